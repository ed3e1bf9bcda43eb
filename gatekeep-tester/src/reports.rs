use std::io::Write;
use std::time::Duration;

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use crate::runner::{GameRecord, PolicySummary};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    summaries: &'a [PolicySummary],
    games: &'a [GameRecord],
}

pub fn generate_console_report<W: Write + ?Sized>(
    writer: &mut W,
    summaries: &[PolicySummary],
    total_duration: Duration,
) -> Result<()> {
    writeln!(writer)?;
    writeln!(writer, "{}", "📊 Admission Run Summary".bright_cyan().bold())?;
    writeln!(writer, "{}", "========================".cyan())?;

    let games: usize = summaries.iter().map(|s| s.games).sum();
    let completed: usize = summaries.iter().map(|s| s.completed).sum();
    writeln!(writer, "Games played: {games}")?;
    writeln!(writer, "Completed: {}", completed.to_string().green())?;
    writeln!(writer, "Failed: {}", (games - completed).to_string().red())?;
    writeln!(writer, "Total time: {total_duration:?}")?;
    writeln!(writer)?;

    for summary in summaries {
        writeln!(
            writer,
            "{} scenario {} ({}) with {}",
            "▶".bright_blue(),
            summary.scenario,
            summary.scenario_name,
            summary.policy.label().bold()
        )?;
        writeln!(
            writer,
            "   Completed: {}/{} ({:.1}%)",
            summary.completed,
            summary.games,
            summary.win_rate * 100.0
        )?;
        if summary.infeasible > 0 {
            writeln!(
                writer,
                "   Constraints infeasible: {}",
                summary.infeasible.to_string().yellow()
            )?;
        }
        if summary.max_rejections > 0 {
            writeln!(
                writer,
                "   Rejection cap reached: {}",
                summary.max_rejections.to_string().red()
            )?;
        }
        writeln!(
            writer,
            "   Mean admitted: {:.1}, mean rejected: {:.1}",
            summary.mean_admitted, summary.mean_rejected
        )?;
        writeln!(writer)?;
    }
    Ok(())
}

pub fn generate_json_report<W: Write + ?Sized>(
    writer: &mut W,
    summaries: &[PolicySummary],
    games: &[GameRecord],
) -> Result<()> {
    let report = JsonReport { summaries, games };
    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)?;
    Ok(())
}

pub fn generate_markdown_report<W: Write + ?Sized>(
    writer: &mut W,
    summaries: &[PolicySummary],
) -> Result<()> {
    writeln!(writer, "# Gatekeep Admission Results\n")?;
    if summaries.is_empty() {
        writeln!(writer, "_No games played._")?;
        return Ok(());
    }
    writeln!(
        writer,
        "| Scenario | Policy | Games | Completed | Infeasible | Rejection cap | Mean admitted | Mean rejected |"
    )?;
    writeln!(
        writer,
        "|----------|--------|-------|-----------|------------|---------------|---------------|---------------|"
    )?;
    for s in summaries {
        writeln!(
            writer,
            "| {} ({}) | {} | {} | {} | {} | {} | {:.1} | {:.1} |",
            s.scenario,
            s.scenario_name,
            s.policy,
            s.games,
            s.completed,
            s.infeasible,
            s.max_rejections,
            s.mean_admitted,
            s.mean_rejected
        )?;
    }
    Ok(())
}
