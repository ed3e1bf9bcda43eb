mod policy;
mod reports;
mod runner;

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use gatekeep_game::{
    AsyncGameEngine, GameConfig, GameEngine, MemoryStore, SamplerConfig, Scenario, StatisticsMode,
};
use policy::PolicyKind;
use runner::{RunPlan, run_plan, summarize};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatisticsArg {
    /// Fresh random statistics per game
    Random,
    /// Fixed per-scenario statistics
    Preset,
}

impl From<StatisticsArg> for StatisticsMode {
    fn from(arg: StatisticsArg) -> Self {
        match arg {
            StatisticsArg::Random => Self::Random,
            StatisticsArg::Preset => Self::Preset,
        }
    }
}

#[derive(Debug, Parser)]
#[command(name = "gatekeep-tester", version = "0.1.0")]
#[command(about = "Automated admission policy runs for the Gatekeep game")]
struct Args {
    /// Scenarios to run, by id or name (comma-separated, or "all")
    #[arg(long, default_value = "all")]
    scenarios: String,

    /// Admission policies to run (comma-separated, or "all")
    #[arg(long, default_value = "greedy")]
    policies: String,

    /// List all available scenarios and exit
    #[arg(long)]
    list_scenarios: bool,

    /// Games per scenario and policy
    #[arg(long, default_value_t = 10)]
    games: u32,

    /// Base seed; every game seed derives from it
    #[arg(long, default_value_t = 1337)]
    seed: u64,

    /// Where attribute statistics come from (default: preset, or the config file's choice)
    #[arg(long, value_enum)]
    statistics: Option<StatisticsArg>,

    /// JSON game config file (caps and sampler settings)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Use the exact quantile and adaptive factorization
    #[arg(long)]
    high_fidelity: bool,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_scenarios(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let config = build_config(&args)?;
    let plan = RunPlan {
        scenarios: expand_scenarios(&args.scenarios),
        policies: expand_policies(&args.policies),
        games: args.games,
        seed: args.seed,
    };
    if plan.scenarios.is_empty() || plan.policies.is_empty() {
        bail!("nothing to run: no known scenarios or policies selected");
    }

    println!(
        "{} {} scenario(s) × {} policy(ies) × {} game(s)",
        "🚪 Running".bright_yellow().bold(),
        plan.scenarios.len(),
        plan.policies.len(),
        plan.games
    );
    let engine = AsyncGameEngine::new(GameEngine::with_config(MemoryStore::new(), config)?);
    let records = run_plan(&engine, &plan, args.verbose).await?;
    let summaries = summarize(&records);

    let mut output_target = OutputTarget::new(args.output.clone())?;
    match args.report.as_str() {
        "json" => reports::generate_json_report(&mut output_target, &summaries, &records)?,
        "markdown" => reports::generate_markdown_report(&mut output_target, &summaries)?,
        _ => reports::generate_console_report(
            &mut output_target,
            &summaries,
            start_time.elapsed(),
        )?,
    }
    output_target.flush_inner()?;

    println!("🏁 Total time: {:?}", start_time.elapsed());
    Ok(())
}

fn maybe_list_scenarios(args: &Args) -> Result<bool> {
    if !args.list_scenarios {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available scenarios:")?;
    for scenario in Scenario::all() {
        let needs: Vec<String> = scenario
            .constraints
            .iter()
            .map(|c| format!("{} ≥ {}", c.attribute, c.min_count))
            .collect();
        writeln!(
            output_target.writer(),
            "  {} {:12} - {}",
            scenario.id,
            scenario.name,
            needs.join(", ")
        )?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🎟️  Gatekeep Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn build_config(args: &Args) -> Result<GameConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            GameConfig::from_json(&text)
                .with_context(|| format!("invalid game config {}", path.display()))?
        }
        None => GameConfig::default().with_statistics(StatisticsMode::Preset),
    };
    if let Some(statistics) = args.statistics {
        config = config.with_statistics(statistics.into());
    }
    if args.high_fidelity {
        config = config.with_sampler(SamplerConfig::high_fidelity());
    }
    Ok(config)
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn expand_scenarios(raw: &str) -> Vec<&'static Scenario> {
    let mut selected: Vec<&'static Scenario> = Vec::new();
    for token in split_csv(raw) {
        let found: Vec<&'static Scenario> = if token.eq_ignore_ascii_case("all") {
            Scenario::all().iter().collect()
        } else {
            Scenario::all()
                .iter()
                .filter(|s| token.parse::<u8>().ok() == Some(s.id) || s.name == token)
                .collect()
        };
        if found.is_empty() {
            eprintln!("⚠️  Unknown scenario: {}", token.yellow());
        }
        for scenario in found {
            if !selected.iter().any(|s| s.id == scenario.id) {
                selected.push(scenario);
            }
        }
    }
    selected
}

fn expand_policies(raw: &str) -> Vec<PolicyKind> {
    let mut selected = Vec::new();
    for token in split_csv(raw) {
        let found: Vec<PolicyKind> = if token.eq_ignore_ascii_case("all") {
            PolicyKind::ALL.to_vec()
        } else if let Some(kind) = PolicyKind::parse(&token) {
            vec![kind]
        } else {
            eprintln!("⚠️  Unknown policy: {}", token.yellow());
            Vec::new()
        };
        for kind in found {
            if !selected.contains(&kind) {
                selected.push(kind);
            }
        }
    }
    selected
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Args {
        Args {
            scenarios: "all".to_string(),
            policies: "greedy".to_string(),
            list_scenarios: false,
            games: 1,
            seed: 1337,
            statistics: None,
            config: None,
            high_fidelity: false,
            report: "json".to_string(),
            verbose: false,
            output: None,
        }
    }

    #[test]
    fn scenarios_expand_by_id_name_and_all() {
        let ids = |raw| {
            expand_scenarios(raw)
                .iter()
                .map(|s| s.id)
                .collect::<Vec<_>>()
        };
        assert_eq!(ids("all"), vec![1, 2, 3]);
        assert_eq!(ids("3, dress-code"), vec![3, 1]);
        assert_eq!(ids("2,2,local-scene"), vec![2]);
        assert!(ids("nope").is_empty());
    }

    #[test]
    fn policies_expand_and_deduplicate() {
        assert_eq!(expand_policies("all"), PolicyKind::ALL.to_vec());
        assert_eq!(
            expand_policies("random, greedy,random"),
            vec![PolicyKind::Random, PolicyKind::Greedy]
        );
        assert!(expand_policies("timid").is_empty());
    }

    #[test]
    fn config_layers_file_then_flags() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"reject_cap": 500}"#).unwrap();

        let mut args = base_args();
        args.config = Some(path);
        args.statistics = Some(StatisticsArg::Preset);
        args.high_fidelity = true;
        let config = build_config(&args).unwrap();
        assert_eq!(config.reject_cap, 500);
        assert_eq!(config.admit_cap, 1_000);
        assert_eq!(config.statistics, StatisticsMode::Preset);
        assert_eq!(config.sampler, SamplerConfig::high_fidelity());
    }

    #[test]
    fn config_file_statistics_apply_without_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"statistics": "random"}"#).unwrap();

        let path = path.to_str().unwrap();
        let args = Args::try_parse_from(["gatekeep-tester", "--config", path]).unwrap();
        assert!(args.statistics.is_none());
        assert_eq!(build_config(&args).unwrap().statistics, StatisticsMode::Random);
    }

    #[test]
    fn statistics_flag_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"statistics": "random"}"#).unwrap();

        let path = path.to_str().unwrap();
        let args = Args::try_parse_from([
            "gatekeep-tester",
            "--config",
            path,
            "--statistics",
            "preset",
        ])
        .unwrap();
        assert_eq!(build_config(&args).unwrap().statistics, StatisticsMode::Preset);
    }

    #[test]
    fn statistics_default_to_preset_without_file_or_flag() {
        let args = Args::try_parse_from(["gatekeep-tester"]).unwrap();
        assert_eq!(build_config(&args).unwrap().statistics, StatisticsMode::Preset);
    }

    #[test]
    fn missing_config_file_is_reported() {
        let mut args = base_args();
        args.config = Some(PathBuf::from("/definitely/not/here.json"));
        let err = build_config(&args).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }

    #[test]
    fn output_target_writes_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        let mut target = OutputTarget::new(Some(path.clone())).unwrap();
        writeln!(target, "hello").unwrap();
        target.flush_inner().unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hello\n");
    }
}
