use std::collections::BTreeMap;

use anyhow::{Context, Result};
use gatekeep_game::numbers::{mean, share};
use gatekeep_game::{
    AsyncGameEngine, FailureReason, MemoryStore, Outcome, Scenario, SessionStatus, SessionStore,
};
use serde::Serialize;
use tokio::task::JoinSet;

use crate::policy::{DoorView, PolicyKind};

/// Which games to play.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub scenarios: Vec<&'static Scenario>,
    pub policies: Vec<PolicyKind>,
    pub games: u32,
    pub seed: u64,
}

impl RunPlan {
    /// Seed for one game; distinct across scenarios and game numbers.
    #[must_use]
    pub fn game_seed(&self, scenario: u8, game: u32) -> u64 {
        self.seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(u64::from(scenario) << 32)
            .wrapping_add(u64::from(game))
    }
}

/// Result of one finished game.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameRecord {
    pub scenario: u8,
    pub policy: PolicyKind,
    pub seed: u64,
    #[serde(flatten)]
    pub status: SessionStatus,
    pub admitted: u32,
    pub rejected: u32,
}

/// Aggregate over all games of one scenario/policy pair.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySummary {
    pub scenario: u8,
    pub scenario_name: &'static str,
    pub policy: PolicyKind,
    pub games: usize,
    pub completed: usize,
    pub max_rejections: usize,
    pub infeasible: usize,
    pub win_rate: f64,
    pub mean_admitted: f64,
    pub mean_rejected: f64,
}

/// Play every game in `plan` concurrently.
///
/// # Errors
///
/// Returns the first engine error or task failure; a game that merely ends
/// in failure is not an error.
pub async fn run_plan(
    engine: &AsyncGameEngine<MemoryStore>,
    plan: &RunPlan,
    verbose: bool,
) -> Result<Vec<GameRecord>> {
    let mut tasks = JoinSet::new();
    for scenario in &plan.scenarios {
        for &policy in &plan.policies {
            for game in 0..plan.games {
                let engine = engine.clone();
                let (scenario, seed) = (scenario.id, plan.game_seed(scenario.id, game));
                tasks.spawn(async move { play_game(&engine, scenario, policy, seed).await });
            }
        }
    }

    let mut records = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let record = joined.context("game task panicked")??;
        if verbose {
            println!(
                "   scenario {} {:<10} seed {:>20}: {} (admitted {}, rejected {})",
                record.scenario,
                record.policy.label(),
                record.seed,
                record.status.as_str(),
                record.admitted,
                record.rejected
            );
        }
        records.push(record);
    }
    records.sort_by_key(|r| (r.scenario, r.policy, r.seed));
    Ok(records)
}

/// Play one game to its end with a fresh `policy`.
///
/// # Errors
///
/// Returns an error if the engine rejects any call.
pub async fn play_game(
    engine: &AsyncGameEngine<MemoryStore>,
    scenario: u8,
    policy: PolicyKind,
    seed: u64,
) -> Result<GameRecord> {
    let admit_cap = engine.engine().config().admit_cap;
    let game = engine.create_with_seed(scenario, seed).await?;
    let id = game.id.to_string();
    let mut constraints = game.constraints;
    let mut chooser = policy.create_policy(seed);

    let mut outcome = engine.decide(id.clone(), 0, None).await?;
    while let Outcome::Running {
        admitted_count,
        next_person,
        ..
    } = &outcome
    {
        let person = &next_person.attributes;
        let accept = chooser.admit(&DoorView {
            person,
            constraints: &constraints,
            admitted: *admitted_count,
            admit_cap,
        });
        if accept {
            for constraint in &mut constraints {
                if person.has(constraint.attribute) {
                    constraint.current += 1;
                }
            }
        }
        let index = next_person.index;
        outcome = engine.decide(id.clone(), index, Some(accept)).await?;
    }

    let session = engine.session(id).await?;
    engine.engine().store().delete(&game.id)?;
    log::debug!(
        "{} finished scenario {scenario} seed {seed}: {}",
        chooser.name(),
        session.status.as_str()
    );
    Ok(GameRecord {
        scenario,
        policy,
        seed,
        status: session.status,
        admitted: session.admitted,
        rejected: session.rejected,
    })
}

/// Group records by scenario and policy.
#[must_use]
pub fn summarize(records: &[GameRecord]) -> Vec<PolicySummary> {
    let mut groups: BTreeMap<(u8, PolicyKind), Vec<&GameRecord>> = BTreeMap::new();
    for record in records {
        groups
            .entry((record.scenario, record.policy))
            .or_default()
            .push(record);
    }

    groups
        .into_iter()
        .map(|((scenario, policy), group)| {
            let count = |status: SessionStatus| group.iter().filter(|r| r.status == status).count();
            let completed = count(SessionStatus::Completed);
            let admitted: Vec<f64> = group.iter().map(|r| f64::from(r.admitted)).collect();
            let rejected: Vec<f64> = group.iter().map(|r| f64::from(r.rejected)).collect();
            PolicySummary {
                scenario,
                scenario_name: Scenario::find(scenario).map_or("unknown", |s| s.name),
                policy,
                games: group.len(),
                completed,
                max_rejections: count(SessionStatus::Failed(FailureReason::MaxRejections)),
                infeasible: count(SessionStatus::Failed(FailureReason::ConstraintsInfeasible)),
                win_rate: share(completed, group.len()),
                mean_admitted: mean(&admitted),
                mean_rejected: mean(&rejected),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeep_game::{GameConfig, GameEngine, StatisticsMode};

    fn engine() -> AsyncGameEngine<MemoryStore> {
        let config = GameConfig::default().with_statistics(StatisticsMode::Preset);
        AsyncGameEngine::new(GameEngine::with_config(MemoryStore::new(), config).unwrap())
    }

    fn plan(policies: Vec<PolicyKind>, games: u32) -> RunPlan {
        RunPlan {
            scenarios: Scenario::all().iter().collect(),
            policies,
            games,
            seed: 1337,
        }
    }

    #[test]
    fn game_seeds_differ_across_scenarios_and_games() {
        let plan = plan(vec![PolicyKind::Greedy], 2);
        assert_ne!(plan.game_seed(1, 0), plan.game_seed(2, 0));
        assert_ne!(plan.game_seed(1, 0), plan.game_seed(1, 1));
        assert_eq!(plan.game_seed(3, 1), plan.game_seed(3, 1));
    }

    #[tokio::test]
    async fn accept_all_games_end_without_rejections() {
        let engine = engine();
        let records = run_plan(&engine, &plan(vec![PolicyKind::AcceptAll], 2), false)
            .await
            .unwrap();
        assert_eq!(records.len(), 6);
        assert!(records.iter().all(|r| r.rejected == 0 && r.status.is_terminal()));
        assert!(engine.engine().store().is_empty());
    }

    #[tokio::test]
    async fn seeded_runs_are_reproducible() {
        let plan = plan(vec![PolicyKind::Random], 1);
        let first = run_plan(&engine(), &plan, false).await.unwrap();
        let second = run_plan(&engine(), &plan, false).await.unwrap();
        let key = |r: &GameRecord| (r.scenario, r.seed, r.status, r.admitted, r.rejected);
        assert_eq!(
            first.iter().map(key).collect::<Vec<_>>(),
            second.iter().map(key).collect::<Vec<_>>()
        );
    }

    #[test]
    fn summaries_count_each_outcome() {
        let record = |status, admitted| GameRecord {
            scenario: 1,
            policy: PolicyKind::Greedy,
            seed: 0,
            status,
            admitted,
            rejected: 10,
        };
        let records = [
            record(SessionStatus::Completed, 1_000),
            record(SessionStatus::Failed(FailureReason::ConstraintsInfeasible), 500),
            record(SessionStatus::Failed(FailureReason::MaxRejections), 0),
            record(SessionStatus::Completed, 1_000),
        ];
        let summaries = summarize(&records);
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.scenario_name, "dress-code");
        assert_eq!(
            (summary.completed, summary.infeasible, summary.max_rejections),
            (2, 1, 1)
        );
        assert!((summary.win_rate - 0.5).abs() < f64::EPSILON);
        assert!((summary.mean_admitted - 625.0).abs() < f64::EPSILON);
        assert!((summary.mean_rejected - 10.0).abs() < f64::EPSILON);
    }
}
