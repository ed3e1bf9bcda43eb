//! Session state machine: one admission game advanced one decision at a time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

use crate::attributes::{Attribute, AttributeStatistics, Person};
use crate::config::GameConfig;
use crate::constants::{MSG_CONSTRAINTS_INFEASIBLE, MSG_MAX_REJECTIONS};
use crate::error::ErrorKind;
use crate::sampler::{CorrelatedSampler, SamplerError};
use crate::scenarios::Scenario;
use crate::seed::person_rng;

/// Opaque session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for SessionId {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| SessionError::MalformedId(s.to_string()))
    }
}

/// Rejected calls; none of them touch session state.
#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error("unknown scenario {0}")]
    UnknownScenario(u8),
    #[error("malformed session id `{0}`")]
    MalformedId(String),
    #[error("person index {supplied} does not match current person {expected}")]
    PersonIndexMismatch { expected: u32, supplied: u32 },
    #[error("a decision is required for person {index}")]
    MissingDecision { index: u32 },
    #[error("missing parameter `{0}`")]
    MissingParameter(&'static str),
    #[error("invalid value `{value}` for parameter `{name}`")]
    InvalidParameter { name: &'static str, value: String },
    #[error(transparent)]
    Sampler(#[from] SamplerError),
}

impl SessionError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Sampler(_) => ErrorKind::Internal,
            _ => ErrorKind::InvalidInput,
        }
    }
}

/// Why a session failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureReason {
    #[serde(rename = "Maximum rejections reached")]
    MaxRejections,
    #[serde(rename = "Cannot meet minimum constraints with remaining capacity")]
    ConstraintsInfeasible,
}

impl FailureReason {
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::MaxRejections => MSG_MAX_REJECTIONS,
            Self::ConstraintsInfeasible => MSG_CONSTRAINTS_INFEASIBLE,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Lifecycle status; `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum SessionStatus {
    #[default]
    Running,
    Completed,
    Failed(FailureReason),
}

impl SessionStatus {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Running)
    }

    #[must_use]
    pub const fn failure_reason(self) -> Option<FailureReason> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed(_) => "failed",
        }
    }
}

/// Admission progress for one attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    pub attribute: Attribute,
    pub current: u32,
    pub target: u32,
}

impl Constraint {
    #[must_use]
    pub const fn new(attribute: Attribute, target: u32) -> Self {
        Self {
            attribute,
            current: 0,
            target,
        }
    }

    /// Admissions with this attribute still needed.
    #[must_use]
    pub const fn outstanding(&self) -> u32 {
        self.target.saturating_sub(self.current)
    }

    #[must_use]
    pub const fn is_met(&self) -> bool {
        self.current >= self.target
    }
}

/// The person currently awaiting a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentPerson {
    pub index: u32,
    pub attributes: Person,
}

/// Fixed facts chosen at session creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMeta {
    pub id: SessionId,
    pub scenario: u8,
    pub seed: u64,
    pub stats: AttributeStatistics,
}

/// Result reported to the caller of [`Session::decide`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    #[serde(rename_all = "camelCase")]
    Running {
        admitted_count: u32,
        rejected_count: u32,
        next_person: CurrentPerson,
    },
    #[serde(rename_all = "camelCase")]
    Completed { rejected_count: u32 },
    #[serde(rename_all = "camelCase")]
    Failed {
        reason: FailureReason,
        rejected_count: u32,
    },
}

impl Outcome {
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        match self {
            Self::Running { .. } => SessionStatus::Running,
            Self::Completed { .. } => SessionStatus::Completed,
            Self::Failed { reason, .. } => SessionStatus::Failed(*reason),
        }
    }

    #[must_use]
    pub const fn rejected_count(&self) -> u32 {
        match self {
            Self::Running { rejected_count, .. }
            | Self::Completed { rejected_count }
            | Self::Failed { rejected_count, .. } => *rejected_count,
        }
    }

    #[must_use]
    pub const fn next_person(&self) -> Option<&CurrentPerson> {
        match self {
            Self::Running { next_person, .. } => Some(next_person),
            _ => None,
        }
    }
}

/// A transition's outcome and whether it changed the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub outcome: Outcome,
    pub changed: bool,
}

/// Summary handed back when a session is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGame {
    pub id: SessionId,
    pub scenario: u8,
    pub constraints: Vec<Constraint>,
    pub attribute_statistics: AttributeStatistics,
    pub initial_person: CurrentPerson,
}

/// One game's complete persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub meta: SessionMeta,
    #[serde(flatten)]
    pub status: SessionStatus,
    pub current_person: CurrentPerson,
    pub admitted: u32,
    pub rejected: u32,
    pub constraints: Vec<Constraint>,
}

impl Session {
    /// Start a session for `scenario` and draw the person at index 0.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Sampler`] if `stats` cannot be sampled under
    /// the configured numeric methods.
    pub fn start(
        id: SessionId,
        scenario: &Scenario,
        stats: AttributeStatistics,
        seed: u64,
        config: &GameConfig,
    ) -> Result<Self, SessionError> {
        let sampler = CorrelatedSampler::new(&stats, &config.sampler)?;
        let first = sampler.draw(&mut person_rng(seed, 0));
        let constraints = scenario
            .constraints
            .iter()
            .map(|c| Constraint::new(c.attribute, c.min_count))
            .collect();
        Ok(Self {
            meta: SessionMeta {
                id,
                scenario: scenario.id,
                seed,
                stats,
            },
            status: SessionStatus::Running,
            current_person: CurrentPerson {
                index: 0,
                attributes: first,
            },
            admitted: 0,
            rejected: 0,
            constraints,
        })
    }

    #[must_use]
    pub const fn id(&self) -> &SessionId {
        &self.meta.id
    }

    #[must_use]
    pub fn new_game(&self) -> NewGame {
        NewGame {
            id: self.meta.id,
            scenario: self.meta.scenario,
            constraints: self.constraints.clone(),
            attribute_statistics: self.meta.stats.clone(),
            initial_person: self.current_person.clone(),
        }
    }

    /// Largest single outstanding constraint (0 when all are met).
    #[must_use]
    pub fn min_required(&self) -> u32 {
        self.constraints
            .iter()
            .map(Constraint::outstanding)
            .max()
            .unwrap_or(0)
    }

    /// Necessary condition for winning: the tightest constraint alone still
    /// fits in the remaining capacity. Joint packing of several constraints
    /// into the same admissions is not considered.
    #[must_use]
    pub fn is_feasible(&self, admit_cap: u32) -> bool {
        admit_cap.saturating_sub(self.admitted) >= self.min_required()
    }

    /// Report the current state without changing it.
    #[must_use]
    pub fn outcome(&self) -> Outcome {
        match self.status {
            SessionStatus::Running => Outcome::Running {
                admitted_count: self.admitted,
                rejected_count: self.rejected,
                next_person: self.current_person.clone(),
            },
            SessionStatus::Completed => Outcome::Completed {
                rejected_count: self.rejected,
            },
            SessionStatus::Failed(reason) => Outcome::Failed {
                reason,
                rejected_count: self.rejected,
            },
        }
    }

    /// Apply a decision for the current person and advance.
    ///
    /// Terminal sessions report their outcome unchanged whatever the
    /// arguments. Otherwise `person_index` must name the current person and,
    /// past index 0, `accept` must be supplied. Index 0 applies no decision.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] for a mismatched index, a missing decision,
    /// or statistics the configured sampler rejects. The session is left
    /// untouched in every error case.
    pub fn decide(
        &mut self,
        person_index: u32,
        accept: Option<bool>,
        config: &GameConfig,
    ) -> Result<Decision, SessionError> {
        if self.status.is_terminal() {
            return Ok(Decision {
                outcome: self.outcome(),
                changed: false,
            });
        }
        if person_index != self.current_person.index {
            return Err(SessionError::PersonIndexMismatch {
                expected: self.current_person.index,
                supplied: person_index,
            });
        }
        let decision = if person_index > 0 {
            Some(accept.ok_or(SessionError::MissingDecision {
                index: person_index,
            })?)
        } else {
            None
        };
        let sampler = CorrelatedSampler::new(&self.meta.stats, &config.sampler)?;

        if let Some(accepted) = decision {
            self.apply(accepted);
        }

        if self.admitted >= config.admit_cap {
            return Ok(self.finish(SessionStatus::Completed));
        }
        if self.rejected >= config.reject_cap {
            return Ok(self.finish(SessionStatus::Failed(FailureReason::MaxRejections)));
        }
        if decision.is_some() && !self.is_feasible(config.admit_cap) {
            return Ok(self.finish(SessionStatus::Failed(
                FailureReason::ConstraintsInfeasible,
            )));
        }

        let next_index = person_index + 1;
        let next = sampler.draw(&mut person_rng(self.meta.seed, next_index));
        self.current_person = CurrentPerson {
            index: next_index,
            attributes: next,
        };
        log::debug!(
            "session {} advanced to person {next_index} (admitted {}, rejected {})",
            self.meta.id,
            self.admitted,
            self.rejected
        );
        Ok(Decision {
            outcome: self.outcome(),
            changed: true,
        })
    }

    fn apply(&mut self, accepted: bool) {
        if accepted {
            self.admitted += 1;
            let person = &self.current_person.attributes;
            for constraint in &mut self.constraints {
                if person.has(constraint.attribute) {
                    constraint.current += 1;
                }
            }
        } else {
            self.rejected += 1;
        }
    }

    fn finish(&mut self, status: SessionStatus) -> Decision {
        self.status = status;
        log::info!(
            "session {} {} (admitted {}, rejected {})",
            self.meta.id,
            status.failure_reason().map_or("completed", FailureReason::message),
            self.admitted,
            self.rejected
        );
        Decision {
            outcome: self.outcome(),
            changed: true,
        }
    }
}
