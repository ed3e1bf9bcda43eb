//! Gatekeep Game Engine
//!
//! Core logic for the Gatekeep admission game: persons with correlated
//! boolean attributes arrive one at a time and are admitted or turned away
//! until the venue fills, the rejection budget runs out, or the minimum
//! attribute quotas become unreachable. Transport and presentation live
//! elsewhere; this crate only needs somewhere to keep sessions.

#[cfg(feature = "async")]
pub mod asynchronous;
pub mod attributes;
pub mod config;
pub mod constants;
pub mod error;
pub mod locks;
pub mod numbers;
pub mod numeric;
pub mod request;
pub mod sampler;
pub mod scenarios;
pub mod seed;
pub mod session;
pub mod stats;
pub mod store;

// Re-export commonly used types
#[cfg(feature = "async")]
pub use asynchronous::AsyncGameEngine;
pub use attributes::{Attribute, AttributeStatistics, Person, StatisticsError};
pub use config::{ConfigError, GameConfig};
pub use constants::{ADMIT_CAP, REJECT_CAP};
pub use error::{ErrorKind, GameError};
pub use locks::SessionLocks;
pub use numeric::{
    AcklamQuantile, AdaptiveFactorizer, CholeskyFactorizer, CorrelationFactorizer,
    FactorizationDiagnostic, FactorizationMethod, LuFactorizer, NormalQuantile, QuantileMethod,
    ReferenceQuantile,
};
pub use request::{DecideRequest, parse_scenario};
pub use sampler::{CorrelatedSampler, SamplerConfig, SamplerError, SamplingDiagnostic};
pub use scenarios::{Scenario, ScenarioConstraint};
pub use session::{
    Constraint, CurrentPerson, FailureReason, NewGame, Outcome, Session, SessionError, SessionId,
    SessionStatus,
};
pub use stats::StatisticsMode;
pub use store::{JsonFileStore, MemoryStore, StoreError};

use rand::Rng;

/// Durable keyed storage for session snapshots.
///
/// Implementations only need per-key atomicity; [`GameEngine`] serializes
/// load-modify-save spans for the same id itself.
pub trait SessionStore {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Load a session
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be read.
    fn load(&self, id: &SessionId) -> Result<Option<Session>, Self::Error>;

    /// Save a session, replacing any previous snapshot
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be written.
    fn save(&self, id: &SessionId, session: &Session) -> Result<(), Self::Error>;

    /// Delete a session; deleting a missing id succeeds
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be removed.
    fn delete(&self, id: &SessionId) -> Result<(), Self::Error>;
}

/// Main game engine for creating and advancing sessions
pub struct GameEngine<S>
where
    S: SessionStore,
{
    store: S,
    config: GameConfig,
    locks: SessionLocks,
}

impl<S> GameEngine<S>
where
    S: SessionStore,
{
    /// Create an engine with the default configuration
    pub fn new(store: S) -> Self {
        Self {
            store,
            config: GameConfig::default(),
            locks: SessionLocks::new(),
        }
    }

    /// Create an engine with a custom configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_config(store: S, config: GameConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            locks: SessionLocks::new(),
        })
    }

    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Start a new game for `scenario_id` with a random seed
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario is unknown or the session cannot be saved.
    pub fn create(&self, scenario_id: u8) -> Result<NewGame, GameError> {
        let seed = rand::thread_rng().r#gen();
        self.create_with_seed(scenario_id, seed)
    }

    /// Start a new game whose statistics and person sequence derive from `seed`
    ///
    /// # Errors
    ///
    /// Returns an error if the scenario is unknown or the session cannot be saved.
    pub fn create_with_seed(&self, scenario_id: u8, seed: u64) -> Result<NewGame, GameError> {
        let scenario =
            Scenario::find(scenario_id).ok_or(SessionError::UnknownScenario(scenario_id))?;
        let stats = stats::for_scenario(
            scenario,
            self.config.statistics,
            &mut seed::statistics_rng(seed),
        );
        let id = SessionId::random();
        let session = Session::start(id, scenario, stats, seed, &self.config)?;
        self.store.save(&id, &session).map_err(GameError::store)?;
        log::info!("session {id} created for scenario {scenario_id}");
        Ok(session.new_game())
    }

    /// Apply a decision to the session named by the raw id `id`
    ///
    /// # Errors
    ///
    /// Returns an error for malformed ids, unknown sessions, rejected
    /// decisions, or store failures. Nothing is written on error.
    pub fn decide(
        &self,
        id: &str,
        person_index: u32,
        accept: Option<bool>,
    ) -> Result<Outcome, GameError> {
        let id: SessionId = id.parse()?;
        self.decide_session(&id, person_index, accept)
    }

    /// Apply a pre-validated decision request
    ///
    /// # Errors
    ///
    /// See [`GameEngine::decide`].
    pub fn decide_request(&self, request: &DecideRequest) -> Result<Outcome, GameError> {
        self.decide_session(&request.id, request.person_index, request.accept)
    }

    /// Apply a decision to session `id` under its per-id lock
    ///
    /// # Errors
    ///
    /// See [`GameEngine::decide`].
    pub fn decide_session(
        &self,
        id: &SessionId,
        person_index: u32,
        accept: Option<bool>,
    ) -> Result<Outcome, GameError> {
        self.locks.hold(id, || {
            let mut session = self.load_existing(id)?;
            let decision = session.decide(person_index, accept, &self.config)?;
            if decision.changed {
                self.store.save(id, &session).map_err(GameError::store)?;
            }
            Ok(decision.outcome)
        })
    }

    /// Load a snapshot of session `id`
    ///
    /// # Errors
    ///
    /// Returns an error for malformed ids, unknown sessions, or store failures.
    pub fn session(&self, id: &str) -> Result<Session, GameError> {
        let id: SessionId = id.parse()?;
        self.load_existing(&id)
    }

    fn load_existing(&self, id: &SessionId) -> Result<Session, GameError> {
        self.store
            .load(id)
            .map_err(GameError::store)?
            .ok_or(GameError::NotFound(*id))
    }
}
