//! Tokio front for [`GameEngine`].
//!
//! Store implementations are synchronous, so every call runs on the blocking
//! pool; the per-id locks inside the engine keep concurrent decisions on one
//! session ordered.

use std::sync::Arc;

use tokio::task;

use crate::request::DecideRequest;
use crate::session::{NewGame, Outcome, Session};
use crate::{GameEngine, GameError, SessionStore};

/// Cloneable async handle over a shared [`GameEngine`].
pub struct AsyncGameEngine<S>
where
    S: SessionStore,
{
    inner: Arc<GameEngine<S>>,
}

impl<S> Clone for AsyncGameEngine<S>
where
    S: SessionStore,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> AsyncGameEngine<S>
where
    S: SessionStore + Send + Sync + 'static,
{
    pub fn new(engine: GameEngine<S>) -> Self {
        Self {
            inner: Arc::new(engine),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &GameEngine<S> {
        &self.inner
    }

    /// # Errors
    ///
    /// See [`GameEngine::create`].
    pub async fn create(&self, scenario_id: u8) -> Result<NewGame, GameError> {
        self.run(move |engine| engine.create(scenario_id)).await
    }

    /// # Errors
    ///
    /// See [`GameEngine::create_with_seed`].
    pub async fn create_with_seed(&self, scenario_id: u8, seed: u64) -> Result<NewGame, GameError> {
        self.run(move |engine| engine.create_with_seed(scenario_id, seed))
            .await
    }

    /// # Errors
    ///
    /// See [`GameEngine::decide`].
    pub async fn decide(
        &self,
        id: String,
        person_index: u32,
        accept: Option<bool>,
    ) -> Result<Outcome, GameError> {
        self.run(move |engine| engine.decide(&id, person_index, accept))
            .await
    }

    /// # Errors
    ///
    /// See [`GameEngine::decide_request`].
    pub async fn decide_request(&self, request: DecideRequest) -> Result<Outcome, GameError> {
        self.run(move |engine| engine.decide_request(&request)).await
    }

    /// # Errors
    ///
    /// See [`GameEngine::session`].
    pub async fn session(&self, id: String) -> Result<Session, GameError> {
        self.run(move |engine| engine.session(&id)).await
    }

    async fn run<T, F>(&self, f: F) -> Result<T, GameError>
    where
        T: Send + 'static,
        F: FnOnce(&GameEngine<S>) -> Result<T, GameError> + Send + 'static,
    {
        let engine = Arc::clone(&self.inner);
        task::spawn_blocking(move || f(&engine))
            .await
            .map_err(|err| GameError::Task(err.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionError;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn create_and_decide_through_blocking_pool() {
        let engine = AsyncGameEngine::new(GameEngine::new(MemoryStore::new()));
        let game = engine.create_with_seed(2, 17).await.unwrap();
        let id = game.id.to_string();

        let outcome = engine.decide(id.clone(), 0, None).await.unwrap();
        assert_eq!(outcome.next_person().map(|p| p.index), Some(1));

        let outcome = engine.decide(id.clone(), 1, Some(true)).await.unwrap();
        assert_eq!(outcome.rejected_count(), 0);

        let session = engine.session(id).await.unwrap();
        assert_eq!(session.admitted, 1);
        assert_eq!(engine.engine().store().len(), 1);
    }

    #[tokio::test]
    async fn errors_cross_the_task_boundary() {
        let engine = AsyncGameEngine::new(GameEngine::new(MemoryStore::new()));
        let err = engine.create(0).await.unwrap_err();
        assert!(matches!(
            err,
            GameError::Session(SessionError::UnknownScenario(0))
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_decisions_apply_once() {
        let engine = AsyncGameEngine::new(GameEngine::new(MemoryStore::new()));
        let id = engine.create_with_seed(1, 3).await.unwrap().id.to_string();
        engine.decide(id.clone(), 0, None).await.unwrap();

        let mut tasks = task::JoinSet::new();
        for _ in 0..16 {
            let (engine, id) = (engine.clone(), id.clone());
            tasks.spawn(async move { engine.decide(id, 1, Some(false)).await });
        }
        let mut applied = 0;
        while let Some(result) = tasks.join_next().await {
            if result.unwrap().is_ok() {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
        assert_eq!(engine.session(id).await.unwrap().rejected, 1);
    }
}
