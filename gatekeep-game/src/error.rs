use thiserror::Error;

use crate::session::{SessionError, SessionId};

/// Coarse classification callers use to map failures onto their own surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rejected before any state was touched.
    InvalidInput,
    /// No session stored under the requested id.
    NotFound,
    /// The session store failed to read or write.
    Storage,
    /// Sampling could not be prepared or a worker task died.
    Internal,
}

/// Errors surfaced by [`crate::GameEngine`].
#[derive(Debug, Error)]
pub enum GameError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("session {0} not found")]
    NotFound(SessionId),
    #[error("session store failure")]
    Store(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("engine task failed: {0}")]
    Task(String),
}

impl GameError {
    pub(crate) fn store<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Store(Box::new(error))
    }

    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Session(err) => err.kind(),
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Store(_) => ErrorKind::Storage,
            Self::Task(_) => ErrorKind::Internal,
        }
    }
}
