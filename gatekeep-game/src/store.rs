//! Session store implementations.
//!
//! Both stores address sessions individually; no operation rewrites more
//! than the one session it names.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use thiserror::Error;

use crate::SessionStore;
use crate::session::{Session, SessionId};

/// In-process store backed by a hash map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemoryStore {
    type Error = Infallible;

    fn load(&self, id: &SessionId) -> Result<Option<Session>, Self::Error> {
        Ok(self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }

    fn save(&self, id: &SessionId, session: &Session) -> Result<(), Self::Error> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(*id, session.clone());
        Ok(())
    }

    fn delete(&self, id: &SessionId) -> Result<(), Self::Error> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("session file {path} could not be accessed")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("session file {path} is not a valid session")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// One JSON document per session under a directory.
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// reader never observes a half-written session.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &SessionId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

impl SessionStore for JsonFileStore {
    type Error = StoreError;

    fn load(&self, id: &SessionId) -> Result<Option<Session>, Self::Error> {
        let path = self.path_for(id);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|source| StoreError::Corrupt { path, source })
    }

    fn save(&self, id: &SessionId, session: &Session) -> Result<(), Self::Error> {
        let path = self.path_for(id);
        let json = serde_json::to_string_pretty(session).map_err(|source| StoreError::Corrupt {
            path: path.clone(),
            source,
        })?;
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, json).map_err(|source| StoreError::Io {
            path: staging.clone(),
            source,
        })?;
        fs::rename(&staging, &path).map_err(|source| StoreError::Io { path, source })
    }

    fn delete(&self, id: &SessionId) -> Result<(), Self::Error> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}
