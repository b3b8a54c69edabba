//! Document persistence capability.

use std::collections::HashMap;
use std::sync::Mutex;

use thiserror::Error;

use serialtrack_core::{AggregateId, ExpectedVersion};

/// Persistence failure surfaced to the session.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The stored snapshot moved underneath the caller.
    #[error("snapshot conflict: {0}")]
    Conflict(String),

    /// Backend failure (transport, disk, serialization).
    #[error("storage backend failure")]
    Backend(#[from] anyhow::Error),
}

/// Persist document snapshots.
///
/// Supplied by external document storage. The session invokes this after
/// changes, never the reconciler. `expected` guards against a stale session
/// overwriting a newer snapshot.
pub trait DocumentStore<S>: Send + Sync {
    fn save(
        &self,
        id: AggregateId,
        expected: ExpectedVersion,
        version: u64,
        snapshot: S,
    ) -> Result<(), StoreError>;

    fn load(&self, id: AggregateId) -> Result<Option<(u64, S)>, StoreError>;
}

impl<S, T> DocumentStore<S> for std::sync::Arc<T>
where
    T: DocumentStore<S> + ?Sized,
{
    fn save(
        &self,
        id: AggregateId,
        expected: ExpectedVersion,
        version: u64,
        snapshot: S,
    ) -> Result<(), StoreError> {
        (**self).save(id, expected, version, snapshot)
    }

    fn load(&self, id: AggregateId) -> Result<Option<(u64, S)>, StoreError> {
        (**self).load(id)
    }
}

/// In-memory store for tests and single-process sessions.
#[derive(Debug, Default)]
pub struct InMemoryStore<S> {
    inner: Mutex<HashMap<AggregateId, (u64, S)>>,
}

impl<S> InMemoryStore<S> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(HashMap::new()),
        }
    }
}

impl<S: Clone + Send> DocumentStore<S> for InMemoryStore<S> {
    fn save(
        &self,
        id: AggregateId,
        expected: ExpectedVersion,
        version: u64,
        snapshot: S,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if let Some((stored_version, _)) = inner.get(&id) {
            expected
                .check(*stored_version)
                .map_err(|e| StoreError::Conflict(e.to_string()))?;
        }

        inner.insert(id, (version, snapshot));
        Ok(())
    }

    fn load(&self, id: AggregateId) -> Result<Option<(u64, S)>, StoreError> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(inner.get(&id).cloned())
    }
}
