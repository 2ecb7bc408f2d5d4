//! Shared test-only helpers for snipstash_core.

use crate::store::{Command, KeyValueStore, MemoryStore, Reply, SharedStore, StoreError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Memory store with switchable failures.
///
/// Failures mimic Redis pipelines: a rejected command fails the whole round
/// trip, and nothing in that round trip is applied.
#[derive(Default)]
pub(crate) struct FaultyStore {
    inner: MemoryStore,
    fail_all: AtomicBool,
    failing_prefixes: Mutex<Vec<String>>,
    round_trips: AtomicUsize,
}

impl FaultyStore {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fail every round trip while `enabled`.
    pub(crate) fn fail_all(&self, enabled: bool) {
        self.fail_all.store(enabled, Ordering::SeqCst);
    }

    /// Fail round trips containing a command whose key starts with `prefix`.
    pub(crate) fn fail_keys_with_prefix(&self, prefix: &str) {
        self.failing_prefixes
            .lock()
            .expect("prefix lock")
            .push(prefix.to_string());
    }

    /// Number of pipelines received so far, including failed ones.
    pub(crate) fn round_trips(&self) -> usize {
        self.round_trips.load(Ordering::SeqCst)
    }

    /// The wrapped store, for seeding and inspection without fault injection.
    pub(crate) fn inner(&self) -> &MemoryStore {
        &self.inner
    }
}

#[async_trait]
impl KeyValueStore for FaultyStore {
    async fn pipeline(
        &self,
        commands: &[Command],
    ) -> Result<Vec<Result<Reply, StoreError>>, StoreError> {
        self.round_trips.fetch_add(1, Ordering::SeqCst);
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected outage".to_string()));
        }
        let prefixes = self.failing_prefixes.lock().expect("prefix lock").clone();
        if let Some(command) = commands
            .iter()
            .find(|command| prefixes.iter().any(|prefix| command.key().starts_with(prefix)))
        {
            return Err(StoreError::Command(format!(
                "injected failure on '{}'",
                command.key()
            )));
        }
        self.inner.pipeline(commands).await
    }
}

/// A fresh in-memory store behind the shared handle type.
pub(crate) fn memory_store() -> SharedStore {
    Arc::new(MemoryStore::new())
}
