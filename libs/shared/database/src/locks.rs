// libs/shared/database/src/locks.rs
//
// Per-entity async mutexes serializing check-then-write sequences.
// Acquisition order is always: doctor, patient, then sessions by ascending id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct LockRegistry {
    name: &'static str,
    entries: Mutex<HashMap<Uuid, Arc<AsyncMutex<()>>>>,
}

impl LockRegistry {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn entry(&self, key: Uuid) -> Arc<AsyncMutex<()>> {
        let mut entries = self
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Drop entries nobody is holding or waiting on.
        if entries.len() > 1024 {
            entries.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        entries.entry(key).or_default().clone()
    }

    pub async fn acquire(&self, key: Uuid) -> OwnedMutexGuard<()> {
        debug!("Acquiring {} lock {}", self.name, key);
        self.entry(key).lock_owned().await
    }

    /// Lock several keys in ascending order, skipping duplicates.
    pub async fn acquire_many(&self, keys: &[Uuid]) -> Vec<OwnedMutexGuard<()>> {
        let mut ordered = keys.to_vec();
        ordered.sort();
        ordered.dedup();

        let mut guards = Vec::with_capacity(ordered.len());
        for key in ordered {
            guards.push(self.acquire(key).await);
        }
        guards
    }
}

#[derive(Debug)]
pub struct SchedulingLocks {
    pub doctors: LockRegistry,
    pub patients: LockRegistry,
    pub sessions: LockRegistry,
}

impl Default for SchedulingLocks {
    fn default() -> Self {
        Self::new()
    }
}

impl SchedulingLocks {
    pub fn new() -> Self {
        Self {
            doctors: LockRegistry::new("doctor"),
            patients: LockRegistry::new("patient"),
            sessions: LockRegistry::new("session"),
        }
    }
}
