use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::{InMemoryStore, SchedulingLocks, SchedulingStore};

use crate::clock::{Clock, SystemClock};

/// Everything a request handler needs: configuration, the store, the lock
/// registries and the clock.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn SchedulingStore>,
    pub locks: Arc<SchedulingLocks>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(config: AppConfig, store: Arc<dyn SchedulingStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: Arc::new(config),
            store,
            locks: Arc::new(SchedulingLocks::new()),
            clock,
        }
    }

    pub fn in_memory(config: AppConfig) -> Self {
        let clock = SystemClock::with_offset_minutes(config.scheduling.utc_offset_minutes);
        Self::new(config, Arc::new(InMemoryStore::new()), Arc::new(clock))
    }
}
