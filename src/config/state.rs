// Application state module
// Shared between connections: configuration, the orientation tracker and cached flags

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use super::types::Config;
use crate::sensor::OrientationTracker;

/// Application state
pub struct AppState {
    pub config: Config,
    pub tracker: Arc<OrientationTracker>,

    // Cached config values for fast access without locks
    pub cached_access_log: AtomicBool,
}

impl AppState {
    pub fn new(config: &Config, tracker: Arc<OrientationTracker>) -> Self {
        Self {
            config: config.clone(),
            tracker,
            cached_access_log: AtomicBool::new(config.logging.access_log),
        }
    }

    /// State with a tracker built from the configuration itself
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config,
            Arc::new(OrientationTracker::from_config(&config.sensor)),
        )
    }
}
