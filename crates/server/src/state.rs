use std::sync::Arc;

use almanac_compute::AlmanacEngine;

use crate::reload::SettingsReloader;

/// Shared handler state.
pub struct AppState {
    pub engine: Arc<AlmanacEngine>,
    /// Present when the server was started from a settings file.
    pub reloader: Option<Arc<SettingsReloader>>,
}

impl AppState {
    pub fn new(engine: Arc<AlmanacEngine>) -> Self {
        Self {
            engine,
            reloader: None,
        }
    }

    pub fn with_reloader(mut self, reloader: Arc<SettingsReloader>) -> Self {
        self.reloader = Some(reloader);
        self
    }
}
