//! TOML engine settings.
//!
//! Every section is optional. A file that is missing or fails to parse
//! yields the defaults, unless the path was given explicitly.

use std::path::Path;

use almanac_compute::{CacheConfig, EngineConfig, ProviderConfig, SchedulerConfig};
use almanac_core::ScopeConfig;
use almanac_notify::NotifyConfig;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Cannot read settings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Duplicate scope id '{0}'")]
    DuplicateScope(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub scopes: Vec<ScopeConfig>,
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Self, SettingsError> {
        let settings: Settings = toml::from_str(text)?;
        let mut seen = std::collections::HashSet::new();
        for scope in &settings.scopes {
            if !seen.insert(scope.id.as_str()) {
                return Err(SettingsError::DuplicateScope(scope.id.clone()));
            }
        }
        Ok(settings)
    }

    /// Read and parse `path`, failing on any error.
    pub fn read(path: &Path) -> Result<Self, SettingsError> {
        let text = std::fs::read_to_string(path).map_err(|source| SettingsError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Read `path`. When `explicit` is false a missing or broken file falls
    /// back to the defaults with a warning; otherwise it is an error.
    pub fn load(path: &Path, explicit: bool) -> Result<Self, SettingsError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(source) if explicit => {
                return Err(SettingsError::Read {
                    path: path.display().to_string(),
                    source,
                })
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Settings file not readable, using defaults");
                return Ok(Self::default());
            }
        };

        match Self::from_toml(&text) {
            Ok(settings) => {
                info!(
                    path = %path.display(),
                    scopes = settings.scopes.len(),
                    "Settings loaded"
                );
                Ok(settings)
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to parse settings, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            cache: self.cache.clone(),
            scheduler: self.scheduler.clone(),
            provider: self.provider.clone(),
        }
    }
}
