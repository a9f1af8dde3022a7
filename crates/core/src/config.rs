use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u16(profile: &str, key: &str, default: u16) -> u16 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

/// Process-level configuration read from the environment.
///
/// Engine settings (cache, scheduler, scopes) live in the TOML settings
/// file that `paths.settings_file` points at.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub paths: PathsConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `ALMANAC_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("ALMANAC_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            paths: PathsConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
        tracing::info!("  settings:    {}", self.paths.settings_file.display());
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "ALMANAC_HOST", "0.0.0.0"),
            port: profiled_env_u16(p, "ALMANAC_PORT", 8123),
        }
    }
}

// ── Paths ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub settings_file: PathBuf,
}

impl PathsConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            settings_file: PathBuf::from(profiled_env_or(
                p,
                "ALMANAC_SETTINGS",
                "config/almanac.toml",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiled_lookup_prefers_prefixed_key() {
        env::set_var("CFGTEST_ALMANAC_PORT", "9001");
        let config = Config::for_profile("cfgtest");
        assert_eq!(config.profile, "CFGTEST");
        assert_eq!(config.server.port, 9001);
        env::remove_var("CFGTEST_ALMANAC_PORT");
    }

    #[test]
    fn unparsable_port_falls_back_to_default() {
        env::set_var("BADPORT_ALMANAC_PORT", "not-a-port");
        let config = Config::for_profile("badport");
        assert_eq!(config.server.port, 8123);
        env::remove_var("BADPORT_ALMANAC_PORT");
    }

    #[test]
    fn default_profile_label() {
        let config = Config::for_profile("");
        assert_eq!(config.profile_label(), "default");
    }
}
