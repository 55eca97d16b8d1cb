//! Application-level configuration loading, including the default party parameters.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "TWO_TRUTHS_BACK_CONFIG_PATH";
/// Environment variable selecting the storage backend (`memory` or `redis`).
const STORAGE_MODE_ENV: &str = "STORAGE_MODE";

const DEFAULT_TICK_INTERVAL_MS: u64 = 1_000;
const DEFAULT_SSE_CAPACITY: usize = 32;

/// Storage backend selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// Process-local maps with lazy TTL expiry.
    Memory,
    /// Upstash Redis reached through its REST API.
    Redis,
}

impl StorageMode {
    /// Resolve the storage mode from `STORAGE_MODE`, defaulting to memory.
    pub fn from_env() -> Self {
        match env::var(STORAGE_MODE_ENV) {
            Ok(value) if value.eq_ignore_ascii_case("redis") => StorageMode::Redis,
            Ok(value) if value.is_empty() || value.eq_ignore_ascii_case("memory") => {
                StorageMode::Memory
            }
            Ok(value) => {
                warn!(mode = %value, "unknown storage mode; falling back to in-memory storage");
                StorageMode::Memory
            }
            Err(_) => StorageMode::Memory,
        }
    }
}

/// Parameters applied when a party creation request leaves a field unset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartyDefaults {
    pub groups: u32,
    pub round_timer_sec: u32,
    pub phase_time_limit_sec: u32,
    pub statement_time_limit_sec: u32,
}

impl Default for PartyDefaults {
    fn default() -> Self {
        Self {
            groups: 0,
            round_timer_sec: 120,
            phase_time_limit_sec: 600,
            statement_time_limit_sec: 120,
        }
    }
}

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    tick_interval: Duration,
    sse_capacity: usize,
    party_defaults: PartyDefaults,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        tick_ms = app_config.tick_interval.as_millis() as u64,
                        "loaded configuration"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Cadence of the deadline enforcement tick.
    pub fn tick_interval(&self) -> Duration {
        self.tick_interval
    }

    /// Capacity of each per-party broadcast channel.
    pub fn sse_capacity(&self) -> usize {
        self.sse_capacity
    }

    /// Defaults applied to party creation requests.
    pub fn party_defaults(&self) -> PartyDefaults {
        self.party_defaults
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(DEFAULT_TICK_INTERVAL_MS),
            sse_capacity: DEFAULT_SSE_CAPACITY,
            party_defaults: PartyDefaults::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    tick_interval_ms: Option<u64>,
    sse_capacity: Option<usize>,
    #[serde(default)]
    party_defaults: RawPartyDefaults,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPartyDefaults {
    groups: Option<u32>,
    round_timer_sec: Option<u32>,
    phase_time_limit_sec: Option<u32>,
    statement_time_limit_sec: Option<u32>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        let fallback = PartyDefaults::default();
        let raw = value.party_defaults;
        Self {
            tick_interval: Duration::from_millis(
                value
                    .tick_interval_ms
                    .filter(|ms| *ms > 0)
                    .unwrap_or(DEFAULT_TICK_INTERVAL_MS),
            ),
            sse_capacity: value
                .sse_capacity
                .filter(|capacity| *capacity > 0)
                .unwrap_or(DEFAULT_SSE_CAPACITY),
            party_defaults: PartyDefaults {
                groups: raw.groups.unwrap_or(fallback.groups),
                round_timer_sec: raw.round_timer_sec.unwrap_or(fallback.round_timer_sec),
                phase_time_limit_sec: raw
                    .phase_time_limit_sec
                    .unwrap_or(fallback.phase_time_limit_sec),
                statement_time_limit_sec: raw
                    .statement_time_limit_sec
                    .unwrap_or(fallback.statement_time_limit_sec),
            },
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_config_fills_missing_fields_with_defaults() {
        let raw: RawConfig =
            serde_json::from_str(r#"{"tickIntervalMs": 250, "partyDefaults": {"groups": 2}}"#)
                .unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(config.tick_interval(), Duration::from_millis(250));
        assert_eq!(config.sse_capacity(), DEFAULT_SSE_CAPACITY);
        assert_eq!(config.party_defaults().groups, 2);
        assert_eq!(config.party_defaults().round_timer_sec, 120);
    }

    #[test]
    fn zero_tick_interval_is_ignored() {
        let raw: RawConfig = serde_json::from_str(r#"{"tickIntervalMs": 0}"#).unwrap();
        let config: AppConfig = raw.into();
        assert_eq!(
            config.tick_interval(),
            Duration::from_millis(DEFAULT_TICK_INTERVAL_MS)
        );
    }
}
