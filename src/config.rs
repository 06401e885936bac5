//! Configuration types.
//!
//! Every recognized option is an explicit field — there is no dynamic
//! property bag. `from_env()` reads the `COURIER_*` environment and
//! `validate()` rejects unusable values at startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Bot display name (used in greetings and the message log).
    pub name: String,
    /// Path to the libSQL database file.
    pub db_path: PathBuf,
    /// Directory where inbound media payloads are stored.
    pub uploads_dir: PathBuf,
    /// Operator conversation address for digests; seeded as admin at startup.
    pub operator_address: Option<String>,
    /// Scheduled-message delivery sweep interval.
    pub sweep_interval: Duration,
    /// Stale-upload cleanup sweep interval.
    pub cleanup_interval: Duration,
    /// Usage-digest sweep interval.
    pub digest_interval: Duration,
    /// Health-snapshot sweep interval.
    pub health_interval: Duration,
    /// Uploaded files older than this are removed by the cleanup sweep.
    pub retention: Duration,
    /// Health sweep warns when process memory exceeds this many MB.
    pub memory_warn_mb: u64,
    /// Per-recipient timeout applied to sweep and broadcast sends.
    pub send_timeout: Duration,
    /// OpenWeatherMap API key for `/weather`.
    pub weather_api_key: Option<String>,
    /// OpenAI API key for `/translate`.
    pub translate_api_key: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            name: "Courier".to_string(),
            db_path: PathBuf::from("./data/courier.db"),
            uploads_dir: PathBuf::from("./uploads"),
            operator_address: None,
            sweep_interval: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(24 * 60 * 60),
            digest_interval: Duration::from_secs(7 * 24 * 60 * 60),
            health_interval: Duration::from_secs(30 * 60),
            retention: Duration::from_secs(7 * 24 * 60 * 60),
            memory_warn_mb: 500,
            send_timeout: Duration::from_secs(10),
            weather_api_key: None,
            translate_api_key: None,
        }
    }
}

impl BotConfig {
    /// Build configuration from the environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            name: std::env::var("COURIER_BOT_NAME").unwrap_or(defaults.name),
            db_path: std::env::var("COURIER_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.db_path),
            uploads_dir: std::env::var("COURIER_UPLOADS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.uploads_dir),
            operator_address: std::env::var("COURIER_OPERATOR").ok().filter(|s| !s.is_empty()),
            sweep_interval: env_secs("COURIER_SWEEP_INTERVAL_SECS", defaults.sweep_interval)?,
            cleanup_interval: env_secs("COURIER_CLEANUP_INTERVAL_SECS", defaults.cleanup_interval)?,
            digest_interval: env_secs("COURIER_DIGEST_INTERVAL_SECS", defaults.digest_interval)?,
            health_interval: env_secs("COURIER_HEALTH_INTERVAL_SECS", defaults.health_interval)?,
            retention: env_parse::<u64>("COURIER_RETENTION_DAYS")?
                .map(|d| Duration::from_secs(d * 24 * 60 * 60))
                .unwrap_or(defaults.retention),
            memory_warn_mb: env_parse("COURIER_MEMORY_WARN_MB")?.unwrap_or(defaults.memory_warn_mb),
            send_timeout: env_secs("COURIER_SEND_TIMEOUT_SECS", defaults.send_timeout)?,
            weather_api_key: std::env::var("WEATHER_API_KEY").ok().filter(|s| !s.is_empty()),
            translate_api_key: std::env::var("OPENAI_API_KEY").ok().filter(|s| !s.is_empty()),
        })
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "COURIER_BOT_NAME".into(),
                message: "bot name must not be empty".into(),
            });
        }
        for (key, interval) in [
            ("COURIER_SWEEP_INTERVAL_SECS", self.sweep_interval),
            ("COURIER_CLEANUP_INTERVAL_SECS", self.cleanup_interval),
            ("COURIER_DIGEST_INTERVAL_SECS", self.digest_interval),
            ("COURIER_HEALTH_INTERVAL_SECS", self.health_interval),
            ("COURIER_SEND_TIMEOUT_SECS", self.send_timeout),
        ] {
            if interval.is_zero() {
                return Err(ConfigError::InvalidValue {
                    key: key.into(),
                    message: "interval must be greater than zero".into(),
                });
            }
        }
        Ok(())
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw.parse::<T>().map(Some).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        Err(_) => Ok(None),
    }
}

fn env_secs(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    Ok(env_parse::<u64>(key)?
        .map(Duration::from_secs)
        .unwrap_or(default))
}
