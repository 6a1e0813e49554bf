//! # configs
//!
//! Runtime settings, read from the environment (seeded from a `.env` file by
//! `load_dotenv` when one exists). Variables use the `POSTS` prefix and `__` between sections:
//!
//! ```text
//! POSTS__POST_STORAGE__DUMP_ENABLED=false
//! POSTS__POST_STORAGE__DUMP_INTERVAL_SECS=30
//! POSTS__SERVICE__MAX_CONTENT_LEN=4000
//! POSTS__TELEMETRY__JSON_LOGS=true
//! ```

use std::path::PathBuf;
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment};
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read settings: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid setting {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub post_storage: PostStorageSettings,
    pub service: ServiceSettings,
    pub telemetry: TelemetrySettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostStorageSettings {
    /// Snapshot read once at startup
    pub restore_source: PathBuf,
    /// Snapshot rewritten on every dump
    pub dump_destination: PathBuf,
    /// When false the store is purely in-memory: no restore, no dumps
    pub dump_enabled: bool,
    pub dump_interval_secs: u64,
}

impl PostStorageSettings {
    pub fn dump_interval(&self) -> Duration {
        Duration::from_secs(self.dump_interval_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceSettings {
    pub max_content_len: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelemetrySettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,
    pub json_logs: bool,
}

/// What happened to the `.env` file. Loading runs before logging is set up,
/// so the outcome is kept and reported through `log` afterwards.
#[derive(Debug)]
pub enum DotenvStatus {
    Loaded(PathBuf),
    Missing,
    Unreadable(String),
}

impl DotenvStatus {
    pub fn log(&self) {
        match self {
            Self::Loaded(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Self::Missing => tracing::debug!("no .env file"),
            Self::Unreadable(err) => tracing::warn!(error = %err, "ignoring unreadable .env"),
        }
    }
}

impl From<dotenvy::Result<PathBuf>> for DotenvStatus {
    fn from(result: dotenvy::Result<PathBuf>) -> Self {
        match result {
            Ok(path) => Self::Loaded(path),
            Err(err) if err.not_found() => Self::Missing,
            Err(err) => Self::Unreadable(err.to_string()),
        }
    }
}

/// Copies variables from the nearest `.env` file into the process
/// environment. Call before `Settings::load`.
pub fn load_dotenv() -> DotenvStatus {
    dotenvy::dotenv().into()
}

impl Settings {
    /// Reads the process environment over the built-in defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let builder = Self::defaults()?.add_source(
            Environment::with_prefix("POSTS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );
        Self::from_builder(builder)
    }

    /// Default values for every setting.
    pub fn defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("post_storage.restore_source", "dump")?
            .set_default("post_storage.dump_destination", "dump")?
            .set_default("post_storage.dump_enabled", true)?
            .set_default("post_storage.dump_interval_secs", 5)?
            .set_default("service.max_content_len", 2000)?
            .set_default("telemetry.log_filter", "info")?
            .set_default("telemetry.json_logs", false)?)
    }

    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.post_storage.dump_enabled && self.post_storage.dump_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "post_storage.dump_interval_secs",
                reason: "must be positive when dumps are enabled".into(),
            });
        }
        if self.service.max_content_len == 0 {
            return Err(ConfigError::Invalid {
                key: "service.max_content_len",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }
}
