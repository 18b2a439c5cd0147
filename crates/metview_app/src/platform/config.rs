//! `metview.toml` loading.
//!
//! Every field has a default, so an empty or missing file yields a working
//! configuration pointed at a local server.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::LevelFilter;
use metview_core::{PollPolicy, PollSettings, ReadinessSource};
use metview_engine::ApiSettings;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILENAME: &str = "metview.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub poll: PollConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub base_url: String,
    pub page_path: String,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_page_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let api = ApiSettings::default();
        Self {
            base_url: api.base_url,
            page_path: api.page_path,
            connect_timeout_secs: api.connect_timeout.as_secs(),
            request_timeout_secs: api.request_timeout.as_secs(),
            max_page_bytes: api.max_page_bytes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessMode {
    #[default]
    Fragment,
    Response,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PollConfig {
    pub readiness: ReadinessMode,
    pub acti_interval_ms: u64,
    pub wrist_interval_ms: u64,
    pub max_attempts: u32,
    pub backoff_factor: f64,
    pub max_interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        let defaults = PollSettings::default();
        Self {
            readiness: ReadinessMode::Fragment,
            acti_interval_ms: duration_ms(defaults.acti.interval),
            wrist_interval_ms: duration_ms(defaults.wrist.interval),
            max_attempts: defaults.acti.max_attempts,
            backoff_factor: defaults.acti.backoff_factor,
            max_interval_ms: duration_ms(defaults.acti.max_interval),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputConfig {
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("metview-output"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Also write `./metview.log`.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: false,
        }
    }
}

impl AppConfig {
    /// Loads `explicit` if given (it must exist), otherwise `./metview.toml`
    /// when present, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => {
                let fallback = Path::new(DEFAULT_CONFIG_FILENAME);
                if fallback.is_file() {
                    Self::from_file(fallback)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: AppConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("server.base_url is empty".into()));
        }
        if self.poll.acti_interval_ms == 0 || self.poll.wrist_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll intervals must be positive".into()));
        }
        let slowest = self.poll.acti_interval_ms.max(self.poll.wrist_interval_ms);
        if self.poll.max_interval_ms < slowest {
            return Err(ConfigError::Invalid(format!(
                "poll.max_interval_ms ({}) is below the poll interval ({slowest})",
                self.poll.max_interval_ms
            )));
        }
        if !(self.poll.backoff_factor.is_finite() && self.poll.backoff_factor >= 1.0) {
            return Err(ConfigError::Invalid(
                "poll.backoff_factor must be at least 1.0".into(),
            ));
        }
        if self.logging_level().is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown logging.level {:?}",
                self.logging.level
            )));
        }
        Ok(())
    }

    pub fn logging_level(&self) -> Option<LevelFilter> {
        metview_logging::parse_level(&self.logging.level)
    }

    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.server.base_url.clone(),
            page_path: self.server.page_path.clone(),
            connect_timeout: Duration::from_secs(self.server.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.server.request_timeout_secs),
            max_page_bytes: self.server.max_page_bytes,
            ..ApiSettings::default()
        }
    }

    pub fn poll_settings(&self) -> PollSettings {
        let policy = |interval_ms: u64| PollPolicy {
            interval: Duration::from_millis(interval_ms),
            max_attempts: self.poll.max_attempts,
            backoff_factor: self.poll.backoff_factor,
            max_interval: Duration::from_millis(self.poll.max_interval_ms),
        };
        PollSettings {
            acti: policy(self.poll.acti_interval_ms),
            wrist: policy(self.poll.wrist_interval_ms),
            readiness: match self.poll.readiness {
                ReadinessMode::Fragment => ReadinessSource::Fragment,
                ReadinessMode::Response => ReadinessSource::Response,
            },
        }
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
