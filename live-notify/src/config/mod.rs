//! Application configuration.
//!
//! Loaded once at startup from a TOML file. Every option has an explicit
//! default, so an empty or missing file yields a working dry-run setup that
//! logs messages instead of delivering them.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::monitor::RoomId;
use crate::notification::{ChannelConfig, TemplateConfig};

pub const DEFAULT_CONFIG_PATH: &str = "live-notify.toml";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:live-notify.db?mode=rwc";
pub const DEFAULT_TIMEZONE: &str = "Asia/Shanghai";
pub const DEFAULT_LOG_FILTER: &str = "live_notify=info,live_platforms=info,sqlx=warn";

fn default_interval_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_cover_timeout_secs() -> u64 {
    15
}

fn default_cover_dir() -> PathBuf {
    PathBuf::from("covers")
}

fn default_database_url() -> String {
    DEFAULT_DATABASE_URL.to_string()
}

fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Seconds between two poll passes.
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Timeout for each room status request.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_cover_timeout_secs")]
    pub cover_timeout_secs: u64,
    /// Where downloaded covers are stored.
    #[serde(default = "default_cover_dir")]
    pub cover_dir: PathBuf,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    /// Timezone the provider formats live start times in.
    #[serde(default = "default_timezone")]
    pub provider_timezone: String,
    /// Timezone used when rendering times in messages.
    #[serde(default = "default_timezone")]
    pub display_timezone: String,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub channel: ChannelConfig,
    #[serde(default)]
    pub templates: TemplateConfig,
    /// Subscriptions ensured at every startup.
    #[serde(default)]
    pub rooms: Vec<RoomSeed>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            cover_timeout_secs: default_cover_timeout_secs(),
            cover_dir: default_cover_dir(),
            database_url: default_database_url(),
            provider_timezone: default_timezone(),
            display_timezone: default_timezone(),
            logging: LoggingConfig::default(),
            api: ApiConfig::default(),
            channel: ChannelConfig::default(),
            templates: TemplateConfig::default(),
            rooms: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directives. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub filter: String,
    /// Directory for daily rolling log files. Stdout only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
            dir: None,
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind: default_bind(),
        }
    }
}

/// A subscription declared in the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSeed {
    pub id: RoomId,
    #[serde(default)]
    pub anchor_name: Option<String>,
    #[serde(default)]
    pub sessions: Vec<String>,
}

impl AppConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml(&raw)
                .map_err(|e| Error::config(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Config file {} not found, using defaults", path.display());
                Self::default()
            }
            Err(e) => {
                return Err(Error::config(format!(
                    "cannot read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        if let Ok(url) = std::env::var("DATABASE_URL")
            && !url.trim().is_empty()
        {
            config.database_url = url;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse without validating.
    pub fn from_toml(raw: &str) -> Result<Self> {
        toml::from_str(raw).map_err(|e| Error::config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval_secs == 0 {
            return Err(Error::config("interval_secs must be greater than zero"));
        }
        self.provider_tz()?;
        self.display_tz()?;
        if self.api.enabled {
            self.api_bind()?;
        }
        for room in &self.rooms {
            if room.id.is_empty() {
                return Err(Error::config("[[rooms]] entries need a non-empty id"));
            }
            if room.sessions.iter().any(|s| s.trim().is_empty()) {
                return Err(Error::config(format!(
                    "room {} lists an empty session id",
                    room.id
                )));
            }
        }
        self.channel.validate()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cover_timeout(&self) -> Duration {
        Duration::from_secs(self.cover_timeout_secs)
    }

    pub fn provider_tz(&self) -> Result<Tz> {
        parse_timezone("provider_timezone", &self.provider_timezone)
    }

    pub fn display_tz(&self) -> Result<Tz> {
        parse_timezone("display_timezone", &self.display_timezone)
    }

    pub fn api_bind(&self) -> Result<SocketAddr> {
        self.api
            .bind
            .parse()
            .map_err(|e| Error::config(format!("invalid api bind address {:?}: {}", self.api.bind, e)))
    }
}

fn parse_timezone(field: &str, value: &str) -> Result<Tz> {
    value
        .parse::<Tz>()
        .map_err(|e| Error::config(format!("invalid {field} {value:?}: {e}")))
}
