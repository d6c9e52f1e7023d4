use chrono_tz::Tz;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_TIMEZONE: &str = "Europe/London";
pub const DEFAULT_SETUP_LEAD_SECS: u64 = 15;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;
/// Largest accepted `schedule.setup_lead_secs` (one hour).
pub const MAX_SETUP_LEAD_SECS: u64 = 3_600;
pub const DEFAULT_CONFIG_PATH: &str = "prerec.toml";

/// Top-level config (prerec.toml + PREREC_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrerecConfig {
    #[serde(default)]
    pub station: StationConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub playback: PlaybackConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Display settings. Nothing here affects scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationConfig {
    #[serde(default = "default_title")]
    pub title: String,
}

impl Default for StationConfig {
    fn default() -> Self {
        Self {
            title: default_title(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// IANA timezone id applied to every submitted start/stop time.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Seconds subtracted from the requested start so the player can warm up.
    #[serde(default = "default_setup_lead_secs")]
    pub setup_lead_secs: u64,
    /// How often the engine checks for due jobs.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            setup_lead_secs: DEFAULT_SETUP_LEAD_SECS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

/// External player invocation: `command args...`, fed through `playlist_path`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaybackConfig {
    #[serde(default = "default_command")]
    pub command: String,
    #[serde(default = "default_args")]
    pub args: Vec<String>,
    /// File the selected media path is written to before the player starts.
    #[serde(default = "default_playlist_path")]
    pub playlist_path: String,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            command: default_command(),
            args: default_args(),
            playlist_path: default_playlist_path(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Optional log file, written in addition to stdout.
    pub file: Option<String>,
}

fn default_title() -> String {
    "Pre-recorded playback".to_string()
}
fn default_timezone() -> String {
    DEFAULT_TIMEZONE.to_string()
}
fn default_setup_lead_secs() -> u64 {
    DEFAULT_SETUP_LEAD_SECS
}
fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}
fn default_db_path() -> String {
    "jobs.sqlite".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_command() -> String {
    "liquidsoap".to_string()
}
fn default_args() -> Vec<String> {
    vec!["prerec.liq".to_string()]
}
fn default_playlist_path() -> String {
    "prerec.m3u".to_string()
}

impl PrerecConfig {
    /// Load config from a TOML file with PREREC_* env var overrides.
    ///
    /// Nested keys use a double underscore, e.g.
    /// `PREREC_SCHEDULE__SETUP_LEAD_SECS=30`. A missing file is not an error;
    /// every field has a default.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path.unwrap_or(DEFAULT_CONFIG_PATH);

        let config: PrerecConfig = Figment::from(Serialized::defaults(PrerecConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed("PREREC_").split("__"))
            .extract()
            .map_err(|e| crate::error::PrerecError::Config(e.to_string()))?;
        config.validate()?;

        tracing::debug!(path, "configuration loaded");
        Ok(config)
    }

    /// Reject values that would make scheduling meaningless.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.schedule.setup_lead_secs > MAX_SETUP_LEAD_SECS {
            return Err(crate::error::PrerecError::Config(format!(
                "schedule.setup_lead_secs must be at most {MAX_SETUP_LEAD_SECS}, got {}",
                self.schedule.setup_lead_secs
            )));
        }
        if self.schedule.poll_interval_ms == 0 {
            return Err(crate::error::PrerecError::Config(
                "schedule.poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve `schedule.timezone` to a concrete zone.
    pub fn timezone(&self) -> crate::error::Result<Tz> {
        self.schedule.timezone.parse::<Tz>().map_err(|_| {
            crate::error::PrerecError::Config(format!(
                "unknown timezone: {}",
                self.schedule.timezone
            ))
        })
    }
}
