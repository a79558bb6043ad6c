//! Static hub configuration
//!
//! Loaded once at startup from a JSON or TOML file (chosen by extension) and
//! injected into the components that need it. Nothing reads configuration
//! from the environment at runtime.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::trace;

use crate::dispatcher::Schedule;
use crate::prober::{self, ProbeOptions};
use crate::rate_limit::{Action, ActionLimits};

/// Longest accepted rate limit window (one year)
pub const MAX_WINDOW_MINUTES: i64 = 525_600;

/// Storage backend configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    /// In-memory storage (no persistence)
    #[serde(rename = "none")]
    None,

    /// SQLite database (default for most deployments)
    Sqlite {
        /// Path to the SQLite database file
        #[serde(default = "default_sqlite_path")]
        path: PathBuf,

        /// Health records older than this are deleted by the retention job
        #[serde(default = "default_retention_days")]
        retention_days: u32,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig::Sqlite {
            path: default_sqlite_path(),
            retention_days: default_retention_days(),
        }
    }
}

impl StorageConfig {
    pub fn retention_days(&self) -> u32 {
        match self {
            StorageConfig::None => default_retention_days(),
            StorageConfig::Sqlite { retention_days, .. } => *retention_days,
        }
    }
}

fn default_sqlite_path() -> PathBuf {
    PathBuf::from("./sentinel.db")
}

fn default_retention_days() -> u32 {
    90
}

/// `{max_attempts, window_minutes}` for one action
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct LimitConfig {
    pub max_attempts: u32,
    pub window_minutes: i64,
}

impl From<LimitConfig> for ActionLimits {
    fn from(config: LimitConfig) -> Self {
        ActionLimits::from_minutes(config.max_attempts, config.window_minutes)
    }
}

/// What a configured job does
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobKind {
    /// POST to another service
    Http {
        url: String,
        token: Option<String>,
        #[serde(default = "default_job_timeout_secs")]
        timeout_secs: u64,
    },

    /// Run the link health check
    HealthCheck,

    /// Purge expired windows and old health records
    Retention,
}

fn default_job_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub name: String,
    #[serde(default)]
    pub schedule: Schedule,
    #[serde(flatten)]
    pub kind: JobKind,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProberConfig {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "prober::default_user_agent")]
    pub user_agent: String,
}

impl Default for ProberConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            timeout_secs: default_probe_timeout_secs(),
            user_agent: prober::default_user_agent(),
        }
    }
}

fn default_concurrency() -> usize {
    prober::DEFAULT_CONCURRENCY
}

fn default_probe_timeout_secs() -> u64 {
    prober::DEFAULT_TIMEOUT.as_secs()
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthConfig {
    /// JSON array of probe targets
    pub targets_file: Option<PathBuf>,

    /// Deadline for a whole probe run
    pub outer_deadline_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DispatcherConfig {
    #[serde(default = "default_tick_timeout_secs")]
    pub tick_timeout_secs: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            tick_timeout_secs: default_tick_timeout_secs(),
        }
    }
}

fn default_tick_timeout_secs() -> u64 {
    crate::dispatcher::DEFAULT_TICK_TIMEOUT.as_secs()
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationConfig {
    EmailService(EmailService),
    Discord(Discord),
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailService {
    pub url: String,
    pub token: Option<String>,
    pub recipients: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Discord {
    pub url: String,
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    pub auth_token: Option<String>,
    #[serde(default)]
    pub enable_cors: bool,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            auth_token: None,
            enable_cors: false,
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Per-action overrides; missing actions keep their defaults
    #[serde(default)]
    pub rate_limits: HashMap<Action, LimitConfig>,

    #[serde(default)]
    pub jobs: Vec<JobConfig>,

    #[serde(default)]
    pub prober: ProberConfig,

    #[serde(default)]
    pub health: HealthConfig,

    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    pub notification: Option<NotificationConfig>,

    /// Storage configuration (defaults to SQLite)
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub api: ApiSettings,
}

/// Errors found while loading or validating the configuration
#[derive(Debug)]
pub enum ConfigError {
    Io(PathBuf, std::io::Error),
    Parse(PathBuf, String),
    Invalid(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(path, err) => write!(f, "cannot read {}: {}", path.display(), err),
            ConfigError::Parse(path, msg) => {
                write!(f, "invalid configuration file {}: {}", path.display(), msg)
            }
            ConfigError::Invalid(msg) => write!(f, "invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(_, err) => Some(err),
            _ => None,
        }
    }
}

impl Config {
    /// Limit table with configured overrides applied
    pub fn action_limits(&self) -> HashMap<Action, ActionLimits> {
        self.rate_limits
            .iter()
            .map(|(action, limits)| (*action, ActionLimits::from(*limits)))
            .collect()
    }

    pub fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            concurrency: self.prober.concurrency,
            per_request_timeout: Duration::from_secs(self.prober.timeout_secs),
            outer_deadline: self.health.outer_deadline_secs.map(Duration::from_secs),
            user_agent: self.prober.user_agent.clone(),
        }
    }

    pub fn tick_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatcher.tick_timeout_secs)
    }

    /// Reject configurations the components cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (action, limits) in &self.rate_limits {
            if limits.max_attempts == 0 {
                return Err(ConfigError::Invalid(format!(
                    "rate_limits.{action}: max_attempts must be at least 1"
                )));
            }
            if limits.window_minutes <= 0 {
                return Err(ConfigError::Invalid(format!(
                    "rate_limits.{action}: window_minutes must be positive"
                )));
            }
            if limits.window_minutes > MAX_WINDOW_MINUTES {
                return Err(ConfigError::Invalid(format!(
                    "rate_limits.{action}: window_minutes must not exceed {MAX_WINDOW_MINUTES} (one year)"
                )));
            }
        }

        if self.prober.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "prober.concurrency must be at least 1".to_string(),
            ));
        }
        if self.prober.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "prober.timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.dispatcher.tick_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "dispatcher.tick_timeout_secs must be at least 1".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for job in &self.jobs {
            if !names.insert(job.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate job name: {}",
                    job.name
                )));
            }
            if let Some(hour) = job.schedule.hour() {
                if hour > 23 {
                    return Err(ConfigError::Invalid(format!(
                        "job {}: hour {} is out of range 0-23",
                        job.name, hour
                    )));
                }
            }
            if matches!(job.kind, JobKind::HealthCheck) && self.health.targets_file.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "job {}: health_check jobs need health.targets_file",
                    job.name
                )));
            }
        }

        Ok(())
    }
}

/// Read, parse and validate a configuration file
///
/// `.toml` files are parsed as TOML, everything else as JSON.
pub fn read_config_file(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let file_content =
        std::fs::read_to_string(path).map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;

    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    let config: Config = if is_toml {
        toml::from_str(&file_content)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?
    } else {
        serde_json::from_str(&file_content)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e.to_string()))?
    };

    config.validate()?;
    trace!("loaded config: {config:?}");
    Ok(config)
}
