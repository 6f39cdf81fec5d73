use crate::cloud::CloudHandler;
use crate::env::{env_lookup, LOG_FORMAT_ENV, LOG_LEVEL_ENV, PROJECT_ID_ENV};
use crate::layer::HandlerLayer;
use crate::local::LocalHandler;
use crate::platform::Platform;
use crate::record::{Level, ParseLevelError};
use std::str::FromStr;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Which handler [`init_logging_with_config`] installs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Cloud on a managed platform, local otherwise.
    #[default]
    Auto,
    Cloud,
    Local,
}

impl LogFormat {
    /// Resolve [`LogFormat::Auto`] against `platform`.
    pub fn resolve(self, platform: &Platform) -> LogFormat {
        match self {
            LogFormat::Auto if platform.is_managed() => LogFormat::Cloud,
            LogFormat::Auto => LogFormat::Local,
            other => other,
        }
    }
}

impl FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(LogFormat::Auto),
            "cloud" | "json" => Ok(LogFormat::Cloud),
            "local" | "pretty" => Ok(LogFormat::Local),
            _ => Err(ConfigError::InvalidFormat(s.to_string())),
        }
    }
}

/// Logging setup for a service.
///
/// **Fields**
/// - `project_id`: Google Cloud project used to qualify trace names.
/// - `level`: minimum level written by either handler.
/// - `format`: handler selection, see [`LogFormat`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    pub project_id: String,
    pub level: Level,
    pub format: LogFormat,
}

impl LoggingConfig {
    pub fn new(project_id: impl Into<String>) -> Self {
        LoggingConfig {
            project_id: project_id.into(),
            ..LoggingConfig::default()
        }
    }

    /// Read [`PROJECT_ID_ENV`], [`LOG_LEVEL_ENV`] and [`LOG_FORMAT_ENV`]
    /// through `lookup`. Unset values keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = LoggingConfig::default();
        if let Some(project_id) = lookup(PROJECT_ID_ENV) {
            config.project_id = project_id;
        }
        if let Some(level) = lookup(LOG_LEVEL_ENV) {
            config.level = level.parse()?;
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            config.format = format.parse()?;
        }
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_lookup)
    }
}

/// Error returned when configuration values cannot be parsed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    InvalidLevel(#[from] ParseLevelError),

    #[error("unknown log format: {0:?}")]
    InvalidFormat(String),
}

/// Error returned when installing the global subscriber.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("invalid logging configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("a global tracing subscriber is already installed: {0}")]
    AlreadyInstalled(#[from] SetGlobalDefaultError),
}

/// Install the handler selected by `config` as the global `tracing`
/// subscriber.
///
/// **Parameters**
/// - `config`: [`LoggingConfig`] naming the project, level and format.
///
/// **Effects**
///
/// Installs a [`Registry`] combined with a [`HandlerLayer`] wrapping
/// either a [`CloudHandler`] or a [`LocalHandler`], both writing to
/// standard error.
pub fn init_logging_with_config(config: LoggingConfig) -> Result<(), InitError> {
    // The two handlers have different types, so the subscriber is
    // assembled in each branch.
    match config.format.resolve(Platform::current()) {
        LogFormat::Cloud => {
            let handler = CloudHandler::new(config.project_id, config.level);
            let subscriber = Registry::default().with(HandlerLayer::new(handler));
            tracing::subscriber::set_global_default(subscriber)?;
        }
        _ => {
            let handler = LocalHandler::new(config.level);
            let subscriber = Registry::default().with(HandlerLayer::new(handler));
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }
    Ok(())
}

/// Initialize logging for `project_id` with defaults: `Info` level and
/// the format picked from the platform.
pub fn init_logging(project_id: impl Into<String>) -> Result<(), InitError> {
    init_logging_with_config(LoggingConfig::new(project_id))
}

/// Initialize logging entirely from the environment.
pub fn init_logging_from_env() -> Result<(), InitError> {
    init_logging_with_config(LoggingConfig::from_env()?)
}
