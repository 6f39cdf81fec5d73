//! Environment variable names read by this crate.
//!
//! The handlers themselves never touch the environment; only
//! [`crate::platform::Platform::from_env`] and
//! [`crate::init::LoggingConfig::from_env`] do.

/// Set by Cloud Run services and Cloud Functions.
pub const K_SERVICE_ENV: &str = "K_SERVICE";

/// Set by Cloud Run jobs.
pub const CLOUD_RUN_JOB_ENV: &str = "CLOUD_RUN_JOB";

/// Set by App Engine.
pub const GAE_SERVICE_ENV: &str = "GAE_SERVICE";

/// Platform indicator variables, in lookup order. The first non-empty
/// one names the service.
pub const PLATFORM_SERVICE_ENVS: [&str; 3] = [K_SERVICE_ENV, CLOUD_RUN_JOB_ENV, GAE_SERVICE_ENV];

/// Google Cloud project id used to qualify trace names.
pub const PROJECT_ID_ENV: &str = "GOOGLE_CLOUD_PROJECT";

/// Minimum level, e.g. `debug` or `warn`.
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// `auto`, `cloud` or `local`.
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

/// Read an environment variable, treating unset, empty and non-unicode
/// values alike.
pub fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}
