use crate::env::{env_lookup, PLATFORM_SERVICE_ENVS};
use std::sync::OnceLock;

/// Managed hosting service the process runs under, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Platform {
    service_name: String,
}

impl Platform {
    pub fn new(service_name: impl Into<String>) -> Self {
        Platform {
            service_name: service_name.into(),
        }
    }

    /// Detect the platform using `lookup` in place of the environment.
    ///
    /// The first of [`PLATFORM_SERVICE_ENVS`] with a non-empty value wins.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let service_name = PLATFORM_SERVICE_ENVS
            .iter()
            .filter_map(|&key| lookup(key))
            .find(|value| !value.is_empty())
            .unwrap_or_default();
        Platform { service_name }
    }

    pub fn from_env() -> Self {
        Self::from_lookup(env_lookup)
    }

    /// Process-wide identity, detected on first use.
    pub fn current() -> &'static Platform {
        static CURRENT: OnceLock<Platform> = OnceLock::new();
        CURRENT.get_or_init(Platform::from_env)
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub fn is_managed(&self) -> bool {
        !self.service_name.is_empty()
    }
}

/// Service name of the current process, empty when not on a managed
/// platform.
pub fn service_name() -> &'static str {
    Platform::current().service_name()
}

pub fn on_managed_platform() -> bool {
    Platform::current().is_managed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn no_variables_means_unmanaged() {
        let platform = Platform::from_lookup(lookup(&[]));
        assert_eq!(platform.service_name(), "");
        assert!(!platform.is_managed());
    }

    #[test]
    fn first_non_empty_variable_wins() {
        let platform = Platform::from_lookup(lookup(&[
            ("K_SERVICE", ""),
            ("CLOUD_RUN_JOB", "nightly-export"),
            ("GAE_SERVICE", "default"),
        ]));
        assert_eq!(platform.service_name(), "nightly-export");
        assert!(platform.is_managed());
    }

    #[test]
    fn cloud_run_service_takes_precedence() {
        let platform = Platform::from_lookup(lookup(&[
            ("GAE_SERVICE", "default"),
            ("K_SERVICE", "api"),
        ]));
        assert_eq!(platform, Platform::new("api"));
    }
}
