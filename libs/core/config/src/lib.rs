//! Environment-driven configuration shared by every binary.
//!
//! Services read their settings from environment variables through the
//! [`FromEnv`] trait and the `env_*` helpers here. [`Environment`] selects
//! log formatting, [`AppInfo`] carries the binary's identity into logs and
//! health endpoints.

pub mod tracing;

use std::env;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("environment variable '{0}' is not set")]
    MissingEnvVar(String),

    #[error("environment variable '{key}' has an invalid value: {details}")]
    ParseError { key: String, details: String },
}

/// Loads a config struct from environment variables.
pub trait FromEnv: Sized {
    fn from_env() -> Result<Self, ConfigError>;
}

pub fn env_or_default(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

pub fn env_required(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Deployment environment, read from `APP_ENV`.
///
/// Anything other than `production` (case-insensitive) counts as
/// development, so a typo degrades to verbose logs rather than silence.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

impl Environment {
    pub fn from_env() -> Self {
        match env::var("APP_ENV") {
            Ok(value) if value.eq_ignore_ascii_case("production") => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }
}

/// Binary name and version as baked in at compile time.
#[derive(Clone, Debug)]
pub struct AppInfo {
    pub name: &'static str,
    pub version: &'static str,
}

/// Capture the calling crate's `CARGO_PKG_NAME` / `CARGO_PKG_VERSION` as an [`AppInfo`].
///
/// Must be a macro so the env vars are resolved in the calling crate,
/// not in `core_config`.
#[macro_export]
macro_rules! app_info {
    () => {
        $crate::AppInfo {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_app_env_means_development() {
        temp_env::with_var_unset("APP_ENV", || {
            let detected = Environment::from_env();
            assert!(detected.is_development());
            assert!(!detected.is_production());
        });
    }

    #[test]
    fn production_is_matched_case_insensitively() {
        for spelling in ["production", "PRODUCTION", "Production"] {
            temp_env::with_var("APP_ENV", Some(spelling), || {
                assert!(Environment::from_env().is_production());
            });
        }
    }

    #[test]
    fn unknown_app_env_falls_back_to_development() {
        temp_env::with_var("APP_ENV", Some("qa"), || {
            assert!(Environment::from_env().is_development());
        });
    }

    #[test]
    fn env_or_default_prefers_the_variable() {
        temp_env::with_var("TEST_VAR", Some("from_env"), || {
            assert_eq!(env_or_default("TEST_VAR", "fallback"), "from_env");
        });
        temp_env::with_var_unset("TEST_VAR", || {
            assert_eq!(env_or_default("TEST_VAR", "fallback"), "fallback");
        });
    }

    #[test]
    fn env_required_names_the_missing_variable() {
        temp_env::with_var("REQUIRED_VAR", Some("present"), || {
            assert_eq!(env_required("REQUIRED_VAR").unwrap(), "present");
        });
        temp_env::with_var_unset("REQUIRED_VAR", || {
            let err = env_required("REQUIRED_VAR").unwrap_err();
            assert!(err.to_string().contains("REQUIRED_VAR"));
        });
    }

    #[test]
    fn app_info_reports_this_crate() {
        let info = app_info!();
        assert_eq!(info.name, "core_config");
        assert!(!info.version.is_empty());
    }
}
