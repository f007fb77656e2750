//! Session, scan and logging configuration.
//!
//! ```toml
//! [session]
//! connection_timeout_secs = 5.0
//!
//! [scan]
//! duration_secs = 5.0
//!
//! [logging]
//! level = "warn"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::logging::LogLevel;

/// Longest timeout or scan duration accepted by validation.
pub const MAX_DURATION_SECS: f64 = 300.0;

/// Lifecycle configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Session settings.
    pub session: SessionConfig,
    /// Scan settings.
    pub scan: ScanConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// A missing file yields the defaults.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return every problem found.
    ///
    /// Timeouts and durations must be finite, positive and at most
    /// [`MAX_DURATION_SECS`].
    ///
    /// # Example
    ///
    /// ```
    /// use blefsm_core::Config;
    ///
    /// let config = Config::default();
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.session.validate());
        errors.extend(self.scan.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

fn validate_seconds(field: &str, value: f64) -> Option<ValidationError> {
    let message = if !value.is_finite() {
        format!("{} must be a finite number of seconds", value)
    } else if value <= 0.0 {
        "must be greater than zero".to_string()
    } else if value > MAX_DURATION_SECS {
        format!("{}s exceeds the maximum of {}s", value, MAX_DURATION_SECS)
    } else {
        return None;
    };
    Some(ValidationError {
        field: field.to_string(),
        message,
    })
}

/// Seconds as a [`Duration`], or `default` when `value` fails validation.
fn seconds_or(field: &str, value: f64, default: f64) -> Duration {
    if let Some(err) = validate_seconds(field, value) {
        warn!("Invalid {}, using {}s", err, default);
        return Duration::from_secs_f64(default);
    }
    Duration::from_secs_f64(value)
}

/// Per-session settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Deadline for one connect attempt, in seconds.
    pub connection_timeout_secs: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            connection_timeout_secs: 5.0,
        }
    }
}

impl SessionConfig {
    /// The connect deadline as a [`Duration`].
    ///
    /// Falls back to the default when the value does not validate.
    pub fn connection_timeout(&self) -> Duration {
        seconds_or(
            "session.connection_timeout_secs",
            self.connection_timeout_secs,
            Self::default().connection_timeout_secs,
        )
    }

    /// Validate session settings.
    pub fn validate(&self) -> Vec<ValidationError> {
        validate_seconds(
            "session.connection_timeout_secs",
            self.connection_timeout_secs,
        )
        .into_iter()
        .collect()
    }
}

/// Scan settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// How long [`ScanController::scan_for`](crate::ScanController::scan_for) runs, in seconds.
    pub duration_secs: f64,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self { duration_secs: 5.0 }
    }
}

impl ScanConfig {
    /// The scan duration as a [`Duration`].
    ///
    /// Falls back to the default when the value does not validate.
    pub fn duration(&self) -> Duration {
        seconds_or(
            "scan.duration_secs",
            self.duration_secs,
            Self::default().duration_secs,
        )
    }

    /// Validate scan settings.
    pub fn validate(&self) -> Vec<ValidationError> {
        validate_seconds("scan.duration_secs", self.duration_secs)
            .into_iter()
            .collect()
    }
}

/// Logging settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level used when `RUST_LOG` is not set.
    pub level: LogLevel,
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path, e.g. `session.connection_timeout_secs`.
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("blefsm")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.session.connection_timeout(), Duration::from_secs(5));
        assert_eq!(config.scan.duration(), Duration::from_secs(5));
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.session.connection_timeout_secs = 2.5;
        config.logging.level = LogLevel::Debug;
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert_eq!(
            loaded.session.connection_timeout(),
            Duration::from_millis(2500)
        );
    }

    #[test]
    fn test_config_load_nonexistent() {
        let result = Config::load("/nonexistent/path/config.toml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_config_load_invalid_toml() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "this is not valid toml [[[").unwrap();

        let result = Config::load(&path);
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [session]
            connection_timeout_secs = 10.0
            "#,
        )
        .unwrap();
        assert_eq!(config.session.connection_timeout_secs, 10.0);
        assert_eq!(config.scan.duration_secs, 5.0);
        assert_eq!(config.logging.level, LogLevel::Warn);
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let mut config = Config::default();
        config.session.connection_timeout_secs = 0.0;
        config.scan.duration_secs = 1000.0;

        let Err(ConfigError::Validation(errors)) = config.validate() else {
            panic!("expected validation errors");
        };
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].field, "session.connection_timeout_secs");
        assert_eq!(errors[1].field, "scan.duration_secs");
    }

    #[test]
    fn test_validation_rejects_non_finite() {
        let config = SessionConfig {
            connection_timeout_secs: f64::NAN,
        };
        assert_eq!(config.validate().len(), 1);
    }

    #[test]
    fn test_invalid_durations_fall_back_to_defaults() {
        for bad in [-1.0, 0.0, f64::NAN, f64::INFINITY, 1e300] {
            let session = SessionConfig {
                connection_timeout_secs: bad,
            };
            assert_eq!(session.connection_timeout(), Duration::from_secs(5));

            let scan = ScanConfig { duration_secs: bad };
            assert_eq!(scan.duration(), Duration::from_secs(5));
        }
    }

    #[test]
    fn test_load_validated_rejects_bad_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[session]\nconnection_timeout_secs = -1.0\n").unwrap();

        let err = Config::load_validated(&path).unwrap_err();
        assert!(err.to_string().contains("session.connection_timeout_secs"));
    }

    #[test]
    fn test_default_config_path() {
        let path = default_config_path();
        assert!(path.ends_with("blefsm/config.toml"));
    }
}
