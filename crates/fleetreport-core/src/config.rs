//! Report service configuration.
//!
//! Handles loading and validating fleetreport configuration including:
//! - Template root for exported documents
//! - Maximum allowed report period
//! - Optional data snapshot served by the HTTP binary
//! - Logging and listener settings
//!
//! Values come from an optional TOML file, overridden by `FLEETREPORT_*`
//! environment variables (e.g. `FLEETREPORT_PERIOD_LIMIT_SECS=2678400`).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::{PeriodPolicy, ReportKind};

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "FLEETREPORT";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file does not exist.
    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The configuration sources could not be read or deserialized.
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// A single field holds an invalid value.
    #[error("invalid value for '{field}': {message}")]
    ValidationError {
        /// Name of the offending field.
        field: &'static str,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields hold invalid values.
    #[error("{} configuration errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// A specialized [`Result`] type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    /// Directory holding `export/<kind>.<ext>` report templates.
    #[serde(default = "default_templates_root")]
    pub templates_root: PathBuf,

    /// Maximum report window in seconds. `0` disables the limit.
    #[serde(default)]
    pub period_limit_secs: u64,

    /// JSON data snapshot loaded by the server at startup.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Use production logging (JSON files plus compact stdout).
    #[serde(default)]
    pub production: bool,

    /// Socket address the HTTP server binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
}

fn default_templates_root() -> PathBuf {
    PathBuf::from("./templates")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0:8082".to_string()
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self {
            templates_root: default_templates_root(),
            period_limit_secs: 0,
            snapshot_path: None,
            log_level: default_log_level(),
            production: false,
            bind_address: default_bind_address(),
        }
    }
}

impl ReportsConfig {
    /// Load configuration from an optional file plus the environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if `path` is given but missing, or
    /// [`ConfigError::Load`] if a source cannot be parsed.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            builder = builder.add_source(File::from(path.to_path_buf()).required(true));
        }

        builder
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()?
            .try_deserialize()
            .map_err(ConfigError::from)
    }

    /// Validate every field, collecting all problems.
    ///
    /// # Errors
    ///
    /// Returns the single validation error, or
    /// [`ConfigError::MultipleValidationErrors`] when several fields are invalid.
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if self.templates_root.as_os_str().is_empty() {
            errors.push(ConfigError::ValidationError {
                field: "templates_root",
                message: "must not be empty".to_string(),
            });
        }

        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            errors.push(ConfigError::ValidationError {
                field: "log_level",
                message: format!(
                    "'{}' is not one of {}",
                    self.log_level,
                    LOG_LEVELS.join(", ")
                ),
            });
        }

        if self.bind_address.parse::<SocketAddr>().is_err() {
            errors.push(ConfigError::ValidationError {
                field: "bind_address",
                message: format!("'{}' is not a socket address", self.bind_address),
            });
        }

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }

    /// The period policy enforced before any report fetch.
    #[must_use]
    pub fn period_policy(&self) -> PeriodPolicy {
        if self.period_limit_secs == 0 {
            PeriodPolicy::unlimited()
        } else {
            PeriodPolicy::limited(Duration::from_secs(self.period_limit_secs))
        }
    }

    /// Location of the template for a report kind with the given file extension.
    #[must_use]
    pub fn template_path(&self, kind: ReportKind, extension: &str) -> PathBuf {
        template_path(&self.templates_root, kind, extension)
    }
}

/// `<root>/export/<kind>.<extension>`
pub(crate) fn template_path(root: &Path, kind: ReportKind, extension: &str) -> PathBuf {
    root.join("export")
        .join(format!("{}.{extension}", kind.template_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = ReportsConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.period_policy().limit().is_none());
    }

    #[test]
    fn test_period_policy_from_limit() {
        let config = ReportsConfig {
            period_limit_secs: 86_400,
            ..ReportsConfig::default()
        };
        assert_eq!(
            config.period_policy().limit(),
            Some(Duration::from_secs(86_400))
        );
    }

    #[test]
    fn test_template_path_layout() {
        let config = ReportsConfig {
            templates_root: PathBuf::from("/opt/templates"),
            ..ReportsConfig::default()
        };
        assert_eq!(
            config.template_path(ReportKind::Route, "xlsx"),
            PathBuf::from("/opt/templates/export/route.xlsx")
        );
    }

    #[test]
    fn test_validate_collects_multiple_errors() {
        let config = ReportsConfig {
            templates_root: PathBuf::new(),
            log_level: "loud".to_string(),
            ..ReportsConfig::default()
        };
        match config.validate() {
            Err(ConfigError::MultipleValidationErrors(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected multiple errors, got {other:?}"),
        }
    }

    #[test]
    fn test_validate_rejects_bad_bind_address() {
        let config = ReportsConfig {
            bind_address: "not-an-address".to_string(),
            ..ReportsConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError {
                field: "bind_address",
                ..
            })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = ReportsConfig::load(Some(Path::new("/nonexistent/fleetreport.toml")));
        assert!(matches!(result, Err(ConfigError::NotFound(_))));
    }

    #[test]
    fn test_load_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleetreport.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "templates_root = \"/srv/templates\"").unwrap();
        writeln!(file, "period_limit_secs = 3600").unwrap();

        let config = ReportsConfig::load(Some(&path)).unwrap();
        assert_eq!(config.templates_root, PathBuf::from("/srv/templates"));
        assert_eq!(config.period_limit_secs, 3600);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_config_error_converts_to_report_error() {
        let err: crate::ReportError = ConfigError::ValidationError {
            field: "log_level",
            message: "bad".to_string(),
        }
        .into();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("log_level"));
    }
}
