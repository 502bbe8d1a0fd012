//! Unified error types for the fleetreport core library.
//!
//! [`ReportError`] covers every way a report generation call can fail. The
//! configuration module keeps its own [`ConfigError`](crate::config::ConfigError)
//! and converts into this type at the boundary.
//!
//! Reference resolution (geofence, maintenance, group, position lookups) never
//! produces an error: an unresolvable reference is treated as absence by the
//! filter and assembler. Only collaborator failures surface here.
//!
//! # Example
//!
//! ```rust
//! use fleetreport_core::error::{ReportError, ReportResult};
//!
//! fn check(limit_secs: u64, requested_secs: u64) -> ReportResult<()> {
//!     if requested_secs > limit_secs {
//!         return Err(ReportError::PeriodExceeded { requested_secs, limit_secs });
//!     }
//!     Ok(())
//! }
//!
//! assert!(check(60, 120).unwrap_err().is_period_error());
//! ```

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use thiserror::Error;

/// The unified error type for all report operations.
#[derive(Debug, Error)]
pub enum ReportError {
    // =========================================================================
    // REQUEST ERRORS
    // =========================================================================
    /// The report window starts after it ends.
    #[error("Invalid report period: 'from' ({from}) is after 'to' ({to})")]
    InvalidPeriod {
        /// Requested window start.
        from: DateTime<Utc>,
        /// Requested window end.
        to: DateTime<Utc>,
    },

    /// The report window is wider than the configured maximum period.
    #[error("Time period exceeds the limit: requested {requested_secs}s, maximum is {limit_secs}s")]
    PeriodExceeded {
        /// Length of the requested window in seconds.
        requested_secs: u64,
        /// Configured maximum in seconds.
        limit_secs: u64,
    },

    /// The report kind is not one of `events`, `route` or `trips`.
    #[error("Unknown report kind: '{0}'. Expected one of: events, route, trips.")]
    UnknownReportKind(String),

    // =========================================================================
    // COLLABORATOR ERRORS
    // =========================================================================
    /// A storage or permission collaborator failed.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    // =========================================================================
    // EXPORT ERRORS
    // =========================================================================
    /// The template for the requested report kind could not be read.
    #[error("Report template not available at {}: {source}", .path.display())]
    TemplateMissing {
        /// Path the template was expected at.
        path: PathBuf,
        /// Underlying read failure.
        #[source]
        source: std::io::Error,
    },

    /// The templating engine failed to render the document.
    #[error("Report rendering failed: {0}")]
    RenderingFailure(String),

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration could not be loaded or parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // I/O ERRORS
    // =========================================================================
    /// Writing the rendered document to its destination failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for report operations.
pub type ReportResult<T> = std::result::Result<T, ReportError>;

impl ReportError {
    /// Wraps any collaborator failure as [`ReportError::StorageUnavailable`].
    pub fn storage(err: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable(err.to_string())
    }

    /// Returns `true` if the requested window was rejected.
    #[inline]
    #[must_use]
    pub const fn is_period_error(&self) -> bool {
        matches!(self, Self::InvalidPeriod { .. } | Self::PeriodExceeded { .. })
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error can only occur while exporting a document.
    #[inline]
    #[must_use]
    pub const fn is_export_error(&self) -> bool {
        matches!(
            self,
            Self::TemplateMissing { .. } | Self::RenderingFailure(_)
        )
    }

    /// Returns `true` if this error is an I/O failure, including an unreadable template.
    #[inline]
    #[must_use]
    pub const fn is_io_error(&self) -> bool {
        matches!(self, Self::TemplateMissing { .. } | Self::IoError(_))
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            // 400 Bad Request - the request itself is unacceptable
            Self::InvalidPeriod { .. } | Self::PeriodExceeded { .. } | Self::UnknownReportKind(_) => {
                400
            }

            // 503 Service Unavailable - backing store is down
            Self::StorageUnavailable(_) => 503,

            // 500 Internal Server Error - server-side issues
            Self::TemplateMissing { .. }
            | Self::RenderingFailure(_)
            | Self::ConfigNotFound(_)
            | Self::ConfigParseError(_)
            | Self::ConfigValidationError(_)
            | Self::IoError(_) => 500,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPeriod { .. } => "INVALID_PERIOD",
            Self::PeriodExceeded { .. } => "PERIOD_EXCEEDED",
            Self::UnknownReportKind(_) => "UNKNOWN_REPORT_KIND",
            Self::StorageUnavailable(_) => "STORAGE_UNAVAILABLE",
            Self::TemplateMissing { .. } => "TEMPLATE_MISSING",
            Self::RenderingFailure(_) => "RENDERING_FAILURE",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::config::ConfigError> for ReportError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path),
            ConfigError::Load(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::{Error as IoErr, ErrorKind};

    #[test]
    fn test_period_error_classification() {
        let from = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert!(ReportError::InvalidPeriod { from, to }.is_period_error());
        assert!(ReportError::PeriodExceeded {
            requested_secs: 10,
            limit_secs: 5
        }
        .is_period_error());

        assert!(!ReportError::StorageUnavailable("down".into()).is_period_error());
    }

    #[test]
    fn test_template_missing_is_io_and_export_error() {
        let err = ReportError::TemplateMissing {
            path: PathBuf::from("/templates/export/events.xlsx"),
            source: IoErr::new(ErrorKind::NotFound, "missing"),
        };
        assert!(err.is_io_error());
        assert!(err.is_export_error());
        assert!(!err.is_period_error());
        assert!(err.to_string().contains("events.xlsx"));
    }

    #[test]
    fn test_rendering_failure_is_not_io() {
        let err = ReportError::RenderingFailure("bad cell".into());
        assert!(err.is_export_error());
        assert!(!err.is_io_error());
    }

    #[test]
    fn test_config_error_classification() {
        assert!(ReportError::ConfigNotFound(PathBuf::from("/test")).is_config_error());
        assert!(ReportError::ConfigParseError("syntax error".into()).is_config_error());
        assert!(ReportError::ConfigValidationError("invalid value".into()).is_config_error());
        assert!(!ReportError::RenderingFailure("x".into()).is_config_error());
    }

    #[test]
    fn test_http_status_codes() {
        assert_eq!(
            ReportError::PeriodExceeded {
                requested_secs: 2,
                limit_secs: 1
            }
            .http_status_code(),
            400
        );
        assert_eq!(
            ReportError::UnknownReportKind("summary".into()).http_status_code(),
            400
        );
        assert_eq!(
            ReportError::StorageUnavailable("timeout".into()).http_status_code(),
            503
        );
        assert_eq!(
            ReportError::RenderingFailure("x".into()).http_status_code(),
            500
        );
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ReportError::PeriodExceeded {
                requested_secs: 2,
                limit_secs: 1
            }
            .error_code(),
            "PERIOD_EXCEEDED"
        );
        assert_eq!(
            ReportError::storage("connection reset").error_code(),
            "STORAGE_UNAVAILABLE"
        );
    }

    #[test]
    fn test_storage_helper_keeps_message() {
        let err = ReportError::storage("connection reset");
        assert!(err.to_string().contains("connection reset"));
    }

    #[test]
    fn test_from_io_error() {
        let err: ReportError = IoErr::new(ErrorKind::BrokenPipe, "closed").into();
        assert!(matches!(err, ReportError::IoError(_)));
        assert!(err.is_io_error());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<ReportError>();
        assert_sync::<ReportError>();
    }
}
