use std::fmt;

use thiserror::Error;

/// The five ways a harvest or link check can fail.
///
/// Drivers never signal these through unwinding: each one is produced by a
/// specific branch and carried as data in the resulting report.
///
/// | kind                | scope of the abort                                  |
/// |---------------------|-----------------------------------------------------|
/// | `PortalUnreachable` | the whole portal (listing failed)                   |
/// | `AccessDenied`      | the remaining records of the portal                 |
/// | `RecordInvalid`     | the remaining records of the portal                 |
/// | `DecodeFailure`     | the remaining pages of a paged search               |
/// | `TransportFailure`  | nothing: recorded in the liveness result (`-42`)    |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    PortalUnreachable,
    AccessDenied,
    RecordInvalid,
    DecodeFailure,
    TransportFailure,
}

impl FailureKind {
    /// Returns the snake_case label used in reports and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PortalUnreachable => "portal_unreachable",
            Self::AccessDenied => "access_denied",
            Self::RecordInvalid => "record_invalid",
            Self::DecodeFailure => "decode_failure",
            Self::TransportFailure => "transport_failure",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application-wide error types.
///
/// Errors that a driver handles itself (listing failures, access denied,
/// validation errors, undecodable pages) are converted into a [`FailureKind`]
/// at the call site. Everything else propagates to the caller.
///
/// # Examples
///
/// ```
/// use demeter_core::error::AppError;
///
/// let err = AppError::NotAuthorized("https://demo.ckan.org".to_string());
/// assert!(err.to_string().contains("Not authorized"));
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// HTTP client request failed (non-success status, unreadable body).
    #[error("API Client error: {0}")]
    ClientError(String),

    /// The request never completed: DNS failure, refused connection, timeout.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// The portal refused access to a record.
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    /// The portal rejected the request parameters for a record.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Filesystem operation failed.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// URL could not be parsed or joined.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The portal base URL is unusable.
    #[error("Invalid portal URL: {0}")]
    InvalidPortalUrl(String),

    /// A dataset record lacks a key the link resolver depends on.
    #[error("Malformed {software} record '{identifier}': {reason}")]
    MalformedRecord {
        software: String,
        identifier: String,
        reason: String,
    },

    /// Configuration file or setting error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic application error for cases not covered by specific variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl AppError {
    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::ClientError(msg) => format!("API error: {}", msg),
            AppError::InvalidPortalUrl(url) => format!(
                "Invalid portal URL: {}\n   Example: https://demo.ckan.org",
                url
            ),
            AppError::MalformedRecord {
                software,
                identifier,
                reason,
            } => format!(
                "Cannot resolve links for {} record '{}': {}\n   The cached file may be truncated or from another portal type.",
                software, identifier, reason
            ),
            AppError::ConfigError(msg) => format!(
                "Configuration error: {}\n   Check your configuration file.",
                msg
            ),
            _ => self.to_string(),
        }
    }
}
