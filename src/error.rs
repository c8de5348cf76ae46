//! Error types for the query guard.
//!
//! Every query rejection surfaces as a single [`GuardError::Security`] kind
//! carrying a human-readable reason, so callers can treat rejections
//! uniformly. The remaining variants cover configuration and logging-sink
//! failures, which never escape the validation path itself.

use thiserror::Error;

/// Errors produced by the query guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GuardError {
    /// The query was rejected by the safety gate.
    #[error("Security violation: {0}")]
    Security(String),

    /// Invalid validation configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A query-activity log could not record an event.
    #[error("Activity log error: {0}")]
    ActivityLog(String),
}

impl GuardError {
    /// Create a security rejection.
    pub fn security(reason: impl Into<String>) -> Self {
        Self::Security(reason.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an activity log error.
    pub fn activity_log(msg: impl Into<String>) -> Self {
        Self::ActivityLog(msg.into())
    }

    /// The bare rejection reason, without the variant prefix.
    pub fn reason(&self) -> &str {
        match self {
            Self::Security(msg) | Self::Config(msg) | Self::ActivityLog(msg) => msg,
        }
    }

    /// Check if this error is a query rejection.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Security(_))
    }

    /// Get a user-friendly suggestion for how to fix this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::Security(_) => {
                Some("Only single read-only SELECT or WITH statements can be run here")
            }
            Self::Config(_) => Some("Check the query guard environment variables and settings"),
            Self::ActivityLog(_) => None,
        }
    }
}

impl From<serde_json::Error> for GuardError {
    fn from(e: serde_json::Error) -> Self {
        GuardError::activity_log(format!("Failed to serialize event: {}", e))
    }
}
