//! Experiment error taxonomy and retry-policy classification.
//!
//! Every failure that can surface from an experiment run is folded into
//! [`ExperimentError`]; [`classify`] maps each variant onto a fixed retry
//! policy so callers never hand-roll per-error decisions.

use std::time::Duration;

use thiserror::Error;

use crate::client::ClientError;
use crate::config::ConfigError;
use crate::store::StoreError;

/// Unified error type for experiment orchestration.
#[derive(Error, Debug)]
pub enum ExperimentError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Rate limited by the compute service")]
    RateLimit { retry_after: Option<Duration> },

    #[error("Compute service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to parse response data: {0}")]
    Parse(String),

    #[error("Experiment cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Classified error kind used for retry policy and observability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Config,
    RateLimit,
    Api,
    Timeout,
    Network,
    Parse,
    Unknown,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::RateLimit => "rate_limit",
            ErrorKind::Api => "api",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Network => "network",
            ErrorKind::Parse => "parse",
            ErrorKind::Unknown => "unknown",
        }
    }
}

/// Retry advice derived from an [`ExperimentError`].
#[derive(Debug, Clone)]
pub struct ErrorAdvice {
    /// Short message suitable for surfacing to the user
    pub user_message: String,
    /// Whether retrying the failed operation can succeed
    pub can_retry: bool,
    /// Whether the failure was a rate limit
    pub is_rate_limit: bool,
    /// Server-specified wait before retrying, when provided
    pub retry_after: Option<Duration>,
    /// Classified kind
    pub kind: ErrorKind,
}

/// Map an error onto the fixed retry-policy table.
///
/// Permanent kinds (config, parse) are never retried; transient kinds
/// (rate limit, API, timeout, network) are. Anything unrecognized defaults
/// to retryable.
pub fn classify(error: &ExperimentError) -> ErrorAdvice {
    match error {
        ExperimentError::Config(msg) => ErrorAdvice {
            user_message: format!("Configuration error: {msg}"),
            can_retry: false,
            is_rate_limit: false,
            retry_after: None,
            kind: ErrorKind::Config,
        },
        ExperimentError::RateLimit { retry_after } => ErrorAdvice {
            user_message: "The compute service is rate limiting requests. Retrying shortly."
                .to_string(),
            can_retry: true,
            is_rate_limit: true,
            retry_after: *retry_after,
            kind: ErrorKind::RateLimit,
        },
        ExperimentError::Api { status, body } => ErrorAdvice {
            user_message: format!("The compute service returned an error ({status}): {body}"),
            can_retry: true,
            is_rate_limit: false,
            retry_after: None,
            kind: ErrorKind::Api,
        },
        ExperimentError::Timeout(duration) => ErrorAdvice {
            user_message: format!("The request timed out after {}s.", duration.as_secs()),
            can_retry: true,
            is_rate_limit: false,
            retry_after: None,
            kind: ErrorKind::Timeout,
        },
        ExperimentError::Network(msg) => ErrorAdvice {
            user_message: format!("Network error: {msg}"),
            can_retry: true,
            is_rate_limit: false,
            retry_after: None,
            kind: ErrorKind::Network,
        },
        ExperimentError::Parse(msg) => ErrorAdvice {
            user_message: format!("Received malformed data from the compute service: {msg}"),
            can_retry: false,
            is_rate_limit: false,
            retry_after: None,
            kind: ErrorKind::Parse,
        },
        // User-initiated; retrying would resurrect work the user stopped.
        ExperimentError::Cancelled => ErrorAdvice {
            user_message: "Experiment cancelled.".to_string(),
            can_retry: false,
            is_rate_limit: false,
            retry_after: None,
            kind: ErrorKind::Unknown,
        },
        ExperimentError::Io(err) => ErrorAdvice {
            user_message: format!("I/O error: {err}"),
            can_retry: true,
            is_rate_limit: false,
            retry_after: None,
            kind: ErrorKind::Unknown,
        },
        ExperimentError::Other(msg) => ErrorAdvice {
            user_message: msg.clone(),
            can_retry: true,
            is_rate_limit: false,
            retry_after: None,
            kind: ErrorKind::Unknown,
        },
    }
}

impl From<ClientError> for ExperimentError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Api { status, body } => ExperimentError::Api { status, body },
            ClientError::RateLimited { retry_after } => ExperimentError::RateLimit { retry_after },
            ClientError::NoBody => {
                ExperimentError::Network("response contained no body".to_string())
            }
            ClientError::Timeout(duration) => ExperimentError::Timeout(duration),
            ClientError::Cancelled => ExperimentError::Cancelled,
            ClientError::Network(msg) => ExperimentError::Network(msg),
        }
    }
}

impl From<ConfigError> for ExperimentError {
    fn from(err: ConfigError) -> Self {
        ExperimentError::Config(err.to_string())
    }
}

impl From<StoreError> for ExperimentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => ExperimentError::Network(msg),
            other => ExperimentError::Other(other.to_string()),
        }
    }
}

impl From<crate::artifact::ArtifactError> for ExperimentError {
    fn from(err: crate::artifact::ArtifactError) -> Self {
        use crate::artifact::ArtifactError;
        match err {
            ArtifactError::InvalidFilename(msg) => ExperimentError::Config(msg),
            ArtifactError::Serialize(e) => ExperimentError::Other(e.to_string()),
            ArtifactError::Io(e) => ExperimentError::Io(e),
        }
    }
}

impl From<serde_json::Error> for ExperimentError {
    fn from(err: serde_json::Error) -> Self {
        ExperimentError::Parse(err.to_string())
    }
}
