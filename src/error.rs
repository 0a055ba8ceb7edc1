//! Error types shared across the pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of the text-completion boundary.
///
/// Everything here describes the backend being unreachable or refusing the call.
/// A backend that answers with garbage is not a `BackendError`; the judge deals
/// with that itself.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Connection refused, DNS failure, broken pipe.
    #[error("{backend} unavailable: {message}")]
    Unavailable { backend: String, message: String },

    #[error("{backend} timed out: {message}")]
    Timeout { backend: String, message: String },

    /// HTTP 429 or an equivalent throttling signal.
    #[error("{backend} rate limited the request: {message}")]
    RateLimited { backend: String, message: String },

    /// Server-side failure (5xx).
    #[error("{backend} returned status {status}: {message}")]
    Service {
        backend: String,
        status: u16,
        message: String,
    },

    /// The request itself was refused (bad credentials, unknown model, ...).
    /// Retrying will not help.
    #[error("{backend} rejected the request with status {status}: {message}")]
    Rejected {
        backend: String,
        status: u16,
        message: String,
    },

    /// The transport succeeded but the envelope around the completion was unusable.
    #[error("{backend} sent an unusable reply: {message}")]
    InvalidReply { backend: String, message: String },
}

impl BackendError {
    /// Whether the retry policy should try the call again.
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Rejected { .. })
    }

    /// Maps an HTTP status to the matching variant.
    pub fn from_status(backend: &str, status: u16, message: impl Into<String>) -> Self {
        let backend = backend.to_string();
        let message = message.into();
        match status {
            429 => Self::RateLimited { backend, message },
            500..=599 => Self::Service {
                backend,
                status,
                message,
            },
            _ => Self::Rejected {
                backend,
                status,
                message,
            },
        }
    }
}

/// Startup configuration problems. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("profile has no research topics")]
    EmptyTopics,

    #[error("profile has no research interests")]
    EmptyInterests,

    #[error("failed to read profile {path}: {source}")]
    ProfileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse profile {path}: {source}")]
    ProfileInvalid {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid preference pattern '{value}': {source}")]
    InvalidPreference {
        value: String,
        #[source]
        source: regex::Error,
    },

    #[error("missing credential: set {env} or provide {path}")]
    MissingCredential { env: &'static str, path: PathBuf },

    #[error("invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}
