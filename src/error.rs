//! Error types for Madlen Chat
//!
//! This module defines the error taxonomy shared by the transport, the
//! stream decoder, the conversation state machine and the session directory,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Madlen Chat operations
///
/// Streaming failures fall into four families (network, cancellation,
/// decoding, backend status). The remaining variants cover configuration
/// and wrapped library errors.
#[derive(Error, Debug)]
pub enum ChatError {
    /// The request could not be completed (connection refused, reset, ...)
    #[error("Network failure: {0}")]
    NetworkFailure(String),

    /// The request was cancelled by the user
    #[error("Request was cancelled")]
    Cancelled,

    /// The response body was not valid UTF-8
    #[error("Decode failure: {0}")]
    DecodeFailure(String),

    /// The backend answered with a non-success HTTP status
    #[error("Backend failure (HTTP {status}): {message}")]
    BackendFailure {
        /// HTTP status code returned by the backend
        status: u16,
        /// Response body or canonical reason
        message: String,
    },

    /// A send was attempted while another reply is still streaming
    #[error("A reply is already streaming; abort it before sending again")]
    AlreadyStreaming,

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Coarse classification of a failure, as seen by the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// User-initiated abort; never shown as an error
    Cancelled,
    /// Connectivity problem
    Network,
    /// Malformed byte stream
    Decode,
    /// Non-success HTTP status
    Backend,
    /// Anything else (configuration, serialization, ...)
    Other,
}

impl ChatError {
    /// Classify this error
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Cancelled => FailureKind::Cancelled,
            Self::NetworkFailure(_) | Self::Http(_) | Self::Io(_) => FailureKind::Network,
            Self::DecodeFailure(_) => FailureKind::Decode,
            Self::BackendFailure { .. } => FailureKind::Backend,
            Self::AlreadyStreaming | Self::Config(_) | Self::Serialization(_) | Self::Yaml(_) => {
                FailureKind::Other
            }
        }
    }

    /// Classify an `anyhow` error by looking for a wrapped [`ChatError`]
    ///
    /// Errors that do not carry a `ChatError` are classified as
    /// [`FailureKind::Other`].
    pub fn kind_of(error: &anyhow::Error) -> FailureKind {
        error
            .chain()
            .find_map(|cause| cause.downcast_ref::<ChatError>())
            .map(ChatError::kind)
            .unwrap_or(FailureKind::Other)
    }

    /// Returns true when the error originates from a cancelled request
    pub fn is_cancellation(error: &anyhow::Error) -> bool {
        Self::kind_of(error) == FailureKind::Cancelled
    }
}

/// Result type alias for Madlen Chat operations
///
/// Uses `anyhow::Error` so callers can attach context; typed [`ChatError`]
/// values are recovered with [`ChatError::kind_of`].
pub type Result<T> = anyhow::Result<T>;
