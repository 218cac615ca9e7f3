use bridge_traits::error::BridgeError;
use core_messages::{MediaProvider, MessageStoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("{provider} API error (HTTP {status}): {message}")]
    RemoteApi {
        provider: MediaProvider,
        status: u16,
        message: String,
    },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Failed to parse provider response: {0}")]
    Parse(String),

    #[error("Invalid media reference: {0}")]
    InvalidReference(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited by {provider}")]
    RateLimited {
        provider: MediaProvider,
        retry_after: Option<Duration>,
    },

    #[error("Unsupported: {0}")]
    Unsupported(String),

    #[error("Message store error: {0}")]
    Store(#[from] MessageStoreError),

    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Machine-readable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::Network(_) => ErrorKind::Network,
            MediaError::RemoteApi { status, .. } if *status >= 500 => ErrorKind::Network,
            MediaError::RemoteApi { .. } => ErrorKind::InvalidContent,
            MediaError::NotFound(_) => ErrorKind::NotFound,
            MediaError::Parse(_) | MediaError::InvalidReference(_) => ErrorKind::InvalidContent,
            MediaError::Unauthorized(_) => ErrorKind::Unauthorized,
            MediaError::RateLimited { .. } => ErrorKind::RateLimited,
            MediaError::NotConfigured(_) | MediaError::Unsupported(_) => ErrorKind::Unsupported,
            MediaError::Bridge(e) if e.is_transient() => ErrorKind::Network,
            MediaError::Bridge(_) | MediaError::Store(_) | MediaError::Internal(_) => {
                ErrorKind::Internal
            }
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind().is_transient()
    }
}

pub type Result<T> = std::result::Result<T, MediaError>;

// =============================================================================
// Error Descriptors
// =============================================================================

/// Error categories reported to the host for a failed fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    NotFound,
    InvalidContent,
    Unauthorized,
    RateLimited,
    Unsupported,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Network => "network",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidContent => "invalid_content",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::Internal => "internal",
        }
    }

    /// Whether a later attempt may succeed without any change on our side.
    pub fn is_transient(&self) -> bool {
        matches!(self, ErrorKind::Network | ErrorKind::RateLimited)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Serializable description of one failure in a resolution round.
///
/// Descriptors are built by the orchestrator and handed to the host as-is;
/// `index` points at the fragment the error refers to, when there is one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDescriptor {
    pub kind: ErrorKind,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl ErrorDescriptor {
    pub fn new(kind: ErrorKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
            index: None,
        }
    }

    pub fn with_index(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

impl From<&MediaError> for ErrorDescriptor {
    fn from(error: &MediaError) -> Self {
        Self::new(error.kind(), error.to_string())
    }
}

impl fmt::Display for ErrorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "[{}] fragment {}: {}", self.kind, index, self.detail),
            None => write!(f, "[{}] {}", self.kind, self.detail),
        }
    }
}
