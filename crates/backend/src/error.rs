//! Backend error types.

use plot_common::PlotError;
use thiserror::Error;

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    #[error("Backend pool '{pool}' exhausted after waiting {waited_ms} ms")]
    Exhausted { pool: String, waited_ms: u64 },

    #[error("Backend pool '{0}' is closed")]
    PoolClosed(String),

    #[error("Query to '{backend}' timed out")]
    Timeout { backend: String },

    #[error("Connection to '{backend}' failed: {message}")]
    Connection { backend: String, message: String },

    #[error("Query to '{backend}' failed with status {status}: {message}")]
    Query {
        backend: String,
        status: u16,
        message: String,
    },

    #[error("Failed to decode response from '{backend}': {message}")]
    Decode { backend: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BackendError {
    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a decode error.
    pub fn decode(backend: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Decode {
            backend: backend.into(),
            message: msg.into(),
        }
    }

    /// Whether the pool could not hand out a connection at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            Self::UnknownBackend(_) | Self::Exhausted { .. } | Self::PoolClosed(_)
        )
    }
}

impl From<BackendError> for PlotError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::UnknownBackend(name) => PlotError::UnknownBackend(name),
            e @ (BackendError::Exhausted { .. } | BackendError::PoolClosed(_)) => {
                PlotError::BackendUnavailable(e.to_string())
            }
            e @ BackendError::Timeout { .. } => PlotError::Timeout(e.to_string()),
            e @ BackendError::Decode { .. } => PlotError::UnexpectedResponse(e.to_string()),
            e @ BackendError::Config(_) => PlotError::ConfigError(e.to_string()),
            e => PlotError::BackendQuery(e.to_string()),
        }
    }
}
