//! Error types for the plot services.

use thiserror::Error;

/// Result type alias using PlotError.
pub type PlotResult<T> = Result<T, PlotError>;

/// Primary error type for plot and data requests.
#[derive(Debug, Error)]
pub enum PlotError {
    // === Request Errors ===
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Illegal parameter: {0}")]
    IllegalParameter(String),

    #[error("Duplicated parameter: {0}")]
    DuplicatedParameter(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    #[error("Illegal {0} value.")]
    InvalidRequest(&'static str),

    #[error("Illegal area of interest: {0}")]
    InvalidArea(String),

    #[error("Invalid time specification: {0}")]
    InvalidTime(String),

    #[error("Bin size too small: {buckets} buckets exceeds the limit of {limit}")]
    TooManyBuckets { buckets: u64, limit: u64 },

    #[error("Mixed output modes in one request")]
    MixedOutputModes,

    // === Lookup Errors ===
    #[error("Unknown data source: {0}")]
    UnknownSource(String),

    #[error("Unknown rank: {0}")]
    UnknownRank(u32),

    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    // === Backend Errors ===
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Backend query failed: {0}")]
    BackendQuery(String),

    #[error("Unexpected backend response: {0}")]
    UnexpectedResponse(String),

    #[error("Backend request timeout: {0}")]
    Timeout(String),

    // === Output Errors ===
    #[error("Export failed: {0}")]
    ExportError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl PlotError {
    /// Shorthand for a field that failed range or syntax validation.
    pub fn invalid(param: impl Into<String>, message: impl Into<String>) -> Self {
        PlotError::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }

    /// Stable machine-readable code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            PlotError::MissingParameter(_) => "MissingParameter",
            PlotError::IllegalParameter(_) => "IllegalParameter",
            PlotError::DuplicatedParameter(_) => "DuplicatedParameter",
            PlotError::InvalidParameter { .. } | PlotError::InvalidRequest(_) => {
                "InvalidParameterValue"
            }
            PlotError::InvalidArea(_) => "InvalidArea",
            PlotError::InvalidTime(_) => "InvalidTime",
            PlotError::TooManyBuckets { .. } => "BinSizeTooSmall",
            PlotError::MixedOutputModes => "MixedOutputModes",
            PlotError::UnknownSource(_) => "UnknownSource",
            PlotError::UnknownRank(_) => "UnknownRank",
            PlotError::UnknownBackend(_) => "UnknownBackend",
            PlotError::BackendUnavailable(_) => "BackendUnavailable",
            PlotError::BackendQuery(_) | PlotError::UnexpectedResponse(_) => "BackendQueryFailed",
            PlotError::Timeout(_) => "Timeout",
            _ => "NoApplicableCode",
        }
    }

    /// Whether the error was caused by the request itself.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PlotError::MissingParameter(_)
                | PlotError::IllegalParameter(_)
                | PlotError::DuplicatedParameter(_)
                | PlotError::InvalidParameter { .. }
                | PlotError::InvalidRequest(_)
                | PlotError::InvalidArea(_)
                | PlotError::InvalidTime(_)
                | PlotError::TooManyBuckets { .. }
                | PlotError::MixedOutputModes
        )
    }

    /// Get the HTTP status code for this error.
    pub fn http_status_code(&self) -> u16 {
        match self {
            e if e.is_validation() => 400,

            PlotError::UnknownSource(_) | PlotError::UnknownRank(_) => 404,

            PlotError::BackendQuery(_) | PlotError::UnexpectedResponse(_) => 502,
            PlotError::BackendUnavailable(_) | PlotError::UnknownBackend(_) => 503,
            PlotError::Timeout(_) => 504,

            _ => 500,
        }
    }
}

impl From<std::io::Error> for PlotError {
    fn from(err: std::io::Error) -> Self {
        PlotError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for PlotError {
    fn from(err: serde_json::Error) -> Self {
        PlotError::InternalError(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_errors_are_400() {
        assert_eq!(PlotError::MissingParameter("st".into()).http_status_code(), 400);
        assert_eq!(PlotError::InvalidRequest("width").http_status_code(), 400);
        assert_eq!(
            PlotError::TooManyBuckets { buckets: 20_000, limit: 10_000 }.http_status_code(),
            400
        );
    }

    #[test]
    fn test_backend_errors() {
        let err = PlotError::BackendUnavailable("quakes".into());
        assert_eq!(err.http_status_code(), 503);
        assert!(!err.is_validation());
        assert_eq!(PlotError::Timeout("q".into()).http_status_code(), 504);
    }

    #[test]
    fn test_invalid_request_message() {
        assert_eq!(PlotError::InvalidRequest("x").to_string(), "Illegal x value.");
    }
}
