use serde::Deserialize;
use thiserror::Error;

/// Extra fields of an OpenAI error body, `{"error": {...}}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiErrorDetails {
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub param: Option<String>,
}

impl std::fmt::Display for ApiErrorDetails {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "type={} code={}",
            self.error_type.as_deref().unwrap_or("-"),
            self.code.as_deref().unwrap_or("-")
        )
    }
}

impl std::error::Error for ApiErrorDetails {}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    RequestError(#[from] reqwest::Error),

    #[error("API returned error (HTTP {status}): {message}")]
    ApiError {
        status: u16,
        message: String,
        #[source]
        details: Option<Box<ApiErrorDetails>>,
    },

    #[error("Failed to parse response: {0}")]
    ParseError(String),

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Timed out after {seconds} seconds: {last}")]
    PollTimeout { seconds: u64, last: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Failed to read {path}: {source}")]
    FileError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,
}

impl ApiError {
    /// HTTP status of an error response, if the API answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_conflict(&self) -> bool {
        self.status() == Some(409)
    }

    pub fn is_bad_request(&self) -> bool {
        self.status() == Some(400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status: u16) -> ApiError {
        ApiError::ApiError {
            status,
            message: "boom".to_string(),
            details: None,
        }
    }

    #[test]
    fn status_helpers() {
        assert!(api_error(404).is_not_found());
        assert!(api_error(409).is_conflict());
        assert!(api_error(400).is_bad_request());
        assert!(!api_error(500).is_not_found());
        assert!(!ApiError::RateLimited.is_conflict());
        assert_eq!(ApiError::Cancelled.status(), None);
    }

    #[test]
    fn error_message_includes_status() {
        assert_eq!(
            api_error(409).to_string(),
            "API returned error (HTTP 409): boom"
        );
    }
}
