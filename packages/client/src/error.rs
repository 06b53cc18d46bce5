use reqwest::StatusCode;
use serde::Deserialize;

/// Failures surfaced to callers of the client library.
///
/// `Display` is the message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    AccessExpired(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("Service unavailable: {0}")]
    Dependency(String),
    #[error("Could not reach the server: {0}")]
    Transport(String),
    #[error("Unexpected error: {0}")]
    Internal(String),
}

/// JSON body the server attaches to every error response.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

impl ClientError {
    /// Map a server error code (falling back to the HTTP status) onto a variant.
    pub fn from_response(status: StatusCode, body: Option<ErrorBody>) -> Self {
        let Some(ErrorBody { code, message }) = body else {
            let message = status
                .canonical_reason()
                .unwrap_or("unexpected response")
                .to_string();
            return Self::from_status(status, message);
        };
        match code.as_str() {
            "VALIDATION_ERROR" => Self::InvalidInput(message),
            "TOKEN_MISSING" | "TOKEN_INVALID" | "INVALID_CREDENTIALS" => Self::Unauthorized(message),
            "PERMISSION_DENIED" => Self::Forbidden(message),
            "ACCESS_EXPIRED" => Self::AccessExpired(message),
            "NOT_FOUND" => Self::NotFound(message),
            "CONFLICT" | "USERNAME_TAKEN" => Self::Conflict(message),
            "DEPENDENCY_FAILURE" => Self::Dependency(message),
            _ => Self::from_status(status, message),
        }
    }

    fn from_status(status: StatusCode, message: String) -> Self {
        match status {
            StatusCode::BAD_REQUEST | StatusCode::PAYLOAD_TOO_LARGE => Self::InvalidInput(message),
            StatusCode::UNAUTHORIZED => Self::Unauthorized(message),
            StatusCode::FORBIDDEN => Self::Forbidden(message),
            StatusCode::NOT_FOUND => Self::NotFound(message),
            StatusCode::CONFLICT => Self::Conflict(message),
            StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE => Self::Dependency(message),
            _ => Self::Internal(message),
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Internal(format!("malformed response: {err}"))
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        Self::InvalidInput(err.to_string())
    }
}
