// HTTP error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::fmt;

/// Result type for HTTP handlers
pub type AppResult<T> = Result<T, AppError>;

/// Application error with HTTP status code
#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.status, self.message)
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Scheduler and platform callers only read the status; plain text
        // bodies keep the webhook surface simple.
        (self.status, self.message).into_response()
    }
}

impl From<restream_core::Error> for AppError {
    fn from(err: restream_core::Error) -> Self {
        use restream_core::Error;

        match err {
            Error::CredentialUnavailable(msg) => Self::unauthorized(msg),
            Error::InvalidInput(msg) => Self::bad_request(msg),
            other => {
                tracing::error!("Internal error: {other}");
                Self::internal("Internal server error")
            }
        }
    }
}
