//! Server error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use strongbox_core::rpc::{ErrorBody, ErrorCode};

/// Server error types mapped to HTTP status codes and wire error codes.
#[derive(Debug)]
pub enum ServerError {
    Database(String),
    BadRequest(String),
    InvalidCredentials,
    UserExists,
    SessionNotFound,
    TokenExpired,
    InvalidToken(String),
    NotFound(String),
    Constraint(String),
    PayloadTooLarge,
    Internal(String),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Database(e) => write!(f, "Database error: {}", e),
            Self::BadRequest(e) => write!(f, "Bad request: {}", e),
            Self::InvalidCredentials => write!(f, "Invalid login or password"),
            Self::UserExists => write!(f, "User already exists"),
            Self::SessionNotFound => write!(f, "Session not found"),
            Self::TokenExpired => write!(f, "token is expired"),
            Self::InvalidToken(e) => write!(f, "Invalid token: {}", e),
            Self::NotFound(e) => write!(f, "Not found: {}", e),
            Self::Constraint(e) => write!(f, "Constraint violated: {}", e),
            Self::PayloadTooLarge => write!(f, "Payload too large"),
            Self::Internal(e) => write!(f, "Internal error: {}", e),
        }
    }
}

impl std::error::Error for ServerError {}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::TokenExpired | Self::InvalidToken(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::SessionNotFound => StatusCode::FORBIDDEN,
            Self::UserExists => StatusCode::CONFLICT,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Constraint(_) => StatusCode::PRECONDITION_FAILED,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Database(_) | Self::Internal(_) => ErrorCode::Internal,
            Self::BadRequest(_) => ErrorCode::InvalidArgument,
            Self::InvalidCredentials => ErrorCode::InvalidCredentials,
            Self::UserExists => ErrorCode::AlreadyExists,
            Self::SessionNotFound => ErrorCode::PermissionDenied,
            Self::TokenExpired => ErrorCode::TokenExpired,
            Self::InvalidToken(_) => ErrorCode::InvalidToken,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Constraint(_) => ErrorCode::FailedPrecondition,
            Self::PayloadTooLarge => ErrorCode::PayloadTooLarge,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Database(e) | Self::Internal(e) => {
                tracing::error!("{}", e);
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorBody {
            error: message,
            code: self.code(),
        };
        (self.status(), axum::Json(body)).into_response()
    }
}

impl From<rusqlite::Error> for ServerError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Database(e.to_string())
    }
}

impl From<strongbox_core::CryptoError> for ServerError {
    fn from(e: strongbox_core::CryptoError) -> Self {
        Self::Internal(e.to_string())
    }
}
