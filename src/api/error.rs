//! API error types and conversions

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::{ApiResponse, error::MonitorError};

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

/// API error types
#[derive(Debug)]
pub enum ApiError {
    /// Wrong shared secret or admin token
    Unauthorized(String),

    /// Malformed request body
    InvalidRequest(String),

    /// The collector has no notifier to send through
    NotifierNotConfigured,

    /// The notifier rejected or failed to deliver a message
    NotifierFailure(String),

    /// Internal server error
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::InvalidRequest(_) | ApiError::NotifierNotConfigured => {
                StatusCode::BAD_REQUEST
            }
            ApiError::NotifierFailure(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            ApiError::Unauthorized(msg)
            | ApiError::InvalidRequest(msg)
            | ApiError::Internal(msg) => msg,
            ApiError::NotifierNotConfigured => MonitorError::NotifierNotConfigured.to_string(),
            ApiError::NotifierFailure(msg) => format!("failed to send test message: {msg}"),
        };

        (status, Json(ApiResponse::<()>::failed(message))).into_response()
    }
}

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        match err {
            MonitorError::AuthenticationFailure => ApiError::Unauthorized(err.to_string()),
            MonitorError::DecodeFailure(_) => ApiError::InvalidRequest(err.to_string()),
            MonitorError::NotifierNotConfigured => ApiError::NotifierNotConfigured,
            MonitorError::NotifierFailure(msg) | MonitorError::TransportFailure(msg) => {
                ApiError::NotifierFailure(msg)
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}
