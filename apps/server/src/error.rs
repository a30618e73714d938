use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use heater_core::HeaterError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    InvalidSetpoint(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl From<HeaterError> for ApiError {
    fn from(e: HeaterError) -> Self {
        match e {
            HeaterError::InvalidSetpoint(_) => ApiError::InvalidSetpoint(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            ApiError::InvalidSetpoint(_) => (StatusCode::NOT_ACCEPTABLE, "INVALID_SETPOINT"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        let body = ErrorResponse {
            error: self.to_string(),
            code: code.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
