//! JSON error envelope for API-shaped routes.
//!
//! Every error renders as `{"message": ..., ...payload}` with a configurable
//! status code, the shape external callers (charts, the survey callback)
//! already parse.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorCode {
    BadRequest,
    NotFound,
    Internal,
}

impl ApiErrorCode {
    fn status(self) -> StatusCode {
        match self {
            ApiErrorCode::BadRequest => StatusCode::BAD_REQUEST,
            ApiErrorCode::NotFound => StatusCode::NOT_FOUND,
            ApiErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug)]
pub struct ApiError {
    code: ApiErrorCode,
    message: String,
    payload: Option<Value>,
}

impl ApiError {
    pub fn new(code: ApiErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            payload: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorCode::BadRequest, message)
    }

    /// Attach extra fields merged into the JSON envelope.
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = match self.payload {
            Some(Value::Object(map)) => Value::Object(map),
            _ => json!({}),
        };
        body["message"] = Value::String(self.message);
        (self.code.status(), Json(body)).into_response()
    }
}

/// Log a database error and return a generic 500 envelope.
pub fn db_error(context: &str, e: anyhow::Error) -> ApiError {
    tracing::error!(error = %e, "{context} failed");
    ApiError::new(ApiErrorCode::Internal, format!("{context} failed"))
}
