//! Error types and HTTP response conversion

use std::collections::BTreeMap;

use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::store::{StoreError, StoreErrorKind};

/// Result type alias using the pipeline error
pub type Result<T> = std::result::Result<T, Error>;

/// Field or query key mapped to a human-readable message, ordered by key
///
/// An empty set means the checked record is valid.
pub type ErrorSet = BTreeMap<String, String>;

/// Error raised while processing a resource request
///
/// Large error variants are boxed to reduce stack size
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(Box<figment::Error>),

    /// Method not supported for the resolved cardinality
    #[error("Method {method} not allowed")]
    MethodNotAllowed {
        /// Method of the rejected request
        method: Method,
        /// Methods the resource accepts at this path
        allowed: Vec<Method>,
    },

    /// Body failed validation (422)
    #[error("Validation failed on {} field(s)", .0.len())]
    ValidationFailed(ErrorSet),

    /// Malformed paging or filter parameter
    #[error("Invalid parameter {name}: {message}")]
    InvalidParameter {
        /// Query key that was rejected
        name: String,
        /// Why the value was rejected
        message: String,
    },

    /// Bad request
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authentication error
    #[error("Authentication failed: {0}")]
    Unauthorized(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Structured store error with operation context
    #[error("{0}")]
    Store(StoreError),

    /// Definition wiring error, e.g. a cycle between resource templates
    #[error("Resource configuration error: {0}")]
    Configuration(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Reject a query parameter
    pub fn invalid_parameter(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name: name.into(),
            message: message.into(),
        }
    }

    /// HTTP status this error converts to
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Config(_) | Self::Configuration(_) | Self::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::InvalidParameter { .. } | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::Store(e) => match e.kind {
                StoreErrorKind::NotFound => StatusCode::NOT_FOUND,
                StoreErrorKind::AlreadyExists | StoreErrorKind::ConstraintViolation => {
                    StatusCode::CONFLICT
                }
                StoreErrorKind::ValidationFailed => StatusCode::UNPROCESSABLE_ENTITY,
                StoreErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
                StoreErrorKind::Other => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    /// Machine-readable error code
    pub fn error_code(&self) -> String {
        match self {
            Self::Config(_) => "CONFIG_ERROR".to_string(),
            Self::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED".to_string(),
            Self::ValidationFailed(_) => "VALIDATION_FAILED".to_string(),
            Self::InvalidParameter { .. } => "INVALID_PARAMETER".to_string(),
            Self::BadRequest(_) => "BAD_REQUEST".to_string(),
            Self::NotFound(_) => "NOT_FOUND".to_string(),
            Self::Unauthorized(_) => "UNAUTHORIZED".to_string(),
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED".to_string(),
            Self::Store(e) => format!("STORE_{}", e.kind.to_string().to_uppercase()),
            Self::Configuration(_) => "CONFIGURATION_ERROR".to_string(),
            Self::Io(_) => "IO_ERROR".to_string(),
        }
    }
}

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Error::Config(Box::new(err))
    }
}

impl From<StoreError> for Error {
    fn from(err: StoreError) -> Self {
        match err.kind {
            StoreErrorKind::NotFound => Error::NotFound(match err.entity_id {
                Some(id) => format!(
                    "{} {}",
                    err.entity_type.as_deref().unwrap_or("Record"),
                    id
                ),
                None => err.message,
            }),
            _ => Error::Store(err),
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error message
    pub error: String,
    /// Optional error code
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// HTTP status code
    pub status: u16,
    /// Per-field messages for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ErrorSet>,
}

impl ErrorResponse {
    /// Create a new error response
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: None,
            status: status.as_u16(),
            errors: None,
        }
    }

    /// Create error response with a code
    pub fn with_code(
        status: StatusCode,
        code: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            error: error.into(),
            code: Some(code.into()),
            status: status.as_u16(),
            errors: None,
        }
    }

    /// Attach the per-field messages
    #[must_use]
    pub fn with_errors(mut self, errors: ErrorSet) -> Self {
        self.errors = Some(errors);
        self
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        match self {
            Error::MethodNotAllowed { method, allowed } => {
                let allow = allowed
                    .iter()
                    .map(Method::as_str)
                    .collect::<Vec<_>>()
                    .join(", ");
                let body = ErrorResponse::with_code(
                    status,
                    code,
                    format!("Method {} not allowed", method),
                );
                let mut response = (status, Json(body)).into_response();
                if let Ok(value) = HeaderValue::from_str(&allow) {
                    response.headers_mut().insert(header::ALLOW, value);
                }
                response
            }
            Error::ValidationFailed(errors) => {
                let body = ErrorResponse::with_code(status, code, "Validation failed")
                    .with_errors(errors);
                (status, Json(body)).into_response()
            }
            Error::Store(ref e) => {
                tracing::error!(
                    operation = %e.operation,
                    kind = %e.kind,
                    entity_type = ?e.entity_type,
                    entity_id = ?e.entity_id,
                    "Store error: {}", e.message
                );

                // Internal details stay in the log
                let user_message = match e.kind {
                    StoreErrorKind::AlreadyExists => "Record already exists",
                    StoreErrorKind::ConstraintViolation => {
                        "Operation conflicts with existing data"
                    }
                    StoreErrorKind::ValidationFailed => "Store rejected the record",
                    StoreErrorKind::Unavailable => "Store temporarily unavailable",
                    StoreErrorKind::NotFound => "Resource not found",
                    StoreErrorKind::Other => "Store operation failed",
                };
                (
                    status,
                    Json(ErrorResponse::with_code(status, code, user_message)),
                )
                    .into_response()
            }
            Error::Config(ref e) => {
                tracing::error!("Configuration error: {}", e);
                (
                    status,
                    Json(ErrorResponse::with_code(
                        status,
                        code,
                        "Service configuration error",
                    )),
                )
                    .into_response()
            }
            Error::Configuration(ref msg) => {
                tracing::error!("Resource configuration error: {}", msg);
                (
                    status,
                    Json(ErrorResponse::with_code(
                        status,
                        code,
                        "Resource configuration error",
                    )),
                )
                    .into_response()
            }
            Error::Io(ref e) => {
                tracing::error!("I/O error: {}", e);
                (
                    status,
                    Json(ErrorResponse::with_code(status, code, "Internal server error")),
                )
                    .into_response()
            }
            other => {
                let body = ErrorResponse::with_code(status, code, other.to_string());
                (status, Json(body)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreOperation;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn test_method_not_allowed_sets_allow_header() {
        let err = Error::MethodNotAllowed {
            method: Method::PUT,
            allowed: vec![Method::GET, Method::POST, Method::DELETE],
        };
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            response.headers().get(header::ALLOW).unwrap(),
            "GET, POST, DELETE"
        );
        let body = body_json(response).await;
        assert_eq!(body["code"], "METHOD_NOT_ALLOWED");
    }

    #[tokio::test]
    async fn test_validation_failed_carries_errors_map() {
        let mut errors = ErrorSet::new();
        errors.insert("title".to_string(), "This field is required".to_string());
        errors.insert("year".to_string(), "Must be a number".to_string());

        let response = Error::ValidationFailed(errors).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = body_json(response).await;
        assert_eq!(body["code"], "VALIDATION_FAILED");
        assert_eq!(body["errors"]["title"], "This field is required");
        assert_eq!(body["errors"]["year"], "Must be a number");
    }

    #[tokio::test]
    async fn test_store_error_hides_internal_message() {
        let err = Error::from(StoreError::unavailable(
            StoreOperation::Query,
            "connection reset by peer at 10.0.0.4",
        ));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = body_json(response).await;
        assert_eq!(body["code"], "STORE_UNAVAILABLE");
        assert!(!body["error"].as_str().unwrap().contains("10.0.0.4"));
    }

    #[test]
    fn test_store_not_found_becomes_not_found() {
        let err = Error::from(StoreError::not_found("book", "42"));
        assert!(matches!(err, Error::NotFound(ref msg) if msg == "book 42"));
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_status_codes_are_distinct_per_client_kind() {
        let cases = [
            (Error::invalid_parameter("limit", "bad"), 400, "INVALID_PARAMETER"),
            (Error::BadRequest("x".into()), 400, "BAD_REQUEST"),
            (Error::Unauthorized("x".into()), 401, "UNAUTHORIZED"),
            (Error::NotFound("x".into()), 404, "NOT_FOUND"),
            (Error::RateLimitExceeded, 429, "RATE_LIMIT_EXCEEDED"),
            (Error::Configuration("cycle".into()), 500, "CONFIGURATION_ERROR"),
            (
                Error::from(StoreError::already_exists("book", "1")),
                409,
                "STORE_ALREADY_EXISTS",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status_code().as_u16(), status, "{err}");
            assert_eq!(err.error_code(), code);
        }
    }
}
