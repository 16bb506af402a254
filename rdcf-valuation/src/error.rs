//! Error types for the valuation service.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::data::ProviderError;
use crate::valuation::ValuationError;

/// Valuation service errors.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Valuation(#[from] ValuationError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        Self::InvalidRequest(rejection.body_text())
    }
}

/// API error response.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ServiceError {
    /// HTTP status and machine-readable code for this error.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Valuation(e) => match e {
                ValuationError::InvalidConfiguration { .. } => {
                    (StatusCode::BAD_REQUEST, "INVALID_CONFIGURATION")
                }
                ValuationError::DivisionByZero(_) => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "DIVISION_BY_ZERO")
                }
                ValuationError::InvalidMultiple { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_MULTIPLE")
                }
                ValuationError::NonFiniteResult { .. } => {
                    (StatusCode::UNPROCESSABLE_ENTITY, "NON_FINITE_RESULT")
                }
            },
            Self::Provider(e) => match e {
                ProviderError::NotFound(_) => (StatusCode::NOT_FOUND, "SYMBOL_NOT_FOUND"),
                ProviderError::RateLimited { .. } => {
                    (StatusCode::TOO_MANY_REQUESTS, "RATE_LIMITED")
                }
                ProviderError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_SYMBOL"),
                ProviderError::Network(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_UNAVAILABLE"),
                ProviderError::Parse(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_PARSE_ERROR"),
                ProviderError::MissingField { .. } => (StatusCode::BAD_GATEWAY, "MISSING_FIELD"),
            },
            Self::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        if status.is_server_error() {
            tracing::warn!(code, error = %self, "Request failed upstream");
        } else {
            tracing::debug!(code, error = %self, "Request rejected");
        }

        let body = serde_json::json!({
            "success": false,
            "error": ApiError {
                code: code.to_string(),
                message: self.to_string(),
            }
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ServiceError::from(ProviderError::NotFound("XYZ".to_string()));
        assert_eq!(err.to_string(), "Symbol not found: XYZ");

        let err = ServiceError::InvalidRequest("missing body".to_string());
        assert_eq!(err.to_string(), "Invalid request: missing body");
    }

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ServiceError::from(ValuationError::DivisionByZero("intrinsic_pe")),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                ServiceError::from(ValuationError::InvalidConfiguration {
                    field: "cost_of_capital",
                    reason: "must be greater than 0".into(),
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                ServiceError::from(ProviderError::RateLimited {
                    retry_after_secs: None,
                }),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                ServiceError::from(ProviderError::MissingField {
                    field: "Stock P/E".into(),
                }),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ServiceError::from(ProviderError::Network("timeout".into())),
                StatusCode::BAD_GATEWAY,
            ),
            (
                ServiceError::from(ValuationError::NonFiniteResult {
                    quantity: "intrinsic_pe",
                    value: f64::NAN,
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status_and_code().0, expected, "{}", err);
        }
    }

    #[test]
    fn test_error_into_response() {
        let err = ServiceError::from(ProviderError::NotFound("XYZ".into()));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
