//! HTTP error responses.
//!
//! Every failure leaves the server as a JSON body `{"error": <message>, "kind": <label>}`:
//!
//! | error                      | status | kind               |
//! |----------------------------|--------|--------------------|
//! | `Validation`               | 400    | `validation_error` |
//! | `GatewayError::NotRunning` | 503    | `not_running`      |
//! | `GatewayError::Runner`     | 500    | `runner_error`     |

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::error::GatewayError;

/// Errors returned by request handlers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// The request body was missing, malformed or incomplete. No runner action was taken.
    #[error("{message}")]
    Validation {
        /// What was wrong with the request.
        message: String,
    },

    /// The orchestration core failed.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ApiError {
    /// Shorthand for [`ApiError::Validation`].
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
        }
    }

    /// Stable label used as the `kind` field of the error body.
    pub fn as_label(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "validation_error",
            ApiError::Gateway(e) => e.as_label(),
        }
    }

    /// HTTP status for this error.
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Gateway(GatewayError::NotRunning) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Gateway(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.to_string(),
            "kind": self.as_label(),
        }));
        (self.status(), body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ApiError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::from(GatewayError::NotRunning).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        let runner = ApiError::from(GatewayError::Runner {
            message: "boom".into(),
        });
        assert_eq!(runner.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(runner.as_label(), "runner_error");
    }
}
