use crate::error::KotizError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

/// A failed request, rendered as `{"error": .., "code": ..}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    pub fn unauthenticated() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            code: "unauthenticated",
            message: "Authentication required".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

pub fn status_for(err: &KotizError) -> StatusCode {
    match err {
        KotizError::Validation(_) | KotizError::InvalidWebhook(_) => StatusCode::BAD_REQUEST,
        KotizError::NotFound(_) => StatusCode::NOT_FOUND,
        KotizError::InvalidState(_) => StatusCode::CONFLICT,
        KotizError::PaymentInitiation { .. } => StatusCode::BAD_GATEWAY,
        KotizError::Forbidden(_) => StatusCode::FORBIDDEN,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<KotizError> for ApiError {
    fn from(err: KotizError) -> Self {
        let status = status_for(&err);
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            // Internal details stay in the logs
            error!(error = %err, "request failed");
            "Internal server error".to_string()
        } else {
            err.to_string()
        };
        Self {
            status,
            code: err.code(),
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({ "error": self.message, "code": self.code })),
        )
            .into_response()
    }
}
