use crate::utils::error::{ErrorCategory, ProcureError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

impl ProcureError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProcureError::PaymentError {
                budget_exceeded: true,
                ..
            } => StatusCode::PAYMENT_REQUIRED,
            ProcureError::NotFound { .. } => StatusCode::NOT_FOUND,
            _ => match self.category() {
                ErrorCategory::Validation => StatusCode::BAD_REQUEST,
                ErrorCategory::Network
                | ErrorCategory::Upstream
                | ErrorCategory::ModelOutput
                | ErrorCategory::Payment => StatusCode::BAD_GATEWAY,
                ErrorCategory::Configuration
                | ErrorCategory::Storage
                | ErrorCategory::Processing => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ProcureError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("❌ {} (category: {:?})", self, self.category());
        } else {
            tracing::warn!("⚠️ Request rejected: {}", self);
        }

        let body = json!({
            "error": self.to_string(),
            "category": format!("{:?}", self.category()).to_lowercase(),
            "suggestion": self.recovery_suggestion(),
        });
        (status, Json(body)).into_response()
    }
}
