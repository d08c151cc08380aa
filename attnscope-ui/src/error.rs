//! Error types for the web layer and their HTTP mapping.

use attnscope_ml::MlError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UiError {
    #[error(transparent)]
    Ml(#[from] MlError),

    #[error("Template error: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("Render error: {0}")]
    Render(#[from] handlebars::RenderError),

    #[error("Inference task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

impl UiError {
    /// 400 for a bad selection or oversized input, 422 for blank text, 500 otherwise.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Ml(MlError::EmptyInput) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Ml(e) if e.is_user_error() => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Rejected request");
        }
        let body = match &self {
            Self::Ml(MlError::EmptyInput) => {
                serde_json::json!({ "warning": attnscope_ml::EMPTY_INPUT_WARNING })
            }
            _ => serde_json::json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}
