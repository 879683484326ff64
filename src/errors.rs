//! The error surface a request handler can produce, mapped onto spec
//! §7's status-code table. Every variant renders as `Content-type:
//! text/plain` with the error text as the body — no stack traces, no
//! JSON envelopes, matching `original_source/handler/handler.go`'s
//! `textResponse` helper.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("bad plan: {0}")]
    BadPlan(String),
    #[error("bad location in plan: {0}")]
    BadLocation(String),
    #[error("execution failure: {0}")]
    StepFailure(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::BadRequest(_) | AppError::BadPlan(_) | AppError::BadLocation(_) => StatusCode::BAD_REQUEST,
            AppError::StepFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = self.to_string();
        tracing::warn!(%body, "request failed");
        (status, [("content-type", "text/plain")], body).into_response()
    }
}
