//! Error types for the pdfedit server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pdfedit_core::PdfEditError;
use serde::Serialize;
use thiserror::Error;

/// Server error types
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("No PDF file provided")]
    MissingPdf,

    #[error("No edits provided")]
    MissingEdits,

    #[error("Invalid edits: {0}")]
    InvalidEdits(String),

    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
    code: String,
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ServerError::MissingPdf => "MISSING_PDF",
            ServerError::MissingEdits => "MISSING_EDITS",
            ServerError::InvalidEdits(_) => "INVALID_EDITS",
            ServerError::InvalidPdf(_) => "INVALID_PDF",
            ServerError::InvalidRequest(_) => "INVALID_REQUEST",
            ServerError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("Rejected request: {}", self);
        }

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            code: self.code().to_string(),
        };

        (status, Json(body)).into_response()
    }
}

impl From<PdfEditError> for ServerError {
    fn from(err: PdfEditError) -> Self {
        match err {
            PdfEditError::InvalidEdits(msg) => ServerError::InvalidEdits(msg),
            PdfEditError::ParseError(msg) => ServerError::InvalidPdf(msg),
            other => ServerError::Internal(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_errors_map_to_client_errors() {
        let edits = ServerError::from(PdfEditError::InvalidEdits("eof".into()));
        assert_eq!(edits.code(), "INVALID_EDITS");
        assert_eq!(edits.status(), StatusCode::BAD_REQUEST);

        let pdf = ServerError::from(PdfEditError::ParseError("bad header".into()));
        assert_eq!(pdf.code(), "INVALID_PDF");
        assert_eq!(pdf.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_save_failure_is_internal() {
        let err = ServerError::from(PdfEditError::SerializationError("disk".into()));
        assert_eq!(err.code(), "INTERNAL_ERROR");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
