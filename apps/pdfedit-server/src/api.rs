//! API handlers for the pdfedit server
//!
//! - `GET /health`
//! - `POST /edit-pdf`: multipart upload of a PDF plus a JSON edit list,
//!   answered with the edited PDF

use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{debug, info};

use crate::error::ServerError;
use crate::AppState;

/// Number of edits applied, as a response header
pub const EDITS_APPLIED: HeaderName = HeaderName::from_static("x-edits-applied");

/// Number of edits skipped, as a response header
pub const EDITS_SKIPPED: HeaderName = HeaderName::from_static("x-edits-skipped");

const FALLBACK_FILENAME: &str = "document.pdf";

/// Build the application router with CORS, request tracing and the upload
/// size limit applied. Rate limiting is layered on separately in `main`
/// because it needs the peer address.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION, EDITS_APPLIED, EDITS_SKIPPED]);

    Router::new()
        .route("/health", get(handle_health))
        .route("/edit-pdf", post(handle_edit_pdf))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(DefaultBodyLimit::max(state.max_upload_bytes)),
        )
}

/// Health check response
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Handler: GET /health
pub async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "pdfedit-server",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Parts of an edit upload
struct EditUpload {
    pdf: Option<(Vec<u8>, Option<String>)>,
    edits: Option<String>,
}

async fn read_upload(mut multipart: Multipart) -> Result<EditUpload, ServerError> {
    let mut upload = EditUpload {
        pdf: None,
        edits: None,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::InvalidRequest(e.body_text()))?
    {
        match field.name() {
            Some("pdf") => {
                let filename = field.file_name().map(str::to_string);
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ServerError::InvalidRequest(e.body_text()))?;
                upload.pdf = Some((bytes.to_vec(), filename));
            }
            Some("edits") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ServerError::InvalidRequest(e.body_text()))?;
                upload.edits = Some(text);
            }
            other => debug!("Ignoring multipart field {:?}", other),
        }
    }

    Ok(upload)
}

/// Handler: POST /edit-pdf
pub async fn handle_edit_pdf(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ServerError> {
    let multipart = multipart.map_err(|e| ServerError::InvalidRequest(e.body_text()))?;
    let upload = read_upload(multipart).await?;

    let (pdf, filename) = upload.pdf.ok_or(ServerError::MissingPdf)?;
    let edits = upload.edits.ok_or(ServerError::MissingEdits)?;
    let filename = sanitize_filename(filename.as_deref());

    info!(
        "Edit request: file={}, {} bytes, edits payload {} bytes",
        filename,
        pdf.len(),
        edits.len()
    );

    let outcome = tokio::task::spawn_blocking(move || pdfedit_core::edit_pdf(&pdf, &edits))
        .await
        .map_err(|e| ServerError::Internal(format!("Edit task failed: {}", e)))??;

    info!(
        "Edited {}: {} applied, {} skipped, {} page(s)",
        filename,
        outcome.report.applied_count(),
        outcome.report.skipped_count(),
        outcome.page_count
    );

    let disposition = content_disposition(&filename);
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/pdf"),
    );
    headers.insert(
        header::CONTENT_DISPOSITION,
        HeaderValue::from_str(&disposition)
            .map_err(|e| ServerError::Internal(format!("Invalid filename header: {}", e)))?,
    );
    headers.insert(
        EDITS_APPLIED,
        HeaderValue::from(outcome.report.applied_count()),
    );
    headers.insert(
        EDITS_SKIPPED,
        HeaderValue::from(outcome.report.skipped_count()),
    );

    Ok((headers, outcome.pdf).into_response())
}

/// Reduce a client-supplied filename to a safe `Content-Disposition` value.
///
/// Directory components and control characters are dropped and double
/// quotes are escaped.
pub fn sanitize_filename(name: Option<&str>) -> String {
    let base = name
        .map(|n| n.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(""))
        .unwrap_or("");

    let mut cleaned = String::with_capacity(base.len());
    for c in base.trim().chars().filter(|c| !c.is_control()) {
        if c == '"' {
            cleaned.push('\\');
        }
        cleaned.push(c);
    }

    if cleaned.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        cleaned
    }
}

/// `Content-Disposition` for the edited file.
///
/// `filename` must already be sanitized. Non-ASCII names get an ASCII
/// `filename` fallback plus an RFC 5987 `filename*` carrying the real name.
pub fn content_disposition(filename: &str) -> String {
    if filename.is_ascii() {
        return format!("attachment; filename=\"edited_{}\"", filename);
    }

    let fallback: String = filename
        .chars()
        .map(|c| if c.is_ascii() { c } else { '_' })
        .collect();
    let original = format!("edited_{}", filename.replace("\\\"", "\""));
    format!(
        "attachment; filename=\"edited_{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(&original)
    )
}
