//! Artifact download endpoints.
//!
//! Binary QR/PDF downloads by registrant identifier. The files were written
//! at registration time; a missing file means the identifier was never
//! issued (or generation failed and a regeneration is due).

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;

use crate::api::{ApiState, ErrorResponse};

/// GET /get-qr/{uid}
pub async fn get_qr(State(state): State<Arc<ApiState>>, Path(uid): Path<String>) -> Response {
    serve_file(
        state.registrar.artifacts().qr_path(&uid),
        "image/png",
        &format!("{uid}.png"),
    )
    .await
}

/// GET /get-pdf/{uid}
pub async fn get_pdf(State(state): State<Arc<ApiState>>, Path(uid): Path<String>) -> Response {
    serve_file(
        state.registrar.artifacts().pdf_path(&uid),
        "application/pdf",
        &format!("{uid}.pdf"),
    )
    .await
}

async fn serve_file(path: std::path::PathBuf, content_type: &str, filename: &str) -> Response {
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, content_type.to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("artifact not found")),
        )
            .into_response(),
    }
}
