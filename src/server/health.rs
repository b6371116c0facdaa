//! `GET /healthz`: liveness check.
//!
//! Only checks that the source file is still on disk. The in-memory image is
//! never consulted, so the check can disagree with what is actually being
//! served if the file changes after startup.

use std::io;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use super::routes::AppState;

pub(crate) async fn health_handler(State(state): State<AppState>) -> Response {
    let path = state.image_file.as_path();
    match tokio::fs::metadata(path).await {
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "/healthz - source image missing");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("{} not found", path.display()),
            )
                .into_response()
        }
        // any other stat failure still counts as present
        _ => {
            tracing::info!("/healthz - ok");
            (StatusCode::OK, "OK").into_response()
        }
    }
}
