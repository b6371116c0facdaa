//! Router construction and one-time bootstrap.

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::crop::crop_handler;
use super::health::health_handler;
use super::{HEALTH_PATH, REQUEST_TIMEOUT};
use crate::config::ServerConfig;
use crate::image_store::{ImageStore, LoadError};

/// Read-only context shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// The decoded source image and its format.
    pub store: Arc<ImageStore>,
    /// File checked by `/healthz`.
    pub image_file: Arc<PathBuf>,
}

impl AppState {
    pub fn new(store: ImageStore, image_file: impl Into<PathBuf>) -> Self {
        Self {
            store: Arc::new(store),
            image_file: Arc::new(image_file.into()),
        }
    }
}

/// Build the axum router. All routes are GET-only; `/` doubles as a crop
/// endpoint unless it already is the configured one.
pub fn app_router(state: AppState, url_path: &str) -> Router {
    let mut router = Router::new()
        .route(url_path, get(crop_handler))
        .route(HEALTH_PATH, get(health_handler));

    if url_path != "/" {
        router = router.route("/", get(crop_handler));
    }

    router
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Load the configured image and build the router around it.
///
/// This is the whole "starting" phase: once it returns `Ok` the image and its
/// format are fixed for the life of the process.
pub fn bootstrap(config: &ServerConfig) -> Result<Router, LoadError> {
    let store = ImageStore::load(&config.image_file)?;
    tracing::info!(
        path = %config.image_file.display(),
        format = %store.format(),
        width = store.width(),
        height = store.height(),
        "source image loaded"
    );

    let state = AppState::new(store, config.image_file.clone());
    Ok(app_router(state, &config.url_path))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
