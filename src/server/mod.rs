//! HTTP server for the crop service.
//!
//! # Endpoints
//!
//! - `GET <url_path>?w=&h=` returns a top-left crop in the source format
//! - `GET /` is the same as the crop endpoint
//! - `GET /healthz` is the liveness check

use std::time::Duration;

pub mod crop;
pub mod error;
mod health;
pub mod listener;
pub mod routes;

pub use crop::CropDimensions;
pub use error::ApiError;
pub use listener::serve;
pub use routes::{app_router, bootstrap, AppState};

/// Fixed path of the liveness check.
pub const HEALTH_PATH: &str = "/healthz";

/// `Cache-Control` sent with every successful crop.
pub const CACHE_CONTROL_VALUE: &str = "max-age=3600";

/// Header read deadline and maximum lifetime of a connection.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
