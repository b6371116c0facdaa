//! # crop-server
//!
//! Serves top-left crops of one pre-loaded image over HTTP, re-encoded in the
//! source image's own format (PNG, JPEG or GIF), plus a liveness check.
//!
//! The image is decoded once at startup into an [`ImageStore`] and shared
//! read-only with every request; see [`server::bootstrap`].

pub mod config;
pub mod image_store;
pub mod server;

pub use config::{ConfigError, ServerConfig};
pub use image_store::{ImageFormatTag, ImageStore};
pub use server::{app_router, bootstrap, AppState};

/// Crate version, logged at startup.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
