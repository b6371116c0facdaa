//! HTTP-facing error taxonomy.
//!
//! Errors carry no body. The status code says what went wrong and the
//! `x-message` header says why.

use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::image_store::{CropEncodeError, CropError, EncodeError};

/// Diagnostic header attached to every error response.
pub const X_MESSAGE: &str = "x-message";

/// Errors returned by the crop endpoint.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The query string could not be parsed at all.
    #[error("Error parsing query: {0}")]
    MalformedQuery(String),

    /// `w` is missing or not a base-10 integer.
    #[error("Error parsing width: {0}")]
    InvalidWidth(String),

    /// `h` is missing or not a base-10 integer.
    #[error("Error parsing height: {0}")]
    InvalidHeight(String),

    /// Dimensions below 1 or beyond the source image.
    #[error("Bad width or height: {width} x {height}")]
    OutOfBounds { width: i64, height: i64 },

    /// The encoder rejected the cropped image.
    #[error("Error encoding image")]
    Encode(#[source] EncodeError),

    /// The blocking crop task did not complete.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::MalformedQuery(_)
            | Self::InvalidWidth(_)
            | Self::InvalidHeight(_)
            | Self::OutOfBounds { .. } => StatusCode::BAD_REQUEST,
            Self::Encode(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<CropEncodeError> for ApiError {
    fn from(err: CropEncodeError) -> Self {
        match err {
            CropEncodeError::Crop(CropError::OutOfBounds { width, height, .. }) => {
                Self::OutOfBounds {
                    width: i64::from(width),
                    height: i64::from(height),
                }
            }
            CropEncodeError::Encode(e) => Self::Encode(e),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "crop request failed");
        } else {
            tracing::debug!(error = %self, "crop request rejected");
        }

        match HeaderValue::from_str(&self.to_string()) {
            Ok(message) => (status, [(X_MESSAGE, message)]).into_response(),
            Err(_) => status.into_response(),
        }
    }
}
