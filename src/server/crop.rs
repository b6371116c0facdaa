//! `GET <url_path>?w=<int>&h=<int>`: top-left crop of the stored image.

use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use super::error::ApiError;
use super::routes::AppState;
use super::CACHE_CONTROL_VALUE;

/// Validated crop size. Always within `1..=max` on both axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropDimensions {
    pub width: u32,
    pub height: u32,
}

impl CropDimensions {
    /// Read `w` and `h` from decoded form pairs and check them against the
    /// image bounds.
    ///
    /// Only the first occurrence of each key counts, and a missing key reads
    /// as an empty string. Width is checked before height.
    pub fn from_form(form: &[(String, String)], max_x: u32, max_y: u32) -> Result<Self, ApiError> {
        let width = parse_dimension(first_value(form, "w")).map_err(ApiError::InvalidWidth)?;
        let height = parse_dimension(first_value(form, "h")).map_err(ApiError::InvalidHeight)?;

        if width < 1 || height < 1 || width > i64::from(max_x) || height > i64::from(max_y) {
            return Err(ApiError::OutOfBounds { width, height });
        }

        Ok(Self {
            width: width as u32,
            height: height as u32,
        })
    }
}

fn first_value<'a>(form: &'a [(String, String)], key: &str) -> &'a str {
    form.iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
        .unwrap_or("")
}

/// Decode a raw query string into ordered key/value pairs.
///
/// `+` decodes to a space and empty segments are skipped. A `;` inside a
/// segment or a `%` not followed by two hex digits rejects the whole query.
pub fn parse_form(raw: &str) -> Result<Vec<(String, String)>, String> {
    for segment in raw.split('&') {
        if segment.contains(';') {
            return Err("invalid semicolon separator in query".to_string());
        }
        check_escapes(segment)?;
    }
    Ok(url::form_urlencoded::parse(raw.as_bytes()).into_owned().collect())
}

fn check_escapes(segment: &str) -> Result<(), String> {
    let bytes = segment.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        let valid = bytes
            .get(i + 1..i + 3)
            .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
        if !valid {
            let end = (i + 3).min(bytes.len());
            return Err(format!(
                "invalid URL escape {:?}",
                String::from_utf8_lossy(&bytes[i..end])
            ));
        }
        i += 3;
    }
    Ok(())
}

fn parse_dimension(raw: &str) -> Result<i64, String> {
    raw.parse::<i64>()
        .map_err(|e| format!("parsing {raw:?}: {e}"))
}

/// Crop handler. Crop and encode run on the blocking pool.
pub(crate) async fn crop_handler(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Response, ApiError> {
    let form = parse_form(query.as_deref().unwrap_or("")).map_err(ApiError::MalformedQuery)?;
    tracing::info!(?form, "crop request");

    let dims = CropDimensions::from_form(&form, state.store.width(), state.store.height())?;

    let store = Arc::clone(&state.store);
    let encoded = tokio::task::spawn_blocking(move || store.crop_encoded(dims.width, dims.height))
        .await
        .map_err(|e| ApiError::Internal(format!("crop task failed: {e}")))??;

    Ok((
        StatusCode::OK,
        [
            (header::CACHE_CONTROL, CACHE_CONTROL_VALUE),
            (header::CONTENT_TYPE, state.store.format().mime_type()),
        ],
        encoded,
    )
        .into_response())
}
