//! Image store errors.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while loading the source image.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The file could not be opened or read.
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bytes were not recognised as PNG, JPEG or GIF.
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),

    /// The format was recognised but decoding failed.
    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),
}

/// A crop rectangle that does not fit inside the stored image.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum CropError {
    #[error("crop {width} x {height} exceeds image bounds {max_x} x {max_y}")]
    OutOfBounds {
        width: u32,
        height: u32,
        max_x: u32,
        max_y: u32,
    },
}

/// Encoding the cropped region failed.
#[derive(Debug, Error)]
#[error("cannot encode {format} image: {source}")]
pub struct EncodeError {
    pub format: super::ImageFormatTag,
    #[source]
    pub source: image::ImageError,
}
