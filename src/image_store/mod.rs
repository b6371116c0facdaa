//! The single decoded source image.
//!
//! [`ImageStore`] is built once at startup and is read-only afterwards, so
//! request handlers share it through an `Arc` without any locking. The decoded
//! pixels and the [`ImageFormatTag`] are produced together by one
//! constructor; a store never exists with one but not the other.

pub mod error;
pub mod format;

use std::io::Cursor;
use std::path::Path;

use bytes::Bytes;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, Frame, ImageFormat};

pub use error::{CropError, EncodeError, LoadError};
pub use format::ImageFormatTag;

/// Quality used for JPEG responses.
pub const JPEG_QUALITY: u8 = 75;

/// A decoded image together with the format it was stored in.
#[derive(Debug, Clone)]
pub struct ImageStore {
    image: DynamicImage,
    format: ImageFormatTag,
}

impl ImageStore {
    /// Read, sniff and decode the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| LoadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    /// Sniff and decode an in-memory encoded image.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoadError> {
        let detected = image::guess_format(bytes)
            .map_err(|e| LoadError::UnsupportedFormat(e.to_string()))?;
        let format = ImageFormatTag::from_image_format(detected)
            .ok_or_else(|| LoadError::UnsupportedFormat(format!("{detected:?}")))?;
        let image = image::load_from_memory_with_format(bytes, detected)?;
        Ok(Self { image, format })
    }

    #[cfg(test)]
    pub(crate) fn from_image(image: DynamicImage, format: ImageFormatTag) -> Self {
        Self { image, format }
    }

    pub fn format(&self) -> ImageFormatTag {
        self.format
    }

    /// Max X of the bounds; the origin is always (0, 0).
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    /// Max Y of the bounds.
    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Top-left anchored crop of exactly `width x height` pixels.
    pub fn crop(&self, width: u32, height: u32) -> Result<DynamicImage, CropError> {
        if width == 0 || height == 0 || width > self.width() || height > self.height() {
            return Err(CropError::OutOfBounds {
                width,
                height,
                max_x: self.width(),
                max_y: self.height(),
            });
        }
        Ok(self.image.crop_imm(0, 0, width, height))
    }

    /// Encode `image` with the encoder matching the stored format.
    ///
    /// Output is deterministic: the same input always yields the same bytes.
    pub fn encode(&self, image: &DynamicImage) -> Result<Bytes, EncodeError> {
        let mut buf = Vec::new();
        let result = match self.format {
            ImageFormatTag::Png => image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png),
            ImageFormatTag::Jpeg => {
                let encoder = JpegEncoder::new_with_quality(&mut buf, JPEG_QUALITY);
                match image {
                    DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => {
                        image.write_with_encoder(encoder)
                    }
                    // JPEG has no alpha channel and no 16-bit samples
                    other => DynamicImage::ImageRgb8(other.to_rgb8()).write_with_encoder(encoder),
                }
            }
            ImageFormatTag::Gif => {
                // the trailer is written when the encoder drops at the end of this block
                let mut encoder = GifEncoder::new(&mut buf);
                encoder.encode_frame(Frame::new(image.to_rgba8()))
            }
        };

        result.map_err(|source| EncodeError {
            format: self.format,
            source,
        })?;
        Ok(Bytes::from(buf))
    }

    /// Crop then encode in one step.
    pub fn crop_encoded(&self, width: u32, height: u32) -> Result<Bytes, CropEncodeError> {
        let cropped = self.crop(width, height)?;
        Ok(self.encode(&cropped)?)
    }
}

/// Failure of [`ImageStore::crop_encoded`].
#[derive(Debug, thiserror::Error)]
pub enum CropEncodeError {
    #[error(transparent)]
    Crop(#[from] CropError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::{GenericImageView, Rgb, RgbImage, Rgba, RgbaImage};

    /// A `width x height` gradient so that crops at different sizes differ.
    pub(crate) fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 128])
        }))
    }

    pub(crate) fn encoded(image: &DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Vec::new();
        image.write_to(&mut Cursor::new(&mut buf), format).unwrap();
        buf
    }

    #[test]
    fn test_from_bytes_detects_each_format() {
        let source = gradient(40, 30);
        for (format, tag) in [
            (ImageFormat::Png, ImageFormatTag::Png),
            (ImageFormat::Jpeg, ImageFormatTag::Jpeg),
            (ImageFormat::Gif, ImageFormatTag::Gif),
        ] {
            let bytes = match format {
                // GIF needs RGBA input from the generic writer
                ImageFormat::Gif => encoded(&DynamicImage::ImageRgba8(source.to_rgba8()), format),
                _ => encoded(&source, format),
            };
            let store = ImageStore::from_bytes(&bytes).unwrap();
            assert_eq!(store.format(), tag);
            assert_eq!((store.width(), store.height()), (40, 30));
        }
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.png");
        std::fs::write(&path, encoded(&gradient(100, 50), ImageFormat::Png)).unwrap();

        let store = ImageStore::load(&path).unwrap();
        assert_eq!(store.format(), ImageFormatTag::Png);
        assert_eq!((store.width(), store.height()), (100, 50));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.png");
        let err = ImageStore::load(&path).unwrap_err();
        assert!(matches!(err, LoadError::Open { .. }));
        assert!(err.to_string().contains("missing.png"));
    }

    #[test]
    fn test_unrecognised_bytes_are_unsupported() {
        let err = ImageStore::from_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_recognised_but_unserved_format_is_unsupported() {
        let mut bmp = b"BM".to_vec();
        bmp.extend_from_slice(&[0u8; 64]);
        let err = ImageStore::from_bytes(&bmp).unwrap_err();
        assert!(matches!(err, LoadError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_truncated_png_fails_to_decode() {
        let bytes = encoded(&gradient(20, 20), ImageFormat::Png);
        let err = ImageStore::from_bytes(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, LoadError::Decode(_)));
    }

    #[test]
    fn test_crop_is_anchored_at_origin() {
        let source = gradient(100, 50);
        let store = ImageStore::from_image(source.clone(), ImageFormatTag::Png);

        let cropped = store.crop(30, 20).unwrap();
        assert_eq!(cropped.dimensions(), (30, 20));
        for (x, y) in [(0, 0), (29, 0), (0, 19), (29, 19), (12, 7)] {
            assert_eq!(cropped.get_pixel(x, y), source.get_pixel(x, y));
        }
    }

    #[test]
    fn test_crop_full_image() {
        let store = ImageStore::from_image(gradient(100, 50), ImageFormatTag::Png);
        assert_eq!(store.crop(100, 50).unwrap().dimensions(), (100, 50));
    }

    #[test]
    fn test_crop_out_of_bounds() {
        let store = ImageStore::from_image(gradient(100, 50), ImageFormatTag::Png);
        for (w, h) in [(0, 10), (10, 0), (101, 10), (10, 51)] {
            assert_eq!(
                store.crop(w, h).unwrap_err(),
                CropError::OutOfBounds {
                    width: w,
                    height: h,
                    max_x: 100,
                    max_y: 50,
                }
            );
        }
    }

    #[test]
    fn test_encode_matches_stored_format() {
        for (tag, format) in [
            (ImageFormatTag::Png, ImageFormat::Png),
            (ImageFormatTag::Jpeg, ImageFormat::Jpeg),
            (ImageFormatTag::Gif, ImageFormat::Gif),
        ] {
            let store = ImageStore::from_image(gradient(64, 32), tag);
            let bytes = store.crop_encoded(16, 8).unwrap();
            assert_eq!(image::guess_format(&bytes).unwrap(), format);
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!(decoded.dimensions(), (16, 8));
        }
    }

    #[test]
    fn test_png_round_trip_is_lossless() {
        let store = ImageStore::from_image(gradient(64, 32), ImageFormatTag::Png);
        let bytes = store.crop_encoded(10, 10).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.to_rgb8(), store.crop(10, 10).unwrap().to_rgb8());
    }

    #[test]
    fn test_jpeg_drops_alpha() {
        let rgba = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 40])));
        let store = ImageStore::from_image(rgba, ImageFormatTag::Jpeg);
        let bytes = store.crop_encoded(4, 4).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        for tag in [ImageFormatTag::Png, ImageFormatTag::Jpeg, ImageFormatTag::Gif] {
            let store = ImageStore::from_image(gradient(50, 40), tag);
            let first = store.crop_encoded(25, 20).unwrap();
            let second = store.crop_encoded(25, 20).unwrap();
            assert_eq!(first, second, "{tag} output differs between calls");
        }
    }

    #[test]
    fn test_crop_encoded_reports_bounds() {
        let store = ImageStore::from_image(gradient(10, 10), ImageFormatTag::Png);
        let err = store.crop_encoded(11, 1).unwrap_err();
        assert!(matches!(err, CropEncodeError::Crop(CropError::OutOfBounds { .. })));
    }
}
