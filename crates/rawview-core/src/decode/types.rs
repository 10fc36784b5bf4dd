//! Core types for RAW decoding.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::encode::EncodeError;

/// Error types for the decode pipeline.
///
/// Every variant carries owned strings so a single settled result can be
/// cloned out to each caller waiting on the same file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The source file could not be read.
    #[error("Failed to read file: {0}")]
    FileRead(String),

    /// The RAW decoder rejected the input or produced no pixel data.
    #[error("RAW decode failed: {0}")]
    NativeDecode(String),

    /// The decoder reported missing or zero dimensions.
    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    /// Rendering into the display surface or encoding it failed.
    #[error("Encoding failed: {0}")]
    Encode(String),

    /// A decode worker crashed or answered with something unusable.
    #[error("Decode worker fault: {0}")]
    WorkerFault(String),

    /// The worker pool has been shut down.
    #[error("Decode service has been shut down")]
    ServiceStopped,
}

impl From<EncodeError> for DecodeError {
    fn from(err: EncodeError) -> Self {
        DecodeError::Encode(err.to_string())
    }
}

/// Which rendition of an image a caller wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ImageKind {
    /// The full decode (half sensor resolution with the fast profile).
    #[default]
    Full,
    /// A downscaled rendition for grids and filmstrips.
    Thumbnail,
}

impl ImageKind {
    /// Build from the `thumbnail` flag used by UI callers.
    pub fn from_thumbnail_flag(thumbnail: bool) -> Self {
        if thumbnail {
            ImageKind::Thumbnail
        } else {
            ImageKind::Full
        }
    }

    #[inline]
    pub fn is_thumbnail(self) -> bool {
        self == ImageKind::Thumbnail
    }
}

/// Filter type for image resizing operations.
///
/// Thumbnails and previews are always resized bilinearly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FilterType {
    #[default]
    Bilinear,
}

impl FilterType {
    /// Convert to the image crate's FilterType.
    pub fn to_image_filter(self) -> image::imageops::FilterType {
        match self {
            FilterType::Bilinear => image::imageops::FilterType::Triangle,
        }
    }
}

/// Metadata reported by a RAW decoder alongside the pixel data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMetadata {
    /// Output width in pixels, if the decoder reported one.
    pub width: Option<u32>,
    /// Output height in pixels, if the decoder reported one.
    pub height: Option<u32>,
    /// Camera make (e.g., "SONY").
    pub make: Option<String>,
    /// Camera model (e.g., "ILCE-6600").
    pub model: Option<String>,
}

/// Everything a RAW decoder hands back after processing a file.
///
/// Both fields are optional because decoders can succeed at opening a file
/// yet still produce nothing usable; [`RawOutput::into_pixels`] turns that
/// into a typed error.
#[derive(Debug, Clone, Default)]
pub struct RawOutput {
    /// Interleaved 8-bit RGB samples, row-major.
    pub data: Option<Vec<u8>>,
    pub metadata: RawMetadata,
}

impl RawOutput {
    /// Validate the decoder output and extract the RGB pixel buffer.
    ///
    /// # Errors
    ///
    /// * `NativeDecode` if no pixel data was produced or its length doesn't
    ///   match the reported dimensions.
    /// * `InvalidDimensions` if width or height is missing or zero.
    pub fn into_pixels(self) -> Result<RawPixels, DecodeError> {
        let data = self
            .data
            .ok_or_else(|| DecodeError::NativeDecode("decoder produced no pixel data".into()))?;

        let (width, height) = match (self.metadata.width, self.metadata.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
            (w, h) => {
                return Err(DecodeError::InvalidDimensions {
                    width: w.unwrap_or(0),
                    height: h.unwrap_or(0),
                })
            }
        };

        let expected = (width as usize) * (height as usize) * 3;
        if data.len() != expected {
            return Err(DecodeError::NativeDecode(format!(
                "pixel buffer holds {} bytes, expected {} for {}x{} RGB",
                data.len(),
                expected,
                width,
                height
            )));
        }

        Ok(RawPixels {
            width,
            height,
            pixels: data,
        })
    }
}

/// A decoded RGB image as produced by the RAW decoder.
#[derive(Debug, Clone)]
pub struct RawPixels {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// RGB pixel data in row-major order (3 bytes per pixel).
    pub pixels: Vec<u8>,
}

impl RawPixels {
    /// Get the total number of pixels.
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(data: Option<Vec<u8>>, width: Option<u32>, height: Option<u32>) -> RawOutput {
        RawOutput {
            data,
            metadata: RawMetadata {
                width,
                height,
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_filter_type_conversion() {
        assert!(matches!(
            FilterType::Bilinear.to_image_filter(),
            image::imageops::FilterType::Triangle
        ));
        assert_eq!(FilterType::default(), FilterType::Bilinear);
    }

    #[test]
    fn test_image_kind_from_flag() {
        assert_eq!(ImageKind::from_thumbnail_flag(true), ImageKind::Thumbnail);
        assert_eq!(ImageKind::from_thumbnail_flag(false), ImageKind::Full);
        assert!(ImageKind::Thumbnail.is_thumbnail());
        assert!(!ImageKind::Full.is_thumbnail());
    }

    #[test]
    fn test_into_pixels_valid() {
        let pixels = output(Some(vec![7u8; 4 * 2 * 3]), Some(4), Some(2))
            .into_pixels()
            .unwrap();
        assert_eq!(pixels.width, 4);
        assert_eq!(pixels.height, 2);
        assert_eq!(pixels.pixel_count(), 8);
    }

    #[test]
    fn test_into_pixels_missing_data() {
        let err = output(None, Some(4), Some(2)).into_pixels().unwrap_err();
        assert!(matches!(err, DecodeError::NativeDecode(_)));
    }

    #[test]
    fn test_into_pixels_missing_or_zero_dimensions() {
        let err = output(Some(vec![]), None, Some(2)).into_pixels().unwrap_err();
        assert_eq!(err, DecodeError::InvalidDimensions { width: 0, height: 2 });

        let err = output(Some(vec![]), Some(0), Some(0)).into_pixels().unwrap_err();
        assert_eq!(err, DecodeError::InvalidDimensions { width: 0, height: 0 });
    }

    #[test]
    fn test_into_pixels_length_mismatch() {
        let err = output(Some(vec![0u8; 10]), Some(4), Some(2))
            .into_pixels()
            .unwrap_err();
        assert!(matches!(err, DecodeError::NativeDecode(_)));
    }

    #[test]
    fn test_decode_error_display() {
        let err = DecodeError::InvalidDimensions {
            width: 0,
            height: 3000,
        };
        assert_eq!(err.to_string(), "Invalid image dimensions: 0x3000");

        let err = DecodeError::FileRead("not found".to_string());
        assert_eq!(err.to_string(), "Failed to read file: not found");
    }

    #[test]
    fn test_encode_error_converts() {
        let err: DecodeError = EncodeError::InvalidDimensions {
            width: 0,
            height: 1,
        }
        .into();
        assert!(matches!(err, DecodeError::Encode(_)));
    }
}
