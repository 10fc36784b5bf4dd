//! JPEG decoding back onto the RGBA canvas.
//!
//! Thumbnails are derived from already-encoded full images, so the cached
//! JPEG has to be turned back into pixels first. The payloads come from our
//! own encoder and carry no EXIF, so no orientation handling happens here.

use std::io::Cursor;

use image::{ImageFormat, ImageReader, RgbaImage};

use super::DecodeError;

/// Decode JPEG bytes into an RGBA canvas.
///
/// # Errors
///
/// Returns `DecodeError::Encode` if the bytes are not a decodable JPEG; from
/// the pipeline's point of view the display surface could not be produced.
pub fn decode_jpeg_rgba(bytes: &[u8]) -> Result<RgbaImage, DecodeError> {
    let reader = ImageReader::with_format(Cursor::new(bytes), ImageFormat::Jpeg);

    let img = reader
        .decode()
        .map_err(|e| DecodeError::Encode(format!("cannot decode cached JPEG: {}", e)))?;

    Ok(img.into_rgba8())
}
