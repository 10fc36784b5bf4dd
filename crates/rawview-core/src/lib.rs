//! rawview Core - RAW decode and encode pipeline
//!
//! This crate provides the synchronous building blocks of rawview: turning
//! RAW file bytes into an RGBA canvas, shrinking canvases into thumbnails,
//! and encoding them into compact display payloads. Scheduling, caching and
//! deduplication live in `rawview-service`.

pub mod decode;
pub mod encode;
mod format;
mod payload;

pub use decode::{DecodeError, DecodeSettings, ImageKind, RawDecoder, RawloaderDecoder};
pub use format::{is_raw_extension, is_raw_path, RAW_EXTENSIONS};
pub use payload::{EncodedImage, PayloadFormat};

/// Decode RAW bytes and encode the result, all on the calling thread.
///
/// This is the whole per-file job of a decode worker: decode with `settings`,
/// validate the output, expand to RGBA, shrink to `thumbnail_width` when a
/// thumbnail is requested, and encode at the matching quality.
pub fn decode_and_encode(
    decoder: &dyn RawDecoder,
    bytes: &[u8],
    kind: ImageKind,
    settings: &DecodeSettings,
    qualities: EncodeQualities,
    thumbnail_width: u32,
) -> Result<EncodedImage, DecodeError> {
    let pixels = decoder.decode(bytes, settings)?.into_pixels()?;
    let canvas = decode::to_rgba_image(&pixels)?;
    drop(pixels);

    let encoded = match kind {
        ImageKind::Full => encode::encode_canvas(&canvas, qualities.full)?,
        ImageKind::Thumbnail => {
            let thumb = decode::generate_thumbnail(&canvas, thumbnail_width)?;
            encode::encode_canvas(&thumb, qualities.thumbnail)?
        }
    };
    Ok(encoded)
}

/// Derive a thumbnail payload from an already encoded full image.
pub fn derive_thumbnail(
    full: &EncodedImage,
    thumbnail_width: u32,
    quality: u8,
) -> Result<EncodedImage, DecodeError> {
    let canvas = decode::decode_jpeg_rgba(full.bytes())?;
    let thumb = decode::generate_thumbnail(&canvas, thumbnail_width)?;
    Ok(encode::encode_canvas(&thumb, quality)?)
}

/// JPEG qualities (1-100) for the two renditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct EncodeQualities {
    pub full: u8,
    pub thumbnail: u8,
}

impl Default for EncodeQualities {
    fn default() -> Self {
        Self {
            full: 92,
            thumbnail: 70,
        }
    }
}
