//! RAW decoding pipeline for rawview.
//!
//! This module provides functionality for:
//! - Decoding RAW sensor data into 8-bit RGB ([`RawDecoder`])
//! - Expanding RGB into the RGBA display canvas
//! - Width-bounded thumbnail resizing
//! - Reading encoded JPEG payloads back onto a canvas
//!
//! # Architecture
//!
//! Everything here is synchronous and allocation-conscious; the service crate
//! decides which thread runs it. A full decode goes
//! `RawDecoder::decode -> RawOutput::into_pixels -> to_rgba_image`, then
//! optionally `generate_thumbnail`, then [`encode_canvas`](crate::encode::encode_canvas).

mod jpeg;
mod pixels;
mod raw;
mod resize;
mod settings;
mod types;

pub use jpeg::decode_jpeg_rgba;
pub use pixels::{rgb_to_rgba_into, to_rgba_image};
pub use raw::{RawDecoder, RawloaderDecoder};
pub use resize::{generate_thumbnail, resize, resize_to_width, thumbnail_dimensions};
pub use settings::{DecodeSettings, OUTPUT_COLOR_RAW, OUTPUT_COLOR_SRGB, QUALITY_LINEAR};
pub use types::{DecodeError, FilterType, ImageKind, RawMetadata, RawOutput, RawPixels};
