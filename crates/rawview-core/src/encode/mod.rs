//! Image encoding for display payloads.
//!
//! This module provides functionality for:
//! - Encoding RGB pixel data to JPEG with configurable quality
//! - Encoding an RGBA canvas (alpha dropped) into an [`EncodedImage`](crate::EncodedImage)
//!
//! # Examples
//!
//! ```ignore
//! use rawview_core::encode::encode_jpeg;
//!
//! let pixels = vec![128u8; 100 * 100 * 3]; // Gray image
//! let jpeg_bytes = encode_jpeg(&pixels, 100, 100, 92).unwrap();
//! println!("Encoded {} bytes", jpeg_bytes.len());
//! ```

mod jpeg;

pub use jpeg::{encode_canvas, encode_jpeg, EncodeError};
