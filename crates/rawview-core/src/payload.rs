//! The encoded image payload handed to display code.

use std::fmt;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Compressed formats a payload can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PayloadFormat {
    Jpeg,
}

impl PayloadFormat {
    pub fn mime_type(self) -> &'static str {
        match self {
            PayloadFormat::Jpeg => "image/jpeg",
        }
    }
}

/// A compressed, display-ready image.
///
/// Immutable once built. The bytes sit behind an `Arc`, so handing the same
/// image to many callers (cache hits, deduplicated decodes) never copies the
/// buffer and every caller sees identical bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct EncodedImage {
    width: u32,
    height: u32,
    format: PayloadFormat,
    bytes: Arc<[u8]>,
}

impl EncodedImage {
    /// Wrap JPEG bytes of a `width`x`height` image.
    pub fn jpeg(width: u32, height: u32, bytes: Vec<u8>) -> Self {
        Self {
            width,
            height,
            format: PayloadFormat::Jpeg,
            bytes: bytes.into(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PayloadFormat {
        self.format
    }

    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }

    /// The compressed bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether two handles share the same underlying buffer.
    pub fn shares_buffer(&self, other: &EncodedImage) -> bool {
        Arc::ptr_eq(&self.bytes, &other.bytes)
    }

    /// Render as a `data:` URL, e.g. for an `<img src>` or a webview.
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type(),
            STANDARD.encode(&self.bytes)
        )
    }
}

impl fmt::Debug for EncodedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("bytes", &self.bytes.len())
            .finish()
    }
}
