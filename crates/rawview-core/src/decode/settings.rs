//! Processing settings handed to the RAW decoder.

use serde::{Deserialize, Serialize};

/// Output color space identifiers understood by decoders.
pub const OUTPUT_COLOR_RAW: u8 = 0;
pub const OUTPUT_COLOR_SRGB: u8 = 1;

/// Linear interpolation (`user_qual`), the only demosaic quality used.
pub const QUALITY_LINEAR: u8 = 0;

/// Knobs for a RAW decode.
///
/// The field set follows the usual LibRaw-style output parameters so that
/// alternative decoders can be plugged in behind [`RawDecoder`](super::RawDecoder)
/// without translating a different vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodeSettings {
    /// Sample at half resolution (each 2x2 CFA block becomes one pixel).
    pub half_size: bool,
    /// Bits per output sample.
    pub output_bps: u8,
    /// Gray-world white balance computed from the image.
    pub use_auto_wb: bool,
    /// As-shot white balance recorded by the camera.
    pub use_camera_wb: bool,
    /// Output color space (see `OUTPUT_COLOR_*`).
    pub output_color: u8,
    /// Demosaic interpolation quality (see [`QUALITY_LINEAR`]).
    pub user_qual: u8,
    /// Median filter passes applied after interpolation.
    pub med_passes: u8,
    /// FBDD noise reduction level.
    pub fbdd_noiserd: u8,
}

impl DecodeSettings {
    /// The profile every decode in the service uses: half-size, 8-bit sRGB,
    /// camera white balance, linear interpolation, no noise reduction.
    pub const FAST: DecodeSettings = DecodeSettings {
        half_size: true,
        output_bps: 8,
        use_auto_wb: false,
        use_camera_wb: true,
        output_color: OUTPUT_COLOR_SRGB,
        user_qual: QUALITY_LINEAR,
        med_passes: 0,
        fbdd_noiserd: 0,
    };
}

impl Default for DecodeSettings {
    fn default() -> Self {
        Self::FAST
    }
}
