//! RGB to RGBA conversion for the display surface.
//!
//! Every decoded image passes through here, so the inner loop works on
//! batches of 8 pixels with fixed-size chunks (bounds checks hoisted out of
//! the body) and finishes the tail one pixel at a time.

use image::RgbaImage;

use super::{DecodeError, RawPixels};

/// Pixels handled per iteration of the batched loop.
const BATCH: usize = 8;

/// Expand interleaved RGB into RGBA with opaque alpha.
///
/// `dst` must hold exactly `src.len() / 3 * 4` bytes; nothing is allocated.
///
/// # Panics
///
/// Panics if `src` is not a whole number of pixels or `dst` has the wrong
/// length.
pub fn rgb_to_rgba_into(src: &[u8], dst: &mut [u8]) {
    assert_eq!(src.len() % 3, 0, "RGB buffer is not a whole number of pixels");
    assert_eq!(dst.len(), src.len() / 3 * 4, "RGBA buffer size mismatch");

    let mut src_batches = src.chunks_exact(BATCH * 3);
    let mut dst_batches = dst.chunks_exact_mut(BATCH * 4);

    for (s, d) in (&mut src_batches).zip(&mut dst_batches) {
        for i in 0..BATCH {
            d[i * 4] = s[i * 3];
            d[i * 4 + 1] = s[i * 3 + 1];
            d[i * 4 + 2] = s[i * 3 + 2];
            d[i * 4 + 3] = 255;
        }
    }

    for (s, d) in src_batches
        .remainder()
        .chunks_exact(3)
        .zip(dst_batches.into_remainder().chunks_exact_mut(4))
    {
        d[0] = s[0];
        d[1] = s[1];
        d[2] = s[2];
        d[3] = 255;
    }
}

/// Convert decoder output into an RGBA canvas.
///
/// The destination buffer is allocated once at its final size.
pub fn to_rgba_image(pixels: &RawPixels) -> Result<RgbaImage, DecodeError> {
    let mut rgba = vec![0u8; pixels.pixel_count() * 4];
    rgb_to_rgba_into(&pixels.pixels, &mut rgba);

    RgbaImage::from_raw(pixels.width, pixels.height, rgba).ok_or(DecodeError::InvalidDimensions {
        width: pixels.width,
        height: pixels.height,
    })
}
