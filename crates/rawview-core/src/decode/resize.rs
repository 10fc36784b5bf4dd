//! Canvas resizing for thumbnail generation.
//!
//! Thumbnails are bounded by width only: grids and filmstrips lay images out
//! in fixed-width cells, so height follows the source aspect ratio.

use image::RgbaImage;

use super::{DecodeError, FilterType};

/// Resize a canvas to exact dimensions.
///
/// # Errors
///
/// Returns `DecodeError::InvalidDimensions` if either target dimension is zero.
pub fn resize(
    image: &RgbaImage,
    width: u32,
    height: u32,
    filter: FilterType,
) -> Result<RgbaImage, DecodeError> {
    if width == 0 || height == 0 {
        return Err(DecodeError::InvalidDimensions { width, height });
    }

    // Fast path: if dimensions match, just clone
    if image.dimensions() == (width, height) {
        return Ok(image.clone());
    }

    Ok(image::imageops::resize(
        image,
        width,
        height,
        filter.to_image_filter(),
    ))
}

/// Resize a canvas so it is at most `max_width` wide, preserving aspect ratio.
///
/// Canvases already narrower than `max_width` are returned unchanged; they
/// are never upscaled.
///
/// # Errors
///
/// Returns `DecodeError::InvalidDimensions` if `max_width` is zero or the
/// source canvas is empty.
pub fn resize_to_width(
    image: &RgbaImage,
    max_width: u32,
    filter: FilterType,
) -> Result<RgbaImage, DecodeError> {
    let (src_width, src_height) = image.dimensions();
    if max_width == 0 || src_width == 0 || src_height == 0 {
        return Err(DecodeError::InvalidDimensions {
            width: src_width.min(max_width),
            height: src_height,
        });
    }

    let (width, height) = thumbnail_dimensions(src_width, src_height, max_width);
    resize(image, width, height, filter)
}

/// Generate a thumbnail canvas for grid display.
///
/// Uses bilinear interpolation: thumbnails are small enough that the extra
/// sharpness of Lanczos isn't visible, and it is several times faster.
pub fn generate_thumbnail(image: &RgbaImage, max_width: u32) -> Result<RgbaImage, DecodeError> {
    resize_to_width(image, max_width, FilterType::Bilinear)
}

/// Dimensions of a `max_width`-bounded thumbnail for a `width`x`height` source.
///
/// Height is `round(height * max_width / width)`, never less than 1.
pub fn thumbnail_dimensions(width: u32, height: u32, max_width: u32) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    if width <= max_width {
        return (width, height);
    }

    let scale = max_width as f64 / width as f64;
    let new_height = (height as f64 * scale).round() as u32;
    (max_width, new_height.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_image(width: u32, height: u32) -> RgbaImage {
        // Simple gradient so resizes have something to interpolate
        RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([
                ((x * 255) / width.max(1)) as u8,
                ((y * 255) / height.max(1)) as u8,
                128,
                255,
            ])
        })
    }

    #[test]
    fn test_resize_basic() {
        let img = create_test_image(100, 50);
        let resized = resize(&img, 50, 25, FilterType::Bilinear).unwrap();

        assert_eq!(resized.dimensions(), (50, 25));
        assert_eq!(resized.as_raw().len(), 50 * 25 * 4);
    }

    #[test]
    fn test_resize_same_dimensions() {
        let img = create_test_image(100, 50);
        let resized = resize(&img, 100, 50, FilterType::Bilinear).unwrap();
        assert_eq!(resized, img);
    }

    #[test]
    fn test_resize_zero_dimensions_error() {
        let img = create_test_image(100, 50);

        assert!(resize(&img, 0, 50, FilterType::Bilinear).is_err());
        assert!(resize(&img, 50, 0, FilterType::Bilinear).is_err());
    }

    #[test]
    fn test_thumbnail_dimensions_reference_sizing() {
        assert_eq!(thumbnail_dimensions(4000, 3000, 320), (320, 240));
    }

    #[test]
    fn test_thumbnail_dimensions_rounding() {
        // 4000 * 320 / 6000 = 213.33
        assert_eq!(thumbnail_dimensions(6000, 4000, 320), (320, 213));
        // 3000 * 320 / 2000 = 480
        assert_eq!(thumbnail_dimensions(2000, 3000, 320), (320, 480));
        // 5 * 320 / 1000 = 1.6
        assert_eq!(thumbnail_dimensions(1000, 5, 320), (320, 2));
    }

    #[test]
    fn test_thumbnail_dimensions_extreme_panorama() {
        assert_eq!(thumbnail_dimensions(100_000, 10, 320), (320, 1));
    }

    #[test]
    fn test_thumbnail_dimensions_no_upscale() {
        assert_eq!(thumbnail_dimensions(200, 100, 320), (200, 100));
        assert_eq!(thumbnail_dimensions(320, 100, 320), (320, 100));
    }

    #[test]
    fn test_thumbnail_dimensions_zero_input() {
        assert_eq!(thumbnail_dimensions(0, 0, 320), (0, 0));
    }

    #[test]
    fn test_generate_thumbnail_landscape() {
        let img = create_test_image(800, 600);
        let thumb = generate_thumbnail(&img, 320).unwrap();
        assert_eq!(thumb.dimensions(), (320, 240));
    }

    #[test]
    fn test_generate_thumbnail_portrait() {
        let img = create_test_image(600, 800);
        let thumb = generate_thumbnail(&img, 320).unwrap();
        assert_eq!(thumb.dimensions(), (320, 427));
    }

    #[test]
    fn test_generate_thumbnail_small_image() {
        let img = create_test_image(100, 50);
        let thumb = generate_thumbnail(&img, 320).unwrap();
        assert_eq!(thumb.dimensions(), (100, 50));
    }

    #[test]
    fn test_resize_to_width_zero_error() {
        let img = create_test_image(100, 50);
        assert!(resize_to_width(&img, 0, FilterType::Bilinear).is_err());
    }

    #[test]
    fn test_alpha_preserved() {
        let img = create_test_image(640, 480);
        let thumb = generate_thumbnail(&img, 320).unwrap();
        assert!(thumb.pixels().all(|p| p.0[3] == 255));
    }
}
