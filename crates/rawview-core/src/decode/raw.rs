//! RAW sensor decoding.
//!
//! [`RawDecoder`] is the seam the worker pool calls into. The default
//! implementation, [`RawloaderDecoder`], parses the file with `rawloader`
//! and develops the sensor data with a deliberately cheap pipeline:
//!
//! 1. Black/white level normalisation per CFA color
//! 2. Half-size demosaic: each 2x2 block collapses into one RGB pixel
//!    (greens averaged), which needs no interpolation at all
//! 3. White balance (camera as-shot, or gray-world when asked for)
//! 4. sRGB transfer curve through a lookup table, 8-bit output
//!
//! When `half_size` is off the half-size result is replicated back up to the
//! sensor dimensions; that is the "linear" quality level of this decoder.

use std::io::Cursor;

use super::{DecodeError, DecodeSettings, RawMetadata, RawOutput, OUTPUT_COLOR_SRGB};

/// Entries in the linear-to-sRGB lookup table.
const LUT_SIZE: usize = 4096;

/// rawloader's CFA lookups wrap at this period, so sampling this many rows
/// and columns captures any pattern it can describe (2x2, 6x6, 2x8, ...).
const RAWLOADER_CFA_PERIOD: usize = 48;

/// Something that can turn RAW file bytes into 8-bit RGB.
///
/// Implementations run on decode worker threads, so they must be shareable.
pub trait RawDecoder: Send + Sync + 'static {
    /// Decode `bytes` with the given settings.
    ///
    /// An `Ok` output may still lack data or dimensions; callers validate it
    /// with [`RawOutput::into_pixels`].
    fn decode(&self, bytes: &[u8], settings: &DecodeSettings) -> Result<RawOutput, DecodeError>;
}

/// [`RawDecoder`] backed by the `rawloader` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawloaderDecoder;

impl RawloaderDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl RawDecoder for RawloaderDecoder {
    fn decode(&self, bytes: &[u8], settings: &DecodeSettings) -> Result<RawOutput, DecodeError> {
        if settings.output_bps != 8 {
            return Err(DecodeError::NativeDecode(format!(
                "unsupported output depth: {} bits",
                settings.output_bps
            )));
        }

        let mut cursor = Cursor::new(bytes);
        let raw = rawloader::decode(&mut cursor)
            .map_err(|e| DecodeError::NativeDecode(format!("{:?}", e)))?;

        let samples = match &raw.data {
            rawloader::RawImageData::Integer(values) => Samples::Integer(values),
            rawloader::RawImageData::Float(values) => Samples::Float(values),
        };

        let cfa = if raw.cpp == 1 {
            CfaPattern::from_fn(RAWLOADER_CFA_PERIOD, RAWLOADER_CFA_PERIOD, |row, col| {
                raw.cfa.color_at(row, col)
            })
        } else {
            CfaPattern::from_fn(1, 1, |_, _| 0)
        };

        let frame = SensorFrame {
            width: raw.width,
            height: raw.height,
            cpp: raw.cpp,
            samples,
            cfa,
            black: raw.blacklevels.map(f32::from),
            white: raw.whitelevels.map(f32::from),
            crop: Crop::from_rawloader(raw.crops, raw.width, raw.height),
        };

        let camera_wb = normalize_wb([raw.wb_coeffs[0], raw.wb_coeffs[1], raw.wb_coeffs[2]]);
        let (width, height, data) = develop(&frame, settings, camera_wb)?;

        Ok(RawOutput {
            data: Some(data),
            metadata: RawMetadata {
                width: Some(width),
                height: Some(height),
                make: Some(raw.make.clone()).filter(|s| !s.is_empty()),
                model: Some(raw.model.clone()).filter(|s| !s.is_empty()),
            },
        })
    }
}

/// Sensor samples as stored by the decoder.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Samples<'a> {
    Integer(&'a [u16]),
    /// Already normalised to 0.0-1.0.
    Float(&'a [f32]),
}

impl Samples<'_> {
    fn len(&self) -> usize {
        match self {
            Samples::Integer(v) => v.len(),
            Samples::Float(v) => v.len(),
        }
    }
}

/// Repeating color filter layout, `width` x `height` sites per tile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CfaPattern {
    width: usize,
    height: usize,
    colors: Vec<usize>,
}

impl CfaPattern {
    pub(crate) fn from_fn(
        width: usize,
        height: usize,
        color_at: impl Fn(usize, usize) -> usize,
    ) -> Self {
        let (width, height) = (width.max(1), height.max(1));
        let mut colors = Vec::with_capacity(width * height);
        for row in 0..height {
            for col in 0..width {
                colors.push(color_at(row, col));
            }
        }
        Self {
            width,
            height,
            colors,
        }
    }

    #[inline]
    pub(crate) fn color_at(&self, row: usize, col: usize) -> usize {
        self.colors[(row % self.height) * self.width + col % self.width]
    }
}

/// Active sensor area after applying the decoder's crops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Crop {
    pub top: usize,
    pub left: usize,
    pub width: usize,
    pub height: usize,
}

impl Crop {
    pub(crate) fn full(width: usize, height: usize) -> Self {
        Self {
            top: 0,
            left: 0,
            width,
            height,
        }
    }

    /// rawloader reports crops as `[top, right, bottom, left]`. Crops that
    /// would eat the whole frame are ignored.
    fn from_rawloader(crops: [usize; 4], width: usize, height: usize) -> Self {
        let [top, right, bottom, left] = crops;
        if top + bottom >= height || left + right >= width {
            return Self::full(width, height);
        }
        Self {
            top,
            left,
            width: width - left - right,
            height: height - top - bottom,
        }
    }
}

/// Borrowed view of undeveloped sensor data.
#[derive(Debug, Clone)]
pub(crate) struct SensorFrame<'a> {
    pub width: usize,
    pub height: usize,
    /// Components per pixel: 1 for CFA sensors, 3 for linear RGB files.
    pub cpp: usize,
    pub samples: Samples<'a>,
    pub cfa: CfaPattern,
    pub black: [f32; 4],
    pub white: [f32; 4],
    pub crop: Crop,
}

impl SensorFrame<'_> {
    /// Normalised sample at an absolute sensor position.
    #[inline]
    fn sample(&self, index: usize, color: usize) -> f32 {
        match self.samples {
            Samples::Integer(values) => {
                let black = self.black[color];
                let range = (self.white[color] - black).max(1.0);
                ((values[index] as f32 - black) / range).max(0.0)
            }
            Samples::Float(values) => values[index].max(0.0),
        }
    }

    /// Linear RGB for the 2x2 block whose top-left corner is at `(row, col)`.
    fn block_rgb(&self, row: usize, col: usize) -> [f32; 3] {
        let mut sum = [0.0f32; 3];
        let mut count = [0u32; 3];

        for dy in 0..2 {
            for dx in 0..2 {
                let (r, c) = (row + dy, col + dx);
                if self.cpp == 3 {
                    let base = (r * self.width + c) * 3;
                    for ch in 0..3 {
                        sum[ch] += self.sample(base + ch, ch);
                        count[ch] += 1;
                    }
                } else {
                    let color = self.cfa.color_at(r, c);
                    // 3 is the second green of RGBG/RGBE layouts
                    let channel = if color == 3 { 1 } else { color.min(2) };
                    sum[channel] += self.sample(r * self.width + c, color.min(3));
                    count[channel] += 1;
                }
            }
        }

        let green = if count[1] > 0 {
            sum[1] / count[1] as f32
        } else {
            0.0
        };
        // X-Trans blocks can miss red or blue; borrow green rather than go black
        let avg = |ch: usize| {
            if count[ch] > 0 {
                sum[ch] / count[ch] as f32
            } else {
                green
            }
        };
        [avg(0), green, avg(2)]
    }
}

/// Scale white-balance coefficients so green is 1.0. Returns `None` when the
/// camera didn't record usable values.
pub(crate) fn normalize_wb(coeffs: [f32; 3]) -> Option<[f32; 3]> {
    if coeffs.iter().any(|c| !c.is_finite() || *c <= 0.0) {
        return None;
    }
    let g = coeffs[1];
    Some([coeffs[0] / g, 1.0, coeffs[2] / g])
}

/// Develop sensor data into interleaved 8-bit RGB.
///
/// Returns `(width, height, pixels)`.
pub(crate) fn develop(
    frame: &SensorFrame<'_>,
    settings: &DecodeSettings,
    camera_wb: Option<[f32; 3]>,
) -> Result<(u32, u32, Vec<u8>), DecodeError> {
    let needed = frame.width * frame.height * frame.cpp;
    if frame.samples.len() < needed {
        return Err(DecodeError::NativeDecode(format!(
            "sensor data truncated: {} samples, expected {}",
            frame.samples.len(),
            needed
        )));
    }
    if frame.cpp != 1 && frame.cpp != 3 {
        return Err(DecodeError::NativeDecode(format!(
            "unsupported components per pixel: {}",
            frame.cpp
        )));
    }

    let crop = frame.crop;
    let half_w = crop.width / 2;
    let half_h = crop.height / 2;
    if half_w == 0 || half_h == 0 {
        return Err(DecodeError::InvalidDimensions {
            width: half_w as u32,
            height: half_h as u32,
        });
    }

    let block_at = |bx: usize, by: usize| frame.block_rgb(crop.top + by * 2, crop.left + bx * 2);

    let wb = match (settings.use_camera_wb, camera_wb) {
        (true, Some(wb)) => wb,
        _ if settings.use_auto_wb => gray_world_wb(half_w, half_h, &block_at),
        _ => [1.0, 1.0, 1.0],
    };

    let lut = transfer_lut(settings.output_color == OUTPUT_COLOR_SRGB);
    let to_u8 = |v: f32| lut[((v.clamp(0.0, 1.0)) * (LUT_SIZE - 1) as f32) as usize];

    let mut half = Vec::with_capacity(half_w * half_h * 3);
    for by in 0..half_h {
        for bx in 0..half_w {
            let [r, g, b] = block_at(bx, by);
            half.push(to_u8(r * wb[0]));
            half.push(to_u8(g * wb[1]));
            half.push(to_u8(b * wb[2]));
        }
    }

    if settings.half_size {
        return Ok((half_w as u32, half_h as u32, half));
    }

    let (full_w, full_h) = (half_w * 2, half_h * 2);
    let mut full = Vec::with_capacity(full_w * full_h * 3);
    for row in half.chunks_exact(half_w * 3) {
        let mut line = Vec::with_capacity(full_w * 3);
        for px in row.chunks_exact(3) {
            line.extend_from_slice(px);
            line.extend_from_slice(px);
        }
        full.extend_from_slice(&line);
        full.extend_from_slice(&line);
    }
    Ok((full_w as u32, full_h as u32, full))
}

/// Gray-world white balance: scale red and blue so their means match green.
fn gray_world_wb(
    half_w: usize,
    half_h: usize,
    block_at: &impl Fn(usize, usize) -> [f32; 3],
) -> [f32; 3] {
    let mut sum = [0.0f64; 3];
    for by in 0..half_h {
        for bx in 0..half_w {
            let rgb = block_at(bx, by);
            for ch in 0..3 {
                sum[ch] += rgb[ch] as f64;
            }
        }
    }
    let scale = |ch: usize| {
        if sum[ch] > 0.0 {
            (sum[1] / sum[ch]) as f32
        } else {
            1.0
        }
    };
    [scale(0), 1.0, scale(2)]
}

/// Linear-to-output lookup table; sRGB transfer curve when `srgb` is set.
fn transfer_lut(srgb: bool) -> Vec<u8> {
    (0..LUT_SIZE)
        .map(|i| {
            let linear = i as f32 / (LUT_SIZE - 1) as f32;
            let encoded = if !srgb {
                linear
            } else if linear <= 0.003_130_8 {
                linear * 12.92
            } else {
                1.055 * linear.powf(1.0 / 2.4) - 0.055
            };
            (encoded * 255.0).round().clamp(0.0, 255.0) as u8
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rggb() -> CfaPattern {
        CfaPattern::from_fn(2, 2, |r, c| match (r, c) {
            (0, 0) => 0,
            (1, 1) => 2,
            _ => 1,
        })
    }

    /// Frame where every site of a given color has the same value.
    fn uniform_sensor(cfa: &CfaPattern, width: usize, height: usize, rgb: [u16; 3]) -> Vec<u16> {
        let mut data = Vec::with_capacity(width * height);
        for r in 0..height {
            for c in 0..width {
                data.push(rgb[cfa.color_at(r, c)]);
            }
        }
        data
    }

    fn uniform_bayer(width: usize, height: usize, rgb: [u16; 3]) -> Vec<u16> {
        uniform_sensor(&rggb(), width, height, rgb)
    }

    fn frame(data: &[u16], width: usize, height: usize) -> SensorFrame<'_> {
        SensorFrame {
            width,
            height,
            cpp: 1,
            samples: Samples::Integer(data),
            cfa: rggb(),
            black: [0.0; 4],
            white: [1000.0; 4],
            crop: Crop::full(width, height),
        }
    }

    fn linear_settings() -> DecodeSettings {
        DecodeSettings {
            output_color: crate::decode::OUTPUT_COLOR_RAW,
            ..DecodeSettings::FAST
        }
    }

    #[test]
    fn test_half_size_dimensions() {
        let data = uniform_bayer(8, 6, [500, 500, 500]);
        let (w, h, pixels) = develop(&frame(&data, 8, 6), &DecodeSettings::FAST, None).unwrap();
        assert_eq!((w, h), (4, 3));
        assert_eq!(pixels.len(), 4 * 3 * 3);
    }

    #[test]
    fn test_pure_red_sensor() {
        let data = uniform_bayer(4, 4, [1000, 0, 0]);
        let (_, _, pixels) = develop(&frame(&data, 4, 4), &linear_settings(), None).unwrap();
        for px in pixels.chunks_exact(3) {
            assert_eq!(px, &[255, 0, 0]);
        }
    }

    #[test]
    fn test_black_level_subtracted() {
        let data = uniform_bayer(4, 4, [100, 100, 100]);
        let mut f = frame(&data, 4, 4);
        f.black = [100.0; 4];
        let (_, _, pixels) = develop(&f, &linear_settings(), None).unwrap();
        assert!(pixels.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_camera_wb_applied() {
        let data = uniform_bayer(4, 4, [250, 500, 250]);
        let wb = normalize_wb([2.0, 1.0, 2.0]);
        let (_, _, pixels) = develop(&frame(&data, 4, 4), &linear_settings(), wb).unwrap();
        // 0.25 * 2.0 == 0.5 on red and blue, green stays 0.5
        let px = &pixels[0..3];
        assert!(px[0].abs_diff(px[1]) <= 1);
        assert!(px[2].abs_diff(px[1]) <= 1);
    }

    #[test]
    fn test_auto_wb_when_camera_missing() {
        let data = uniform_bayer(4, 4, [250, 500, 125]);
        let settings = DecodeSettings {
            use_auto_wb: true,
            ..linear_settings()
        };
        let (_, _, pixels) = develop(&frame(&data, 4, 4), &settings, None).unwrap();
        let px = &pixels[0..3];
        assert!(px[0].abs_diff(px[1]) <= 1);
        assert!(px[2].abs_diff(px[1]) <= 1);
    }

    #[test]
    fn test_full_size_replicates_blocks() {
        let data = uniform_bayer(4, 4, [1000, 0, 0]);
        let settings = DecodeSettings {
            half_size: false,
            ..linear_settings()
        };
        let (w, h, pixels) = develop(&frame(&data, 4, 4), &settings, None).unwrap();
        assert_eq!((w, h), (4, 4));
        assert_eq!(pixels.len(), 4 * 4 * 3);
    }

    #[test]
    fn test_crop_respected() {
        let data = uniform_bayer(8, 8, [500, 500, 500]);
        let mut f = frame(&data, 8, 8);
        f.crop = Crop::from_rawloader([2, 2, 2, 2], 8, 8);
        let (w, h, _) = develop(&f, &DecodeSettings::FAST, None).unwrap();
        assert_eq!((w, h), (2, 2));
    }

    #[test]
    fn test_cfa_pattern_wraps_at_its_own_period() {
        let cfa = rggb();
        assert_eq!(cfa.color_at(0, 0), 0);
        assert_eq!(cfa.color_at(7, 7), 2);
        assert_eq!(cfa.color_at(6, 7), 1);
    }

    #[test]
    fn test_two_by_eight_pattern() {
        // Bayer-like for six columns, then red and blue swap places.
        let rows = [[0, 1, 0, 1, 0, 1, 2, 1], [1, 2, 1, 2, 1, 2, 1, 0]];
        let cfa = CfaPattern::from_fn(8, 2, |r, c| rows[r][c]);
        let data = uniform_sensor(&cfa, 16, 2, [0, 0, 1000]);
        let mut f = frame(&data, 16, 2);
        f.cfa = cfa;

        let (w, h, pixels) = develop(&f, &linear_settings(), None).unwrap();
        assert_eq!((w, h), (8, 1));
        for px in pixels.chunks_exact(3) {
            assert_eq!(px, &[0, 0, 255]);
        }
    }

    #[test]
    fn test_oversized_crop_ignored() {
        assert_eq!(Crop::from_rawloader([5, 0, 5, 0], 8, 8), Crop::full(8, 8));
    }

    #[test]
    fn test_truncated_data_rejected() {
        let data = vec![0u16; 10];
        let err = develop(&frame(&data, 8, 8), &DecodeSettings::FAST, None).unwrap_err();
        assert!(matches!(err, DecodeError::NativeDecode(_)));
    }

    #[test]
    fn test_single_row_sensor_rejected() {
        let data = vec![0u16; 8];
        let err = develop(&frame(&data, 8, 1), &DecodeSettings::FAST, None).unwrap_err();
        assert!(matches!(err, DecodeError::InvalidDimensions { .. }));
    }

    #[test]
    fn test_three_component_input() {
        let data = vec![1000u16; 4 * 4 * 3];
        let mut f = frame(&data, 4, 4);
        f.cpp = 3;
        let (w, h, pixels) = develop(&f, &linear_settings(), None).unwrap();
        assert_eq!((w, h), (2, 2));
        assert!(pixels.iter().all(|&v| v == 255));
    }

    #[test]
    fn test_normalize_wb() {
        assert_eq!(normalize_wb([2.0, 2.0, 4.0]), Some([1.0, 1.0, 2.0]));
        assert_eq!(normalize_wb([f32::NAN, 1.0, 1.0]), None);
        assert_eq!(normalize_wb([1.0, 0.0, 1.0]), None);
    }

    #[test]
    fn test_srgb_lut_endpoints() {
        let lut = transfer_lut(true);
        assert_eq!(lut[0], 0);
        assert_eq!(lut[LUT_SIZE - 1], 255);
        // sRGB lifts mid-tones
        assert!(lut[LUT_SIZE / 4] > 64);
    }

    #[test]
    fn test_rawloader_rejects_garbage() {
        let err = RawloaderDecoder::new()
            .decode(b"definitely not a raw file", &DecodeSettings::FAST)
            .unwrap_err();
        assert!(matches!(err, DecodeError::NativeDecode(_)));
    }

    #[test]
    fn test_rawloader_rejects_16_bit_output() {
        let settings = DecodeSettings {
            output_bps: 16,
            ..DecodeSettings::FAST
        };
        let err = RawloaderDecoder::new().decode(&[], &settings).unwrap_err();
        assert!(matches!(err, DecodeError::NativeDecode(_)));
    }
}
