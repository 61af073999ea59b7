//! Resize and re-encode
//!
//! Fits a decoded image inside the requested bounding box (aspect preserved,
//! never enlarged), flattens transparency over a background color when the
//! output format cannot carry alpha, and encodes with fixed per-format
//! settings. Codec failures of any kind wrap into [`TranscodeError`].

use std::io::Cursor;

use bytes::Bytes;
use image::{imageops::FilterType, DynamicImage, GenericImageView, ImageFormat, ImageReader, Rgb,
    RgbImage};

use pixserve_core::{Dimensions, OutputFormat};

// Fixed encode settings, deterministic per (format, alpha).
const JPEG_QUALITY: f32 = 80.0;
const WEBP_QUALITY: f32 = 80.0;

#[derive(Debug, thiserror::Error)]
#[error("transcode failed: {0}")]
pub struct TranscodeError(pub String);

impl TranscodeError {
    fn wrap(error: impl std::fmt::Display) -> Self {
        TranscodeError(error.to_string())
    }
}

/// Encoded output plus the metadata the cache entry needs.
#[derive(Debug, Clone)]
pub struct TranscodeOutput {
    pub data: Bytes,
    pub dimensions: Dimensions,
    pub format: OutputFormat,
}

pub struct Transcoder;

impl Transcoder {
    /// Target dimensions fitting `(orig_width, orig_height)` inside the
    /// requested box. A missing side is unconstrained; scale never exceeds
    /// 1.0, so output never exceeds the source's native size.
    pub fn fit_within(
        orig_width: u32,
        orig_height: u32,
        width: Option<u32>,
        height: Option<u32>,
    ) -> (u32, u32) {
        let width_scale = width.map(|w| w as f64 / orig_width as f64);
        let height_scale = height.map(|h| h as f64 / orig_height as f64);
        let scale = match (width_scale, height_scale) {
            (Some(ws), Some(hs)) => ws.min(hs),
            (Some(ws), None) => ws,
            (None, Some(hs)) => hs,
            (None, None) => 1.0,
        }
        .min(1.0);

        let new_width = ((orig_width as f64 * scale).round() as u32).max(1);
        let new_height = ((orig_height as f64 * scale).round() as u32).max(1);
        (new_width, new_height)
    }

    /// Filter choice by downscale ratio: cheap filters for heavy reductions,
    /// Lanczos near 1:1.
    fn select_filter(
        orig_width: u32,
        orig_height: u32,
        new_width: u32,
        new_height: u32,
    ) -> FilterType {
        let width_ratio = orig_width as f32 / new_width as f32;
        let height_ratio = orig_height as f32 / new_height as f32;
        let max_ratio = width_ratio.max(height_ratio);

        if max_ratio > 2.0 {
            FilterType::Triangle
        } else if max_ratio > 1.5 {
            FilterType::CatmullRom
        } else {
            FilterType::Lanczos3
        }
    }

    /// Parse a hex RGB string (`"rrggbb"`, optional leading `#`). Each
    /// channel that is missing or malformed independently defaults to 255.
    pub fn parse_background_color(hex: &str) -> [u8; 3] {
        let hex = hex.trim_start_matches('#');
        let channel = |index: usize| {
            hex.get(index * 2..index * 2 + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .unwrap_or(255)
        };
        [channel(0), channel(1), channel(2)]
    }

    /// Composite over an opaque background, dropping the alpha channel.
    fn flatten(img: &DynamicImage, background: [u8; 3]) -> RgbImage {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let mut flat = RgbImage::new(width, height);
        for (x, y, pixel) in rgba.enumerate_pixels() {
            let alpha = pixel[3] as u32;
            let blend = |fg: u8, bg: u8| {
                ((fg as u32 * alpha + bg as u32 * (255 - alpha)) / 255) as u8
            };
            flat.put_pixel(
                x,
                y,
                Rgb([
                    blend(pixel[0], background[0]),
                    blend(pixel[1], background[1]),
                    blend(pixel[2], background[2]),
                ]),
            );
        }
        flat
    }

    /// Decode, fit to the bounding box, and encode as `format`. CPU-bound;
    /// callers dispatch this through a bounded blocking pool.
    pub fn transcode(
        data: &[u8],
        width: Option<u32>,
        height: Option<u32>,
        format: OutputFormat,
        background_hex: &str,
    ) -> Result<TranscodeOutput, TranscodeError> {
        let img = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(TranscodeError::wrap)?
            .decode()
            .map_err(TranscodeError::wrap)?;

        let (orig_width, orig_height) = img.dimensions();
        let (new_width, new_height) = Self::fit_within(orig_width, orig_height, width, height);

        let resized = if (new_width, new_height) == (orig_width, orig_height) {
            img
        } else {
            let filter = Self::select_filter(orig_width, orig_height, new_width, new_height);
            img.resize_exact(new_width, new_height, filter)
        };

        let background = Self::parse_background_color(background_hex);
        let encoded = match format {
            OutputFormat::Jpeg => Self::encode_jpeg(&resized, background)?,
            OutputFormat::Png => Self::encode_png(&resized)?,
            OutputFormat::Webp => Self::encode_webp(&resized)?,
        };

        Ok(TranscodeOutput {
            data: encoded,
            dimensions: Dimensions {
                width: new_width,
                height: new_height,
            },
            format,
        })
    }

    /// Progressive JPEG via mozjpeg with optimized coding. JPEG carries no
    /// alpha, so the image is flattened first.
    fn encode_jpeg(img: &DynamicImage, background: [u8; 3]) -> Result<Bytes, TranscodeError> {
        let rgb_img = if img.color().has_alpha() {
            Self::flatten(img, background)
        } else {
            img.to_rgb8()
        };
        let (width, height) = rgb_img.dimensions();

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(JPEG_QUALITY);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let mut comp = comp
            .start_compress(Vec::new())
            .map_err(TranscodeError::wrap)?;
        comp.write_scanlines(&rgb_img).map_err(TranscodeError::wrap)?;
        let jpeg_data = comp.finish().map_err(TranscodeError::wrap)?;

        Ok(Bytes::from(jpeg_data))
    }

    fn encode_png(img: &DynamicImage) -> Result<Bytes, TranscodeError> {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .map_err(TranscodeError::wrap)?;
        Ok(Bytes::from(buffer))
    }

    /// Lossy WebP from RGBA, so source alpha survives.
    fn encode_webp(img: &DynamicImage) -> Result<Bytes, TranscodeError> {
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let encoder = webp::Encoder::from_rgba(&rgba, width, height);
        let webp_data = encoder.encode(WEBP_QUALITY);
        Ok(Bytes::copy_from_slice(&webp_data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32, pixel: Rgba<u8>) -> Vec<u8> {
        let img = RgbaImage::from_pixel(width, height, pixel);
        let mut buffer = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_fit_within_never_enlarges() {
        assert_eq!(Transcoder::fit_within(10, 10, Some(100), Some(100)), (10, 10));
        assert_eq!(Transcoder::fit_within(10, 10, Some(100), None), (10, 10));
        assert_eq!(Transcoder::fit_within(10, 10, None, Some(100)), (10, 10));
    }

    #[test]
    fn test_fit_within_bounding_box() {
        // Landscape into a square box: width binds.
        assert_eq!(Transcoder::fit_within(100, 50, Some(50), Some(50)), (50, 25));
        // One-sided targets leave the other axis aspect-scaled.
        assert_eq!(Transcoder::fit_within(100, 50, Some(50), None), (50, 25));
        assert_eq!(Transcoder::fit_within(100, 50, None, Some(25)), (50, 25));
        // No constraint: source dimensions pass through.
        assert_eq!(Transcoder::fit_within(100, 50, None, None), (100, 50));
    }

    #[test]
    fn test_fit_within_floors_at_one_pixel() {
        assert_eq!(Transcoder::fit_within(1000, 2, Some(10), None), (10, 1));
    }

    #[test]
    fn test_parse_background_color() {
        assert_eq!(Transcoder::parse_background_color("ff8000"), [255, 128, 0]);
        assert_eq!(Transcoder::parse_background_color("#000000"), [0, 0, 0]);
        // Malformed or missing channels independently default to white.
        assert_eq!(Transcoder::parse_background_color("zzff00"), [255, 255, 0]);
        assert_eq!(Transcoder::parse_background_color("10"), [16, 255, 255]);
        assert_eq!(Transcoder::parse_background_color(""), [255, 255, 255]);
    }

    #[test]
    fn test_transcode_downscales() {
        let data = png_bytes(100, 50, Rgba([200, 10, 10, 255]));
        let output =
            Transcoder::transcode(&data, Some(50), None, OutputFormat::Png, "ffffff").unwrap();
        assert_eq!(
            output.dimensions,
            Dimensions {
                width: 50,
                height: 25
            }
        );
        assert_eq!(output.format, OutputFormat::Png);
        assert!(!output.data.is_empty());
    }

    #[test]
    fn test_transcode_does_not_upscale() {
        let data = png_bytes(10, 10, Rgba([200, 10, 10, 255]));
        let output =
            Transcoder::transcode(&data, Some(500), Some(500), OutputFormat::Png, "ffffff")
                .unwrap();
        assert_eq!(
            output.dimensions,
            Dimensions {
                width: 10,
                height: 10
            }
        );
    }

    #[test]
    fn test_jpeg_flattens_over_background() {
        // Half-transparent red over white should land near (255, 127, 127).
        let data = png_bytes(16, 16, Rgba([255, 0, 0, 128]));
        let output =
            Transcoder::transcode(&data, Some(16), None, OutputFormat::Jpeg, "ffffff").unwrap();

        let decoded = image::load_from_memory(&output.data).unwrap().to_rgb8();
        let pixel = decoded.get_pixel(8, 8);
        assert!(pixel[0] > 240, "red channel was {}", pixel[0]);
        assert!((pixel[1] as i32 - 127).abs() < 20, "green was {}", pixel[1]);
        assert!((pixel[2] as i32 - 127).abs() < 20, "blue was {}", pixel[2]);
    }

    #[test]
    fn test_webp_output_is_riff() {
        let data = png_bytes(16, 16, Rgba([0, 200, 0, 255]));
        let output =
            Transcoder::transcode(&data, Some(8), None, OutputFormat::Webp, "ffffff").unwrap();
        assert_eq!(&output.data[..4], b"RIFF");
        assert_eq!(
            output.dimensions,
            Dimensions {
                width: 8,
                height: 8
            }
        );
    }

    #[test]
    fn test_corrupt_input_is_wrapped() {
        let result =
            Transcoder::transcode(b"garbage", Some(10), None, OutputFormat::Png, "ffffff");
        let error = result.unwrap_err();
        assert!(error.to_string().starts_with("transcode failed:"));
    }
}
