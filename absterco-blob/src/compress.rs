//! Image compression run on every upload before it reaches the blob store.
//!
//! [`compress`] decodes once, scales down to fit the requested box (never up),
//! then re-encodes. While the output is over the size budget the quality is
//! lowered in 0.1 steps; once quality is at or below 0.3 the result is accepted
//! as-is. [`smart_compress`] picks the output format: PNG sources that actually
//! use transparency go to lossless WebP, everything else to lossy WebP.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Quality steps are whole percents so the retry loop always terminates.
const QUALITY_STEP: u8 = 10;
const QUALITY_FLOOR: u8 = 30;

#[derive(Error, Debug)]
pub enum CompressError {
    #[error("image could not be decoded: {0}")]
    Decode(#[source] image::ImageError),

    #[error("image could not be encoded: {0}")]
    Encode(#[source] image::ImageError),

    #[error("image could not be encoded as webp: {0}")]
    WebP(String),

    #[error("empty image file")]
    Empty,
}

/// An image as received from (or sent to) a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Lossy, honors `quality`
    Jpeg,
    /// Lossless
    Png,
    /// Lossy, honors `quality`
    WebP,
    /// Lossless, keeps alpha
    WebPLossless,
}

impl OutputFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::WebP | OutputFormat::WebPLossless => "image/webp",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Jpeg => "jpg",
            OutputFormat::Png => "png",
            OutputFormat::WebP | OutputFormat::WebPLossless => "webp",
        }
    }

    fn honors_quality(&self) -> bool {
        matches!(self, OutputFormat::Jpeg | OutputFormat::WebP)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionOptions {
    pub max_width: u32,
    pub max_height: u32,
    /// 0.0 ..= 1.0
    pub quality: f32,
    pub format: OutputFormat,
    pub max_size_mb: f64,
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self {
            max_width: 1920,
            max_height: 1080,
            quality: 0.85,
            format: OutputFormat::WebP,
            max_size_mb: 2.0,
        }
    }
}

impl CompressionOptions {
    pub fn max_size_bytes(&self) -> u64 {
        (self.max_size_mb.max(0.0) * 1024.0 * 1024.0) as u64
    }
}

#[derive(Debug, Clone)]
pub struct CompressionResult {
    pub file: ImageFile,
    pub original_size: u64,
    pub compressed_size: u64,
    /// Percent of the original size saved; negative when the output grew.
    pub compression_ratio: f64,
    pub width: u32,
    pub height: u32,
    /// Quality the accepted output was encoded at.
    pub quality: f32,
    pub format: OutputFormat,
}

/// Fit `width x height` inside the box, keeping aspect ratio, never upscaling.
/// A zero bound leaves that axis unconstrained.
pub fn target_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    let fit = |max: u32, actual: u32| {
        if max == 0 || actual == 0 {
            1.0
        } else {
            max as f64 / actual as f64
        }
    };
    let ratio = fit(max_width, width).min(fit(max_height, height)).min(1.0);

    if ratio >= 1.0 {
        return (width, height);
    }

    let w = ((width as f64 * ratio).round() as u32).max(1);
    let h = ((height as f64 * ratio).round() as u32).max(1);
    (w, h)
}

pub fn compress(file: &ImageFile, options: &CompressionOptions) -> Result<CompressionResult, CompressError> {
    let img = decode(file)?;
    compress_decoded(file, img, options)
}

/// Full alpha scan: true when any pixel has alpha below 255.
pub fn has_transparency(bytes: &[u8]) -> Result<bool, CompressError> {
    if bytes.is_empty() {
        return Err(CompressError::Empty);
    }
    let img = image::load_from_memory(bytes).map_err(CompressError::Decode)?;
    Ok(image_has_transparency(&img))
}

pub fn smart_compress(file: &ImageFile, options: CompressionOptions) -> Result<CompressionResult, CompressError> {
    let img = decode(file)?;

    let is_png = file.content_type.eq_ignore_ascii_case("image/png")
        || matches!(image::guess_format(&file.bytes), Ok(ImageFormat::Png));

    let format = if is_png && image_has_transparency(&img) {
        OutputFormat::WebPLossless
    } else {
        OutputFormat::WebP
    };

    compress_decoded(file, img, &CompressionOptions { format, ..options })
}

fn decode(file: &ImageFile) -> Result<DynamicImage, CompressError> {
    if file.bytes.is_empty() {
        return Err(CompressError::Empty);
    }
    image::load_from_memory(&file.bytes).map_err(CompressError::Decode)
}

fn image_has_transparency(img: &DynamicImage) -> bool {
    if !img.color().has_alpha() {
        return false;
    }
    img.to_rgba8().pixels().any(|p| p.0[3] < u8::MAX)
}

fn compress_decoded(
    file: &ImageFile,
    img: DynamicImage,
    options: &CompressionOptions,
) -> Result<CompressionResult, CompressError> {
    let (width, height) = target_dimensions(img.width(), img.height(), options.max_width, options.max_height);
    let img = if (width, height) != (img.width(), img.height()) {
        img.resize_exact(width, height, FilterType::Lanczos3)
    } else {
        img
    };

    let budget = options.max_size_bytes();
    let mut quality = (options.quality.clamp(0.0, 1.0) * 100.0).round() as u8;
    quality = quality.max(1);

    let encoded = loop {
        let encoded = encode(&img, options.format, quality)?;
        let size = encoded.len() as u64;

        if size <= budget || quality <= QUALITY_FLOOR || !options.format.honors_quality() {
            break encoded;
        }

        debug!(size, budget, quality, "image.compress.retry");
        quality = quality.saturating_sub(QUALITY_STEP).max(1);
    };

    let original_size = file.size();
    let compressed_size = encoded.len() as u64;
    let compression_ratio = if original_size == 0 {
        0.0
    } else {
        (original_size as f64 - compressed_size as f64) / original_size as f64 * 100.0
    };

    Ok(CompressionResult {
        file: ImageFile {
            name: replace_extension(&file.name, options.format.extension()),
            content_type: options.format.content_type().to_string(),
            bytes: Bytes::from(encoded),
        },
        original_size,
        compressed_size,
        compression_ratio,
        width,
        height,
        quality: quality as f32 / 100.0,
        format: options.format,
    })
}

fn encode(img: &DynamicImage, format: OutputFormat, quality: u8) -> Result<Vec<u8>, CompressError> {
    let mut buf = Cursor::new(Vec::new());
    let (w, h) = (img.width(), img.height());

    match format {
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel.
            let rgb = img.to_rgb8();
            JpegEncoder::new_with_quality(&mut buf, quality)
                .write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
                .map_err(CompressError::Encode)?;
        }
        OutputFormat::Png => {
            let rgba = img.to_rgba8();
            PngEncoder::new_with_quality(&mut buf, CompressionType::Best, PngFilter::Adaptive)
                .write_image(rgba.as_raw(), w, h, ExtendedColorType::Rgba8)
                .map_err(CompressError::Encode)?;
        }
        OutputFormat::WebP => {
            let rgb = img.to_rgb8();
            let encoded = webp::Encoder::from_rgb(rgb.as_raw(), w, h)
                .encode_simple(false, f32::from(quality))
                .map_err(|e| CompressError::WebP(format!("{e:?}")))?;
            return Ok(encoded.to_vec());
        }
        OutputFormat::WebPLossless => {
            if img.color().has_alpha() {
                let rgba = img.to_rgba8();
                WebPEncoder::new_lossless(&mut buf)
                    .write_image(rgba.as_raw(), w, h, ExtendedColorType::Rgba8)
                    .map_err(CompressError::Encode)?;
            } else {
                let rgb = img.to_rgb8();
                WebPEncoder::new_lossless(&mut buf)
                    .write_image(rgb.as_raw(), w, h, ExtendedColorType::Rgb8)
                    .map_err(CompressError::Encode)?;
            }
        }
    }

    Ok(buf.into_inner())
}

fn replace_extension(name: &str, ext: &str) -> String {
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    let stem = if stem.trim().is_empty() { "image" } else { stem };
    format!("{stem}.{ext}")
}
