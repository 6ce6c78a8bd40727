use std::io::Cursor;

use image::codecs::avif::AvifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType as PngFilterType, PngEncoder};
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageDecoder, ImageError, ImageReader};

use crate::{EncodeOptions, OutputFormat, Result, SourceImage, TransformError};

/// How the source is fitted to the target box.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum ResizeFit {
    /// Scale so both target dimensions are covered, then center-crop to the
    /// exact target box.
    Cover,

    /// Scale to fit within the target box, preserving aspect ratio.
    /// Sources already within the box are passed through unscaled.
    Within,
}

/// One transform: a source, a target box and the encode options to apply.
#[derive(Clone, Debug)]
pub struct TransformRequest {
    /// The encoded source image.
    pub source: SourceImage,

    /// Width of the target box, in pixels.
    pub target_width: u32,

    /// Height of the target box, in pixels.
    pub target_height: u32,

    /// How the source is fitted to the target box.
    pub fit: ResizeFit,

    /// Format-specific encode options. The options identify the output
    /// format.
    pub options: EncodeOptions,

    /// Sources with more pixels than this are rejected before decoding.
    pub max_pixels: u64,
}

/// The encoded output of a successful transform.
#[derive(Debug)]
pub struct EncodedImage {
    format: OutputFormat,
    bytes: Vec<u8>,
}

impl EncodedImage {
    pub(crate) fn new(format: OutputFormat, bytes: Vec<u8>) -> Self {
        Self { format, bytes }
    }

    /// The format this artifact is encoded in.
    #[must_use]
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// The encoded bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Size of the encoded artifact, in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the encoded artifact is empty. Never true for artifacts
    /// produced by an engine.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Decodes a source, enforcing the pixel limit and normalizing orientation.
pub(crate) fn decode_oriented(source: &SourceImage, max_pixels: u64) -> Result<DynamicImage> {
    let reader = ImageReader::new(Cursor::new(source.bytes()))
        .with_guessed_format()
        .map_err(|e| TransformError::Decode {
            source: ImageError::IoError(e),
        })?;

    let mut decoder = reader
        .into_decoder()
        .map_err(|source| TransformError::Decode { source })?;

    let (width, height) = decoder.dimensions();
    if u64::from(width).saturating_mul(u64::from(height)) > max_pixels {
        return Err(TransformError::InputTooLarge {
            width,
            height,
            max_pixels,
        });
    }

    let orientation = decoder
        .orientation()
        .map_err(|source| TransformError::Decode { source })?;

    let mut image =
        DynamicImage::from_decoder(decoder).map_err(|source| TransformError::Decode { source })?;
    image.apply_orientation(orientation);

    Ok(image)
}

/// Fits a decoded image to the target box.
pub(crate) fn fit_to_box(
    image: &DynamicImage,
    target_width: u32,
    target_height: u32,
    fit: ResizeFit,
) -> DynamicImage {
    match fit {
        ResizeFit::Cover => image.resize_to_fill(target_width, target_height, FilterType::Lanczos3),
        ResizeFit::Within => {
            // No enlargement of undersized inputs.
            if image.width() <= target_width && image.height() <= target_height {
                image.clone()
            } else {
                image.resize(target_width, target_height, FilterType::Lanczos3)
            }
        }
    }
}

/// Encodes a fitted image with the given options.
pub(crate) fn encode(image: &DynamicImage, options: EncodeOptions) -> Result<EncodedImage> {
    let format = options.format();
    let mut bytes = Vec::new();

    let result = match options {
        EncodeOptions::Jpeg { quality } => {
            image.write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, quality))
        }
        EncodeOptions::Png {
            quality: _,
            compression_level,
        } => image.write_with_encoder(PngEncoder::new_with_quality(
            &mut bytes,
            png_compression(compression_level),
            PngFilterType::Adaptive,
        )),
        EncodeOptions::WebP { quality: _ } => {
            image.write_with_encoder(WebPEncoder::new_lossless(&mut bytes))
        }
        EncodeOptions::Avif { quality, effort } => image.write_with_encoder(
            AvifEncoder::new_with_speed_quality(&mut bytes, avif_speed(effort), quality),
        ),
    };

    result.map_err(|source| TransformError::Encode { format, source })?;

    Ok(EncodedImage::new(format, bytes))
}

/// Maps a zlib compression level (0-9) to the encoder's compression tiers.
fn png_compression(level: u8) -> CompressionType {
    match level {
        0..=3 => CompressionType::Fast,
        4..=6 => CompressionType::Default,
        _ => CompressionType::Best,
    }
}

/// Maps encode effort (0-9, higher is slower) to the AVIF encoder's speed
/// scale (1-10, higher is faster).
fn avif_speed(effort: u8) -> u8 {
    10_u8.saturating_sub(effort.min(9)).max(1)
}
