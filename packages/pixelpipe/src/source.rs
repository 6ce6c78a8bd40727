use std::any::type_name;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage};

use crate::{OutputFormat, Result, TransformError};

/// Quality used when generating synthetic source fixtures. High enough that
/// the decoded image retains the detail that makes re-encoding expensive.
const SYNTHETIC_SOURCE_QUALITY: u8 = 90;

/// Identifies source images for cache lookups. Process-wide counter so two
/// sources never collide even across engines.
static NEXT_SOURCE_ID: AtomicU64 = AtomicU64::new(0);

/// An encoded source image handed to transforms.
///
/// Cloning is cheap - the encoded bytes are shared, so the same source can
/// be handed to any number of concurrent transforms.
#[derive(Clone)]
pub struct SourceImage {
    id: u64,
    bytes: Arc<[u8]>,
}

impl SourceImage {
    /// Generates a synthetic photographic-looking source image of the given
    /// dimensions, encoded as JPEG.
    ///
    /// The pixel content mixes gradients with high-frequency detail so that
    /// decoding, resizing and re-encoding it costs roughly what a real
    /// photograph would, without shipping binary fixtures.
    ///
    /// # Example
    ///
    /// ```
    /// use pixelpipe::SourceImage;
    ///
    /// let source = SourceImage::synthetic(64, 48)?;
    /// assert!(!source.bytes().is_empty());
    /// # Ok::<(), pixelpipe::TransformError>(())
    /// ```
    pub fn synthetic(width: u32, height: u32) -> Result<Self> {
        #[expect(
            clippy::cast_possible_truncation,
            reason = "channel values are reduced modulo 256 before the cast"
        )]
        let pixels = RgbImage::from_fn(width, height, |x, y| {
            // Smooth gradients give the encoder something compressible,
            // the modulated terms keep every 8x8 block non-trivial.
            let horizontal = x.saturating_mul(255) / width.max(1);
            let vertical = y.saturating_mul(255) / height.max(1);
            let detail = (x.wrapping_mul(7) ^ y.wrapping_mul(13)) % 64;

            image::Rgb([
                (horizontal.wrapping_add(detail) % 256) as u8,
                (vertical.wrapping_add(detail / 2) % 256) as u8,
                ((horizontal + vertical) / 2 % 256) as u8,
            ])
        });

        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, SYNTHETIC_SOURCE_QUALITY)
            .write_image(pixels.as_raw(), width, height, ExtendedColorType::Rgb8)
            .map_err(|source| TransformError::Encode {
                format: OutputFormat::Jpeg,
                source,
            })?;

        Ok(Self::from_encoded(bytes))
    }

    /// Wraps already-encoded image bytes as a source.
    #[must_use]
    pub fn from_encoded(bytes: Vec<u8>) -> Self {
        Self {
            id: NEXT_SOURCE_ID.fetch_add(1, Ordering::Relaxed),
            bytes: Arc::from(bytes),
        }
    }

    /// The encoded bytes of this source.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Stable identity of this source, used as the decoded-image cache key.
    pub(crate) fn cache_key(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for SourceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(type_name::<Self>())
            .field("id", &self.id)
            .field("byte_len", &self.bytes.len())
            .finish()
    }
}
