use std::fmt;
use std::str::FromStr;

use crate::UnknownFormatError;

/// The output formats a transform can encode to.
///
/// Each format carries two static option records: the sweep table used by
/// latency measurements and the service table that mirrors typical
/// customer-facing quality settings. Neither table is ever mutated.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[non_exhaustive]
pub enum OutputFormat {
    /// Baseline JPEG.
    Jpeg,

    /// Lossless PNG.
    Png,

    /// WebP. The encoder in use is lossless, so the quality knob in the
    /// option records is carried but not applied.
    WebP,

    /// AV1 image file format.
    Avif,
}

impl OutputFormat {
    /// All supported output formats, in sweep order.
    pub const ALL: [Self; 4] = [Self::Jpeg, Self::Png, Self::WebP, Self::Avif];

    /// The encode options used by latency sweeps for this format.
    #[must_use]
    pub fn sweep_options(self) -> EncodeOptions {
        match self {
            Self::Jpeg => EncodeOptions::Jpeg { quality: 75 },
            Self::Png => EncodeOptions::Png {
                quality: 75,
                compression_level: 6,
            },
            Self::WebP => EncodeOptions::WebP { quality: 75 },
            Self::Avif => EncodeOptions::Avif {
                quality: 55,
                effort: 3,
            },
        }
    }

    /// The encode options that mirror typical customer quality settings.
    ///
    /// Used by the bounded-demand harness.
    #[must_use]
    pub fn service_options(self) -> EncodeOptions {
        match self {
            Self::Jpeg => EncodeOptions::Jpeg { quality: 80 },
            Self::Png => EncodeOptions::Png {
                quality: 100,
                compression_level: 6,
            },
            Self::WebP => EncodeOptions::WebP { quality: 80 },
            Self::Avif => EncodeOptions::Avif {
                quality: 60,
                effort: 4,
            },
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::WebP => "webp",
            Self::Avif => "avif",
        };

        // pad() rather than write_str() so report columns can align us.
        f.pad(name)
    }
}

impl FromStr for OutputFormat {
    type Err = UnknownFormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "jpeg" => Ok(Self::Jpeg),
            "png" => Ok(Self::Png),
            "webp" => Ok(Self::WebP),
            "avif" => Ok(Self::Avif),
            other => Err(UnknownFormatError {
                value: other.to_string(),
            }),
        }
    }
}

/// Format-specific encode options.
///
/// The variant identifies the output format, so a request carrying encode
/// options can never disagree with itself about what it encodes to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum EncodeOptions {
    /// JPEG options.
    Jpeg {
        /// Quality, 1-100.
        quality: u8,
    },

    /// PNG options.
    Png {
        /// Quality, 1-100. Retained as configuration; the encoder is
        /// lossless and does not quantize.
        quality: u8,

        /// zlib compression level, 0-9.
        compression_level: u8,
    },

    /// WebP options.
    WebP {
        /// Quality, 1-100. Retained as configuration; the encoder is
        /// lossless.
        quality: u8,
    },

    /// AVIF options.
    Avif {
        /// Quality, 1-100.
        quality: u8,

        /// CPU effort, 0-9, higher is slower and smaller.
        effort: u8,
    },
}

impl EncodeOptions {
    /// The output format these options encode to.
    #[must_use]
    pub fn format(self) -> OutputFormat {
        match self {
            Self::Jpeg { .. } => OutputFormat::Jpeg,
            Self::Png { .. } => OutputFormat::Png,
            Self::WebP { .. } => OutputFormat::WebP,
            Self::Avif { .. } => OutputFormat::Avif,
        }
    }
}
