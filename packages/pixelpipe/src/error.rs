use thiserror::Error;

use crate::OutputFormat;

/// Errors that can occur when executing a transform.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum TransformError {
    /// The source bytes could not be decoded as an image.
    #[error("source image could not be decoded: {source}")]
    Decode {
        /// The underlying decoder error.
        source: image::ImageError,
    },

    /// The source image is larger than the configured input pixel limit.
    #[error(
        "source dimensions {width}x{height} exceed the input limit of {max_pixels} pixels"
    )]
    InputTooLarge {
        /// Width of the offending source, in pixels.
        width: u32,

        /// Height of the offending source, in pixels.
        height: u32,

        /// The input limit that was exceeded, in pixels.
        max_pixels: u64,
    },

    /// Encoding the transformed image failed.
    #[error("encoding to {format} failed: {source}")]
    Encode {
        /// The output format that was being encoded.
        format: OutputFormat,

        /// The underlying encoder error.
        source: image::ImageError,
    },
}

/// A specialized `Result` type for transform operations, returning the
/// crate's [`TransformError`] type as the error value.
pub(crate) type Result<T> = std::result::Result<T, TransformError>;

/// The caller provided a string that does not name a known output format.
#[derive(Debug, Error)]
#[error("'{value}' is not a known output format")]
pub struct UnknownFormatError {
    /// The string that failed to parse.
    pub(crate) value: String,
}
