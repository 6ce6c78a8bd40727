//! Image transform engine with explicit per-instance concurrency tunables.
//!
//! The unit of work is a transform: decode a source image, normalize its
//! orientation, resize it to a target box and re-encode it in one of the
//! supported output formats. An [`Engine`] executes transforms on a fixed
//! pool of worker threads whose size is chosen at construction time, with
//! an internal admission limit capping how many transforms may be
//! processing simultaneously.
//!
//! Both tunables are per-instance state. Two engines in the same process
//! never share configuration, which makes the engine suitable for
//! measurement scenarios where one configuration must not leak into
//! another.
//!
//! # Example
//!
//! ```
//! use new_zealand::nz;
//! use pixelpipe::{
//!     Engine, EngineOptions, OutputFormat, ResizeFit, SourceImage, TransformRequest,
//! };
//!
//! let engine = Engine::new(EngineOptions {
//!     worker_threads: nz!(2),
//!     concurrency_limit: nz!(2),
//!     cache: true,
//! });
//!
//! let source = SourceImage::synthetic(64, 48)?;
//!
//! let artifact = engine.transform(&TransformRequest {
//!     source,
//!     target_width: 32,
//!     target_height: 24,
//!     fit: ResizeFit::Cover,
//!     options: OutputFormat::Jpeg.sweep_options(),
//!     max_pixels: 1_000_000,
//! })?;
//!
//! assert_eq!(artifact.format(), OutputFormat::Jpeg);
//! assert!(!artifact.bytes().is_empty());
//! # Ok::<(), pixelpipe::TransformError>(())
//! ```

mod engine;
mod error;
mod format;
mod semaphore;
mod source;
mod transform;

pub use engine::*;
pub use error::*;
pub use format::*;
pub use semaphore::*;
pub use source::*;
pub use transform::*;
