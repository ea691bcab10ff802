//! # denoise-exr
//!
//! OpenEXR container access for the render denoiser.
//!
//! The denoiser consumes and produces multi-layer EXR files whose channels
//! carry dot-delimited names (`layer.pass.channel`). This crate wraps the
//! operations the pipeline needs:
//!
//! - [`ExrSource::open`] - parse the header only (dimensions, ordered
//!   channel descriptions, attributes including `multiView` and the
//!   `cycles.<layer>.samples` strings)
//! - [`ExrSource::read_all_f32`] - decode every channel as f32 into one
//!   interleaved buffer
//! - [`write_f32`] - re-encode a buffer against a header snapshot,
//!   restoring per-channel sample kinds and attributes
//! - [`temp_output_path`] - unique sibling temp path for the
//!   write-then-rename promotion of outputs
//!
//! # Example
//!
//! ```ignore
//! use denoise_exr::ExrSource;
//!
//! let source = ExrSource::open("render.exr")?;
//! println!("{}x{}", source.spec().width, source.spec().height);
//! let pixels = source.read_all_f32()?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod read;
mod write;

pub use error::{ExrError, ExrResult};
pub use read::ExrSource;
pub use write::{temp_output_path, write_f32};
