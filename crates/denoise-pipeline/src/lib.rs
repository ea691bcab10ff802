//! # denoise-pipeline
//!
//! Orchestration of the multi-frame render denoiser.
//!
//! The pipeline consumes multi-layer EXR frames that carry a noisy beauty
//! pass plus the auxiliary denoising feature passes, dispatches tiled work
//! to a compute device, and writes denoised frames back in place of their
//! combined channels while preserving everything else in the container.
//!
//! Control flow per frame: [`Denoiser::run`] builds a [`task::FrameTask`],
//! which loads the center image and its temporal neighbors into one packed
//! device buffer ([`image`], [`preprocess`]), then lets the device pull
//! tiles through the callback protocol ([`tiles`], [`task`]) and finally
//! promotes the output atomically.
//!
//! # Example
//!
//! ```ignore
//! use denoise_pipeline::{Denoiser, DenoiseOptions};
//! use denoise_device::CpuDevice;
//! use std::sync::Arc;
//!
//! let mut denoiser = Denoiser::new(Arc::new(CpuDevice::default()), DenoiseOptions::default());
//! denoiser.set_frames(vec!["noisy.exr".into()], vec!["clean.exr".into()]);
//! denoiser.run()?;
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod denoiser;
mod error;
pub mod image;
mod options;
pub mod preprocess;
pub mod task;
pub mod tiles;

pub use denoiser::Denoiser;
pub use error::{DenoiseError, Result};
pub use image::Image;
pub use options::{DENOISE_MAX_FRAMES, DenoiseOptions};
pub use task::FrameTask;
