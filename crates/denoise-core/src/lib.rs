//! # denoise-core
//!
//! Core types for the render denoiser: the canonical denoising channel map,
//! render-layer discovery with channel reshuffle tables, the image spec
//! snapshot preserved for write-back, and tile rectangle geometry.
//!
//! # Overview
//!
//! A render writes multi-layer images whose channels are dot-delimited
//! (`layer.pass.channel`). Denoising needs a fixed packed record per pixel
//! (15 input floats, 3 output floats); this crate resolves which file
//! channels feed which record slots:
//!
//! - [`channels`] - the fixed slot layout shared with the kernel
//! - [`layer`] - grouping, validation and reshuffle-table construction
//! - [`spec`] - container header snapshot (dimensions, channels, attributes)
//! - [`rect`] - clipped rectangles for tiles and neighborhoods

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod channels;
mod error;
pub mod layer;
pub mod rect;
pub mod spec;

pub use channels::{
    INPUT_DEPTH, INPUT_INTENSITY, INPUT_NOISY_IMAGE, INPUT_NUM_CHANNELS, INPUT_VARIANCE,
    OUTPUT_COMBINED, OUTPUT_NUM_CHANNELS, input_channels, output_channels,
};
pub use error::{CoreError, Result};
pub use layer::{RenderLayer, parse_channels};
pub use rect::Rect;
pub use spec::{AttrValue, ChannelDesc, ImageSpec, SampleKind};
