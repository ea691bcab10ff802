//! Pipeline error types.
//!
//! Every failure inside a frame aborts that frame's task; the frame driver
//! propagates the error and aborts the whole run rather than continuing
//! with later frames and producing silent partial output.

use denoise_core::CoreError;
use denoise_device::DeviceError;
use denoise_exr::ExrError;
use std::path::PathBuf;
use thiserror::Error;

/// Denoising pipeline error.
#[derive(Debug, Error)]
pub enum DenoiseError {
    /// Input path does not point at a regular file.
    #[error("{}: not a regular file", .path.display())]
    NotAFile {
        /// Offending path.
        path: PathBuf,
    },

    /// Opening a container failed.
    #[error("failed to open {}: {source}", .path.display())]
    Open {
        /// Offending path.
        path: PathBuf,
        /// Underlying container error.
        #[source]
        source: ExrError,
    },

    /// Reading container pixels failed.
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        /// Offending path.
        path: PathBuf,
        /// Underlying container error.
        #[source]
        source: ExrError,
    },

    /// Writing a container failed.
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        /// Offending path.
        path: PathBuf,
        /// Underlying container error.
        #[source]
        source: ExrError,
    },

    /// Promoting the temp file over the target failed.
    #[error("failed to rename {} over {}: {source}", .from.display(), .to.display())]
    Rename {
        /// Temp path that was written.
        from: PathBuf,
        /// Target output path.
        to: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// No layer in the file carries the full denoising channel set.
    #[error("{}: no layer with complete denoising data passes", .path.display())]
    LayerMissing {
        /// Offending path.
        path: PathBuf,
    },

    /// A neighbor frame differs in dimensions or channels.
    #[error("neighbor frame {} {reason}", .path.display())]
    NeighborMismatch {
        /// Offending neighbor path.
        path: PathBuf,
        /// Human-readable mismatch description.
        reason: String,
    },

    /// Sample-count metadata unavailable for a layer.
    #[error("{}: {source}", .path.display())]
    Metadata {
        /// File the metadata was looked up in.
        path: PathBuf,
        /// Underlying resolution error.
        #[source]
        source: CoreError,
    },

    /// More neighbor frames requested than the device supports.
    #[error("{requested} neighbor frames exceed the supported maximum of {max}")]
    CapExceeded {
        /// Requested neighbor count.
        requested: usize,
        /// Maximum supported neighbor count.
        max: usize,
    },

    /// The compute device failed.
    #[error("device error: {0}")]
    Device(#[from] DeviceError),
}

/// Result type for pipeline operations.
pub type Result<T> = std::result::Result<T, DenoiseError>;
