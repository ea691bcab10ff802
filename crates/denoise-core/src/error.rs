//! Error types for core denoising operations.

use thiserror::Error;

/// Error type for layer resolution and channel matching.
#[derive(Debug, Error)]
pub enum CoreError {
    /// No layer in the file carries the full denoising channel set.
    #[error("no layer with complete denoising data passes")]
    NoUsableLayer,

    /// Sample count unavailable both as an override and in file metadata.
    #[error("layer {layer}: sample count not found (expected a cycles.{layer}.samples attribute)")]
    MissingSamples {
        /// Layer key the lookup was performed for.
        layer: String,
    },

    /// Sample count attribute present but not a positive decimal.
    #[error("layer {layer}: invalid sample count {value:?}")]
    InvalidSamples {
        /// Layer key the lookup was performed for.
        layer: String,
        /// Attribute text that failed to parse.
        value: String,
    },

    /// A neighbor frame lacks a channel the center frame uses.
    #[error("misses denoising data passes (channel {channel:?} not found)")]
    NeighborChannelMissing {
        /// Full channel name as used by the center frame.
        channel: String,
    },
}

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;
