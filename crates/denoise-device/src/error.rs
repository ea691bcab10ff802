//! Error types for device operations.

use thiserror::Error;

/// Device protocol or kernel error.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// A tile was mapped twice without an intervening unmap.
    #[error("tile {tile_index} is already mapped")]
    TileAlreadyMapped {
        /// Raster-order index of the offending tile.
        tile_index: usize,
    },

    /// An unmap arrived for a tile that was never mapped.
    #[error("tile {tile_index} is not mapped")]
    TileNotMapped {
        /// Raster-order index of the offending tile.
        tile_index: usize,
    },

    /// A tile references a buffer too small for its geometry.
    #[error("buffer holds {len} floats, tile needs {needed}")]
    BufferTooSmall {
        /// Actual buffer length.
        len: usize,
        /// Required length.
        needed: usize,
    },
}

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;
