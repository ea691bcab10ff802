//! Device tile descriptors.
//!
//! A tile addresses pixels of a buffer through `offset` and `stride`: the
//! record for image pixel `(x, y)` starts at float
//! `(offset + y * stride + x) * record_stride`, where the record stride is
//! the task's `pass_stride` for input tiles and `target_pass_stride` for
//! the output tile. Tiles covering the frame-wide input buffer use
//! `stride = image width` and `offset = 0`, so coordinates stay absolute;
//! the per-tile output buffer uses `stride = tile width` with a negative
//! offset that maps the tile origin to buffer start.

use crate::buffer::DeviceBuffer;
use denoise_core::Rect;

/// Slots in a 3x3 neighborhood descriptor plus the output tile.
pub const NEIGHBORHOOD_SLOTS: usize = 10;
/// Slot of the center tile being denoised.
pub const NEIGHBORHOOD_CENTER: usize = 4;
/// Slot of the output tile.
pub const NEIGHBORHOOD_TARGET: usize = 9;

/// One rectangular unit of denoising work.
#[derive(Debug, Clone, Default)]
pub struct DeviceTile {
    /// X origin in image coordinates.
    pub x: usize,
    /// Y origin in image coordinates.
    pub y: usize,
    /// Tile width, clipped to image bounds (may be zero for neighbors).
    pub w: usize,
    /// Tile height, clipped to image bounds (may be zero for neighbors).
    pub h: usize,
    /// Raster-order index of the center tile this descriptor belongs to.
    pub tile_index: usize,
    /// First sample of the tile's sample range.
    pub start_sample: u32,
    /// Number of samples the layer was rendered with.
    pub num_samples: u32,
    /// Pixels per buffer row.
    pub stride: usize,
    /// Signed pixel offset applied before stride addressing.
    pub offset: i64,
    /// Buffer this tile reads from or writes to.
    pub buffer: DeviceBuffer,
}

impl DeviceTile {
    /// The tile's rectangle in image coordinates.
    #[inline]
    pub fn rect(&self) -> Rect {
        Rect::new(self.x, self.y, self.w, self.h)
    }

    /// Returns `true` if the tile covers no pixels.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Buffer record index for image pixel `(x, y)`.
    #[inline]
    pub fn pixel_record(&self, x: usize, y: usize) -> usize {
        (self.offset + (y * self.stride + x) as i64) as usize
    }
}

/// The 3x3 tile block around a center tile, plus the output tile.
///
/// Slots 0-8 are the grid in raster order with the center at slot
/// [`NEIGHBORHOOD_CENTER`]; missing corners are empty rectangles. Slot
/// [`NEIGHBORHOOD_TARGET`] shares the center's geometry but points into the
/// freshly allocated output buffer.
#[derive(Debug, Clone, Default)]
pub struct TileNeighborhood {
    /// The tile descriptors, indexed by slot.
    pub tiles: [DeviceTile; NEIGHBORHOOD_SLOTS],
}

impl TileNeighborhood {
    /// The center tile.
    #[inline]
    pub fn center(&self) -> &DeviceTile {
        &self.tiles[NEIGHBORHOOD_CENTER]
    }

    /// The output tile.
    #[inline]
    pub fn target(&self) -> &DeviceTile {
        &self.tiles[NEIGHBORHOOD_TARGET]
    }

    /// The readable region: the union of the nine grid rectangles.
    pub fn bounds(&self) -> Rect {
        self.tiles[..NEIGHBORHOOD_TARGET]
            .iter()
            .fold(Rect::default(), |acc, t| acc.union(&t.rect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_record_absolute() {
        let tile = DeviceTile {
            x: 64,
            y: 64,
            w: 64,
            h: 64,
            stride: 256,
            offset: 0,
            ..Default::default()
        };
        assert_eq!(tile.pixel_record(64, 64), 64 * 256 + 64);
    }

    #[test]
    fn test_pixel_record_tile_local() {
        // Output tile: origin maps to buffer start.
        let tile = DeviceTile {
            x: 64,
            y: 32,
            w: 16,
            h: 16,
            stride: 16,
            offset: -(32 * 16 + 64),
            ..Default::default()
        };
        assert_eq!(tile.pixel_record(64, 32), 0);
        assert_eq!(tile.pixel_record(65, 33), 17);
    }
}
