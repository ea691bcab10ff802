//! Device task protocol.
//!
//! A [`DeviceTask`] bundles the fixed denoising parameters with a
//! [`TileDispatch`] capability object supplied by the pipeline. The device
//! drives the protocol from its worker threads:
//!
//! 1. `acquire_tile` - claim the next center tile, false when exhausted
//! 2. `map_neighboring_tiles` - synthesize the 3x3 context and the seeded
//!    output tile
//! 3. run the kernel over the mapped neighborhood
//! 4. `unmap_neighboring_tiles` - write results back, exactly once per map
//! 5. `release_tile`
//!
//! All five callbacks may be invoked concurrently from different workers;
//! `get`-style `cancelled` polling may interleave anywhere.

use crate::buffer::DeviceBuffer;
use crate::error::DeviceResult;
use crate::tile::{DeviceTile, TileNeighborhood};
use std::sync::Arc;

/// Fixed per-task denoising parameters, shared with the kernel.
#[derive(Debug, Clone)]
pub struct DenoiseParams {
    /// Packed input floats per pixel (15).
    pub pass_stride: usize,
    /// Packed output floats per pixel (3).
    pub target_pass_stride: usize,
    /// Offset of the denoising feature record inside the packed input (0).
    pub pass_denoising_data: usize,
    /// Offset of the noise-free pass, negative when absent (-1).
    pub pass_denoising_clean: i64,
    /// Floats per temporal frame slab in the input buffer.
    pub frame_stride: usize,
    /// Neighbor frame offsets relative to the center frame, slab order.
    pub frames: Vec<i64>,
    /// Whether the kernel filters at all; when false the seeded output
    /// values stand.
    pub do_filter: bool,
    /// Whether prefiltered feature passes are written out (false).
    pub write_passes: bool,
    /// Whether input comes straight from a render session (false).
    pub from_render: bool,
}

impl DenoiseParams {
    /// Number of temporal slabs in the input buffer, center included.
    #[inline]
    pub fn num_frames(&self) -> usize {
        1 + self.frames.len()
    }
}

/// Callbacks the pipeline exposes to device workers.
///
/// Implementations must be safe to call from multiple threads; the contract
/// guarantees one `unmap_neighboring_tiles` per `map_neighboring_tiles`,
/// issued after all kernel reads of the mapped buffers complete.
pub trait TileDispatch: Send + Sync {
    /// Claims the next tile. Returns `false` when no work remains.
    fn acquire_tile(&self, tile: &mut DeviceTile) -> bool;

    /// Fills the 3x3 context around the center tile (already placed at the
    /// center slot) and allocates the seeded output tile.
    fn map_neighboring_tiles(&self, hood: &mut TileNeighborhood) -> DeviceResult<()>;

    /// Copies the output tile's results back and releases its buffer.
    fn unmap_neighboring_tiles(&self, hood: &mut TileNeighborhood) -> DeviceResult<()>;

    /// Returns a claimed tile. Work was already committed at unmap time.
    fn release_tile(&self, tile: &DeviceTile);

    /// Polled between work items; `true` aborts the task early.
    fn cancelled(&self) -> bool {
        false
    }
}

/// A denoising task queued on a device.
pub struct DeviceTask {
    /// Fixed kernel parameters.
    pub params: DenoiseParams,
    /// Pipeline callbacks driving tile handout and write-back.
    pub dispatch: Arc<dyn TileDispatch>,
    /// The frame-wide packed input buffer, read-only while the task runs.
    pub input: DeviceBuffer,
}

/// A compute device that executes denoising tasks.
///
/// `task_add` only enqueues; `task_wait` blocks until every queued task has
/// finished and reports the first failure.
pub trait Device: Send + Sync {
    /// Queues a task for execution.
    fn task_add(&self, task: DeviceTask);

    /// Runs queued tasks to completion.
    fn task_wait(&self) -> DeviceResult<()>;

    /// Maps a tile's buffer for host access.
    ///
    /// Host-resident devices hand the buffer back unchanged; a device with
    /// separate memory would copy here.
    fn map_tile(&self, tile: &DeviceTile) -> DeviceBuffer {
        tile.buffer.clone()
    }
}
