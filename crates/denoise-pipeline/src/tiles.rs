//! Tile partitioning and handout.
//!
//! A layer is split into a `ceil(W/tw) x ceil(H/th)` grid of rectangles
//! clipped to image bounds, indexed in raster order. Device workers pull
//! tiles one at a time under a mutex; each successful handout reports
//! progress on stdout, prefixed with the frame number when the run produces
//! more than one output frame.

use denoise_device::{DeviceBuffer, DeviceTile};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

struct QueueState {
    pending: VecDeque<DeviceTile>,
    handed_out: usize,
}

/// Mutex-protected source of denoising tiles for one layer.
pub struct TileQueue {
    state: Mutex<QueueState>,
    total: usize,
    frame_label: Option<usize>,
}

impl TileQueue {
    /// Partitions a `width x height` layer into tiles of at most
    /// `tile_w x tile_h` pixels, all sharing the packed `input` buffer.
    pub fn new(
        width: usize,
        height: usize,
        (tile_w, tile_h): (usize, usize),
        num_samples: u32,
        input: &DeviceBuffer,
        frame_label: Option<usize>,
    ) -> Self {
        let mut pending = VecDeque::new();
        let mut tile_index = 0;
        let mut y = 0;
        while y < height {
            let h = tile_h.min(height - y);
            let mut x = 0;
            while x < width {
                let w = tile_w.min(width - x);
                pending.push_back(DeviceTile {
                    x,
                    y,
                    w,
                    h,
                    tile_index,
                    start_sample: 0,
                    num_samples,
                    stride: width,
                    offset: 0,
                    buffer: input.clone(),
                });
                tile_index += 1;
                x += tile_w;
            }
            y += tile_h;
        }
        let total = pending.len();
        Self {
            state: Mutex::new(QueueState {
                pending,
                handed_out: 0,
            }),
            total,
            frame_label,
        }
    }

    /// Number of tiles in the grid.
    pub fn total(&self) -> usize {
        self.total
    }

    /// Pops the next tile into `tile`; `false` once the queue is empty.
    pub fn acquire(&self, tile: &mut DeviceTile) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match state.pending.pop_front() {
            Some(next) => {
                state.handed_out += 1;
                match self.frame_label {
                    Some(frame) => {
                        println!("Frame {}: {} / {} tiles", frame, state.handed_out, self.total)
                    }
                    None => println!("{} / {} tiles", state.handed_out, self.total),
                }
                *tile = next;
                true
            }
            None => false,
        }
    }
}
