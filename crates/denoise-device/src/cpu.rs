//! CPU compute device.
//!
//! Runs queued denoising tasks on a pool of scoped worker threads. Each
//! worker drives the tile protocol independently: acquire, map, filter,
//! unmap, release, until the tile source runs dry. The first error stops
//! the pool; remaining workers drain out at the next acquire.

use crate::error::DeviceResult;
use crate::kernel;
use crate::task::{Device, DeviceTask};
use crate::tile::{DeviceTile, NEIGHBORHOOD_CENTER, TileNeighborhood};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// A denoising device backed by host threads.
pub struct CpuDevice {
    num_threads: usize,
    queue: Mutex<Vec<DeviceTask>>,
}

impl CpuDevice {
    /// Creates a device with the given worker count; 0 means one worker
    /// per available core.
    pub fn new(num_threads: usize) -> Self {
        let num_threads = if num_threads == 0 {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        } else {
            num_threads
        };
        Self {
            num_threads,
            queue: Mutex::new(Vec::new()),
        }
    }

    fn run_task(&self, task: &DeviceTask) -> DeviceResult<()> {
        let stop = AtomicBool::new(false);
        let failure: Mutex<Option<crate::error::DeviceError>> = Mutex::new(None);

        debug!(threads = self.num_threads, "running denoise task");
        std::thread::scope(|scope| {
            for _ in 0..self.num_threads {
                scope.spawn(|| {
                    if let Err(err) = worker_loop(task, &stop) {
                        stop.store(true, Ordering::Relaxed);
                        let mut slot = failure.lock().unwrap_or_else(PoisonError::into_inner);
                        slot.get_or_insert(err);
                    }
                });
            }
        });

        match failure
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Default for CpuDevice {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Device for CpuDevice {
    fn task_add(&self, task: DeviceTask) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(task);
    }

    fn task_wait(&self) -> DeviceResult<()> {
        let tasks = std::mem::take(&mut *self.queue.lock().unwrap_or_else(PoisonError::into_inner));
        for task in &tasks {
            self.run_task(task)?;
        }
        Ok(())
    }
}

/// One worker's drain loop over the tile protocol.
fn worker_loop(task: &DeviceTask, stop: &AtomicBool) -> DeviceResult<()> {
    loop {
        if stop.load(Ordering::Relaxed) || task.dispatch.cancelled() {
            return Ok(());
        }
        let mut tile = DeviceTile::default();
        if !task.dispatch.acquire_tile(&mut tile) {
            return Ok(());
        }

        let mut hood = TileNeighborhood::default();
        hood.tiles[NEIGHBORHOOD_CENTER] = tile.clone();
        task.dispatch.map_neighboring_tiles(&mut hood)?;

        let filtered = kernel::filter_neighborhood(&task.params, &hood);
        // Keep the map/unmap pairing even when the kernel fails.
        let unmapped = task.dispatch.unmap_neighboring_tiles(&mut hood);
        filtered?;
        unmapped?;

        task.dispatch.release_tile(&tile);
    }
}
