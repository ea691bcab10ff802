//! Frame driver.
//!
//! Walks the output frame list serially; for each frame with a non-empty
//! output path it computes the temporal neighbor set, runs a [`FrameTask`]
//! through load/exec/save, and aborts the whole run on the first failure so
//! no silent partial output is produced. Outputs already promoted for
//! earlier frames stay on disk.

use crate::error::Result;
use crate::options::DenoiseOptions;
use crate::task::FrameTask;
use denoise_device::Device;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// Multi-frame denoiser bound to one device.
pub struct Denoiser {
    device: Arc<dyn Device>,
    options: DenoiseOptions,
    input: Vec<PathBuf>,
    output: Vec<PathBuf>,
}

impl Denoiser {
    /// Creates a denoiser running on `device` with the given options.
    pub fn new(device: Arc<dyn Device>, options: DenoiseOptions) -> Self {
        Self {
            device,
            options,
            input: Vec::new(),
            output: Vec::new(),
        }
    }

    /// Sets the paired input and output frame lists.
    ///
    /// Both lists must have equal length; an empty output path skips that
    /// frame (it still serves as temporal context for its neighbors).
    pub fn set_frames(&mut self, input: Vec<PathBuf>, output: Vec<PathBuf>) {
        debug_assert_eq!(input.len(), output.len());
        self.input = input;
        self.output = output;
    }

    /// Frames within the temporal half-window of `frame`, center excluded.
    fn neighbor_frames(&self, frame: usize) -> Vec<usize> {
        let radius = self.options.neighbor_frames;
        let lo = frame.saturating_sub(radius);
        let hi = (frame + radius).min(self.output.len().saturating_sub(1));
        (lo..=hi).filter(|&f| f != frame).collect()
    }

    /// Denoises every frame with a non-empty output path.
    pub fn run(&self) -> Result<()> {
        let num_frames = self.output.len();
        for frame in 0..num_frames {
            if self.output[frame].as_os_str().is_empty() {
                continue;
            }
            let neighbors = self.neighbor_frames(frame);
            info!(frame, neighbors = neighbors.len(), "denoising frame");

            let mut task = FrameTask::new(frame, num_frames, neighbors, self.options.clone());
            task.load(&self.input)?;
            task.exec(self.device.as_ref())?;
            task.save(&self.output[frame])?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use denoise_device::CpuDevice;

    fn denoiser_with(num_frames: usize, radius: usize) -> Denoiser {
        let mut denoiser = Denoiser::new(
            Arc::new(CpuDevice::new(1)),
            DenoiseOptions {
                neighbor_frames: radius,
                ..Default::default()
            },
        );
        let paths: Vec<PathBuf> = (0..num_frames)
            .map(|i| PathBuf::from(format!("{i}.exr")))
            .collect();
        denoiser.set_frames(paths.clone(), paths);
        denoiser
    }

    #[test]
    fn test_neighbor_set_clamped_to_range() {
        let denoiser = denoiser_with(5, 2);
        assert_eq!(denoiser.neighbor_frames(0), vec![1, 2]);
        assert_eq!(denoiser.neighbor_frames(2), vec![0, 1, 3, 4]);
        assert_eq!(denoiser.neighbor_frames(4), vec![2, 3]);
    }

    #[test]
    fn test_zero_radius_has_no_neighbors() {
        let denoiser = denoiser_with(3, 0);
        for frame in 0..3 {
            assert!(denoiser.neighbor_frames(frame).is_empty());
        }
    }
}
