//! Image store.
//!
//! An [`Image`] owns the center frame's pixels, the detected render layers
//! and the opened neighbor frame readers. The center frame is decoded once
//! at load; neighbor frames stay open and are re-read per layer, reshuffled
//! straight into the packed device layout.
//!
//! Write-back is atomic: the output is encoded to a sibling temp file and
//! renamed over the target only on success, so a failed run never leaves a
//! truncated container at the output path.

use crate::error::{DenoiseError, Result};
use crate::options::DENOISE_MAX_FRAMES;
use denoise_core::layer::RenderLayer;
use denoise_core::spec::ImageSpec;
use denoise_core::{CoreError, parse_channels};
use denoise_exr::{ExrSource, temp_output_path, write_f32};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info};

/// Shared handle to the center frame's interleaved pixel buffer.
///
/// Tile write-back runs on device worker threads while the image itself is
/// owned by the frame task, so the buffer lives behind a mutex. Writers
/// target disjoint tile rectangles; the lock is scoped to one tile's copy.
pub type PixelsHandle = Arc<Mutex<Vec<f32>>>;

/// A loaded center frame with its neighbor readers.
#[derive(Debug)]
pub struct Image {
    /// Image width in pixels.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
    /// Channels per pixel in the container.
    pub num_channels: usize,
    /// Render layers that carry complete denoising data.
    pub layers: Vec<RenderLayer>,
    spec: ImageSpec,
    pixels: PixelsHandle,
    neighbors: Vec<ExrSource>,
}

impl Image {
    /// Opens and decodes the center frame.
    ///
    /// Fails if the path is not a regular file, the container cannot be
    /// opened or read, no layer carries the denoising channel set, or a
    /// layer's sample count cannot be resolved.
    pub fn load(path: &Path, samples_override: u32) -> Result<Self> {
        if !path.is_file() {
            return Err(DenoiseError::NotAFile {
                path: path.to_path_buf(),
            });
        }
        let source = ExrSource::open(path).map_err(|source| DenoiseError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let spec = source.spec().clone();
        let layers = parse_channels(&spec, samples_override).map_err(|err| match err {
            CoreError::NoUsableLayer => DenoiseError::LayerMissing {
                path: path.to_path_buf(),
            },
            other => DenoiseError::Metadata {
                path: path.to_path_buf(),
                source: other,
            },
        })?;
        let pixels = source.read_all_f32().map_err(|source| DenoiseError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        info!(
            path = %path.display(),
            width = spec.width,
            height = spec.height,
            layers = layers.len(),
            "loaded center frame"
        );
        Ok(Self {
            width: spec.width,
            height: spec.height,
            num_channels: spec.num_channels(),
            layers,
            spec,
            pixels: Arc::new(Mutex::new(pixels)),
            neighbors: Vec::new(),
        })
    }

    /// Opens the temporal neighbor frames for streaming reads.
    ///
    /// Each neighbor must match the center frame's dimensions and carry
    /// every channel the center's layers use; the per-layer neighbor
    /// reshuffle tables are filled here. Fails fast on the first mismatch.
    pub fn load_neighbors(&mut self, paths: &[PathBuf]) -> Result<()> {
        if paths.len() > DENOISE_MAX_FRAMES - 1 {
            return Err(DenoiseError::CapExceeded {
                requested: paths.len(),
                max: DENOISE_MAX_FRAMES - 1,
            });
        }
        for path in paths {
            let source = ExrSource::open(path).map_err(|source| DenoiseError::Open {
                path: path.clone(),
                source,
            })?;
            let spec = source.spec();
            if spec.width != self.width || spec.height != self.height {
                return Err(DenoiseError::NeighborMismatch {
                    path: path.clone(),
                    reason: format!(
                        "is {}x{}, expected {}x{}",
                        spec.width, spec.height, self.width, self.height
                    ),
                });
            }
            let center_names = self.spec.channel_names();
            let neighbor_names = spec.channel_names();
            for layer in &mut self.layers {
                layer
                    .match_neighbor_channels(&center_names, &neighbor_names)
                    .map_err(|err| DenoiseError::NeighborMismatch {
                        path: path.clone(),
                        reason: err.to_string(),
                    })?;
            }
            debug!(path = %path.display(), "opened neighbor frame");
            self.neighbors.push(source);
        }
        Ok(())
    }

    /// Number of opened neighbor frames.
    pub fn num_neighbors(&self) -> usize {
        self.neighbors.len()
    }

    /// Handle to the center pixel buffer, shared with tile write-back.
    pub fn pixels(&self) -> PixelsHandle {
        Arc::clone(&self.pixels)
    }

    /// The header snapshot preserved for write-back.
    pub fn spec(&self) -> &ImageSpec {
        &self.spec
    }

    /// Copies the center frame into `dst` in packed kernel layout:
    /// `dst[i * 15 + slot] = pixels[i * num_channels + remap[slot]]`.
    pub fn read_pixels(&self, layer: &RenderLayer, dst: &mut [f32]) {
        let pixels = self.pixels.lock().unwrap_or_else(PoisonError::into_inner);
        reshuffle(
            &pixels,
            self.num_channels,
            &layer.input_to_image_channel,
            dst,
        );
    }

    /// Decodes one neighbor frame and copies it into `dst` in packed
    /// kernel layout, using the layer's neighbor reshuffle table.
    pub fn read_neighbor_pixels(
        &self,
        neighbor: usize,
        layer: &RenderLayer,
        dst: &mut [f32],
    ) -> Result<()> {
        let source = &self.neighbors[neighbor];
        let pixels = source
            .read_all_f32()
            .map_err(|err| DenoiseError::Read {
                path: source.path().to_path_buf(),
                source: err,
            })?;
        reshuffle(
            &pixels,
            source.spec().num_channels(),
            &layer.neighbor_input_to_image_channel[neighbor],
            dst,
        );
        Ok(())
    }

    /// Writes the (now partially denoised) center frame to `path`.
    ///
    /// The output clones the input spec; layers that resolved their sample
    /// count from an override get a `cycles.<layer>.samples` attribute
    /// added so downstream tools can still find it. Encoding goes to a
    /// sibling temp file which is renamed over the target on success and
    /// removed on any failure.
    pub fn save_output(&mut self, path: &Path) -> Result<()> {
        let mut spec = self.spec.clone();
        for layer in &self.layers {
            let key = format!("cycles.{}.samples", layer.name);
            if spec.get_string(&key).is_none() {
                spec.set_attr(key, layer.samples.to_string());
            }
        }

        // Neighbor readers are no longer needed once saving starts.
        self.neighbors.clear();

        let temp = temp_output_path(path);
        let written = {
            let pixels = self.pixels.lock().unwrap_or_else(PoisonError::into_inner);
            write_f32(&temp, &spec, &pixels)
        };
        if let Err(source) = written {
            let _ = std::fs::remove_file(&temp);
            return Err(DenoiseError::Write {
                path: temp,
                source,
            });
        }
        if let Err(source) = std::fs::rename(&temp, path) {
            let _ = std::fs::remove_file(&temp);
            return Err(DenoiseError::Rename {
                from: temp,
                to: path.to_path_buf(),
                source,
            });
        }
        info!(path = %path.display(), "wrote denoised frame");
        Ok(())
    }
}

/// Gathers packed records from an interleaved buffer through a remap table.
fn reshuffle(pixels: &[f32], num_channels: usize, remap: &[usize], dst: &mut [f32]) {
    let slots = remap.len();
    for (i, record) in dst.chunks_exact_mut(slots).enumerate() {
        let base = i * num_channels;
        for (slot, channel) in remap.iter().enumerate() {
            record[slot] = pixels[base + channel];
        }
    }
}
