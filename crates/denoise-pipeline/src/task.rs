//! Per-frame denoising task.
//!
//! A [`FrameTask`] binds one center frame to a device: `load` decodes the
//! frame, opens its temporal neighbors and assembles the packed input
//! buffer (center slab first, one slab per neighbor); `exec` submits one
//! device task per layer and blocks on the device; `save` promotes the
//! result. The device drives tile work through a [`LayerContext`], the
//! capability object implementing the five tile callbacks.
//!
//! Locking: the tile queue and the output-buffer registry each have their
//! own mutex, held only across pop and insert/remove. The center pixel
//! buffer has a third lock scoped to one tile's seed or write-back copy;
//! tiles cover disjoint rectangles, so copies never overlap.

use crate::error::Result;
use crate::image::{Image, PixelsHandle};
use crate::options::DenoiseOptions;
use crate::preprocess;
use crate::tiles::TileQueue;
use denoise_core::Rect;
use denoise_core::channels::{INPUT_NOISY_IMAGE, INPUT_NUM_CHANNELS, OUTPUT_NUM_CHANNELS};
use denoise_core::layer::RenderLayer;
use denoise_device::{
    DenoiseParams, Device, DeviceBuffer, DeviceError, DeviceResult, DeviceTask, DeviceTile,
    NEIGHBORHOOD_CENTER, NEIGHBORHOOD_TARGET, TileDispatch, TileNeighborhood,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::info;

/// Denoises one output frame.
pub struct FrameTask {
    frame: usize,
    frame_label: Option<usize>,
    neighbor_frames: Vec<usize>,
    options: DenoiseOptions,
    image: Option<Image>,
    input: DeviceBuffer,
}

impl FrameTask {
    /// Creates a task for `frame` with the given absolute neighbor frame
    /// indices. Progress lines carry the frame number when the run has
    /// more than one output frame.
    pub fn new(
        frame: usize,
        num_output_frames: usize,
        neighbor_frames: Vec<usize>,
        options: DenoiseOptions,
    ) -> Self {
        Self {
            frame,
            frame_label: (num_output_frames > 1).then_some(frame),
            neighbor_frames,
            options,
            image: None,
            input: DeviceBuffer::default(),
        }
    }

    /// The loaded image, once [`FrameTask::load`] has run.
    pub fn image(&self) -> Option<&Image> {
        self.image.as_ref()
    }

    /// Loads the center frame and its neighbors, allocates the packed
    /// input buffer and fills it for the first layer.
    pub fn load(&mut self, input_paths: &[PathBuf]) -> Result<()> {
        let mut image = Image::load(&input_paths[self.frame], self.options.samples_override)?;
        let neighbor_paths: Vec<PathBuf> = self
            .neighbor_frames
            .iter()
            .map(|&f| input_paths[f].clone())
            .collect();
        image.load_neighbors(&neighbor_paths)?;

        let frame_stride = image.width * image.height * INPUT_NUM_CHANNELS;
        self.input = DeviceBuffer::alloc(frame_stride * (1 + image.num_neighbors()));
        load_input_pixels(&image, &self.input, 0, &self.options)?;
        self.image = Some(image);
        Ok(())
    }

    /// Runs the device over every layer in discovery order.
    ///
    /// Layer 0 reuses the pixels staged by `load`; later layers refill the
    /// input buffer before their device task is submitted.
    pub fn exec(&mut self, device: &dyn Device) -> Result<()> {
        let Some(image) = &self.image else {
            return Ok(());
        };
        let frame_stride = image.width * image.height * INPUT_NUM_CHANNELS;

        for layer_index in 0..image.layers.len() {
            if layer_index > 0 {
                load_input_pixels(image, &self.input, layer_index, &self.options)?;
            }
            let layer = image.layers[layer_index].clone();
            info!(frame = self.frame, layer = %layer.name, "denoising layer");

            let queue = TileQueue::new(
                image.width,
                image.height,
                self.options.tile_size,
                layer.samples,
                &self.input,
                self.frame_label,
            );
            let context = Arc::new(LayerContext {
                width: image.width,
                height: image.height,
                num_channels: image.num_channels,
                tile_size: self.options.tile_size,
                layer,
                queue,
                outputs: Mutex::new(HashMap::new()),
                pixels: image.pixels(),
                input: self.input.clone(),
            });
            let params = DenoiseParams {
                pass_stride: INPUT_NUM_CHANNELS,
                target_pass_stride: OUTPUT_NUM_CHANNELS,
                pass_denoising_data: 0,
                pass_denoising_clean: -1,
                frame_stride,
                frames: self
                    .neighbor_frames
                    .iter()
                    .map(|&f| f as i64 - self.frame as i64)
                    .collect(),
                do_filter: true,
                write_passes: false,
                from_render: false,
            };

            device.task_add(DeviceTask {
                params,
                dispatch: context,
                input: self.input.clone(),
            });
            device.task_wait()?;
        }
        Ok(())
    }

    /// Writes the denoised frame to `path` via temp-then-rename.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        match &mut self.image {
            Some(image) => image.save_output(path),
            None => Ok(()),
        }
    }
}

/// Fills the packed input buffer for one layer: center slab first, then
/// one slab per neighbor, followed by the preprocess passes.
fn load_input_pixels(
    image: &Image,
    input: &DeviceBuffer,
    layer_index: usize,
    options: &DenoiseOptions,
) -> Result<()> {
    let layer = &image.layers[layer_index];
    let frame_stride = image.width * image.height * INPUT_NUM_CHANNELS;
    {
        let mut guard = input.write();
        image.read_pixels(layer, &mut guard[..frame_stride]);
        for neighbor in 0..image.num_neighbors() {
            let start = (neighbor + 1) * frame_stride;
            image.read_neighbor_pixels(neighbor, layer, &mut guard[start..start + frame_stride])?;
        }
    }
    preprocess::apply(input, image.width, image.height, options);
    Ok(())
}

/// Tile callbacks for one layer of one frame.
///
/// Shared with the device's worker threads for the duration of a single
/// `task_wait`.
struct LayerContext {
    width: usize,
    height: usize,
    num_channels: usize,
    tile_size: (usize, usize),
    layer: RenderLayer,
    queue: TileQueue,
    outputs: Mutex<HashMap<usize, DeviceBuffer>>,
    pixels: PixelsHandle,
    input: DeviceBuffer,
}

impl TileDispatch for LayerContext {
    fn acquire_tile(&self, tile: &mut DeviceTile) -> bool {
        self.queue.acquire(tile)
    }

    fn map_neighboring_tiles(&self, hood: &mut TileNeighborhood) -> DeviceResult<()> {
        let center = hood.tiles[NEIGHBORHOOD_CENTER].clone();
        let (tile_w, tile_h) = self.tile_size;

        for i in 0..NEIGHBORHOOD_TARGET {
            if i == NEIGHBORHOOD_CENTER {
                continue;
            }
            let dx = (i % 3) as i64 - 1;
            let dy = (i / 3) as i64 - 1;
            let rect = Rect::from_clipped_bounds(
                center.x as i64 + dx * tile_w as i64,
                center.y as i64 + dy * tile_h as i64,
                center.x as i64 + (dx + 1) * tile_w as i64,
                center.y as i64 + (dy + 1) * tile_h as i64,
                self.width,
                self.height,
            );
            hood.tiles[i] = DeviceTile {
                x: rect.x,
                y: rect.y,
                w: rect.width,
                h: rect.height,
                tile_index: center.tile_index,
                start_sample: center.start_sample,
                num_samples: center.num_samples,
                stride: self.width,
                offset: 0,
                buffer: self.input.clone(),
            };
        }

        // The kernel may skip pixels, so the output starts as the noisy
        // image of the center rectangle.
        let output = DeviceBuffer::alloc(OUTPUT_NUM_CHANNELS * center.w * center.h);
        {
            let pixels = self.pixels.lock().unwrap_or_else(PoisonError::into_inner);
            let mut out = output.write();
            for y in 0..center.h {
                for x in 0..center.w {
                    let src = ((center.y + y) * self.width + center.x + x) * self.num_channels;
                    let dst = (y * center.w + x) * OUTPUT_NUM_CHANNELS;
                    for k in 0..OUTPUT_NUM_CHANNELS {
                        out[dst + k] =
                            pixels[src + self.layer.input_to_image_channel[INPUT_NOISY_IMAGE + k]];
                    }
                }
            }
        }

        let mut target = center.clone();
        target.buffer = output.clone();
        target.stride = center.w;
        target.offset = -((center.y * center.w + center.x) as i64);
        hood.tiles[NEIGHBORHOOD_TARGET] = target;

        let mut outputs = self.outputs.lock().unwrap_or_else(PoisonError::into_inner);
        if outputs.insert(center.tile_index, output).is_some() {
            return Err(DeviceError::TileAlreadyMapped {
                tile_index: center.tile_index,
            });
        }
        Ok(())
    }

    fn unmap_neighboring_tiles(&self, hood: &mut TileNeighborhood) -> DeviceResult<()> {
        let target = hood.target().clone();
        let output = {
            let mut outputs = self.outputs.lock().unwrap_or_else(PoisonError::into_inner);
            outputs
                .remove(&target.tile_index)
                .ok_or(DeviceError::TileNotMapped {
                    tile_index: target.tile_index,
                })?
        };

        // Copy back from the device, then scatter the combined channels of
        // the center rectangle; all other channels stay untouched.
        let data = output.to_vec();
        let mut pixels = self.pixels.lock().unwrap_or_else(PoisonError::into_inner);
        for y in 0..target.h {
            for x in 0..target.w {
                let src = (y * target.w + x) * OUTPUT_NUM_CHANNELS;
                let dst = ((target.y + y) * self.width + target.x + x) * self.num_channels;
                for k in 0..OUTPUT_NUM_CHANNELS {
                    pixels[dst + self.layer.output_to_image_channel[k]] = data[src + k];
                }
            }
        }
        Ok(())
    }

    fn release_tile(&self, _tile: &DeviceTile) {
        // Work was committed at unmap time.
    }

    fn cancelled(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Identity layer over a file that stores exactly the 15 input
    /// channels followed by the 3 output channels.
    fn identity_layer() -> RenderLayer {
        RenderLayer {
            name: "RenderLayer".into(),
            channels: Vec::new(),
            layer_to_image_channel: Vec::new(),
            input_to_image_channel: (0..INPUT_NUM_CHANNELS).collect(),
            output_to_image_channel: (INPUT_NUM_CHANNELS..INPUT_NUM_CHANNELS + 3).collect(),
            neighbor_input_to_image_channel: Vec::new(),
            samples: 4,
        }
    }

    fn context(width: usize, height: usize, tile: usize) -> LayerContext {
        let num_channels = INPUT_NUM_CHANNELS + 3;
        let mut pixels = vec![0.0f32; width * height * num_channels];
        for (i, px) in pixels.chunks_mut(num_channels).enumerate() {
            px[INPUT_NOISY_IMAGE] = i as f32;
            px[INPUT_NOISY_IMAGE + 1] = i as f32 + 0.25;
            px[INPUT_NOISY_IMAGE + 2] = i as f32 + 0.5;
        }
        let input = DeviceBuffer::alloc(width * height * INPUT_NUM_CHANNELS);
        let queue = TileQueue::new(width, height, (tile, tile), 4, &input, None);
        LayerContext {
            width,
            height,
            num_channels,
            tile_size: (tile, tile),
            layer: identity_layer(),
            queue,
            outputs: Mutex::new(HashMap::new()),
            pixels: Arc::new(Mutex::new(pixels)),
            input,
        }
    }

    fn acquire_and_map(ctx: &LayerContext) -> TileNeighborhood {
        let mut tile = DeviceTile::default();
        assert!(ctx.acquire_tile(&mut tile));
        let mut hood = TileNeighborhood::default();
        hood.tiles[NEIGHBORHOOD_CENTER] = tile;
        ctx.map_neighboring_tiles(&mut hood).unwrap();
        hood
    }

    #[test]
    fn test_corner_tile_neighbors_clipped() {
        let ctx = context(8, 8, 4);
        let hood = acquire_and_map(&ctx);

        // First tile sits at the top-left corner: the row above and the
        // column to the left are off-image.
        for i in [0, 1, 2, 3, 6] {
            assert!(hood.tiles[i].is_empty(), "slot {i} should be empty");
        }
        assert_eq!(hood.tiles[5].rect(), Rect::new(4, 0, 4, 4));
        assert_eq!(hood.tiles[7].rect(), Rect::new(0, 4, 4, 4));
        assert_eq!(hood.tiles[8].rect(), Rect::new(4, 4, 4, 4));
        assert_eq!(hood.bounds(), Rect::new(0, 0, 8, 8));

        // Context tiles address the shared input buffer in absolute
        // coordinates.
        for i in 0..NEIGHBORHOOD_TARGET {
            assert_eq!(hood.tiles[i].stride, 8);
            assert_eq!(hood.tiles[i].offset, 0);
        }
    }

    #[test]
    fn test_output_seeded_with_noisy_image() {
        let ctx = context(8, 8, 4);
        let hood = acquire_and_map(&ctx);

        let target = hood.target();
        assert_eq!(target.stride, 4);
        assert_eq!(target.offset, 0, "corner tile origin maps to buffer start");
        let seeded = target.buffer.to_vec();
        // Pixel (1, 1) of the image is record 9 in the tile-local buffer.
        let expected = (8 + 1) as f32;
        assert_eq!(seeded[(4 + 1) * 3], expected);
        assert_eq!(seeded[(4 + 1) * 3 + 1], expected + 0.25);
    }

    #[test]
    fn test_double_map_rejected() {
        let ctx = context(8, 8, 4);
        let hood = acquire_and_map(&ctx);

        let mut again = TileNeighborhood::default();
        again.tiles[NEIGHBORHOOD_CENTER] = hood.center().clone();
        let err = ctx.map_neighboring_tiles(&mut again).unwrap_err();
        assert!(matches!(err, DeviceError::TileAlreadyMapped { tile_index: 0 }));
    }

    #[test]
    fn test_unmap_writes_combined_only() {
        let ctx = context(8, 8, 4);
        let mut hood = acquire_and_map(&ctx);
        let before = ctx.pixels.lock().unwrap().clone();

        // Pretend the kernel produced all-sevens.
        {
            let target = hood.target();
            let mut out = target.buffer.write();
            out.fill(7.0);
        }
        ctx.unmap_neighboring_tiles(&mut hood).unwrap();

        let after = ctx.pixels.lock().unwrap().clone();
        let rect = hood.center().rect();
        for (i, (chunk_before, chunk_after)) in before
            .chunks(ctx.num_channels)
            .zip(after.chunks(ctx.num_channels))
            .enumerate()
        {
            let (x, y) = (i % 8, i / 8);
            for c in 0..ctx.num_channels {
                let is_combined = ctx.layer.output_to_image_channel.contains(&c);
                if is_combined && rect.contains(x, y) {
                    assert_eq!(chunk_after[c], 7.0);
                } else {
                    assert_eq!(chunk_after[c], chunk_before[c]);
                }
            }
        }
    }

    #[test]
    fn test_unmap_without_map_rejected() {
        let ctx = context(8, 8, 4);
        let mut hood = TileNeighborhood::default();
        hood.tiles[NEIGHBORHOOD_TARGET].tile_index = 3;
        let err = ctx.unmap_neighboring_tiles(&mut hood).unwrap_err();
        assert!(matches!(err, DeviceError::TileNotMapped { tile_index: 3 }));
    }

    #[test]
    fn test_interior_tile_target_offset() {
        let ctx = context(12, 12, 4);
        // Drain to the center tile of the 3x3 grid (index 4).
        let mut tile = DeviceTile::default();
        for _ in 0..5 {
            assert!(ctx.acquire_tile(&mut tile));
        }
        assert_eq!((tile.x, tile.y), (4, 4));

        let mut hood = TileNeighborhood::default();
        hood.tiles[NEIGHBORHOOD_CENTER] = tile;
        ctx.map_neighboring_tiles(&mut hood).unwrap();

        // All eight neighbors are full tiles here.
        for i in 0..NEIGHBORHOOD_TARGET {
            assert_eq!(hood.tiles[i].rect().area(), 16, "slot {i}");
        }
        let target = hood.target();
        // Tile origin (4, 4) maps to record 0 of the output buffer.
        assert_eq!(target.pixel_record(4, 4), 0);
        ctx.unmap_neighboring_tiles(&mut hood).unwrap();
    }
}
