//! Feature preprocessing.
//!
//! Applied to every temporal slab of the packed input buffer before the
//! device task runs: an optional clamp of all features to +-1e8, then a
//! separable box blur of the intensity feature with radius `5 * radius`.
//! The blur averages over the true contributing sample count, so edge
//! pixels use a shorter window instead of padded values.

use crate::options::DenoiseOptions;
use denoise_core::channels::{INPUT_INTENSITY, INPUT_NUM_CHANNELS};
use denoise_device::DeviceBuffer;
use rayon::prelude::*;

const CLAMP_LIMIT: f32 = 1e8;

/// Preprocesses all frame slabs of the packed input buffer in place.
pub fn apply(input: &DeviceBuffer, width: usize, height: usize, options: &DenoiseOptions) {
    let mut guard = input.write();
    let frame_stride = width * height * INPUT_NUM_CHANNELS;
    for slab in guard.chunks_mut(frame_stride) {
        if options.clamp_input {
            clamp_slab(slab);
        }
        blur_intensity(slab, width, height, 5 * options.radius as usize);
    }
}

fn clamp_slab(slab: &mut [f32]) {
    slab.par_iter_mut()
        .for_each(|v| *v = v.clamp(-CLAMP_LIMIT, CLAMP_LIMIT));
}

/// Separable box blur of the intensity channel of one frame slab.
///
/// Horizontal pass averages `[max(x-r, 0), min(x+r+1, w))` into a scratch
/// plane; the vertical pass averages the scratch values over
/// `[max(y-r, 0), min(y+r+1, h))` back into the channel. With `r = 0` both
/// windows hold exactly one sample, making the blur the identity.
fn blur_intensity(slab: &mut [f32], width: usize, height: usize, radius: usize) {
    if radius == 0 {
        return;
    }

    let mut scratch = vec![0.0f32; width * height];
    scratch
        .par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            for x in 0..width {
                let x0 = x.saturating_sub(radius);
                let x1 = (x + radius + 1).min(width);
                let mut sum = 0.0f32;
                for i in x0..x1 {
                    sum += slab[(y * width + i) * INPUT_NUM_CHANNELS + INPUT_INTENSITY];
                }
                row[x] = sum / (x1 - x0) as f32;
            }
        });

    slab.par_chunks_mut(width * INPUT_NUM_CHANNELS)
        .enumerate()
        .for_each(|(y, row)| {
            let y0 = y.saturating_sub(radius);
            let y1 = (y + radius + 1).min(height);
            for x in 0..width {
                let mut sum = 0.0f32;
                for j in y0..y1 {
                    sum += scratch[j * width + x];
                }
                row[x * INPUT_NUM_CHANNELS + INPUT_INTENSITY] = sum / (y1 - y0) as f32;
            }
        });
}
