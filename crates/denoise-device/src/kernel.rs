//! CPU denoising kernel.
//!
//! A feature-guided cross-bilateral filter: every output pixel is a
//! weighted average of noisy-image samples from a square window around it,
//! taken from all temporal slabs of the packed input buffer. Weights
//! combine the color distance scaled by per-channel variance with normal,
//! depth and albedo similarity, so edges guarded by the feature passes
//! survive while noise averages out.
//!
//! The kernel reads through the mapped neighborhood only: the window is
//! clipped to the union of the nine context rectangles. Output pixels whose
//! weight sum degenerates (non-finite input) keep their seeded noisy value.

use crate::error::{DeviceError, DeviceResult};
use crate::task::DenoiseParams;
use crate::tile::TileNeighborhood;
use denoise_core::channels::{
    INPUT_ALBEDO, INPUT_DEPTH, INPUT_NOISY_IMAGE, INPUT_NORMAL, INPUT_VARIANCE,
};

/// Half-width of the square sample window, in pixels.
const WINDOW_RADIUS: i64 = 7;

/// Filters one mapped neighborhood into its output tile.
pub fn filter_neighborhood(params: &DenoiseParams, hood: &TileNeighborhood) -> DeviceResult<()> {
    let center = hood.center();
    let target = hood.target();
    if center.is_empty() {
        return Ok(());
    }

    let input = center.buffer.read();
    let needed = params.num_frames() * params.frame_stride;
    if input.len() < needed {
        return Err(DeviceError::BufferTooSmall {
            len: input.len(),
            needed,
        });
    }
    let mut output = target.buffer.write();
    let out_needed = center.w * center.h * params.target_pass_stride;
    if output.len() < out_needed {
        return Err(DeviceError::BufferTooSmall {
            len: output.len(),
            needed: out_needed,
        });
    }

    if !params.do_filter {
        return Ok(());
    }

    let bounds = hood.bounds();
    let pass = params.pass_denoising_data;

    for y in center.y..center.y + center.h {
        for x in center.x..center.x + center.w {
            let c = center.pixel_record(x, y) * params.pass_stride + pass;
            let c_depth = input[c + INPUT_DEPTH];
            let c_normal = [
                input[c + INPUT_NORMAL],
                input[c + INPUT_NORMAL + 1],
                input[c + INPUT_NORMAL + 2],
            ];
            let c_albedo = [
                input[c + INPUT_ALBEDO],
                input[c + INPUT_ALBEDO + 1],
                input[c + INPUT_ALBEDO + 2],
            ];
            let c_noisy = [
                input[c + INPUT_NOISY_IMAGE],
                input[c + INPUT_NOISY_IMAGE + 1],
                input[c + INPUT_NOISY_IMAGE + 2],
            ];
            let c_var = [
                input[c + INPUT_VARIANCE],
                input[c + INPUT_VARIANCE + 1],
                input[c + INPUT_VARIANCE + 2],
            ];

            let y0 = (y as i64 - WINDOW_RADIUS).max(bounds.y as i64) as usize;
            let y1 = ((y as i64 + WINDOW_RADIUS + 1).min(bounds.bottom() as i64)) as usize;
            let x0 = (x as i64 - WINDOW_RADIUS).max(bounds.x as i64) as usize;
            let x1 = ((x as i64 + WINDOW_RADIUS + 1).min(bounds.right() as i64)) as usize;

            let mut sum = [0.0f32; 3];
            let mut weight_sum = 0.0f32;

            for frame in 0..params.num_frames() {
                let base = frame * params.frame_stride;
                for qy in y0..y1 {
                    for qx in x0..x1 {
                        let q = base + center.pixel_record(qx, qy) * params.pass_stride + pass;

                        let mut color_dist = 0.0f32;
                        for k in 0..3 {
                            let d = input[q + INPUT_NOISY_IMAGE + k] - c_noisy[k];
                            let var =
                                1e-4 + c_var[k].max(0.0) + input[q + INPUT_VARIANCE + k].max(0.0);
                            color_dist += d * d / var;
                        }

                        let mut normal_dot = 0.0f32;
                        let mut albedo_dist = 0.0f32;
                        for k in 0..3 {
                            normal_dot += c_normal[k] * input[q + INPUT_NORMAL + k];
                            let da = input[q + INPUT_ALBEDO + k] - c_albedo[k];
                            albedo_dist += da * da;
                        }
                        let q_depth = input[q + INPUT_DEPTH];
                        let depth_rel =
                            (c_depth - q_depth) / (c_depth.abs() + q_depth.abs() + 1e-3);

                        let weight = (-0.5 * color_dist
                            - 3.0 * (1.0 - normal_dot.clamp(0.0, 1.0))
                            - 4.0 * depth_rel * depth_rel
                            - 2.0 * albedo_dist)
                            .exp();
                        if weight > 0.0 {
                            weight_sum += weight;
                            for k in 0..3 {
                                sum[k] += weight * input[q + INPUT_NOISY_IMAGE + k];
                            }
                        }
                    }
                }
            }

            // Degenerate windows keep the seeded noisy value.
            if weight_sum > 0.0 && weight_sum.is_finite() {
                let t = target.pixel_record(x, y) * params.target_pass_stride;
                for k in 0..3 {
                    output[t + k] = sum[k] / weight_sum;
                }
            }
        }
    }

    Ok(())
}
