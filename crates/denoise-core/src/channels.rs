//! Canonical denoising channel map.
//!
//! The denoising kernel consumes a packed per-pixel record of exactly
//! [`INPUT_NUM_CHANNELS`] floats and produces [`OUTPUT_NUM_CHANNELS`]
//! floats. The slot offsets below are a wire contract with the kernel and
//! must not be reordered:
//!
//! | Slot | Pass |
//! |------|------|
//! | 0 | Denoising Depth.Z |
//! | 1–3 | Denoising Normal.X/Y/Z |
//! | 4 | Denoising Shadowing.X |
//! | 5–7 | Denoising Albedo.R/G/B |
//! | 8–10 | Noisy Image.R/G/B |
//! | 11–13 | Denoising Variance.R/G/B |
//! | 14 | Denoising Intensity.X |
//!
//! Output slots 0–2 hold the denoised Combined.R/G/B result.
//!
//! The layer resolver matches these `"pass.component"` names against the
//! per-layer channel lists discovered in the file and records where each
//! slot lives in the file's channel order (the reshuffle tables).

/// Input slot of the depth feature.
pub const INPUT_DEPTH: usize = 0;
/// First input slot of the shading normal (X, Y, Z).
pub const INPUT_NORMAL: usize = 1;
/// Input slot of the shadowing feature.
pub const INPUT_SHADOWING: usize = 4;
/// First input slot of the albedo feature (R, G, B).
pub const INPUT_ALBEDO: usize = 5;
/// First input slot of the noisy beauty image (R, G, B).
pub const INPUT_NOISY_IMAGE: usize = 8;
/// First input slot of the per-channel variance (R, G, B).
pub const INPUT_VARIANCE: usize = 11;
/// Input slot of the pre-blurred intensity feature.
pub const INPUT_INTENSITY: usize = 14;
/// Number of packed input channels per pixel.
pub const INPUT_NUM_CHANNELS: usize = 15;

/// First output slot of the denoised combined pass (R, G, B).
pub const OUTPUT_COMBINED: usize = 0;
/// Number of packed output channels per pixel.
pub const OUTPUT_NUM_CHANNELS: usize = 3;

/// A canonical slot together with its `"pass.component"` channel name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotName {
    /// Fixed offset in the packed per-pixel record.
    pub offset: usize,
    /// Channel name relative to the layer, e.g. `"Denoising Normal.X"`.
    pub name: &'static str,
}

const fn slot(offset: usize, name: &'static str) -> SlotName {
    SlotName { offset, name }
}

static INPUT_CHANNELS: [SlotName; INPUT_NUM_CHANNELS] = [
    slot(INPUT_DEPTH, "Denoising Depth.Z"),
    slot(INPUT_NORMAL, "Denoising Normal.X"),
    slot(INPUT_NORMAL + 1, "Denoising Normal.Y"),
    slot(INPUT_NORMAL + 2, "Denoising Normal.Z"),
    slot(INPUT_SHADOWING, "Denoising Shadowing.X"),
    slot(INPUT_ALBEDO, "Denoising Albedo.R"),
    slot(INPUT_ALBEDO + 1, "Denoising Albedo.G"),
    slot(INPUT_ALBEDO + 2, "Denoising Albedo.B"),
    slot(INPUT_NOISY_IMAGE, "Noisy Image.R"),
    slot(INPUT_NOISY_IMAGE + 1, "Noisy Image.G"),
    slot(INPUT_NOISY_IMAGE + 2, "Noisy Image.B"),
    slot(INPUT_VARIANCE, "Denoising Variance.R"),
    slot(INPUT_VARIANCE + 1, "Denoising Variance.G"),
    slot(INPUT_VARIANCE + 2, "Denoising Variance.B"),
    slot(INPUT_INTENSITY, "Denoising Intensity.X"),
];

static OUTPUT_CHANNELS: [SlotName; OUTPUT_NUM_CHANNELS] = [
    slot(OUTPUT_COMBINED, "Combined.R"),
    slot(OUTPUT_COMBINED + 1, "Combined.G"),
    slot(OUTPUT_COMBINED + 2, "Combined.B"),
];

/// The ordered list of required input channels.
pub fn input_channels() -> &'static [SlotName; INPUT_NUM_CHANNELS] {
    &INPUT_CHANNELS
}

/// The ordered list of produced output channels.
pub fn output_channels() -> &'static [SlotName; OUTPUT_NUM_CHANNELS] {
    &OUTPUT_CHANNELS
}
