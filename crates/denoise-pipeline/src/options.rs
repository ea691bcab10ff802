//! Denoiser configuration.

/// Compile-time cap on the total number of temporal frames, center
/// included. The packed input buffer grows by one full frame slab per
/// neighbor, so the cap bounds device memory for a frame.
pub const DENOISE_MAX_FRAMES: usize = 16;

/// User-facing denoising options.
#[derive(Debug, Clone)]
pub struct DenoiseOptions {
    /// Temporal half-window: frames within this distance of the center
    /// frame are supplied to the kernel as additional context.
    pub neighbor_frames: usize,
    /// Denoising radius. The intensity feature is pre-blurred with a box
    /// filter of radius `5 * radius`.
    pub radius: u32,
    /// Clamp all input features to +-1e8 before filtering.
    pub clamp_input: bool,
    /// Tile width and height in pixels.
    pub tile_size: (usize, usize),
    /// Overrides the per-layer sample count when positive; 0 reads the
    /// `cycles.<layer>.samples` metadata instead.
    pub samples_override: u32,
    /// Device worker threads, 0 for one per core.
    pub threads: usize,
}

impl Default for DenoiseOptions {
    fn default() -> Self {
        Self {
            neighbor_frames: 0,
            radius: 8,
            clamp_input: false,
            tile_size: (64, 64),
            samples_override: 0,
            threads: 0,
        }
    }
}
