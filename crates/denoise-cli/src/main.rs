//! denoise - standalone multi-frame render denoiser.
//!
//! Consumes multi-layer EXR frames carrying a noisy beauty pass plus the
//! auxiliary denoising feature passes, and writes denoised frames back
//! preserving the container's structure and metadata.

use anyhow::{Context, Result, bail};
use clap::Parser;
use denoise_device::CpuDevice;
use denoise_pipeline::{DENOISE_MAX_FRAMES, DenoiseOptions, Denoiser};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "denoise")]
#[command(author, version, about = "Multi-frame render denoiser")]
#[command(long_about = "
Denoises rendered frames using their denoising feature passes.

Inputs and outputs are paired by position; pass an empty output path (\"\")
to skip writing a frame while still using it as temporal context.

Examples:
  denoise noisy.exr -o clean.exr
  denoise f0.exr f1.exr f2.exr -o o0.exr o1.exr o2.exr --neighbor-frames 1
  denoise f0.exr f1.exr f2.exr -o \"\" o1.exr \"\" --neighbor-frames 1
")]
struct Cli {
    /// Input frames in playback order.
    #[arg(required = true)]
    input: Vec<PathBuf>,

    /// Output path per input frame; an empty path skips that frame.
    #[arg(short, long, required = true, num_args = 1..)]
    output: Vec<PathBuf>,

    /// Temporal half-window: use frames within this distance as context.
    #[arg(long, default_value_t = 0)]
    neighbor_frames: usize,

    /// Denoising radius; the intensity feature is pre-blurred with 5x this.
    #[arg(long, default_value_t = 8)]
    radius: u32,

    /// Clamp input features to +-1e8 before filtering.
    #[arg(long)]
    clamp_input: bool,

    /// Tile size in pixels.
    #[arg(long, num_args = 2, value_names = ["WIDTH", "HEIGHT"], default_values_t = [64, 64])]
    tile_size: Vec<usize>,

    /// Override per-layer sample counts (0 reads cycles.<layer>.samples).
    #[arg(long, default_value_t = 0)]
    samples: u32,

    /// Device worker threads (0 = one per core).
    #[arg(long, default_value_t = 0)]
    threads: usize,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Initialize tracing based on verbosity level.
fn init_tracing(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if cli.input.len() != cli.output.len() {
        bail!(
            "got {} input frames but {} output paths",
            cli.input.len(),
            cli.output.len()
        );
    }
    // Mid-sequence frames see neighbors on both sides of the window.
    if cli.neighbor_frames * 2 > DENOISE_MAX_FRAMES - 1 {
        bail!(
            "--neighbor-frames {} needs up to {} context frames, more than the supported {}",
            cli.neighbor_frames,
            cli.neighbor_frames * 2,
            DENOISE_MAX_FRAMES - 1
        );
    }
    if cli.tile_size.iter().any(|&t| t == 0) {
        bail!("tile size must be positive");
    }

    let options = DenoiseOptions {
        neighbor_frames: cli.neighbor_frames,
        radius: cli.radius,
        clamp_input: cli.clamp_input,
        tile_size: (cli.tile_size[0], cli.tile_size[1]),
        samples_override: cli.samples,
        threads: cli.threads,
    };

    info!(
        frames = cli.input.len(),
        neighbor_frames = options.neighbor_frames,
        radius = options.radius,
        "starting denoise run"
    );
    let device = Arc::new(CpuDevice::new(cli.threads));
    let mut denoiser = Denoiser::new(device, options);
    denoiser.set_frames(cli.input, cli.output);
    denoiser.run().context("denoising failed")?;
    info!("denoise run finished");
    Ok(())
}
