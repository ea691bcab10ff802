//! End-to-end denoising scenarios over real EXR files.

use denoise_core::spec::{AttrValue, ImageSpec, SampleKind};
use denoise_core::{input_channels, output_channels};
use denoise_device::CpuDevice;
use denoise_pipeline::{DenoiseOptions, Denoiser};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

const NOISY: [f32; 3] = [0.25, 0.5, 0.75];

/// Spec with the full denoising channel set for each named layer.
fn layer_spec(width: usize, height: usize, layers: &[&str]) -> ImageSpec {
    let mut spec = ImageSpec::new(width, height);
    for layer in layers {
        for ch in input_channels() {
            spec.push_channel(format!("{layer}.{}", ch.name));
        }
        for ch in output_channels() {
            spec.push_channel(format!("{layer}.{}", ch.name));
        }
    }
    spec
}

/// Interleaved pixels with constant features and the given noisy color.
fn fill_pixels(spec: &ImageSpec, noisy: [f32; 3]) -> Vec<f32> {
    let num_channels = spec.num_channels();
    let mut pixels = vec![0.0f32; spec.sample_count()];
    for (channel, desc) in spec.channels.iter().enumerate() {
        let name = desc.name.as_str();
        let value = if name.contains("Noisy Image.") {
            noisy[["R", "G", "B"]
                .iter()
                .position(|c| name.ends_with(c))
                .unwrap()]
        } else if name.contains("Denoising Normal") {
            if name.ends_with(".Z") { 1.0 } else { 0.0 }
        } else if name.contains("Denoising Depth") {
            1.0
        } else if name.contains("Denoising Albedo") {
            0.5
        } else if name.contains("Denoising Variance") {
            1e-4
        } else if name.contains("Denoising Intensity") {
            0.5
        } else {
            0.0
        };
        for i in 0..spec.width * spec.height {
            pixels[i * num_channels + channel] = value;
        }
    }
    pixels
}

fn write_frame(path: &Path, spec: &ImageSpec, pixels: &[f32]) {
    denoise_exr::write_f32(path, spec, pixels).unwrap();
}

/// Reads a file into (spec, per-channel-name planes).
fn read_planes(path: &Path) -> (ImageSpec, HashMap<String, Vec<f32>>) {
    let source = denoise_exr::ExrSource::open(path).unwrap();
    let spec = source.spec().clone();
    let pixels = source.read_all_f32().unwrap();
    let num_channels = spec.num_channels();
    let mut planes = HashMap::new();
    for (channel, desc) in spec.channels.iter().enumerate() {
        let plane: Vec<f32> = (0..spec.width * spec.height)
            .map(|i| pixels[i * num_channels + channel])
            .collect();
        planes.insert(desc.name.clone(), plane);
    }
    (spec, planes)
}

fn denoiser(options: DenoiseOptions, input: Vec<PathBuf>, output: Vec<PathBuf>) -> Denoiser {
    let threads = options.threads;
    let mut denoiser = Denoiser::new(Arc::new(CpuDevice::new(threads)), options);
    denoiser.set_frames(input, output);
    denoiser
}

fn assert_no_temp_files(dir: &Path) {
    for entry in std::fs::read_dir(dir).unwrap() {
        let name = entry.unwrap().file_name().to_string_lossy().into_owned();
        assert!(
            !name.contains(".denoise-tmp-"),
            "stale temp file left behind: {name}"
        );
    }
}

/// S1: one frame, one layer, samples from metadata.
#[test]
fn single_frame_single_layer() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.exr");
    let output = dir.path().join("out.exr");

    let mut spec = layer_spec(48, 20, &["RenderLayer"]);
    spec.set_attr("cycles.RenderLayer.samples", "16");
    let pixels = fill_pixels(&spec, NOISY);
    write_frame(&input, &spec, &pixels);

    let options = DenoiseOptions {
        neighbor_frames: 0,
        radius: 0,
        clamp_input: false,
        threads: 2,
        ..Default::default()
    };
    denoiser(options, vec![input.clone()], vec![output.clone()])
        .run()
        .unwrap();

    assert!(output.is_file());
    assert_no_temp_files(dir.path());

    let (in_spec, in_planes) = read_planes(&input);
    let (out_spec, out_planes) = read_planes(&output);

    // Structure and metadata preserved.
    assert_eq!(out_spec.width, in_spec.width);
    assert_eq!(out_spec.height, in_spec.height);
    assert_eq!(out_spec.channel_names(), in_spec.channel_names());
    assert_eq!(
        out_spec.get_string("cycles.RenderLayer.samples"),
        Some("16")
    );

    // Constant noisy input denoises to the same constant.
    for (k, name) in ["R", "G", "B"].iter().enumerate() {
        for v in &out_planes[&format!("RenderLayer.Combined.{name}")] {
            approx::assert_relative_eq!(*v, NOISY[k], max_relative = 1e-4);
        }
    }

    // Every non-combined channel is untouched.
    for (name, plane) in &in_planes {
        if !name.contains("Combined") {
            assert_eq!(plane, &out_planes[name], "channel {name} was modified");
        }
    }
}

/// S2: missing samples metadata fails before any output is written.
#[test]
fn missing_samples_fails() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.exr");
    let output = dir.path().join("out.exr");

    let spec = layer_spec(16, 16, &["RenderLayer"]);
    let pixels = fill_pixels(&spec, NOISY);
    write_frame(&input, &spec, &pixels);

    let err = denoiser(
        DenoiseOptions::default(),
        vec![input],
        vec![output.clone()],
    )
    .run()
    .unwrap_err();

    assert!(err.to_string().contains("RenderLayer"), "got: {err}");
    assert!(!output.exists());
    assert_no_temp_files(dir.path());
}

/// S3: three temporal frames denoise to three outputs, inputs untouched.
#[test]
fn temporal_three_frames() {
    let dir = tempfile::tempdir().unwrap();
    let mut spec = layer_spec(32, 16, &["RenderLayer"]);
    spec.set_attr("cycles.RenderLayer.samples", "8");
    let pixels = fill_pixels(&spec, NOISY);

    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for i in 0..3 {
        let input = dir.path().join(format!("in{i}.exr"));
        write_frame(&input, &spec, &pixels);
        inputs.push(input);
        outputs.push(dir.path().join(format!("out{i}.exr")));
    }

    let options = DenoiseOptions {
        neighbor_frames: 1,
        radius: 0,
        threads: 2,
        ..Default::default()
    };
    denoiser(options, inputs.clone(), outputs.clone())
        .run()
        .unwrap();

    for output in &outputs {
        assert!(output.is_file());
    }
    assert_no_temp_files(dir.path());

    // Source frames were only read.
    for input in &inputs {
        let (_, planes) = read_planes(input);
        for (k, name) in ["R", "G", "B"].iter().enumerate() {
            for v in &planes[&format!("RenderLayer.Noisy Image.{name}")] {
                assert_eq!(*v, NOISY[k]);
            }
        }
    }

    let (_, planes) = read_planes(&outputs[1]);
    for v in &planes["RenderLayer.Combined.R"] {
        approx::assert_relative_eq!(*v, NOISY[0], max_relative = 1e-4);
    }
}

/// S4: a neighbor with different dimensions aborts the run at its frame.
#[test]
fn neighbor_dimension_mismatch() {
    let dir = tempfile::tempdir().unwrap();
    let mut spec = layer_spec(24, 16, &["RenderLayer"]);
    spec.set_attr("cycles.RenderLayer.samples", "8");
    let mut short_spec = layer_spec(24, 8, &["RenderLayer"]);
    short_spec.set_attr("cycles.RenderLayer.samples", "8");

    let mut inputs = Vec::new();
    let mut outputs = Vec::new();
    for i in 0..3 {
        let input = dir.path().join(format!("in{i}.exr"));
        let frame_spec = if i == 2 { &short_spec } else { &spec };
        write_frame(&input, frame_spec, &fill_pixels(frame_spec, NOISY));
        inputs.push(input);
        outputs.push(dir.path().join(format!("out{i}.exr")));
    }

    let options = DenoiseOptions {
        neighbor_frames: 1,
        radius: 0,
        ..Default::default()
    };
    let err = denoiser(options, inputs, outputs.clone())
        .run()
        .unwrap_err();

    assert!(err.to_string().contains("neighbor frame"), "got: {err}");
    // Frame 0 (neighbors: frame 1 only) finished before the failure.
    assert!(outputs[0].is_file());
    assert!(!outputs[1].exists());
    assert!(!outputs[2].exists());
    assert_no_temp_files(dir.path());
}

/// S5: channels outside the denoising set pass through unchanged.
#[test]
fn extra_channels_pass_through() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.exr");
    let output = dir.path().join("out.exr");

    let mut spec = layer_spec(16, 16, &["RenderLayer"]);
    spec.push_channel("Shadow.R");
    spec.push_channel("Mist.Z");
    spec.set_attr("cycles.RenderLayer.samples", "4");

    let num_channels = spec.num_channels();
    let mut pixels = fill_pixels(&spec, NOISY);
    for (channel, desc) in spec.channels.iter().enumerate() {
        if desc.name == "Shadow.R" || desc.name == "Mist.Z" {
            for i in 0..spec.width * spec.height {
                pixels[i * num_channels + channel] = i as f32 * 0.125;
            }
        }
    }
    write_frame(&input, &spec, &pixels);

    denoiser(
        DenoiseOptions {
            radius: 0,
            ..Default::default()
        },
        vec![input.clone()],
        vec![output.clone()],
    )
    .run()
    .unwrap();

    let (out_spec, out_planes) = read_planes(&output);
    let (in_spec, in_planes) = read_planes(&input);
    assert_eq!(out_spec.channel_names(), in_spec.channel_names());
    assert_eq!(out_planes["Shadow.R"], in_planes["Shadow.R"]);
    assert_eq!(out_planes["Mist.Z"], in_planes["Mist.Z"]);
}

/// S6: both views of a multi-view file are detected and denoised.
#[test]
fn multi_view_denoises_both_views() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.exr");
    let output = dir.path().join("out.exr");

    let mut spec = ImageSpec::new(16, 12);
    for view in ["left", "right"] {
        for ch in input_channels().iter().chain(output_channels().iter()) {
            let (pass, comp) = ch.name.rsplit_once('.').unwrap();
            spec.push_channel(format!("RenderLayer.{pass}.{view}.{comp}"));
        }
    }
    spec.set_attr(
        "multiView",
        AttrValue::StrList(vec!["left".into(), "right".into()]),
    );
    spec.set_attr("cycles.RenderLayer.left.samples", "8");
    spec.set_attr("cycles.RenderLayer.right.samples", "8");

    let pixels = fill_pixels(&spec, NOISY);
    write_frame(&input, &spec, &pixels);

    denoiser(
        DenoiseOptions {
            radius: 0,
            ..Default::default()
        },
        vec![input],
        vec![output.clone()],
    )
    .run()
    .unwrap();

    let (_, planes) = read_planes(&output);
    for view in ["left", "right"] {
        for (k, name) in ["R", "G", "B"].iter().enumerate() {
            let plane = &planes[&format!("RenderLayer.Combined.{view}.{name}")];
            for v in plane {
                approx::assert_relative_eq!(*v, NOISY[k], max_relative = 1e-4);
            }
        }
    }
}

/// With a zero temporal window, neighbor files are never opened: garbage
/// neighbors do not fail the run, and empty output paths skip frames.
#[test]
fn zero_neighbor_window_opens_no_neighbors() {
    let dir = tempfile::tempdir().unwrap();
    let garbage0 = dir.path().join("bad0.exr");
    let garbage2 = dir.path().join("bad2.exr");
    std::fs::write(&garbage0, b"not an exr").unwrap();
    std::fs::write(&garbage2, b"not an exr").unwrap();

    let input = dir.path().join("in.exr");
    let output = dir.path().join("out.exr");
    let mut spec = layer_spec(16, 16, &["RenderLayer"]);
    spec.set_attr("cycles.RenderLayer.samples", "4");
    write_frame(&input, &spec, &fill_pixels(&spec, NOISY));

    let options = DenoiseOptions {
        neighbor_frames: 0,
        radius: 0,
        ..Default::default()
    };
    denoiser(
        options,
        vec![garbage0, input, garbage2],
        vec![PathBuf::new(), output.clone(), PathBuf::new()],
    )
    .run()
    .unwrap();

    assert!(output.is_file());
}

/// Same inputs and parameters produce byte-identical outputs, even with
/// parallel tile workers.
#[test]
fn denoising_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.exr");

    let mut spec = layer_spec(40, 24, &["RenderLayer"]);
    spec.set_attr("cycles.RenderLayer.samples", "4");
    let num_channels = spec.num_channels();
    let mut pixels = fill_pixels(&spec, NOISY);
    // Perturb the noisy pass so filtering actually mixes pixels.
    for (channel, desc) in spec.channels.iter().enumerate() {
        if desc.name.contains("Noisy Image") {
            for i in 0..spec.width * spec.height {
                pixels[i * num_channels + channel] += ((i * 31 + channel * 7) % 17) as f32 * 0.01;
            }
        }
    }
    write_frame(&input, &spec, &pixels);

    let mut results = Vec::new();
    for run in 0..2 {
        let output = dir.path().join(format!("out{run}.exr"));
        let options = DenoiseOptions {
            tile_size: (16, 16),
            threads: 4,
            ..Default::default()
        };
        denoiser(options, vec![input.clone()], vec![output.clone()])
            .run()
            .unwrap();
        let source = denoise_exr::ExrSource::open(&output).unwrap();
        results.push(source.read_all_f32().unwrap());
    }
    assert_eq!(results[0], results[1]);
}

/// A layer missing one input channel is dropped; the file still denoises
/// through the surviving layer.
#[test]
fn incomplete_layer_dropped_file_still_denoises() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("in.exr");
    let output = dir.path().join("out.exr");

    let mut spec = layer_spec(16, 16, &["RenderLayer"]);
    // Second layer without the intensity pass.
    for ch in input_channels() {
        if ch.name != "Denoising Intensity.X" {
            spec.push_channel(format!("Partial.{}", ch.name));
        }
    }
    for ch in output_channels() {
        spec.push_channel(format!("Partial.{}", ch.name));
    }
    spec.set_attr("cycles.RenderLayer.samples", "4");

    write_frame(&input, &spec, &fill_pixels(&spec, NOISY));

    denoiser(
        DenoiseOptions {
            radius: 0,
            ..Default::default()
        },
        vec![input.clone()],
        vec![output.clone()],
    )
    .run()
    .unwrap();

    // The partial layer's combined pass was left alone.
    let (_, in_planes) = read_planes(&input);
    let (_, out_planes) = read_planes(&output);
    assert_eq!(in_planes["Partial.Combined.R"], out_planes["Partial.Combined.R"]);
    for v in &out_planes["RenderLayer.Combined.G"] {
        approx::assert_relative_eq!(*v, NOISY[1], max_relative = 1e-4);
    }
}

/// Misuse guard: SampleKind is part of the public surface used by tools
/// that build specs by hand.
#[test]
fn spec_defaults_are_f32() {
    let spec = layer_spec(4, 4, &["L"]);
    assert!(spec.channels.iter().all(|c| c.kind == SampleKind::F32));
}
