//! Writing multi-channel EXR containers.
//!
//! The writer re-encodes an interleaved f32 buffer against an
//! [`ImageSpec`] snapshot, restoring each channel's on-disk sample kind and
//! re-attaching the header attributes, so a read-modify-write cycle
//! preserves everything the denoiser did not touch.
//!
//! Output promotion is temp-then-rename: [`temp_output_path`] builds a
//! sibling path `<output>.denoise-tmp-<unique><ext>` that the caller writes
//! to and renames over the target on success.

use crate::error::{ExrError, ExrResult};
use denoise_core::spec::{AttrValue, ImageSpec, SampleKind};
use exr::image::{AnyChannel, AnyChannels, Encoding, FlatSamples, Image, Layer};
use exr::meta::attribute::{AttributeValue, Text};
use exr::meta::header::{ImageAttributes, LayerAttributes};
use exr::prelude::WritableImage;
use half::f16;
use smallvec::SmallVec;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

fn attr_text(name: &str) -> ExrResult<Text> {
    Text::new_or_none(name)
        .ok_or_else(|| ExrError::Encode(format!("unsupported characters in name {name:?}")))
}

fn convert_attribute(value: &AttrValue) -> ExrResult<AttributeValue> {
    Ok(match value {
        AttrValue::Int(v) => AttributeValue::I32(*v as i32),
        AttrValue::Float(v) => AttributeValue::F32(*v as f32),
        AttrValue::Str(s) => AttributeValue::Text(attr_text(s)?),
        AttrValue::StrList(list) => AttributeValue::TextVector(
            list.iter()
                .map(|s| attr_text(s))
                .collect::<ExrResult<Vec<Text>>>()?,
        ),
    })
}

/// Encodes an interleaved f32 buffer to a single-part EXR file.
///
/// `pixels` must hold `spec.sample_count()` floats in the snapshot's channel
/// order. Channels are stored with their original sample kinds; the
/// container keeps channels name-sorted, matching the order `open` reports.
pub fn write_f32<P: AsRef<Path>>(path: P, spec: &ImageSpec, pixels: &[f32]) -> ExrResult<()> {
    let path = path.as_ref();
    let width = spec.width;
    let height = spec.height;
    let num_channels = spec.num_channels();
    let pixel_count = width * height;
    if pixels.len() != spec.sample_count() {
        return Err(ExrError::Encode(format!(
            "pixel buffer holds {} samples, spec needs {}",
            pixels.len(),
            spec.sample_count()
        )));
    }

    let mut list: SmallVec<[AnyChannel<FlatSamples>; 4]> = SmallVec::new();
    for (channel_index, desc) in spec.channels.iter().enumerate() {
        let plane = (0..pixel_count).map(|i| pixels[i * num_channels + channel_index]);
        let sample_data = match desc.kind {
            SampleKind::F16 => FlatSamples::F16(plane.map(f16::from_f32).collect()),
            SampleKind::F32 => FlatSamples::F32(plane.collect()),
            SampleKind::U32 => FlatSamples::U32(plane.map(|v| v as u32).collect()),
        };
        list.push(AnyChannel {
            name: attr_text(&desc.name)?,
            sample_data,
            quantize_linearly: desc.quantize_linearly,
            sampling: exr::math::Vec2(1, 1),
        });
    }

    let mut layer_attributes = LayerAttributes::default();
    for (name, value) in &spec.attributes {
        if name == "multiView" {
            if let AttrValue::StrList(list) = value {
                layer_attributes.multi_view_names = Some(
                    list.iter()
                        .map(|s| attr_text(s))
                        .collect::<ExrResult<Vec<Text>>>()?,
                );
                continue;
            }
        }
        layer_attributes
            .other
            .insert(attr_text(name)?, convert_attribute(value)?);
    }

    let layer = Layer::new(
        (width, height),
        layer_attributes,
        Encoding::default(),
        AnyChannels::sort(list),
    );
    let image = Image::from_layers(ImageAttributes::with_size((width, height)), vec![layer]);

    image
        .write()
        .to_file(path)
        .map_err(|e| ExrError::Encode(format!("{}: {e}", path.display())))?;
    debug!(path = %path.display(), channels = num_channels, "wrote container");
    Ok(())
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Builds a unique sibling temp path for atomic write-back:
/// `<output>.denoise-tmp-<unique><ext>`.
///
/// Keeping the original extension lets the container writer pick the right
/// format for the temp file; the unique suffix combines the process id and
/// a counter so concurrent runs cannot collide.
pub fn temp_output_path(target: &Path) -> PathBuf {
    let unique = format!(
        "{}-{}",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    let mut name = target.as_os_str().to_os_string();
    name.push(format!(".denoise-tmp-{unique}"));
    if let Some(ext) = target.extension() {
        name.push(".");
        name.push(ext);
    }
    PathBuf::from(name)
}
