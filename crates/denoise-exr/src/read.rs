//! Reading multi-channel EXR containers.
//!
//! [`ExrSource`] separates header parsing from pixel decoding: `open` reads
//! only the metadata (cheap, used to validate neighbor frames without
//! decoding them), while [`ExrSource::read_all_f32`] decodes every channel
//! of the first part into one interleaved f32 buffer. A source stays usable
//! for repeated reads, which is how neighbor frames are streamed once per
//! layer.

use crate::error::{ExrError, ExrResult};
use denoise_core::spec::{AttrValue, ChannelDesc, ImageSpec, SampleKind};
use exr::image::read::read_all_flat_layers_from_file;
use exr::image::FlatSamples;
use exr::meta::MetaData;
use exr::meta::attribute::AttributeValue;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An EXR file opened for reading.
#[derive(Debug)]
pub struct ExrSource {
    path: PathBuf,
    spec: ImageSpec,
}

fn sample_kind(sample_type: exr::meta::attribute::SampleType) -> SampleKind {
    use exr::meta::attribute::SampleType;
    match sample_type {
        SampleType::F16 => SampleKind::F16,
        SampleType::F32 => SampleKind::F32,
        SampleType::U32 => SampleKind::U32,
    }
}

/// Converts a header attribute to the snapshot representation.
///
/// Only the attribute kinds the denoiser consumes or preserves are mapped;
/// structural attributes (channel lists, windows, tiling) are carried by the
/// container itself and exotic kinds are dropped.
fn convert_attribute(value: &AttributeValue) -> Option<AttrValue> {
    match value {
        AttributeValue::Text(text) => Some(AttrValue::Str(text.to_string())),
        AttributeValue::TextVector(texts) => Some(AttrValue::StrList(
            texts.iter().map(|t| t.to_string()).collect(),
        )),
        AttributeValue::I32(v) => Some(AttrValue::Int(*v as i64)),
        AttributeValue::F32(v) => Some(AttrValue::Float(*v as f64)),
        AttributeValue::F64(v) => Some(AttrValue::Float(*v)),
        _ => None,
    }
}

impl ExrSource {
    /// Opens a file and snapshots its header without decoding pixels.
    pub fn open<P: AsRef<Path>>(path: P) -> ExrResult<Self> {
        let path = path.as_ref();
        let meta = MetaData::read_from_file(path, false)
            .map_err(|e| ExrError::Decode(format!("{}: {e}", path.display())))?;
        let header = meta
            .headers
            .first()
            .ok_or_else(|| ExrError::Decode(format!("{}: no image parts", path.display())))?;

        let mut spec = ImageSpec::new(header.layer_size.width(), header.layer_size.height());
        for channel in header.channels.list.iter() {
            spec.channels.push(ChannelDesc {
                name: channel.name.to_string(),
                kind: sample_kind(channel.sample_type),
                quantize_linearly: channel.quantize_linearly,
            });
        }
        for (name, value) in header
            .shared_attributes
            .other
            .iter()
            .chain(header.own_attributes.other.iter())
        {
            if let Some(converted) = convert_attribute(value) {
                spec.attributes.insert(name.to_string(), converted);
            }
        }
        if let Some(views) = &header.own_attributes.multi_view_names {
            spec.attributes.insert(
                "multiView".to_string(),
                AttrValue::StrList(views.iter().map(|t| t.to_string()).collect()),
            );
        }

        debug!(
            path = %path.display(),
            width = spec.width,
            height = spec.height,
            channels = spec.num_channels(),
            "opened container"
        );
        Ok(Self {
            path: path.to_path_buf(),
            spec,
        })
    }

    /// The header snapshot taken at open time.
    pub fn spec(&self) -> &ImageSpec {
        &self.spec
    }

    /// Path this source reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decodes all channels of the first part into an interleaved f32
    /// buffer of length `width * height * num_channels`, channel order as
    /// in the header snapshot. U32 channels are converted by value.
    pub fn read_all_f32(&self) -> ExrResult<Vec<f32>> {
        let image = read_all_flat_layers_from_file(&self.path)
            .map_err(|e| ExrError::Decode(format!("{}: {e}", self.path.display())))?;
        let layer = image
            .layer_data
            .first()
            .ok_or_else(|| ExrError::Decode(format!("{}: no image parts", self.path.display())))?;

        let width = layer.size.width();
        let height = layer.size.height();
        let num_channels = layer.channel_data.list.len();
        if width != self.spec.width || height != self.spec.height || num_channels != self.spec.num_channels() {
            return Err(ExrError::Decode(format!(
                "{}: header changed between open and read",
                self.path.display()
            )));
        }

        let pixel_count = width * height;
        let mut pixels = vec![0.0f32; pixel_count * num_channels];
        for (channel_index, channel) in layer.channel_data.list.iter().enumerate() {
            match &channel.sample_data {
                FlatSamples::F16(values) => {
                    for (i, value) in values.iter().enumerate() {
                        pixels[i * num_channels + channel_index] = value.to_f32();
                    }
                }
                FlatSamples::F32(values) => {
                    for (i, value) in values.iter().enumerate() {
                        pixels[i * num_channels + channel_index] = *value;
                    }
                }
                FlatSamples::U32(values) => {
                    for (i, value) in values.iter().enumerate() {
                        pixels[i * num_channels + channel_index] = *value as f32;
                    }
                }
            }
        }
        Ok(pixels)
    }
}
