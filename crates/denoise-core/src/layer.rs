//! Render layer discovery and channel reshuffling.
//!
//! Container channel names are dot-delimited: `layer.pass.channel`, with an
//! extra view component (`layer.pass.view.channel`) in multi-view files.
//! [`parse_channels`] groups the file's channels into provisional layers and
//! keeps the ones that carry the complete denoising channel set; each kept
//! layer records reshuffle tables mapping canonical kernel slots to actual
//! file channel positions, so arbitrary channel order in the input is
//! absorbed at load time.

use crate::channels::{INPUT_NUM_CHANNELS, OUTPUT_NUM_CHANNELS, input_channels, output_channels};
use crate::error::{CoreError, Result};
use crate::spec::ImageSpec;
use tracing::debug;

/// A render layer with complete denoising data.
#[derive(Debug, Clone)]
pub struct RenderLayer {
    /// Layer key: the layer name, plus `.view` in multi-view files.
    pub name: String,
    /// Channel names relative to the layer (`"pass.chan"`), in file order.
    pub channels: Vec<String>,
    /// File channel index of each entry in `channels`.
    pub layer_to_image_channel: Vec<usize>,
    /// File channel index of each canonical input slot (length 15).
    pub input_to_image_channel: Vec<usize>,
    /// File channel index of each canonical output slot (length 3).
    pub output_to_image_channel: Vec<usize>,
    /// For each neighbor frame, the input slot remap into that neighbor's
    /// own channel list. Filled by [`RenderLayer::match_neighbor_channels`].
    pub neighbor_input_to_image_channel: Vec<Vec<usize>>,
    /// Sample count used to render this layer.
    pub samples: u32,
}

impl RenderLayer {
    /// Resolves, for one neighbor frame, where each of the 15 input slots
    /// lives in the neighbor's channel list.
    ///
    /// The slot's channel must appear in the neighbor under exactly the
    /// same full name the center frame uses. The resulting remap is
    /// appended, so neighbors must be matched in frame order.
    pub fn match_neighbor_channels(
        &mut self,
        center_channel_names: &[&str],
        neighbor_channel_names: &[&str],
    ) -> Result<()> {
        let mut remap = Vec::with_capacity(INPUT_NUM_CHANNELS);
        for slot in 0..INPUT_NUM_CHANNELS {
            let name = center_channel_names[self.input_to_image_channel[slot]];
            let index = neighbor_channel_names
                .iter()
                .position(|n| *n == name)
                .ok_or_else(|| CoreError::NeighborChannelMissing {
                    channel: name.to_string(),
                })?;
            remap.push(index);
        }
        self.neighbor_input_to_image_channel.push(remap);
        Ok(())
    }
}

/// A provisional channel group before denoising-channel detection.
struct ProvisionalLayer {
    name: String,
    channels: Vec<String>,
    layer_to_image_channel: Vec<usize>,
}

/// Splits a full channel name into (layer, pass, channel), honoring the
/// optional view component in multi-view mode.
///
/// Returns `None` for names that do not have the required number of
/// components; such channels pass through the denoiser untouched.
fn split_channel_name(name: &str, multi_view: bool) -> Option<(String, String, String)> {
    let (rest, channel) = name.rsplit_once('.')?;
    let (rest, view) = if multi_view {
        rest.rsplit_once('.')?
    } else {
        (rest, "")
    };
    if rest.is_empty() {
        return None;
    }
    // The last remaining component is the pass; whatever precedes it (possibly
    // nothing) is the layer.
    let (layer, pass) = match rest.rsplit_once('.') {
        Some((layer, pass)) => (layer, pass),
        None => ("", rest),
    };
    let key = if multi_view {
        format!("{layer}.{view}")
    } else {
        layer.to_string()
    };
    Some((key, pass.to_string(), channel.to_string()))
}

/// Fills the input/output reshuffle tables for one provisional layer.
///
/// Returns `None` if any required channel is missing; the layer is then
/// dropped without error, since files routinely carry auxiliary layers
/// without denoising data.
fn detect_denoising_channels(layer: &ProvisionalLayer) -> Option<(Vec<usize>, Vec<usize>)> {
    let find = |wanted: &str| -> Option<usize> {
        layer
            .channels
            .iter()
            .position(|c| c == wanted)
            .map(|i| layer.layer_to_image_channel[i])
    };

    let mut input = Vec::with_capacity(INPUT_NUM_CHANNELS);
    for ch in input_channels() {
        input.push(find(ch.name)?);
    }
    let mut output = Vec::with_capacity(OUTPUT_NUM_CHANNELS);
    for ch in output_channels() {
        output.push(find(ch.name)?);
    }
    Some((input, output))
}

/// Reads the layer's sample count: the override when positive, otherwise the
/// `cycles.<layer>.samples` attribute as a decimal string.
fn resolve_samples(spec: &ImageSpec, layer: &str, samples_override: u32) -> Result<u32> {
    if samples_override > 0 {
        return Ok(samples_override);
    }
    let key = format!("cycles.{layer}.samples");
    let text = spec
        .get_string(&key)
        .ok_or_else(|| CoreError::MissingSamples {
            layer: layer.to_string(),
        })?;
    match text.trim().parse::<u32>() {
        Ok(samples) if samples >= 1 => Ok(samples),
        _ => Err(CoreError::InvalidSamples {
            layer: layer.to_string(),
            value: text.to_string(),
        }),
    }
}

/// Discovers the denoisable layers of a container.
///
/// Groups channels by layer key (preserving file order), keeps the groups
/// that carry the complete input and output channel sets, and resolves each
/// kept layer's sample count. Returns [`CoreError::NoUsableLayer`] if no
/// group qualifies.
pub fn parse_channels(spec: &ImageSpec, samples_override: u32) -> Result<Vec<RenderLayer>> {
    let multi_view = spec.views().is_some();
    let mut provisional: Vec<ProvisionalLayer> = Vec::new();

    for (index, name) in spec.channel_names().iter().enumerate() {
        let Some((key, pass, channel)) = split_channel_name(name, multi_view) else {
            continue;
        };
        let entry = format!("{pass}.{channel}");
        match provisional.iter_mut().find(|l| l.name == key) {
            Some(layer) => {
                layer.channels.push(entry);
                layer.layer_to_image_channel.push(index);
            }
            None => provisional.push(ProvisionalLayer {
                name: key,
                channels: vec![entry],
                layer_to_image_channel: vec![index],
            }),
        }
    }

    let mut layers = Vec::new();
    for candidate in provisional {
        let Some((input, output)) = detect_denoising_channels(&candidate) else {
            debug!(layer = %candidate.name, "skipping layer without denoising data passes");
            continue;
        };
        let samples = resolve_samples(spec, &candidate.name, samples_override)?;
        debug!(layer = %candidate.name, samples, "detected denoisable layer");
        layers.push(RenderLayer {
            name: candidate.name,
            channels: candidate.channels,
            layer_to_image_channel: candidate.layer_to_image_channel,
            input_to_image_channel: input,
            output_to_image_channel: output,
            neighbor_input_to_image_channel: Vec::new(),
            samples,
        });
    }

    if layers.is_empty() {
        return Err(CoreError::NoUsableLayer);
    }
    Ok(layers)
}
