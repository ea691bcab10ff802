//! Image specification snapshot.
//!
//! [`ImageSpec`] describes a multi-channel image container: dimensions, the
//! ordered channel list with per-channel sample kinds, and the header
//! attributes. The denoiser snapshots the spec of every input file and
//! preserves it for write-back, so the output carries the same channel
//! names, sample kinds and attributes as the input.
//!
//! Modeled on OpenImageIO-style image specs: the spec is the "header" for a
//! flat pixel buffer of `width * height * channels` floats.

use std::collections::HashMap;

/// Per-channel sample kind as stored in the container.
///
/// Pixel data is always exchanged as f32; the kind records how each channel
/// is encoded on disk so write-back can restore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleKind {
    /// 16-bit half float.
    F16,
    /// 32-bit float.
    F32,
    /// 32-bit unsigned integer (object IDs, cryptomatte ranks).
    U32,
}

/// Description of one channel in the container.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDesc {
    /// Full channel name as stored in the file, e.g.
    /// `"RenderLayer.Denoising Normal.X"`.
    pub name: String,
    /// On-disk sample encoding.
    pub kind: SampleKind,
    /// Whether the channel quantizes linearly (non-color data).
    pub quantize_linearly: bool,
}

/// Attribute value stored in image metadata.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value.
    Str(String),
    /// String array value (e.g. the `multiView` view list).
    StrList(Vec<String>),
}

impl AttrValue {
    /// Returns this value as a string, if applicable.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns this value as a string list, if applicable.
    pub fn as_str_list(&self) -> Option<&[String]> {
        match self {
            Self::StrList(v) => Some(v),
            _ => None,
        }
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

/// Snapshot of a container's header: dimensions, channels, attributes.
#[derive(Debug, Clone, Default)]
pub struct ImageSpec {
    /// Image width in pixels.
    pub width: usize,
    /// Image height in pixels.
    pub height: usize,
    /// Ordered channel descriptions, in file order.
    pub channels: Vec<ChannelDesc>,
    /// Header attributes keyed by name.
    pub attributes: HashMap<String, AttrValue>,
}

impl ImageSpec {
    /// Creates a spec with the given dimensions and no channels.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            channels: Vec::new(),
            attributes: HashMap::new(),
        }
    }

    /// Number of channels in the container.
    #[inline]
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Ordered channel names, in file order.
    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }

    /// Appends an f32 channel description.
    pub fn push_channel(&mut self, name: impl Into<String>) {
        self.channels.push(ChannelDesc {
            name: name.into(),
            kind: SampleKind::F32,
            quantize_linearly: false,
        });
    }

    /// Sets an attribute value.
    pub fn set_attr(&mut self, key: impl Into<String>, value: impl Into<AttrValue>) {
        self.attributes.insert(key.into(), value.into());
    }

    /// Gets an attribute value by key.
    pub fn get_attr(&self, key: &str) -> Option<&AttrValue> {
        self.attributes.get(key)
    }

    /// Gets an attribute as a string.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get_attr(key).and_then(|v| v.as_str())
    }

    /// Gets an attribute as a string list.
    pub fn get_string_list(&self, key: &str) -> Option<&[String]> {
        self.get_attr(key).and_then(|v| v.as_str_list())
    }

    /// The advertised view list, if this is a multi-view container.
    ///
    /// Multi-view mode requires a `multiView` string-array attribute with at
    /// least two entries.
    pub fn views(&self) -> Option<&[String]> {
        match self.get_string_list("multiView") {
            Some(views) if views.len() >= 2 => Some(views),
            _ => None,
        }
    }

    /// Total number of f32 samples in the flat pixel buffer.
    #[inline]
    pub fn sample_count(&self) -> usize {
        self.width * self.height * self.num_channels()
    }
}
