//! Channel descriptors.
//!
//! A [`Channel`] is one scalar or vector data stream of a device. Its `index` is the bit
//! position used in channel-enable masks and orders channels inside a sample record.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::device::DeviceId;
use crate::error::Result;
use crate::format::DataFormat;

/// Data direction of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Samples flow from the device.
    #[default]
    Input,
    /// Samples flow to the device.
    Output,
}

/// Semantic qualifier of a channel (axis, light sub-band, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Modifier {
    /// No qualifier.
    #[default]
    None,
    /// X axis.
    X,
    /// Y axis.
    Y,
    /// Z axis.
    Z,
    /// Visible plus infrared light.
    LightBoth,
    /// Infrared light.
    LightIr,
    /// sqrt(x² + y²).
    RootSumSquaredXY,
    /// x² + y² + z².
    SumSquaredXYZ,
    /// Unfiltered light.
    LightClear,
    /// Red light.
    LightRed,
    /// Green light.
    LightGreen,
    /// Blue light.
    LightBlue,
}

impl Modifier {
    /// Suffix used in sysfs channel ids (`accel_x`, `intensity_ir`, ...).
    pub fn as_suffix(self) -> Option<&'static str> {
        match self {
            Self::None => None,
            Self::X => Some("x"),
            Self::Y => Some("y"),
            Self::Z => Some("z"),
            Self::LightBoth => Some("both"),
            Self::LightIr => Some("ir"),
            Self::RootSumSquaredXY => Some("sqrt(x^2+y^2)"),
            Self::SumSquaredXYZ => Some("x^2+y^2+z^2"),
            Self::LightClear => Some("clear"),
            Self::LightRed => Some("red"),
            Self::LightGreen => Some("green"),
            Self::LightBlue => Some("blue"),
        }
    }
}

/// One data stream of a device.
#[derive(Debug)]
pub struct Channel {
    id: String,
    name: Option<String>,
    index: usize,
    direction: Direction,
    modifier: Modifier,
    format: DataFormat,
    enabled: AtomicBool,
    attrs: Arc<[String]>,
    device: DeviceId,
}

impl Channel {
    /// Channel id, unique within its device for a given direction.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Optional human name.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Bit position in enable masks.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Input or output.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Whether samples flow to the device.
    pub fn is_output(&self) -> bool {
        self.direction == Direction::Output
    }

    /// Semantic qualifier.
    pub fn modifier(&self) -> Modifier {
        self.modifier
    }

    /// Sample encoding.
    pub fn format(&self) -> &DataFormat {
        &self.format
    }

    /// Attribute names, discovered once.
    pub fn attrs(&self) -> &Arc<[String]> {
        &self.attrs
    }

    /// Check whether `name` is a known attribute of this channel.
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a == name)
    }

    /// Whether the channel will be part of the next buffer's requested mask.
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Owning device.
    pub fn device_id(&self) -> DeviceId {
        self.device
    }

    pub(crate) fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// True if `name` matches the channel's id or name.
    pub(crate) fn matches(&self, name: &str) -> bool {
        self.id == name || self.name.as_deref() == Some(name)
    }
}

/// Builder used by discovery code to describe a channel.
#[derive(Debug, Clone)]
pub struct ChannelBuilder {
    id: String,
    name: Option<String>,
    index: usize,
    direction: Direction,
    modifier: Modifier,
    format: DataFormat,
    enabled: bool,
    attrs: Vec<String>,
}

impl ChannelBuilder {
    /// Start describing a channel with the given id and scan index.
    pub fn new(id: impl Into<String>, index: usize) -> Self {
        Self {
            id: id.into(),
            name: None,
            index,
            direction: Direction::Input,
            modifier: Modifier::None,
            format: DataFormat::default(),
            enabled: false,
            attrs: Vec::new(),
        }
    }

    /// Set the human-readable name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Mark the channel as an output.
    pub fn output(mut self) -> Self {
        self.direction = Direction::Output;
        self
    }

    /// Set the semantic qualifier.
    pub fn modifier(mut self, modifier: Modifier) -> Self {
        self.modifier = modifier;
        self
    }

    /// Set the sample encoding.
    pub fn format(mut self, format: DataFormat) -> Self {
        self.format = format;
        self
    }

    /// Start enabled.
    pub fn enabled(mut self) -> Self {
        self.enabled = true;
        self
    }

    /// Add an attribute name.
    pub fn attr(mut self, name: impl Into<String>) -> Self {
        self.attrs.push(name.into());
        self
    }

    /// Add several attribute names.
    pub fn attrs<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attrs.extend(names.into_iter().map(Into::into));
        self
    }

    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn build(self, device: DeviceId) -> Result<Channel> {
        self.format.validate()?;
        Ok(Channel {
            id: self.id,
            name: self.name,
            index: self.index,
            direction: self.direction,
            modifier: self.modifier,
            format: self.format,
            enabled: AtomicBool::new(self.enabled),
            attrs: self.attrs.into(),
            device,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let channel = ChannelBuilder::new("voltage0", 0)
            .build(DeviceId::new(0))
            .unwrap();
        assert_eq!(channel.id(), "voltage0");
        assert_eq!(channel.name(), None);
        assert!(!channel.is_output());
        assert!(!channel.is_enabled());
        assert_eq!(channel.modifier(), Modifier::None);
        assert!(channel.attrs().is_empty());
    }

    #[test]
    fn test_matches_id_or_name() {
        let channel = ChannelBuilder::new("accel_x", 0)
            .name("tilt")
            .modifier(Modifier::X)
            .attrs(["raw", "scale"])
            .build(DeviceId::new(0))
            .unwrap();
        assert!(channel.matches("accel_x"));
        assert!(channel.matches("tilt"));
        assert!(!channel.matches("accel_y"));
        assert!(channel.has_attr("scale"));
        assert!(!channel.has_attr("offset"));
        assert_eq!(channel.modifier().as_suffix(), Some("x"));
    }

    #[test]
    fn test_invalid_format_rejected() {
        let result = ChannelBuilder::new("bad", 0)
            .format(DataFormat::new(8, 12))
            .build(DeviceId::new(0));
        assert!(result.unwrap_err().is_invalid_argument());

        let result = ChannelBuilder::new("wrapped", 1)
            .format(DataFormat::new(16, 12).with_shift(u32::MAX))
            .build(DeviceId::new(0));
        assert!(result.unwrap_err().is_invalid_argument());
    }
}
