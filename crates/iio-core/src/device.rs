//! Device descriptors.

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::channel::{Channel, ChannelBuilder};
use crate::error::{IioError, Result};
use crate::mask::ChannelMask;

/// Position of a device inside its context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId(usize);

impl DeviceId {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    /// Index into [`Context::devices`](crate::Context::devices).
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One hardware unit exposed by the transport.
///
/// Channels are kept sorted by scan index, which is the order their slots appear in a
/// sample record.
#[derive(Debug)]
pub struct Device {
    key: DeviceId,
    id: String,
    name: Option<String>,
    channels: Vec<Channel>,
    attrs: Arc<[String]>,
    streaming: AtomicBool,
}

impl Device {
    /// Transport-level id, e.g. `iio:device0`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Human name, e.g. `ad7476`.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Handle of this device inside its context.
    pub fn key(&self) -> DeviceId {
        self.key
    }

    /// Channels in ascending index order.
    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// Channel with the given scan index.
    pub fn channel_by_index(&self, index: usize) -> Option<&Channel> {
        self.channels
            .binary_search_by_key(&index, Channel::index)
            .ok()
            .map(|pos| &self.channels[pos])
    }

    /// Channel whose id or name is `name` and whose direction matches `output`.
    pub fn find_channel(&self, name: &str, output: bool) -> Option<&Channel> {
        self.channels
            .iter()
            .find(|c| c.is_output() == output && c.matches(name))
    }

    /// Device-level attribute names.
    pub fn attrs(&self) -> &Arc<[String]> {
        &self.attrs
    }

    /// Whether the device exposes attribute `name`.
    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.iter().any(|a| a == name)
    }

    /// Trigger devices are named `trigger*` by the kernel.
    pub fn is_trigger(&self) -> bool {
        self.id.starts_with("trigger")
    }

    /// True while a buffer is open on this device.
    pub fn is_streaming(&self) -> bool {
        self.streaming.load(Ordering::Acquire)
    }

    /// Number of mask bits needed to address every channel.
    pub fn mask_bits(&self) -> usize {
        self.channels.last().map_or(0, |c| c.index() + 1)
    }

    /// Mask of the currently enabled channels.
    pub fn enabled_mask(&self) -> ChannelMask {
        let mut mask = ChannelMask::with_bits(self.mask_bits());
        for channel in self.channels.iter().filter(|c| c.is_enabled()) {
            // index < mask_bits by construction
            let _ = mask.set(channel.index());
        }
        mask
    }

    /// Check every set bit of `mask` addresses an existing channel.
    pub fn validate_mask(&self, mask: &ChannelMask) -> Result<()> {
        match mask.iter().find(|&bit| self.channel_by_index(bit).is_none()) {
            Some(bit) => Err(IioError::invalid_argument(format!(
                "mask bit {} does not address a channel of {}",
                bit, self.id
            ))),
            None => Ok(()),
        }
    }

    pub(crate) fn try_begin_streaming(&self) -> Result<()> {
        self.streaming
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| IioError::Busy {
                device: self.id.clone(),
            })
    }

    pub(crate) fn end_streaming(&self) {
        self.streaming.store(false, Ordering::Release);
    }
}

/// Builder used by discovery code to describe a device and its channels.
#[derive(Debug, Clone)]
pub struct DeviceBuilder {
    id: String,
    name: Option<String>,
    channels: Vec<ChannelBuilder>,
    attrs: Vec<String>,
}

impl DeviceBuilder {
    /// Start a device with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            channels: Vec::new(),
            attrs: Vec::new(),
        }
    }

    /// Set the human-readable name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Add a channel.
    pub fn channel(mut self, channel: ChannelBuilder) -> Self {
        self.channels.push(channel);
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

    pub(crate) fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn build(self, key: DeviceId) -> Result<Device> {
        let mut seen = HashSet::new();
        if let Some(dup) = self.channels.iter().find(|c| !seen.insert(c.index())) {
            return Err(IioError::invalid_argument(format!(
                "device {} has two channels with index {}",
                self.id,
                dup.index()
            )));
        }

        let mut channels = self
            .channels
            .into_iter()
            .map(|c| c.build(key))
            .collect::<Result<Vec<_>>>()?;
        channels.sort_by_key(Channel::index);

        Ok(Device {
            key,
            id: self.id,
            name: self.name,
            channels,
            attrs: self.attrs.into(),
            streaming: AtomicBool::new(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adc() -> Device {
        DeviceBuilder::new("iio:device1")
            .name("ad7606")
            .attr("sampling_frequency")
            .channel(ChannelBuilder::new("voltage2", 2).enabled())
            .channel(ChannelBuilder::new("voltage0", 0).enabled())
            .channel(ChannelBuilder::new("voltage1", 1))
            .channel(ChannelBuilder::new("voltage0", 40).output())
            .build(DeviceId::new(0))
            .unwrap()
    }

    #[test]
    fn test_channels_sorted_by_index() {
        let device = adc();
        let indices: Vec<_> = device.channels().iter().map(Channel::index).collect();
        assert_eq!(indices, vec![0, 1, 2, 40]);
        assert_eq!(device.channel_by_index(2).unwrap().id(), "voltage2");
        assert!(device.channel_by_index(3).is_none());
    }

    #[test]
    fn test_duplicate_index_rejected() {
        let err = DeviceBuilder::new("iio:device0")
            .channel(ChannelBuilder::new("a", 1))
            .channel(ChannelBuilder::new("b", 1))
            .build(DeviceId::new(0))
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_find_channel_by_direction() {
        let device = adc();
        assert_eq!(device.find_channel("voltage0", false).unwrap().index(), 0);
        assert_eq!(device.find_channel("voltage0", true).unwrap().index(), 40);
        assert!(device.find_channel("voltage1", true).is_none());
    }

    #[test]
    fn test_enabled_mask_spans_words() {
        let device = adc();
        let mask = device.enabled_mask();
        assert_eq!(mask.word_count(), 2);
        assert_eq!(mask.iter().collect::<Vec<_>>(), vec![0, 2]);
    }

    #[test]
    fn test_validate_mask() {
        let device = adc();
        let mut mask = ChannelMask::with_bits(64);
        mask.set(40).unwrap();
        assert!(device.validate_mask(&mask).is_ok());
        mask.set(41).unwrap();
        assert!(device.validate_mask(&mask).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_streaming_flag_is_exclusive() {
        let device = adc();
        device.try_begin_streaming().unwrap();
        assert!(matches!(
            device.try_begin_streaming(),
            Err(IioError::Busy { .. })
        ));
        device.end_streaming();
        assert!(!device.is_streaming());
    }
}
