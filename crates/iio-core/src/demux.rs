//! Sample demultiplexer.
//!
//! Walks a raw buffer of interleaved sample records and hands every scalar of every
//! enabled channel to a callback, decoded according to the channel's [`DataFormat`].
//!
//! A record holds one slot per enabled channel, in ascending channel index order. Each
//! slot is `storage_bytes * repeat` bytes wide and follows the previous one with no
//! padding. Channels absent from the mask occupy no bytes. Only whole records are
//! processed; a trailing partial record is left untouched.
//!
//! [`DataFormat`]: crate::format::DataFormat

use crate::channel::Channel;
use crate::device::Device;
use crate::error::{IioError, Result};
use crate::format::SampleValue;
use crate::mask::ChannelMask;

#[derive(Debug, Clone, Copy)]
struct Slot<'d> {
    channel: &'d Channel,
    offset: usize,
}

/// Position of every enabled channel inside one sample record.
#[derive(Debug, Clone)]
pub struct SampleLayout<'d> {
    slots: Vec<Slot<'d>>,
    record_size: usize,
}

impl<'d> SampleLayout<'d> {
    /// Lay out the channels of `device` selected by `mask`.
    ///
    /// Mask bits with no matching channel are ignored.
    pub fn new(device: &'d Device, mask: &ChannelMask) -> Self {
        let mut offset = 0;
        let slots = device
            .channels()
            .iter()
            .filter(|c| mask.test(c.index()))
            .map(|channel| {
                let slot = Slot { channel, offset };
                offset += channel.format().sample_bytes();
                slot
            })
            .collect();
        Self {
            slots,
            record_size: offset,
        }
    }

    /// Bytes per sample record.
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// Byte offset of `channel`'s first slot within a record, if it is laid out.
    pub fn offset_of(&self, channel: &Channel) -> Option<usize> {
        self.slots
            .iter()
            .find(|s| s.channel.index() == channel.index())
            .map(|s| s.offset)
    }

    /// Channels in record order.
    pub fn channels(&self) -> impl Iterator<Item = &'d Channel> + '_ {
        self.slots.iter().map(|s| s.channel)
    }

    /// Number of whole records in `len` bytes.
    pub fn records_in(&self, len: usize) -> usize {
        if self.record_size == 0 {
            0
        } else {
            len / self.record_size
        }
    }
}

/// Decode every whole sample record in `buf`.
///
/// `callback` runs once per scalar in ascending (record, channel index, repeat slot)
/// order. The first error it returns stops processing and is returned unchanged; use
/// [`IioError::aborted`] to stop with a raw negative status code.
///
/// Returns the number of bytes consumed, always a multiple of the record size.
///
/// # Errors
///
/// `InvalidArgument` if `mask` selects no channel of `device`.
pub fn process_samples<F>(
    device: &Device,
    mask: &ChannelMask,
    buf: &[u8],
    mut callback: F,
) -> Result<usize>
where
    F: FnMut(&Channel, SampleValue) -> Result<()>,
{
    let layout = SampleLayout::new(device, mask);
    if layout.record_size() == 0 {
        return Err(IioError::invalid_argument(format!(
            "channel mask selects nothing to demultiplex on {}",
            device.id()
        )));
    }

    let records = layout.records_in(buf.len());
    let consumed = records * layout.record_size();

    for record in buf[..consumed].chunks_exact(layout.record_size()) {
        for slot in &layout.slots {
            let format = slot.channel.format();
            let width = format.storage_bytes();
            for repeat in 0..format.repeat as usize {
                let start = slot.offset + repeat * width;
                let value = format.extract(&record[start..start + width]);
                callback(slot.channel, value)?;
            }
        }
    }

    Ok(consumed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelBuilder;
    use crate::device::{DeviceBuilder, DeviceId};
    use crate::format::DataFormat;

    fn device(channels: Vec<ChannelBuilder>) -> Device {
        channels
            .into_iter()
            .fold(DeviceBuilder::new("iio:device0"), DeviceBuilder::channel)
            .build(DeviceId::new(0))
            .unwrap()
    }

    fn full_mask(device: &Device) -> ChannelMask {
        let mut mask = ChannelMask::with_bits(device.mask_bits());
        for c in device.channels() {
            mask.set(c.index()).unwrap();
        }
        mask
    }

    #[test]
    fn test_layout_offsets_skip_disabled_channels() {
        let dev = device(vec![
            ChannelBuilder::new("a", 0).format(DataFormat::new(16, 12)),
            ChannelBuilder::new("b", 1).format(DataFormat::new(32, 32)),
            ChannelBuilder::new("c", 2).format(DataFormat::new(8, 8).with_repeat(3)),
        ]);
        let mut mask = ChannelMask::with_bits(3);
        mask.set(0).unwrap();
        mask.set(2).unwrap();

        let layout = SampleLayout::new(&dev, &mask);
        assert_eq!(layout.record_size(), 5);
        assert_eq!(layout.offset_of(&dev.channels()[2]), Some(2));
        assert_eq!(layout.offset_of(&dev.channels()[1]), None);
    }

    #[test]
    fn test_mixed_widths_in_record_order() {
        let dev = device(vec![
            ChannelBuilder::new("u8", 0).format(DataFormat::new(8, 8)),
            ChannelBuilder::new("s16", 1).format(DataFormat::new(16, 16).signed()),
        ]);
        let mut buf = vec![7u8];
        buf.extend_from_slice(&(-2i16).to_ne_bytes());
        buf.push(9);
        buf.extend_from_slice(&300i16.to_ne_bytes());

        let mut seen = Vec::new();
        let consumed = process_samples(&dev, &full_mask(&dev), &buf, |c, v| {
            seen.push((c.index(), v.as_i64()));
            Ok(())
        })
        .unwrap();

        assert_eq!(consumed, 6);
        assert_eq!(seen, vec![(0, 7), (1, -2), (0, 9), (1, 300)]);
    }

    #[test]
    fn test_repeat_slots_walked_before_next_channel() {
        let dev = device(vec![
            ChannelBuilder::new("vec", 0).format(DataFormat::new(8, 8).with_repeat(3)),
            ChannelBuilder::new("tail", 1).format(DataFormat::new(8, 8)),
        ]);
        let buf = [1u8, 2, 3, 4];

        let mut seen = Vec::new();
        process_samples(&dev, &full_mask(&dev), &buf, |c, v| {
            seen.push((c.index(), v.as_u64()));
            Ok(())
        })
        .unwrap();
        assert_eq!(seen, vec![(0, 1), (0, 2), (0, 3), (1, 4)]);
    }

    #[test]
    fn test_partial_record_not_interpreted() {
        let dev = device(vec![ChannelBuilder::new("a", 0).format(DataFormat::new(32, 32))]);
        let buf = [0u8; 10];
        let mut calls = 0;
        let consumed = process_samples(&dev, &full_mask(&dev), &buf, |_, _| {
            calls += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(consumed, 8);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_empty_mask_rejected() {
        let dev = device(vec![ChannelBuilder::new("a", 0)]);
        let err = process_samples(&dev, &ChannelMask::with_bits(1), &[0u8; 4], |_, _| Ok(()))
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_callback_error_returned_unchanged() {
        let dev = device(vec![ChannelBuilder::new("a", 0).format(DataFormat::new(8, 8))]);
        let err = process_samples(&dev, &full_mask(&dev), &[0u8; 4], |_, _| {
            Err(IioError::io_errno(110, "sink timed out"))
        })
        .unwrap_err();
        assert_eq!(err.code(), -110);
    }
}
