//! Streaming buffers.
//!
//! A [`Buffer`] is one open streaming session on one device. It owns the raw sample
//! storage (`capacity * sample_size` bytes), the mask requested by the application and
//! the mask granted by the transport. Storage exists only between a successful
//! [`Buffer::open`] and [`Buffer::close`]; dropping an open buffer closes it.

use tracing::{debug, info, trace, warn};

use crate::channel::Channel;
use crate::context::DeviceRef;
use crate::demux::{process_samples, SampleLayout};
use crate::error::{IioError, Result};
use crate::format::SampleValue;
use crate::mask::ChannelMask;

/// Raw sample storage of an open streaming session.
#[derive(Debug)]
pub struct Buffer<'ctx> {
    device: DeviceRef<'ctx>,
    storage: Option<Vec<u8>>,
    requested: ChannelMask,
    granted: ChannelMask,
    sample_size: usize,
    capacity: usize,
    data_len: usize,
}

impl<'ctx> Buffer<'ctx> {
    /// Open a streaming session on `device` for the channels in `mask`.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for a zero capacity, an all-zero mask or a mask bit that
    ///   addresses no channel
    /// - `Busy` if a buffer is already open on the device
    /// - any error reported by the transport, unchanged
    ///
    /// Nothing is allocated and the device is left idle on failure.
    pub fn open(device: DeviceRef<'ctx>, mask: &ChannelMask, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(IioError::invalid_argument("buffer capacity must be positive"));
        }
        if mask.is_empty() {
            return Err(IioError::invalid_argument(format!(
                "no channel enabled on {}: nothing to stream",
                device.id()
            )));
        }
        device.validate_mask(mask)?;
        device.try_begin_streaming()?;

        let backend = device.context().backend();
        let mut granted = mask.clone();
        let sample_size = match backend.open(device.device(), &mut granted) {
            Ok(size) => size,
            Err(e) => {
                device.end_streaming();
                return Err(e);
            }
        };

        if granted != *mask {
            debug!(
                device = %device.id(),
                requested = ?mask.words(),
                granted = ?granted.words(),
                "Transport adjusted channel mask"
            );
        }

        let Some(length) = capacity.checked_mul(sample_size).filter(|&l| l > 0) else {
            if let Err(e) = backend.close(device.device()) {
                warn!(device = %device.id(), error = %e, "Failed to close rejected session");
            }
            device.end_streaming();
            return Err(IioError::invalid_argument(format!(
                "cannot allocate {} samples of {} bytes",
                capacity, sample_size
            )));
        };

        info!(
            device = %device.id(),
            capacity,
            sample_size,
            bytes = length,
            "Buffer opened"
        );

        Ok(Self {
            device,
            storage: Some(vec![0u8; length]),
            requested: mask.clone(),
            granted,
            sample_size,
            capacity,
            data_len: length,
        })
    }

    /// End the streaming session and release the storage.
    ///
    /// Storage is released and the device becomes idle even if the transport reports an
    /// error, which is then returned.
    ///
    /// # Errors
    ///
    /// `NotOpen` if the buffer was already closed; the transport is not called again.
    pub fn close(&mut self) -> Result<()> {
        if self.storage.take().is_none() {
            return Err(IioError::not_open(format!(
                "buffer on {} is already closed",
                self.device.id()
            )));
        }
        self.data_len = 0;

        let result = self
            .device
            .context()
            .backend()
            .close(self.device.device());
        self.device.end_streaming();

        info!(device = %self.device.id(), ok = result.is_ok(), "Buffer closed");
        result
    }

    /// Whether the session is still open.
    pub fn is_open(&self) -> bool {
        self.storage.is_some()
    }

    /// Device this buffer streams from or to.
    pub fn device(&self) -> DeviceRef<'ctx> {
        self.device
    }

    /// Mask the application asked for.
    pub fn requested_mask(&self) -> &ChannelMask {
        &self.requested
    }

    /// Mask granted by the transport; may differ from the requested one.
    pub fn granted_mask(&self) -> &ChannelMask {
        &self.granted
    }

    /// Capacity in samples.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes per sample record, as reported by the transport.
    pub fn step(&self) -> usize {
        self.sample_size
    }

    /// Fill the storage with fresh samples. Returns the number of bytes read.
    ///
    /// The granted mask is fixed for the whole session; a transport that rewrites the mask
    /// during `read` is ignored and logged.
    pub fn refill(&mut self) -> Result<usize> {
        let storage = self
            .storage
            .as_mut()
            .ok_or_else(|| IioError::not_open("refill on a closed buffer"))?;
        let mut mask = self.granted.clone();
        let bytes =
            self.device
                .context()
                .backend()
                .read(self.device.device(), storage, &mut mask)?;
        if mask != self.granted {
            debug!(
                device = %self.device.id(),
                granted = ?self.granted.words(),
                reported = ?mask.words(),
                "Transport changed channel mask during read; keeping granted mask"
            );
        }
        self.data_len = bytes.min(storage.len());
        trace!(device = %self.device.id(), bytes, "Buffer refilled");
        Ok(bytes)
    }

    /// Send the whole storage to the device. Returns the number of bytes written.
    pub fn push(&mut self) -> Result<usize> {
        self.push_partial(self.capacity)
    }

    /// Send the first `samples` samples of the storage. Returns the number of bytes written.
    pub fn push_partial(&mut self, samples: usize) -> Result<usize> {
        let storage = self
            .storage
            .as_ref()
            .ok_or_else(|| IioError::not_open("push on a closed buffer"))?;
        if samples > self.capacity {
            return Err(IioError::invalid_argument(format!(
                "cannot push {} samples from a buffer of {}",
                samples, self.capacity
            )));
        }
        let len = samples * self.sample_size;
        let bytes = self
            .device
            .context()
            .backend()
            .write(self.device.device(), &storage[..len])?;
        trace!(device = %self.device.id(), bytes, "Buffer pushed");
        Ok(bytes)
    }

    /// Valid sample bytes: the last refill's data, or the whole storage before any refill.
    pub fn data(&self) -> &[u8] {
        match &self.storage {
            Some(storage) => &storage[..self.data_len],
            None => &[],
        }
    }

    /// Whole storage, for composing output samples.
    pub fn data_mut(&mut self) -> &mut [u8] {
        match &mut self.storage {
            Some(storage) => storage.as_mut_slice(),
            None => &mut [],
        }
    }

    fn layout(&self) -> SampleLayout<'ctx> {
        SampleLayout::new(self.device.device(), &self.granted)
    }

    /// Byte offset of `channel`'s first slot in the storage.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the channel is not part of the granted mask.
    pub fn first(&self, channel: &Channel) -> Result<usize> {
        self.layout().offset_of(channel).ok_or_else(|| {
            IioError::invalid_argument(format!(
                "channel {} is not streamed by this buffer",
                channel.id()
            ))
        })
    }

    /// Run `callback` on every scalar of the valid data. See [`process_samples`].
    pub fn foreach_sample<F>(&self, callback: F) -> Result<usize>
    where
        F: FnMut(&Channel, SampleValue) -> Result<()>,
    {
        process_samples(self.device.device(), &self.granted, self.data(), callback)
    }

    /// Copy `channel`'s raw slots out of the valid data, record after record.
    ///
    /// Stops when `dst` cannot hold another slot. Returns the number of bytes copied.
    pub fn read_channel_raw(&self, channel: &Channel, dst: &mut [u8]) -> Result<usize> {
        let layout = self.layout();
        let offset = self.first(channel)?;
        let width = channel.format().sample_bytes();

        let mut copied = 0;
        for record in self.data().chunks_exact(layout.record_size()) {
            if copied + width > dst.len() {
                break;
            }
            dst[copied..copied + width].copy_from_slice(&record[offset..offset + width]);
            copied += width;
        }
        Ok(copied)
    }

    /// Copy consecutive slots from `src` into `channel`'s position of each record.
    ///
    /// Stops at the end of `src` or of the storage. Returns the number of bytes copied.
    pub fn write_channel_raw(&mut self, channel: &Channel, src: &[u8]) -> Result<usize> {
        let layout = self.layout();
        let offset = self.first(channel)?;
        let width = channel.format().sample_bytes();
        let record_size = layout.record_size();

        let mut copied = 0;
        for record in self.data_mut().chunks_exact_mut(record_size) {
            if copied + width > src.len() {
                break;
            }
            record[offset..offset + width].copy_from_slice(&src[copied..copied + width]);
            copied += width;
        }
        Ok(copied)
    }
}

impl Drop for Buffer<'_> {
    fn drop(&mut self) {
        if self.is_open() {
            if let Err(e) = self.close() {
                warn!(device = %self.device.id(), error = %e, "Failed to close buffer on drop");
            }
        }
    }
}
