//! Recording backend shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use iio_core::{
    Backend, BackendKind, Channel, ChannelBuilder, ChannelMask, Context, ContextBuilder,
    DataFormat, Device, DeviceBuilder, IioError, Result, SampleLayout,
};

/// Call counters, shared between a test and the backend it moved into a context.
#[derive(Debug, Default)]
pub struct Calls {
    pub open: AtomicUsize,
    pub close: AtomicUsize,
    pub read: AtomicUsize,
    pub write: AtomicUsize,
    pub shutdown: AtomicUsize,
}

impl Calls {
    pub fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

/// Backend that serves a fixed byte pattern and records what it is asked.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    pub calls: Arc<Calls>,
    /// Extra indices forced into every granted mask.
    pub force_on: Vec<usize>,
    /// Indices `read` sets in the mask it is handed.
    pub widen_on_read: Vec<usize>,
    /// Bytes returned by `read`, repeated to fill the destination.
    pub pattern: Vec<u8>,
    /// Error returned by `open`, if any.
    pub open_error: Option<IioError>,
    /// Error returned by `close`, if any.
    pub close_error: Option<IioError>,
    pub pushed: Arc<Mutex<Vec<u8>>>,
    pub open: Mutex<bool>,
}

impl Backend for RecordingBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Mock
    }

    fn open(&self, device: &Device, mask: &mut ChannelMask) -> Result<usize> {
        self.calls.open.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.open_error {
            return Err(err.clone());
        }
        mask.ensure_bits(device.mask_bits());
        for &bit in &self.force_on {
            mask.set(bit)?;
        }
        *self.open.lock() = true;
        Ok(SampleLayout::new(device, mask).record_size())
    }

    fn close(&self, _device: &Device) -> Result<()> {
        self.calls.close.fetch_add(1, Ordering::SeqCst);
        let mut open = self.open.lock();
        if !*open {
            return Err(IioError::not_open("no session"));
        }
        *open = false;
        match &self.close_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn read(&self, _device: &Device, dst: &mut [u8], mask: &mut ChannelMask) -> Result<usize> {
        self.calls.read.fetch_add(1, Ordering::SeqCst);
        for &bit in &self.widen_on_read {
            mask.set(bit)?;
        }
        if self.pattern.is_empty() {
            return Ok(0);
        }
        for (byte, value) in dst.iter_mut().zip(self.pattern.iter().cycle()) {
            *byte = *value;
        }
        Ok(dst.len())
    }

    fn write(&self, _device: &Device, src: &[u8]) -> Result<usize> {
        self.calls.write.fetch_add(1, Ordering::SeqCst);
        self.pushed.lock().extend_from_slice(src);
        Ok(src.len())
    }

    fn read_device_attr(&self, _: &Device, _: &str, _: &mut [u8]) -> Result<usize> {
        Ok(0)
    }

    fn write_device_attr(&self, _: &Device, _: &str, value: &str) -> Result<usize> {
        Ok(value.len())
    }

    fn read_channel_attr(&self, _: &Device, _: &Channel, _: &str, _: &mut [u8]) -> Result<usize> {
        Ok(0)
    }

    fn write_channel_attr(&self, _: &Device, _: &Channel, _: &str, value: &str) -> Result<usize> {
        Ok(value.len())
    }

    fn shutdown(&self, _context: &Context) {
        self.calls.shutdown.fetch_add(1, Ordering::SeqCst);
    }
}

/// Four 16-bit input channels and one 16-bit output channel.
pub fn adc_device() -> DeviceBuilder {
    let mut device = DeviceBuilder::new("iio:device0")
        .name("adc")
        .attr("sampling_frequency");
    for i in 0..4 {
        device = device.channel(
            ChannelBuilder::new(format!("voltage{}", i), i)
                .format(DataFormat::new(16, 16).signed())
                .attrs(["raw", "scale"]),
        );
    }
    device.channel(
        ChannelBuilder::new("voltage0", 4)
            .output()
            .format(DataFormat::new(16, 16)),
    )
}

pub fn context(backend: RecordingBackend) -> Context {
    ContextBuilder::new("test")
        .device(adc_device())
        .build(backend)
        .unwrap()
}
