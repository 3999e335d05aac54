//! Context, the root of the object model, and borrowed views into it.
//!
//! A [`Context`] owns its devices and the bound [`Backend`]. Devices and channels are
//! handed out as [`DeviceRef`] / [`ChannelRef`] views that pair the descriptor with the
//! context, so attribute and streaming calls can reach the backend without the
//! descriptors holding owning back-pointers.

use std::collections::HashSet;
use std::ops::Deref;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::{Backend, BackendKind};
use crate::buffer::Buffer;
use crate::channel::Channel;
use crate::demux::SampleLayout;
use crate::device::{Device, DeviceBuilder, DeviceId};
use crate::error::{IioError, Result};
use crate::numeric::{format_double, read_double};

/// Tunables applied to every operation of a context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextOptions {
    /// Size of the scratch buffer used for textual attribute reads.
    pub attr_buffer_len: usize,
    /// Capacity in samples used by [`DeviceRef::create_default_buffer`].
    pub default_buffer_capacity: usize,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            attr_buffer_len: 1024,
            default_buffer_capacity: 1024,
        }
    }
}

/// One connected instance of the library, bound to one transport.
#[derive(Debug)]
pub struct Context {
    name: String,
    description: Option<String>,
    devices: Vec<Device>,
    backend: Box<dyn Backend>,
    options: ContextOptions,
}

impl Context {
    /// Display name, usually the transport name (`local`, `network`, ...).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Free-form description reported by the transport.
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Tunables this context was built with.
    pub fn options(&self) -> &ContextOptions {
        &self.options
    }

    /// Transport family of the bound backend.
    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    /// Number of devices.
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Devices in discovery order.
    pub fn devices(&self) -> impl ExactSizeIterator<Item = DeviceRef<'_>> + '_ {
        self.devices.iter().map(move |device| DeviceRef { ctx: self, device })
    }

    /// Device at position `index`.
    pub fn device(&self, index: usize) -> Option<DeviceRef<'_>> {
        self.devices
            .get(index)
            .map(|device| DeviceRef { ctx: self, device })
    }

    /// Resolve a device handle, e.g. from [`Channel::device_id`].
    pub fn get(&self, key: DeviceId) -> Option<DeviceRef<'_>> {
        self.device(key.index())
    }

    /// Device whose id or name is `name`.
    pub fn find_device(&self, name: &str) -> Option<DeviceRef<'_>> {
        self.devices().find(|d| d.id() == name || d.name() == Some(name))
    }

    pub(crate) fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    fn read_text(&self, read: impl FnOnce(&mut [u8]) -> Result<usize>) -> Result<String> {
        let mut buf = vec![0u8; self.options.attr_buffer_len];
        let len = read(&mut buf)?.min(buf.len());
        let text = &buf[..len];
        let end = text.iter().position(|&b| b == 0).unwrap_or(len);
        Ok(String::from_utf8_lossy(&text[..end]).into_owned())
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        debug!(context = %self.name, backend = %self.backend.kind(), "Shutting down backend");
        let ctx: &Context = self;
        ctx.backend.shutdown(ctx);
    }
}

/// Builder used by discovery code to assemble a context.
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    name: String,
    description: Option<String>,
    devices: Vec<DeviceBuilder>,
    options: ContextOptions,
}

impl ContextBuilder {
    /// Start a context named `name` with no devices.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the context description.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Override the default tunables.
    pub fn options(mut self, options: ContextOptions) -> Self {
        self.options = options;
        self
    }

    /// Add a device; its position is its [`DeviceId`].
    pub fn device(mut self, device: DeviceBuilder) -> Self {
        self.devices.push(device);
        self
    }

    /// Build the context and bind it to `backend`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for duplicate device ids, duplicate channel indices, malformed
    /// channel formats or a zero attribute buffer length.
    pub fn build<B: Backend + 'static>(self, backend: B) -> Result<Context> {
        self.build_boxed(Box::new(backend))
    }

    /// Same as [`build`](Self::build) for an already boxed backend.
    pub fn build_boxed(self, backend: Box<dyn Backend>) -> Result<Context> {
        if self.options.attr_buffer_len == 0 {
            return Err(IioError::invalid_argument(
                "attribute buffer length must be positive",
            ));
        }

        let mut seen = HashSet::new();
        if let Some(dup) = self.devices.iter().find(|d| !seen.insert(d.id().to_owned())) {
            return Err(IioError::invalid_argument(format!(
                "duplicate device id '{}'",
                dup.id()
            )));
        }

        let devices = self
            .devices
            .into_iter()
            .enumerate()
            .map(|(i, d)| d.build(DeviceId::new(i)))
            .collect::<Result<Vec<_>>>()?;

        info!(
            context = %self.name,
            backend = %backend.kind(),
            devices = devices.len(),
            "Context created"
        );

        Ok(Context {
            name: self.name,
            description: self.description,
            devices,
            backend,
            options: self.options,
        })
    }
}

fn parse_longlong(text: &str) -> Result<i64> {
    let trimmed = text.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let magnitude = match digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
    {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|_| IioError::invalid_format(text))?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Borrowed view of a device inside its context.
#[derive(Debug, Clone, Copy)]
pub struct DeviceRef<'ctx> {
    ctx: &'ctx Context,
    device: &'ctx Device,
}

impl<'ctx> Deref for DeviceRef<'ctx> {
    type Target = Device;

    fn deref(&self) -> &Device {
        self.device
    }
}

impl<'ctx> DeviceRef<'ctx> {
    /// Owning context.
    pub fn context(&self) -> &'ctx Context {
        self.ctx
    }

    /// Underlying descriptor, with the context's lifetime.
    pub fn device(&self) -> &'ctx Device {
        self.device
    }

    /// Channels in ascending index order.
    pub fn channels(&self) -> impl ExactSizeIterator<Item = ChannelRef<'ctx>> + 'ctx {
        let device = *self;
        self.device
            .channels()
            .iter()
            .map(move |channel| ChannelRef { device, channel })
    }

    /// Channel at position `index` in index order.
    pub fn channel(&self, index: usize) -> Option<ChannelRef<'ctx>> {
        self.device
            .channels()
            .get(index)
            .map(|channel| self.wrap(channel))
    }

    /// Channel whose id or name is `name` and whose direction matches `output`.
    pub fn find_channel(&self, name: &str, output: bool) -> Option<ChannelRef<'ctx>> {
        self.device
            .find_channel(name, output)
            .map(|channel| self.wrap(channel))
    }

    /// Wrap a channel descriptor of this device.
    pub fn wrap(&self, channel: &'ctx Channel) -> ChannelRef<'ctx> {
        ChannelRef {
            device: *self,
            channel,
        }
    }

    /// Attribute name equal to `name`, if the device has it.
    pub fn find_attr(&self, name: &str) -> Option<&'ctx str> {
        self.device
            .attrs()
            .iter()
            .find(|a| *a == name)
            .map(String::as_str)
    }

    fn check_attr(&self, name: &str) -> Result<()> {
        if self.device.has_attr(name) {
            Ok(())
        } else {
            Err(IioError::invalid_argument(format!(
                "device {} has no attribute '{}'",
                self.device.id(),
                name
            )))
        }
    }

    /// Read an attribute's raw text into `dst`.
    pub fn attr_read_raw(&self, name: &str, dst: &mut [u8]) -> Result<usize> {
        self.check_attr(name)?;
        self.ctx.backend().read_device_attr(self.device, name, dst)
    }

    /// Read an attribute as text, up to the first NUL.
    pub fn attr_read(&self, name: &str) -> Result<String> {
        self.check_attr(name)?;
        self.ctx
            .read_text(|buf| self.ctx.backend().read_device_attr(self.device, name, buf))
    }

    /// Write an attribute as text. Returns the bytes consumed.
    pub fn attr_write(&self, name: &str, value: &str) -> Result<usize> {
        self.check_attr(name)?;
        debug!(device = %self.device.id(), attr = name, value, "Writing device attribute");
        self.ctx
            .backend()
            .write_device_attr(self.device, name, value)
    }

    /// Read an attribute as a locale-independent decimal number.
    pub fn attr_read_double(&self, name: &str) -> Result<f64> {
        read_double(&self.attr_read(name)?)
    }

    /// Write a number as locale-independent decimal text.
    pub fn attr_write_double(&self, name: &str, value: f64) -> Result<usize> {
        self.attr_write(name, &format_double(value))
    }

    /// Read an attribute as a decimal or `0x` hex integer.
    pub fn attr_read_longlong(&self, name: &str) -> Result<i64> {
        parse_longlong(&self.attr_read(name)?)
    }

    /// Write an integer as decimal text.
    pub fn attr_write_longlong(&self, name: &str, value: i64) -> Result<usize> {
        self.attr_write(name, &value.to_string())
    }

    /// Read an attribute as a boolean (non-zero integer).
    pub fn attr_read_bool(&self, name: &str) -> Result<bool> {
        Ok(self.attr_read_longlong(name)? != 0)
    }

    /// Write a boolean as `1` or `0`.
    pub fn attr_write_bool(&self, name: &str, value: bool) -> Result<usize> {
        self.attr_write(name, if value { "1" } else { "0" })
    }

    /// Trigger currently pacing this device.
    ///
    /// # Errors
    ///
    /// `NotSupported` when the transport has no trigger support.
    pub fn trigger(&self) -> Result<Option<DeviceRef<'ctx>>> {
        let Some(id) = self.ctx.backend().get_trigger(self.device)? else {
            return Ok(None);
        };
        self.ctx.find_device(&id).map(Some).ok_or_else(|| {
            IioError::invalid_argument(format!(
                "transport reported unknown trigger '{}' for {}",
                id,
                self.device.id()
            ))
        })
    }

    /// Attach `trigger` to this device, or detach with `None`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if `trigger` is not a trigger device of the same context,
    /// `NotSupported` when the transport has no trigger support.
    pub fn set_trigger(&self, trigger: Option<DeviceRef<'_>>) -> Result<()> {
        if let Some(t) = trigger {
            if !std::ptr::eq(t.ctx, self.ctx) {
                return Err(IioError::invalid_argument(
                    "trigger belongs to another context",
                ));
            }
            if !t.is_trigger() {
                return Err(IioError::invalid_argument(format!(
                    "{} is not a trigger device",
                    t.id()
                )));
            }
        }
        debug!(
            device = %self.device.id(),
            trigger = trigger.map(|t| t.device.id()),
            "Setting trigger"
        );
        self.ctx
            .backend()
            .set_trigger(self.device, trigger.map(|t| t.device))
    }

    /// Bytes per sample record for the currently enabled channels.
    pub fn sample_size(&self) -> usize {
        SampleLayout::new(self.device, &self.device.enabled_mask()).record_size()
    }

    /// Open a buffer of `capacity` samples over the currently enabled channels.
    pub fn create_buffer(&self, capacity: usize) -> Result<Buffer<'ctx>> {
        Buffer::open(*self, &self.device.enabled_mask(), capacity)
    }

    /// Open a buffer with the context's default capacity.
    pub fn create_default_buffer(&self) -> Result<Buffer<'ctx>> {
        self.create_buffer(self.ctx.options.default_buffer_capacity)
    }
}

/// Borrowed view of a channel inside its context.
#[derive(Debug, Clone, Copy)]
pub struct ChannelRef<'ctx> {
    device: DeviceRef<'ctx>,
    channel: &'ctx Channel,
}

impl<'ctx> Deref for ChannelRef<'ctx> {
    type Target = Channel;

    fn deref(&self) -> &Channel {
        self.channel
    }
}

impl<'ctx> ChannelRef<'ctx> {
    /// Owning device.
    pub fn device(&self) -> DeviceRef<'ctx> {
        self.device
    }

    /// Underlying descriptor, with the context's lifetime.
    pub fn channel(&self) -> &'ctx Channel {
        self.channel
    }

    /// Include this channel in the next buffer.
    ///
    /// # Errors
    ///
    /// `Busy` while a buffer is open on the device.
    pub fn enable(&self) -> Result<()> {
        self.set_enabled(true)
    }

    /// Exclude this channel from the next buffer.
    pub fn disable(&self) -> Result<()> {
        self.set_enabled(false)
    }

    fn set_enabled(&self, enabled: bool) -> Result<()> {
        if self.device.is_streaming() {
            return Err(IioError::Busy {
                device: self.device.id().to_owned(),
            });
        }
        self.channel.set_enabled(enabled);
        Ok(())
    }

    /// Attribute name equal to `name`, if the channel has it.
    pub fn find_attr(&self, name: &str) -> Option<&'ctx str> {
        self.channel
            .attrs()
            .iter()
            .find(|a| *a == name)
            .map(String::as_str)
    }

    fn check_attr(&self, name: &str) -> Result<()> {
        if self.channel.has_attr(name) {
            Ok(())
        } else {
            Err(IioError::invalid_argument(format!(
                "channel {} of {} has no attribute '{}'",
                self.channel.id(),
                self.device.id(),
                name
            )))
        }
    }

    /// Read an attribute's raw text into `dst`.
    pub fn attr_read_raw(&self, name: &str, dst: &mut [u8]) -> Result<usize> {
        self.check_attr(name)?;
        self.device
            .ctx
            .backend()
            .read_channel_attr(self.device.device, self.channel, name, dst)
    }

    /// Read an attribute as text, up to the first NUL.
    pub fn attr_read(&self, name: &str) -> Result<String> {
        self.check_attr(name)?;
        let ctx = self.device.ctx;
        ctx.read_text(|buf| {
            ctx.backend()
                .read_channel_attr(self.device.device, self.channel, name, buf)
        })
    }

    /// Write an attribute as text. Returns the bytes consumed.
    pub fn attr_write(&self, name: &str, value: &str) -> Result<usize> {
        self.check_attr(name)?;
        debug!(
            device = %self.device.id(),
            channel = %self.channel.id(),
            attr = name,
            value,
            "Writing channel attribute"
        );
        self.device
            .ctx
            .backend()
            .write_channel_attr(self.device.device, self.channel, name, value)
    }

    /// Read an attribute as a locale-independent decimal number.
    pub fn attr_read_double(&self, name: &str) -> Result<f64> {
        read_double(&self.attr_read(name)?)
    }

    /// Write a number as locale-independent decimal text.
    pub fn attr_write_double(&self, name: &str, value: f64) -> Result<usize> {
        self.attr_write(name, &format_double(value))
    }

    /// Read an attribute as a decimal or `0x` hex integer.
    pub fn attr_read_longlong(&self, name: &str) -> Result<i64> {
        parse_longlong(&self.attr_read(name)?)
    }

    /// Write an integer as decimal text.
    pub fn attr_write_longlong(&self, name: &str, value: i64) -> Result<usize> {
        self.attr_write(name, &value.to_string())
    }

    /// Read an attribute as a boolean.
    pub fn attr_read_bool(&self, name: &str) -> Result<bool> {
        Ok(self.attr_read_longlong(name)? != 0)
    }

    /// Write a boolean as `1` or `0`.
    pub fn attr_write_bool(&self, name: &str, value: bool) -> Result<usize> {
        self.attr_write(name, if value { "1" } else { "0" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ChannelBuilder;
    use crate::mask::ChannelMask;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Attribute store backend with no streaming support.
    #[derive(Debug, Default)]
    struct AttrBackend {
        values: Mutex<HashMap<String, String>>,
        calls: Arc<AtomicUsize>,
        shutdowns: Arc<AtomicUsize>,
    }

    impl AttrBackend {
        fn load(&self, key: String, dst: &mut [u8]) -> Result<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let values = self.values.lock();
            let value = values.get(&key).cloned().unwrap_or_default();
            let n = value.len().min(dst.len());
            dst[..n].copy_from_slice(&value.as_bytes()[..n]);
            Ok(n)
        }

        fn store(&self, key: String, value: &str) -> Result<usize> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.values.lock().insert(key, value.to_owned());
            Ok(value.len())
        }
    }

    impl Backend for AttrBackend {
        fn kind(&self) -> BackendKind {
            BackendKind::Mock
        }

        fn open(&self, _: &Device, _: &mut ChannelMask) -> Result<usize> {
            Err(IioError::not_supported("no streaming"))
        }

        fn close(&self, _: &Device) -> Result<()> {
            Err(IioError::not_open("no streaming"))
        }

        fn read(&self, _: &Device, _: &mut [u8], _: &mut ChannelMask) -> Result<usize> {
            Err(IioError::not_open("no streaming"))
        }

        fn write(&self, _: &Device, _: &[u8]) -> Result<usize> {
            Err(IioError::not_open("no streaming"))
        }

        fn read_device_attr(&self, device: &Device, attr: &str, dst: &mut [u8]) -> Result<usize> {
            self.load(format!("{}/{}", device.id(), attr), dst)
        }

        fn write_device_attr(&self, device: &Device, attr: &str, value: &str) -> Result<usize> {
            self.store(format!("{}/{}", device.id(), attr), value)
        }

        fn read_channel_attr(
            &self,
            device: &Device,
            channel: &Channel,
            attr: &str,
            dst: &mut [u8],
        ) -> Result<usize> {
            self.load(format!("{}/{}/{}", device.id(), channel.id(), attr), dst)
        }

        fn write_channel_attr(
            &self,
            device: &Device,
            channel: &Channel,
            attr: &str,
            value: &str,
        ) -> Result<usize> {
            self.store(format!("{}/{}/{}", device.id(), channel.id(), attr), value)
        }

        fn shutdown(&self, _: &Context) {
            self.shutdowns.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn context_with(backend: AttrBackend) -> Context {
        ContextBuilder::new("test")
            .device(
                DeviceBuilder::new("iio:device0")
                    .name("adc")
                    .attrs(["sampling_frequency", "powerdown"])
                    .channel(ChannelBuilder::new("voltage0", 0).attrs(["raw", "scale"])),
            )
            .device(DeviceBuilder::new("trigger0").name("sysfstrig0"))
            .build(backend)
            .unwrap()
    }

    #[test]
    fn test_lookup() {
        let ctx = context_with(AttrBackend::default());
        assert_eq!(ctx.device_count(), 2);
        assert_eq!(ctx.backend_kind(), BackendKind::Mock);
        assert_eq!(ctx.find_device("adc").unwrap().id(), "iio:device0");
        assert!(ctx.find_device("trigger0").unwrap().is_trigger());
        assert!(ctx.find_device("nope").is_none());

        let dev = ctx.device(0).unwrap();
        let ch = dev.find_channel("voltage0", false).unwrap();
        assert_eq!(ctx.get(ch.device_id()).unwrap().id(), dev.id());
        assert_eq!(ch.device().id(), "iio:device0");
    }

    #[test]
    fn test_duplicate_device_id_rejected() {
        let err = ContextBuilder::new("dup")
            .device(DeviceBuilder::new("iio:device0"))
            .device(DeviceBuilder::new("iio:device0"))
            .build(AttrBackend::default())
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_unknown_attribute_never_reaches_backend() {
        let backend = AttrBackend::default();
        let calls = Arc::clone(&backend.calls);
        let ctx = context_with(backend);
        let dev = ctx.device(0).unwrap();

        assert!(dev.attr_read("bogus").unwrap_err().is_invalid_argument());
        assert!(dev.attr_write("bogus", "1").unwrap_err().is_invalid_argument());
        let ch = dev.channel(0).unwrap();
        assert!(ch.attr_read("offset").unwrap_err().is_invalid_argument());
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        ch.attr_read("scale").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_typed_attribute_helpers() {
        let ctx = context_with(AttrBackend::default());
        let dev = ctx.device(0).unwrap();

        dev.attr_write_double("sampling_frequency", 1000.5).unwrap();
        assert_eq!(dev.attr_read("sampling_frequency").unwrap(), "1000.500000");
        assert_eq!(dev.attr_read_double("sampling_frequency").unwrap(), 1000.5);

        dev.attr_write_bool("powerdown", true).unwrap();
        assert!(dev.attr_read_bool("powerdown").unwrap());

        let ch = dev.channel(0).unwrap();
        ch.attr_write_longlong("raw", -1234).unwrap();
        assert_eq!(ch.attr_read_longlong("raw").unwrap(), -1234);
        ch.attr_write("raw", "0x1F\n").unwrap();
        assert_eq!(ch.attr_read_longlong("raw").unwrap(), 31);
        ch.attr_write("scale", "volts").unwrap();
        assert!(matches!(
            ch.attr_read_double("scale"),
            Err(IioError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_attr_read_stops_at_nul() {
        let ctx = context_with(AttrBackend::default());
        let dev = ctx.device(0).unwrap();
        dev.attr_write("sampling_frequency", "100\0garbage").unwrap();
        assert_eq!(dev.attr_read("sampling_frequency").unwrap(), "100");
    }

    #[test]
    fn test_trigger_not_supported_by_default() {
        let ctx = context_with(AttrBackend::default());
        let dev = ctx.device(0).unwrap();
        let trig = ctx.find_device("trigger0").unwrap();
        assert!(dev.trigger().unwrap_err().is_not_supported());
        assert!(dev.set_trigger(Some(trig)).unwrap_err().is_not_supported());
        // a non-trigger device is rejected before the backend is asked
        assert!(dev.set_trigger(Some(dev)).unwrap_err().is_invalid_argument());
    }

    #[test]
    fn test_shutdown_called_once_on_drop() {
        let backend = AttrBackend::default();
        let shutdowns = Arc::clone(&backend.shutdowns);
        let ctx = context_with(backend);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 0);
        drop(ctx);
        assert_eq!(shutdowns.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_parse_longlong() {
        assert_eq!(parse_longlong(" 42 ").unwrap(), 42);
        assert_eq!(parse_longlong("-0x10").unwrap(), -16);
        assert_eq!(parse_longlong("+7").unwrap(), 7);
        assert!(parse_longlong("4.2").is_err());
    }
}
