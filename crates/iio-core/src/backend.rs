//! Backend capability interface.
//!
//! A [`Backend`] is one transport (local sysfs, network daemon, USB, in-memory mock). The
//! [`Context`] holds exactly one, chosen when the context is built, and routes every
//! attribute and streaming operation through it. The core never inspects which concrete
//! transport it talks to.
//!
//! All methods take `&self`: transports that keep per-session state use interior
//! mutability. Every failure is returned as an [`IioError`]; implementations must not
//! panic across this interface.
//!
//! [`IioError`]: crate::IioError

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::channel::Channel;
use crate::context::Context;
use crate::device::Device;
use crate::error::{IioError, Result};
use crate::mask::ChannelMask;

/// Transport family of a backend, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Kernel sysfs and character devices on this host.
    Local,
    /// Remote daemon reached over the network.
    Network,
    /// Device attached over USB.
    Usb,
    /// In-memory transport for tests and demos.
    Mock,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Local => "local",
            Self::Network => "network",
            Self::Usb => "usb",
            Self::Mock => "mock",
        };
        f.write_str(name)
    }
}

/// Operations a transport provides to the object model.
pub trait Backend: fmt::Debug + Send + Sync {
    /// Transport family.
    fn kind(&self) -> BackendKind;

    /// Begin a streaming session on `device` restricted to the channels in `mask`.
    ///
    /// The transport may widen `mask` in place when hardware forces channels to be
    /// streamed together; the mask left in place is the granted mask. Returns the size in
    /// bytes of one sample record under the granted mask.
    fn open(&self, device: &Device, mask: &mut ChannelMask) -> Result<usize>;

    /// End the streaming session on `device`.
    ///
    /// Returns `NotOpen` when no session is open.
    fn close(&self, device: &Device) -> Result<()>;

    /// Fill `dst` with interleaved sample records for the channels in `mask`.
    ///
    /// `mask` is the granted mask of the session. Changes made to it here do not alter
    /// the session layout.
    ///
    /// Returns the number of bytes written to `dst`.
    fn read(&self, device: &Device, dst: &mut [u8], mask: &mut ChannelMask) -> Result<usize>;

    /// Push interleaved sample records from `src` to the device's output channels.
    ///
    /// Returns the number of bytes consumed.
    fn write(&self, device: &Device, src: &[u8]) -> Result<usize>;

    /// Read a device attribute into `dst` as text. Returns the number of bytes produced.
    fn read_device_attr(&self, device: &Device, attr: &str, dst: &mut [u8]) -> Result<usize>;

    /// Write `value` to a device attribute. Returns the number of bytes consumed.
    fn write_device_attr(&self, device: &Device, attr: &str, value: &str) -> Result<usize>;

    /// Read a channel attribute into `dst` as text. Returns the number of bytes produced.
    fn read_channel_attr(
        &self,
        device: &Device,
        channel: &Channel,
        attr: &str,
        dst: &mut [u8],
    ) -> Result<usize>;

    /// Write `value` to a channel attribute. Returns the number of bytes consumed.
    fn write_channel_attr(
        &self,
        device: &Device,
        channel: &Channel,
        attr: &str,
        value: &str,
    ) -> Result<usize>;

    /// Id of the trigger currently pacing `device`, if any.
    fn get_trigger(&self, device: &Device) -> Result<Option<String>> {
        let _ = device;
        Err(IioError::not_supported("transport has no trigger support"))
    }

    /// Attach `trigger` to `device`, or detach with `None`.
    fn set_trigger(&self, device: &Device, trigger: Option<&Device>) -> Result<()> {
        let _ = (device, trigger);
        Err(IioError::not_supported("transport has no trigger support"))
    }

    /// Release transport resources. Called exactly once, when the context is dropped.
    fn shutdown(&self, context: &Context) {
        let _ = context;
    }
}
