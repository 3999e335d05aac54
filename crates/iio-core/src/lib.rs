//! `iio-core`
//!
//! Host-side object model for industrial I/O hardware (ADCs, DACs, IMUs and similar
//! peripherals), independent of the transport that reaches the hardware.
//!
//! # Architecture
//!
//! - [`Context`] owns the discovered [`Device`]s and one bound [`Backend`]. Devices and
//!   channels are reached through the borrowed views [`DeviceRef`] and [`ChannelRef`].
//! - [`Backend`] is the capability interface a transport implements (local, network,
//!   USB, or the in-memory mock from `iio-driver-mock`).
//! - [`Buffer`] is one streaming session: requested and granted [`ChannelMask`]s plus
//!   raw sample storage.
//! - [`process_samples`] demultiplexes interleaved, bit-packed sample records into
//!   per-channel values described by each channel's [`DataFormat`].
//! - [`numeric`] converts attribute text to and from `f64` regardless of host locale.
//!
//! # Example
//!
//! ```rust,ignore
//! let ctx = discover()?;
//! let adc = ctx.find_device("ad7606").ok_or("no adc")?;
//! for channel in adc.channels().filter(|c| !c.is_output()) {
//!     channel.enable()?;
//! }
//! let mut buffer = adc.create_buffer(256)?;
//! buffer.refill()?;
//! buffer.foreach_sample(|channel, value| {
//!     println!("{} = {}", channel.id(), value.as_i64());
//!     Ok(())
//! })?;
//! ```

pub mod backend;
pub mod buffer;
pub mod channel;
pub mod context;
pub mod demux;
pub mod device;
pub mod error;
pub mod format;
pub mod mask;
pub mod numeric;
pub mod version;

pub use backend::{Backend, BackendKind};
pub use buffer::Buffer;
pub use channel::{Channel, ChannelBuilder, Direction, Modifier};
pub use context::{ChannelRef, Context, ContextBuilder, ContextOptions, DeviceRef};
pub use demux::{process_samples, SampleLayout};
pub use device::{Device, DeviceBuilder, DeviceId};
pub use error::{IioError, Result};
pub use format::{ByteOrder, DataFormat, SampleValue};
pub use mask::ChannelMask;
pub use numeric::{format_double, read_double, write_double};
pub use version::{library_version, Version};
