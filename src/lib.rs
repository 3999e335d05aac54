//! rust-iio
//!
//! Host-side library for industrial I/O hardware: ADCs, DACs, accelerometers and similar
//! peripherals exposed as devices, channels and attributes, with buffered streaming of
//! bit-packed sample records.
//!
//! This crate is the application-facing layer. It re-exports the object model from
//! [`iio_core`] and the in-memory transport from [`iio_driver_mock`], and adds:
//!
//! - [`config`]: layered configuration (TOML file plus `RUST_IIO_` environment variables)
//! - [`tracing_setup`]: global `tracing` subscriber installation
//! - [`capture`]: one-shot acquisition helpers
//!
//! # Example
//! ```no_run
//! use rust_iio::{capture, config::IioConfig, tracing_setup};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = IioConfig::load()?;
//! tracing_setup::init_from_config(&config)?;
//!
//! let (ctx, _mock) = capture::open_mock(&config)?;
//! let adc = ctx.find_device("ad7606").ok_or_else(|| anyhow::anyhow!("no adc"))?;
//! let burst = capture::capture(adc, &["voltage0", "voltage1"], 256)?;
//! println!("{:?}", burst.channel("voltage0"));
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod config;
pub mod tracing_setup;

pub use iio_core;
pub use iio_driver_mock;

pub use iio_core::{
    process_samples, Backend, BackendKind, Buffer, Channel, ChannelMask, ChannelRef, Context,
    ContextBuilder, ContextOptions, DataFormat, Device, DeviceRef, IioError, SampleValue,
};
