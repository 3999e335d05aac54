//! Mock transport for rust-iio
//!
//! This crate provides an in-memory [`Backend`](iio_core::Backend) so applications and
//! tests can exercise the full object model without hardware.
//!
//! # Features
//!
//! - Attribute storage seeded per device and channel
//! - Sample generation (ramp, constant, seeded noise) or scripted raw chunks
//! - Channel grouping: requesting one member of a group grants the whole group
//! - Trigger get/set, optionally disabled to exercise `NotSupported` paths
//! - Error injection through [`ErrorConfig`] / [`ErrorScenario`]
//! - Call statistics through [`MockStats`]
//!
//! # Example
//!
//! ```rust,no_run
//! use iio_core::ContextOptions;
//! use iio_driver_mock::{demo_context, MockConfig};
//!
//! # fn example() -> anyhow::Result<()> {
//! let (ctx, mock) = demo_context(MockConfig::default(), ContextOptions::default())?;
//! let adc = ctx.find_device("ad7606").ok_or_else(|| anyhow::anyhow!("no adc"))?;
//! adc.find_channel("voltage0", false).ok_or_else(|| anyhow::anyhow!("no channel"))?.enable()?;
//!
//! let mut buffer = adc.create_buffer(128)?;
//! buffer.refill()?;
//! buffer.foreach_sample(|channel, value| {
//!     println!("{} = {}", channel.id(), value.as_i64());
//!     Ok(())
//! })?;
//! println!("{} reads", mock.stats().reads());
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod common;
pub mod config;
pub mod pattern;
pub mod topology;

// Re-export common types
pub use backend::{MockBackend, MockStats};
pub use common::{ErrorConfig, ErrorScenario, MockOp, MockRng};
pub use config::{MockConfig, SamplePattern};
pub use topology::demo_context;
