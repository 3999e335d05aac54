//! One-shot acquisition helpers for applications and demos.
//!
//! These wrap the object model in `anyhow` so command-line tools can stream a burst of
//! samples with a single call and readable error context.

use std::collections::BTreeMap;

use anyhow::{bail, Context as _, Result};
use iio_core::{Context, DeviceRef};
use iio_driver_mock::{demo_context, MockBackend};
use tracing::{debug, info};

use crate::config::IioConfig;

/// Raw values captured per channel, in record order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capture {
    /// Bytes per sample record under the granted mask.
    pub sample_size: usize,
    /// Whole records decoded.
    pub records: usize,
    /// Values keyed by channel id. Vector channels contribute `repeat` values per record.
    pub values: BTreeMap<String, Vec<i64>>,
}

impl Capture {
    /// Values of one channel, empty if it was not streamed.
    pub fn channel(&self, id: &str) -> &[i64] {
        self.values.get(id).map(Vec::as_slice).unwrap_or_default()
    }
}

/// Validate `config` and build the simulated topology over the mock transport.
pub fn open_mock(config: &IioConfig) -> Result<(Context, MockBackend)> {
    config.validate().context("configuration rejected")?;
    let (ctx, mock) = demo_context(config.mock.clone(), config.context.clone())
        .context("failed to build mock context")?;
    info!(
        context = ctx.name(),
        devices = ctx.device_count(),
        backend = %ctx.backend_kind(),
        "Mock context ready"
    );
    Ok((ctx, mock))
}

/// Stream `records` samples of the named input channels of `device`.
///
/// Only the named channels are enabled for the session, inputs and outputs alike are
/// disabled first; the previous enable state is restored afterwards. Channels the transport adds to the granted mask are captured
/// too.
pub fn capture(device: DeviceRef<'_>, channels: &[&str], records: usize) -> Result<Capture> {
    if channels.is_empty() {
        bail!("no channel requested on {}", device.id());
    }

    let previous: Vec<_> = device.channels().filter(|c| c.is_enabled()).collect();
    // enabled outputs would otherwise widen the requested mask
    for channel in device.channels() {
        channel.disable()?;
    }

    let result = stream(device, channels, records);

    for channel in device.channels() {
        channel.disable()?;
    }
    for channel in previous {
        channel.enable()?;
    }
    result
}

fn stream(device: DeviceRef<'_>, channels: &[&str], records: usize) -> Result<Capture> {
    for name in channels {
        let channel = device
            .find_channel(name, false)
            .with_context(|| format!("{} has no input channel {}", device.id(), name))?;
        channel.enable()?;
    }

    let mut buffer = device
        .create_buffer(records)
        .with_context(|| format!("failed to open buffer on {}", device.id()))?;
    let bytes = buffer.refill().context("refill failed")?;
    debug!(device = %device.id(), bytes, "Capture refilled");

    let mut values: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    let consumed = buffer.foreach_sample(|channel, value| {
        values
            .entry(channel.id().to_string())
            .or_default()
            .push(value.as_i64());
        Ok(())
    })?;

    let sample_size = buffer.step();
    buffer.close()?;

    Ok(Capture {
        sample_size,
        records: consumed / sample_size,
        values,
    })
}
