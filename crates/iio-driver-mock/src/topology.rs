//! Demo hardware topology served by the mock transport.

use iio_core::{
    ByteOrder, ChannelBuilder, Context, ContextBuilder, ContextOptions, DataFormat,
    DeviceBuilder, Modifier, Result,
};

use crate::backend::MockBackend;
use crate::config::MockConfig;

/// Accelerometer device id.
pub const ACCEL: &str = "iio:device0";
/// 8-channel ADC device id.
pub const ADC: &str = "iio:device1";
/// 4-channel DAC device id.
pub const DAC: &str = "iio:device2";
/// Software trigger device id.
pub const TRIGGER: &str = "trigger0";

fn accelerometer() -> DeviceBuilder {
    let axis = DataFormat::new(16, 13)
        .signed()
        .with_byte_order(ByteOrder::little_endian());
    let mut device = DeviceBuilder::new(ACCEL)
        .name("adxl345")
        .attrs(["sampling_frequency", "sampling_frequency_available"]);
    for (index, modifier) in [Modifier::X, Modifier::Y, Modifier::Z].into_iter().enumerate() {
        let suffix = modifier.as_suffix().unwrap_or_default();
        device = device.channel(
            ChannelBuilder::new(format!("accel_{}", suffix), index)
                .modifier(modifier)
                .format(axis)
                .attrs(["raw", "scale", "calibbias"]),
        );
    }
    device.channel(
        ChannelBuilder::new("timestamp", 3).format(DataFormat::new(64, 64).signed()),
    )
}

fn adc() -> DeviceBuilder {
    let sample = DataFormat::new(16, 16)
        .signed()
        .with_byte_order(ByteOrder::big_endian());
    (0..8).fold(
        DeviceBuilder::new(ADC)
            .name("ad7606")
            .attrs(["sampling_frequency", "oversampling_ratio"]),
        |device, index| {
            device.channel(
                ChannelBuilder::new(format!("voltage{}", index), index)
                    .format(sample)
                    .attrs(["raw", "scale"]),
            )
        },
    )
}

fn dac() -> DeviceBuilder {
    // 12-bit codes left-aligned in a 16-bit word
    let code = DataFormat::new(16, 12)
        .with_shift(4)
        .with_byte_order(ByteOrder::big_endian());
    (0..4).fold(DeviceBuilder::new(DAC).name("ad5686"), |device, index| {
        device.channel(
            ChannelBuilder::new(format!("voltage{}", index), index)
                .output()
                .format(code)
                .attrs(["raw", "scale", "powerdown"]),
        )
    })
}

fn trigger() -> DeviceBuilder {
    DeviceBuilder::new(TRIGGER)
        .name("sysfstrig0")
        .attr("trigger_now")
}

fn seed_attributes(mock: &MockBackend) {
    mock.set_device_attr(ACCEL, "sampling_frequency", "100.000000");
    mock.set_device_attr(
        ACCEL,
        "sampling_frequency_available",
        "0.10 0.20 0.39 0.78 1.56 3.13 6.25 12.50 25 50 100 200 400 800 1600 3200",
    );
    for axis in ["accel_x", "accel_y", "accel_z"] {
        mock.set_channel_attr(ACCEL, axis, false, "raw", "0");
        mock.set_channel_attr(ACCEL, axis, false, "scale", "0.038300");
        mock.set_channel_attr(ACCEL, axis, false, "calibbias", "0");
    }

    mock.set_device_attr(ADC, "sampling_frequency", "200000");
    mock.set_device_attr(ADC, "oversampling_ratio", "1");
    for index in 0..8 {
        let id = format!("voltage{}", index);
        mock.set_channel_attr(ADC, &id, false, "raw", "0");
        mock.set_channel_attr(ADC, &id, false, "scale", "0.152587890");
    }

    for index in 0..4 {
        let id = format!("voltage{}", index);
        mock.set_channel_attr(DAC, &id, true, "raw", "0");
        mock.set_channel_attr(DAC, &id, true, "scale", "0.610351562");
        mock.set_channel_attr(DAC, &id, true, "powerdown", "0");
    }

    mock.set_device_attr(TRIGGER, "trigger_now", "0");
}

/// Build a context over a simulated accelerometer, ADC, DAC and software trigger.
///
/// Returns the context and a handle to its transport for scripting and inspection.
pub fn demo_context(config: MockConfig, options: ContextOptions) -> Result<(Context, MockBackend)> {
    let mock = MockBackend::new(config);
    seed_attributes(&mock);

    let context = ContextBuilder::new("mock")
        .description("Simulated IIO devices")
        .options(options)
        .device(accelerometer())
        .device(adc())
        .device(dac())
        .device(trigger())
        .build(mock.clone())?;
    Ok((context, mock))
}
