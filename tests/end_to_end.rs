//! End-to-end tests: configuration file to decoded samples over the mock transport.

use std::io::Write;

use rust_iio::capture::{capture, open_mock};
use rust_iio::config::IioConfig;
use rust_iio::iio_driver_mock::topology::{ADC, DAC, TRIGGER};
use serial_test::serial;
use tracing_test::traced_test;

fn load(contents: &str) -> IioConfig {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    IioConfig::load_from(file.path()).expect("load config")
}

#[test]
#[serial]
fn test_shipped_config_is_valid() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/iio.toml");
    let config = IioConfig::load_from(path).unwrap();
    config.validate().unwrap();
    assert_eq!(config, IioConfig::default());
}

#[test]
#[serial]
fn test_channel_groups_from_config_reach_capture() {
    let config = load(
        r#"
        [mock]
        channel_groups = [[0, 1]]
        "#,
    );
    let (ctx, mock) = open_mock(&config).unwrap();
    let adc = ctx.find_device("ad7606").unwrap();

    let burst = capture(adc, &["voltage0"], 3).unwrap();

    // voltage1 streams with voltage0 on this hardware
    assert_eq!(burst.sample_size, 4);
    assert_eq!(burst.channel("voltage0"), &[0, 1, 2]);
    assert_eq!(burst.channel("voltage1"), &[1, 2, 3]);
    assert_eq!(mock.stats().opens(), 1);
    assert_eq!(mock.stats().closes(), 1);
    assert!(!mock.is_streaming(ADC));
}

#[test]
#[serial]
fn test_constant_pattern_sign_extends() {
    let config = load(
        r#"
        [mock]
        pattern = "constant"
        constant_value = -1234
        "#,
    );
    let (ctx, _mock) = open_mock(&config).unwrap();
    let accel = ctx.find_device("adxl345").unwrap();

    let burst = capture(accel, &["accel_x", "accel_z"], 2).unwrap();
    assert_eq!(burst.channel("accel_x"), &[-1234, -1234]);
    assert_eq!(burst.channel("accel_z"), &[-1234, -1234]);
}

#[test]
fn test_attributes_use_locale_independent_numbers() {
    let (ctx, mock) = open_mock(&IioConfig::default()).unwrap();
    let adc = ctx.find_device(ADC).unwrap();

    adc.attr_write_double("sampling_frequency", 1000.5).unwrap();
    assert_eq!(
        mock.device_attr(ADC, "sampling_frequency").as_deref(),
        Some("1000.500000")
    );
    assert_eq!(adc.attr_read_double("sampling_frequency").unwrap(), 1000.5);

    let scale = adc
        .find_channel("voltage2", false)
        .unwrap()
        .attr_read_double("scale")
        .unwrap();
    assert!((scale - 0.152587890).abs() < 1e-12);
}

#[test]
fn test_dac_output_through_buffer() {
    let (ctx, mock) = open_mock(&IioConfig::default()).unwrap();
    let dac = ctx.find_device(DAC).unwrap();
    let out = dac.find_channel("voltage0", true).unwrap();
    out.enable().unwrap();

    let mut buffer = dac.create_buffer(2).unwrap();
    let format = *out.format();
    for record in buffer.data_mut().chunks_exact_mut(2) {
        format.insert(0xABC, record);
    }
    assert_eq!(buffer.push().unwrap(), 4);
    drop(buffer);

    assert_eq!(mock.written(DAC), vec![0xAB, 0xC0, 0xAB, 0xC0]);
}

#[test]
fn test_trigger_attach_and_detach() {
    let (ctx, _mock) = open_mock(&IioConfig::default()).unwrap();
    let adc = ctx.find_device(ADC).unwrap();
    let trigger = ctx.find_device(TRIGGER).unwrap();

    adc.set_trigger(Some(trigger)).unwrap();
    assert_eq!(adc.trigger().unwrap().map(|t| t.id().to_string()).as_deref(), Some(TRIGGER));

    adc.set_trigger(None).unwrap();
    assert!(adc.trigger().unwrap().is_none());
}

#[test]
#[traced_test]
fn test_open_mock_logs_topology() {
    let (_ctx, _mock) = open_mock(&IioConfig::default()).unwrap();
    assert!(logs_contain("Mock context ready"));
}

