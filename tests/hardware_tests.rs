//! Tests requiring actual serial hardware.
//!
//! Compiled only with the `hardware-tests` feature and skipped when no test
//! port is configured.
//!
//! # Running Hardware Tests
//!
//! ```bash
//! export TEST_PORT=COM3                  # or ttyUSB0 on Linux
//! export TEST_BAUD=9600                  # optional, default: 9600
//! export LOOPBACK_ENABLED=1              # if the port has TX-RX loopback
//!
//! cargo test --features hardware-tests --test hardware_tests
//! ```
//!
//! The same values can be set in the `[testing]` section of `config.toml`.

#![cfg(feature = "hardware-tests")]

mod common;

use common::assert_error_kind;
use comport::config::{ConfigLoader, TestingConfig};
use comport::port::{list_ports, ErrorKind, Mode, OpenOptions, SerialPort};
use std::io::Write;
use std::time::Duration;

/// Skip test if hardware is not available.
fn testing_config() -> Option<TestingConfig> {
    let testing = ConfigLoader::with_defaults().into_config().testing;
    if testing.port.is_none() {
        println!("Skipping hardware test: no test port configured");
        return None;
    }
    Some(testing)
}

fn open_test_port(testing: &TestingConfig) -> SerialPort {
    let name = testing.port.as_deref().expect("port checked by testing_config");
    OpenOptions::new(Mode::new(testing.baud))
        .idle_timeout(Some(testing.timeout()))
        .open(name)
        .expect("Failed to open test port")
}

#[test]
fn test_real_port_open_close() {
    let Some(testing) = testing_config() else {
        return;
    };

    let mut port = open_test_port(&testing);
    assert!(port.is_open());
    port.close().expect("Failed to close port");
    assert!(!port.is_open());
}

#[test]
fn test_real_port_is_listed() {
    let Some(testing) = testing_config() else {
        return;
    };

    let names = list_ports().expect("Enumeration failed");
    let wanted = testing.port.unwrap();
    assert!(
        names.iter().any(|name| name.ends_with(&wanted)),
        "{wanted} not in {names:?}"
    );
}

#[test]
fn test_real_port_applies_mode() {
    let Some(testing) = testing_config() else {
        return;
    };

    let mut port = open_test_port(&testing);
    port.set_mode(&Mode::new(19200)).expect("Failed to set mode");
    let block = port.control_block().expect("Failed to read control block");
    assert_eq!(block.baud_rate, 19200);
    assert_eq!(block.byte_size, 8);
}

#[test]
fn test_real_port_liveness_probe() {
    let Some(testing) = testing_config() else {
        return;
    };

    let mut port = open_test_port(&testing);
    port.probe_liveness().expect("Attached device failed the probe");
    assert!(port.is_open());
}

#[test]
fn test_real_port_break() {
    let Some(testing) = testing_config() else {
        return;
    };

    let mut port = open_test_port(&testing);
    port.send_break(Duration::from_millis(50))
        .expect("Failed to send break");
    assert!(port.is_open());
}

#[test]
fn test_loopback_echo() {
    let Some(testing) = testing_config() else {
        return;
    };
    if !testing.loopback_enabled {
        println!("Skipping loopback test: loopback not enabled");
        return;
    }

    let mut port = open_test_port(&testing);
    let payload = b"comport loopback\r\n";
    port.write_all(payload).expect("Write failed");

    let mut received = Vec::new();
    let mut buffer = [0u8; 64];
    while received.len() < payload.len() {
        let n = port.read(&mut buffer).expect("Read failed");
        received.extend_from_slice(&buffer[..n]);
    }
    assert_eq!(received, payload);
}

#[test]
fn test_quiet_line_times_out() {
    let Some(testing) = testing_config() else {
        return;
    };
    if testing.loopback_enabled {
        // Loopback ports may echo line noise back
        return;
    }

    let mut port = OpenOptions::new(Mode::new(testing.baud))
        .read_timeout(Duration::from_millis(100))
        .idle_timeout(Some(Duration::from_millis(300)))
        .open(testing.port.as_deref().unwrap())
        .expect("Failed to open test port");
    assert_error_kind(port.read(&mut [0u8; 16]), ErrorKind::ReadTimeout);
    assert!(port.is_open());
}
