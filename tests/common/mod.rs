//! Shared test utilities for port tests.
//!
//! This module provides:
//! - Opening ports on scripted mock devices
//! - Mode builders for the common line settings
//! - Assertions on error kinds and handle state

#![allow(dead_code)]

use comport::port::{CommDevice, ErrorKind, MockDevice, Mode, OpenOptions, PortError, SerialPort};
use std::time::Duration;

/// Open `name` on a fresh mock device with default options.
///
/// Returns the port and a clone of the device for scripting and inspection.
pub fn open_mock(name: &str) -> (SerialPort<MockDevice>, MockDevice) {
    open_mock_with(name, OpenOptions::default())
}

/// Open `name` on a fresh mock device with the given options.
pub fn open_mock_with(name: &str, options: OpenOptions) -> (SerialPort<MockDevice>, MockDevice) {
    let mock = MockDevice::new();
    let port = open_on(&mock, name, options).expect("mock open should succeed");
    (port, mock)
}

/// Open `name` on an existing mock, so a test can script it first.
pub fn open_on(
    mock: &MockDevice,
    name: &str,
    options: OpenOptions,
) -> Result<SerialPort<MockDevice>, PortError> {
    let device = mock.clone();
    options.open_with(name, move |_| Ok(device))
}

/// Options with an idle limit, for reads that must not block forever.
pub fn options_with_idle_timeout(timeout: Duration) -> OpenOptions {
    OpenOptions::default().idle_timeout(Some(timeout))
}

/// 8N1 at `baud`.
pub fn mode_8n1(baud: u32) -> Mode {
    Mode::new(baud)
}

/// Everything zeroed, as callers pass when they want the defaults.
pub fn zero_mode() -> Mode {
    Mode::new(0).data_bits(0)
}

/// Assert that `result` failed with `kind`.
pub fn assert_error_kind<T: std::fmt::Debug>(result: Result<T, PortError>, kind: ErrorKind) {
    match result {
        Ok(value) => panic!("expected {kind:?}, got Ok({value:?})"),
        Err(err) => assert_eq!(err.kind(), kind, "unexpected error: {err}"),
    }
}

/// Assert that the handle is unusable: closed and rejecting every operation.
pub fn assert_port_closed<D: CommDevice>(port: &mut SerialPort<D>) {
    assert!(!port.is_open(), "port should report closed");
    assert_error_kind(port.write(b"x"), ErrorKind::Closed);
    assert_error_kind(port.read(&mut [0u8; 4]), ErrorKind::Closed);
    assert_error_kind(port.set_mode(&Mode::default()), ErrorKind::Closed);
    assert_error_kind(port.send_break(Duration::ZERO), ErrorKind::Closed);
    assert_error_kind(port.probe_liveness(), ErrorKind::Closed);
}
