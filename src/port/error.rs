//! Port-specific error types.
//!
//! Every failure carries enough information for the caller to tell whether
//! the handle that produced it is still usable; see [`PortError::closes_handle`].

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur during serial port operations.
#[derive(Debug, Error)]
pub enum PortError {
    /// The device does not exist.
    #[error("Serial port not found: {0}")]
    NotFound(String),

    /// The device exists but is held exclusively by someone else.
    #[error("Serial port is busy: {0}")]
    Busy(String),

    /// Reading or writing the device control record failed while configuring
    /// the port. The handle has been closed.
    #[error("Invalid serial port configuration: {0}")]
    InvalidConfiguration(#[source] io::Error),

    /// A break-signal or liveness operation failed on a previously open port.
    /// The handle has been closed.
    #[error("Invalid serial port: {0}")]
    InvalidSerialPort(#[source] io::Error),

    /// Device discovery failed. No partial list is ever returned.
    #[error("Failed to enumerate serial ports: {0}")]
    EnumerationFailed(#[source] io::Error),

    /// No data arrived within the configured idle timeout while the device
    /// stayed attached.
    #[error("No data received within {0:?}")]
    ReadTimeout(Duration),

    /// The handle was closed, either explicitly or by an earlier failure.
    #[error("Serial port is closed")]
    Closed,

    /// Platform error surfaced unchanged.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Classification of a [`PortError`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PortNotFound,
    PortBusy,
    InvalidConfiguration,
    InvalidSerialPort,
    EnumerationFailed,
    ReadTimeout,
    Closed,
    Io,
}

impl PortError {
    /// Create a NotFound error from a port name.
    pub fn not_found(port_name: impl Into<String>) -> Self {
        Self::NotFound(port_name.into())
    }

    /// Create a Busy error from a port name.
    pub fn busy(port_name: impl Into<String>) -> Self {
        Self::Busy(port_name.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::PortNotFound,
            Self::Busy(_) => ErrorKind::PortBusy,
            Self::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            Self::InvalidSerialPort(_) => ErrorKind::InvalidSerialPort,
            Self::EnumerationFailed(_) => ErrorKind::EnumerationFailed,
            Self::ReadTimeout(_) => ErrorKind::ReadTimeout,
            Self::Closed => ErrorKind::Closed,
            Self::Io(_) => ErrorKind::Io,
        }
    }

    /// Whether the operation that returned this error closed the handle.
    ///
    /// `Closed` reports `true` as well: the handle is unusable either way.
    pub fn closes_handle(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfiguration(_) | Self::InvalidSerialPort(_) | Self::Closed
        )
    }

    /// The underlying platform error, if any.
    pub fn io_error(&self) -> Option<&io::Error> {
        match self {
            Self::InvalidConfiguration(e)
            | Self::InvalidSerialPort(e)
            | Self::EnumerationFailed(e)
            | Self::Io(e) => Some(e),
            _ => None,
        }
    }

    /// Map a failure to acquire the device into the open-time taxonomy.
    pub(crate) fn from_open(port_name: &str, err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::busy(port_name),
            io::ErrorKind::NotFound => Self::not_found(port_name),
            _ => Self::Io(err),
        }
    }
}

impl From<PortError> for io::Error {
    fn from(err: PortError) -> Self {
        match err {
            PortError::Io(e) => e,
            PortError::NotFound(_) => io::Error::new(io::ErrorKind::NotFound, err),
            PortError::Busy(_) => io::Error::new(io::ErrorKind::PermissionDenied, err),
            PortError::ReadTimeout(_) => io::Error::new(io::ErrorKind::TimedOut, err),
            PortError::Closed => io::Error::new(io::ErrorKind::NotConnected, err),
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PortError::not_found("COM9");
        assert_eq!(err.to_string(), "Serial port not found: COM9");

        let err = PortError::busy("/dev/ttyUSB0");
        assert_eq!(err.to_string(), "Serial port is busy: /dev/ttyUSB0");

        assert_eq!(PortError::Closed.to_string(), "Serial port is closed");
    }

    #[test]
    fn test_open_error_classification() {
        let denied = io::Error::from(io::ErrorKind::PermissionDenied);
        assert_eq!(PortError::from_open("COM3", denied).kind(), ErrorKind::PortBusy);

        let missing = io::Error::from(io::ErrorKind::NotFound);
        assert_eq!(PortError::from_open("COM9", missing).kind(), ErrorKind::PortNotFound);

        let other = io::Error::new(io::ErrorKind::InvalidInput, "bad name");
        let err = PortError::from_open("COM3", other);
        assert_eq!(err.kind(), ErrorKind::Io);
        assert_eq!(err.io_error().map(io::Error::kind), Some(io::ErrorKind::InvalidInput));
    }

    #[test]
    fn test_closes_handle() {
        let io = || io::Error::from(io::ErrorKind::BrokenPipe);
        assert!(PortError::InvalidConfiguration(io()).closes_handle());
        assert!(PortError::InvalidSerialPort(io()).closes_handle());
        assert!(PortError::Closed.closes_handle());
        assert!(!PortError::Io(io()).closes_handle());
        assert!(!PortError::ReadTimeout(Duration::from_secs(1)).closes_handle());
        assert!(!PortError::not_found("COM1").closes_handle());
    }

    #[test]
    fn test_into_io_error_keeps_raw_error() {
        let raw = io::Error::from_raw_os_error(5);
        let converted: io::Error = PortError::Io(raw).into();
        assert_eq!(converted.raw_os_error(), Some(5));

        let converted: io::Error = PortError::ReadTimeout(Duration::from_millis(500)).into();
        assert_eq!(converted.kind(), io::ErrorKind::TimedOut);
        assert!(converted.to_string().contains("500ms"));
    }
}
