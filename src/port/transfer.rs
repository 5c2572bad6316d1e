//! Blocking reads and writes.
//!
//! A read that times out with no data cannot tell a quiet line from an
//! unplugged device, so every idle timeout is followed by a liveness probe:
//! the control record is fetched and written straight back. Only a device
//! that is still attached accepts that round trip.

use super::device::CommDevice;
use super::error::PortError;
use super::handle::SerialPort;
use std::io;
use std::time::Instant;
use tracing::{trace, warn};

impl<D: CommDevice> SerialPort<D> {
    /// Read into `buffer`, blocking until at least one byte arrives.
    ///
    /// A failing read call is returned as [`PortError::Io`] and leaves the
    /// port open. If the device disappears while the line is idle the port
    /// is closed and [`PortError::InvalidSerialPort`] is returned. With an
    /// idle timeout configured, a quiet but attached device yields
    /// [`PortError::ReadTimeout`] once it expires.
    pub fn read(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        if buffer.is_empty() {
            return Ok(0);
        }

        let started = Instant::now();
        loop {
            let n = self.device()?.read(buffer)?;
            if n > 0 {
                return Ok(n);
            }

            self.probe_liveness()?;

            if let Some(limit) = self.options.idle_timeout {
                if started.elapsed() >= limit {
                    return Err(PortError::ReadTimeout(limit));
                }
            }
        }
    }

    /// Write `data` with a single platform call.
    ///
    /// Returns how many bytes the device accepted, which may be fewer than
    /// `data.len()`. Failures are returned as [`PortError::Io`] without
    /// closing the port.
    pub fn write(&mut self, data: &[u8]) -> Result<usize, PortError> {
        Ok(self.device()?.write(data)?)
    }

    /// Check that the device is still attached by writing its control record
    /// back unchanged. On failure the port is closed.
    pub fn probe_liveness(&mut self) -> Result<(), PortError> {
        match self.device()?.echo_comm_state() {
            Ok(()) => {
                trace!(port = %self.name(), "Idle line, device still attached");
                Ok(())
            }
            Err(err) => {
                warn!(port = %self.name(), error = %err, "Liveness probe failed");
                self.invalidate("device no longer responds");
                Err(PortError::InvalidSerialPort(err))
            }
        }
    }
}

impl<D: CommDevice> io::Read for SerialPort<D> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        SerialPort::read(self, buf).map_err(io::Error::from)
    }
}

impl<D: CommDevice> io::Write for SerialPort<D> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        SerialPort::write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::port::control::{ControlBlock, Timeouts};
    use crate::port::device::CommDevice;
    use crate::port::error::ErrorKind;
    use crate::port::handle::{OpenOptions, SerialPort};
    use crate::port::mock::MockDevice;
    use crate::port::PortError;
    use std::io;
    use std::time::{Duration, Instant};

    fn open_mock(mock: &MockDevice, options: OpenOptions) -> SerialPort<MockDevice> {
        let device = mock.clone();
        options.open_with("COM3", move |_| Ok(device)).unwrap()
    }

    #[test]
    fn test_read_returns_available_data() {
        let mock = MockDevice::new();
        mock.push_read(b"AB");
        let mut port = open_mock(&mock, OpenOptions::default());
        let probes_before = mock.set_state_calls();

        let mut buffer = [0u8; 8];
        assert_eq!(port.read(&mut buffer).unwrap(), 2);
        assert_eq!(&buffer[..2], b"AB");
        assert_eq!(mock.set_state_calls(), probes_before, "no probe when data arrives");
    }

    #[test]
    fn test_read_probes_and_retries_while_idle() {
        let mock = MockDevice::new();
        mock.push_idle(3);
        mock.push_read(b"late");
        let mut port = open_mock(&mock, OpenOptions::default());
        let gets = mock.get_state_calls();
        let sets = mock.set_state_calls();

        let mut buffer = [0u8; 8];
        assert_eq!(port.read(&mut buffer).unwrap(), 4);
        assert_eq!(mock.get_state_calls() - gets, 3);
        assert_eq!(mock.set_state_calls() - sets, 3);
        assert!(port.is_open());
    }

    #[test]
    fn test_probe_writes_record_back_unchanged() {
        let mock = MockDevice::new();
        let mut port = open_mock(&mock, OpenOptions::default());
        let before = mock.control_block();

        port.probe_liveness().unwrap();
        assert_eq!(mock.control_block(), before);
    }

    #[test]
    fn test_unplugged_device_closes_port() {
        let mock = MockDevice::new();
        mock.push_idle(1);
        let mut port = open_mock(&mock, OpenOptions::default());
        mock.disconnect_after_idle(1);

        let mut buffer = [0u8; 8];
        let err = port.read(&mut buffer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSerialPort);
        assert!(err.closes_handle());
        assert_eq!(
            err.io_error().map(io::Error::kind),
            Some(io::ErrorKind::NotConnected)
        );
        assert!(!port.is_open());
        assert!(mock.is_closed());

        assert!(matches!(port.read(&mut buffer), Err(PortError::Closed)));
        assert!(matches!(port.write(b"x"), Err(PortError::Closed)));
    }

    #[test]
    fn test_probe_set_failure_is_fatal() {
        let mock = MockDevice::new();
        let mut port = open_mock(&mock, OpenOptions::default());

        mock.fail_set_state(true);
        let err = port.probe_liveness().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSerialPort);
        assert!(!port.is_open());
    }

    /// Device whose control record stops decoding once open, the way a
    /// driver reporting an unknown parity code would behave.
    #[derive(Debug, Default)]
    struct OpaqueRecordDevice {
        opaque: bool,
        echoes: usize,
    }

    impl CommDevice for OpaqueRecordDevice {
        fn comm_state(&mut self) -> io::Result<ControlBlock> {
            if self.opaque {
                Err(io::Error::new(io::ErrorKind::InvalidData, "unknown parity code 9"))
            } else {
                Ok(ControlBlock::default())
            }
        }

        fn set_comm_state(&mut self, _block: &ControlBlock) -> io::Result<()> {
            Ok(())
        }

        fn echo_comm_state(&mut self) -> io::Result<()> {
            self.echoes += 1;
            Ok(())
        }

        fn set_timeouts(&mut self, _timeouts: &Timeouts) -> io::Result<()> {
            Ok(())
        }

        fn read(&mut self, _buffer: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }

        fn write(&mut self, data: &[u8]) -> io::Result<usize> {
            Ok(data.len())
        }

        fn set_break(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn clear_break(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn close(self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_probe_echoes_native_record() {
        let mut port = OpenOptions::default()
            .idle_timeout(Some(Duration::ZERO))
            .open_with("COM7", |_| Ok(OpaqueRecordDevice::default()))
            .unwrap();
        port.device.as_mut().unwrap().opaque = true;

        port.probe_liveness().unwrap();
        let err = port.read(&mut [0u8; 4]).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ReadTimeout);
        assert!(port.is_open());
        assert_eq!(port.device.as_ref().unwrap().echoes, 2);
    }

    #[test]
    fn test_read_error_is_returned_raw_and_port_stays_open() {
        let mock = MockDevice::new();
        mock.push_read_error(io::ErrorKind::BrokenPipe);
        let mut port = open_mock(&mock, OpenOptions::default());

        let mut buffer = [0u8; 8];
        let err = port.read(&mut buffer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(!err.closes_handle());
        assert!(port.is_open());
        assert!(!mock.is_closed());
    }

    #[test]
    fn test_idle_timeout_policy() {
        let mock = MockDevice::new();
        mock.simulate_timeouts(true);
        let options = OpenOptions::default()
            .read_timeout(Duration::from_millis(10))
            .idle_timeout(Some(Duration::from_millis(35)));
        let mut port = open_mock(&mock, options);

        let mut buffer = [0u8; 8];
        let probes = mock.get_state_calls();
        let started = Instant::now();
        let err = port.read(&mut buffer).unwrap_err();
        assert!(matches!(err, PortError::ReadTimeout(d) if d == Duration::from_millis(35)));
        assert!(started.elapsed() >= Duration::from_millis(35));
        assert_eq!(mock.get_state_calls() - probes, mock.idle_reads());
        assert!(port.is_open());
    }

    #[test]
    fn test_idle_read_waits_for_timeout_before_retrying() {
        let mock = MockDevice::new();
        mock.simulate_timeouts(true);
        mock.push_idle(1);
        mock.push_read(b"!");
        let mut port = open_mock(
            &mock,
            OpenOptions::default().read_timeout(Duration::from_millis(20)),
        );

        let mut buffer = [0u8; 1];
        let started = Instant::now();
        assert_eq!(port.read(&mut buffer).unwrap(), 1);
        assert!(started.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_empty_buffer_returns_immediately() {
        let mock = MockDevice::new();
        let mut port = open_mock(&mock, OpenOptions::default());
        assert_eq!(port.read(&mut []).unwrap(), 0);
        assert_eq!(mock.idle_reads(), 0);
    }

    #[test]
    fn test_write_single_call() {
        let mock = MockDevice::new();
        let mut port = open_mock(&mock, OpenOptions::default());

        assert_eq!(port.write(&[0x41, 0x42]).unwrap(), 2);
        assert_eq!(mock.write_log(), vec![vec![0x41, 0x42]]);
    }

    #[test]
    fn test_partial_write_is_not_retried() {
        let mock = MockDevice::new();
        mock.set_write_limit(Some(1));
        let mut port = open_mock(&mock, OpenOptions::default());

        assert_eq!(port.write(b"ABC").unwrap(), 1);
        assert_eq!(mock.write_log().len(), 1);
    }

    #[test]
    fn test_write_error_is_raw() {
        let mock = MockDevice::new();
        mock.fail_writes(Some(io::ErrorKind::TimedOut));
        let mut port = open_mock(&mock, OpenOptions::default());

        let err = port.write(b"x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Io);
        assert!(port.is_open());
    }

    #[test]
    fn test_std_io_traits() {
        use std::io::{Read, Write};

        let mock = MockDevice::new();
        mock.push_read(b"pong");
        let mut port = open_mock(&mock, OpenOptions::default());

        port.write_all(b"ping").unwrap();
        port.flush().unwrap();
        let mut buffer = [0u8; 4];
        port.read_exact(&mut buffer).unwrap();
        assert_eq!(&buffer, b"pong");
        assert_eq!(mock.written(), b"ping");
    }
}
