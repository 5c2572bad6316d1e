//! tty backend on top of [`serialport::TTYPort`].
//!
//! termios has no slot for several control-record fields (XON/XOFF limits,
//! the special characters, DSR handling, the parity-check flag). Those are
//! kept in a shadow copy of the last record installed, so reading the record
//! back after writing it returns what was written.

use crate::port::control::{ControlBlock, ControlFlags, DtrControl, RtsControl, Timeouts};
use crate::port::device::CommDevice;
use crate::port::mode::{Parity, StopBits};
use serialport::{DataBits, FlowControl, SerialPort as _, TTYPort};
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Wait used when the timeout record asks a read to block for its first byte.
const BLOCKING_READ: Duration = Duration::from_millis(u32::MAX as u64);

/// An open tty device.
#[derive(Debug)]
pub struct NativeDevice {
    port: TTYPort,
    path: String,
    shadow: ControlBlock,
}

impl NativeDevice {
    /// Open `/dev/<name>` (or `name` itself if it is an absolute path) for
    /// exclusive reading and writing.
    pub fn open(name: &str) -> io::Result<Self> {
        let path = device_path(name);
        let defaults = ControlBlock::default();
        let port = serialport::new(path.as_str(), defaults.baud_rate)
            .timeout(Timeouts::default().read_timeout())
            .open_native()
            .map_err(|err| open_error(&path, err))?;

        let mut device = Self {
            port,
            path,
            shadow: defaults,
        };
        device.shadow = device.comm_state()?;

        debug!(path = %device.path, "Opened tty");
        Ok(device)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn modem_line(&self, line: &str, result: serialport::Result<()>) -> io::Result<()> {
        match result {
            Ok(()) => Ok(()),
            // Pseudo terminals have no modem lines.
            Err(err) if matches!(err.kind, serialport::ErrorKind::Unknown) => {
                debug!(path = %self.path, line, error = %err, "Modem line not supported");
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }
}

impl CommDevice for NativeDevice {
    fn comm_state(&mut self) -> io::Result<ControlBlock> {
        let mut block = self.shadow.clone();

        block.baud_rate = self.port.baud_rate()?;
        block.byte_size = byte_size(self.port.data_bits()?);
        block.parity = match self.port.parity()? {
            serialport::Parity::None => Parity::None,
            serialport::Parity::Odd => Parity::Odd,
            serialport::Parity::Even => Parity::Even,
        };
        block.stop_bits = match self.port.stop_bits()? {
            serialport::StopBits::One => StopBits::One,
            serialport::StopBits::Two => StopBits::Two,
        };

        let flow = self.port.flow_control()?;
        if flow != flow_control(&block.flags) {
            apply_flow_control(&mut block.flags, flow);
        }
        Ok(block)
    }

    fn set_comm_state(&mut self, block: &ControlBlock) -> io::Result<()> {
        let data_bits = data_bits(block.byte_size)?;
        let parity = match block.parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
            Parity::Mark | Parity::Space => {
                return Err(invalid(format!("{:?} parity is not supported", block.parity)))
            }
        };
        let stop_bits = match block.stop_bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
            StopBits::OnePointFive => {
                return Err(invalid("1.5 stop bits are not supported".to_string()))
            }
        };

        self.port.set_baud_rate(block.baud_rate)?;
        self.port.set_data_bits(data_bits)?;
        self.port.set_parity(parity)?;
        self.port.set_stop_bits(stop_bits)?;
        self.port.set_flow_control(flow_control(&block.flags))?;

        let dtr = match block.flags.dtr_control {
            DtrControl::Enable => Some(true),
            DtrControl::Disable => Some(false),
            DtrControl::Handshake | DtrControl::Reserved => None,
        };
        if let Some(level) = dtr {
            let result = self.port.write_data_terminal_ready(level);
            self.modem_line("DTR", result)?;
        }

        let rts = match block.flags.rts_control {
            RtsControl::Enable => Some(true),
            RtsControl::Disable => Some(false),
            RtsControl::Handshake | RtsControl::Toggle => None,
        };
        if let Some(level) = rts {
            let result = self.port.write_request_to_send(level);
            self.modem_line("RTS", result)?;
        }

        self.shadow = block.clone();
        Ok(())
    }

    fn set_timeouts(&mut self, timeouts: &Timeouts) -> io::Result<()> {
        self.port.set_timeout(read_wait(timeouts))?;
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buffer) {
            Err(err) if err.kind() == io::ErrorKind::TimedOut => Ok(0),
            // poll reports a hangup as a broken pipe. Treat it as an idle line
            // and let the liveness probe decide.
            Err(err) if err.kind() == io::ErrorKind::BrokenPipe => {
                debug!(path = %self.path, "Hangup reported while reading");
                Ok(0)
            }
            other => other,
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.port.write(data)
    }

    fn set_break(&mut self) -> io::Result<()> {
        self.port.set_break()?;
        Ok(())
    }

    fn clear_break(&mut self) -> io::Result<()> {
        self.port.clear_break()?;
        Ok(())
    }

    fn close(self) -> io::Result<()> {
        let Self { port, path, .. } = self;
        drop(port);
        debug!(path = %path, "Closed tty");
        Ok(())
    }
}

fn device_path(name: &str) -> String {
    if name.starts_with('/') {
        name.to_string()
    } else {
        format!("/dev/{name}")
    }
}

/// A held `TIOCEXCL` or flock is reported as `NoDevice`, which converts to
/// `NotFound` like a missing node. Tell the two apart by whether the node
/// exists.
fn open_error(path: &str, err: serialport::Error) -> io::Error {
    if matches!(err.kind, serialport::ErrorKind::NoDevice) && Path::new(path).exists() {
        return io::Error::new(
            io::ErrorKind::PermissionDenied,
            format!("{path} is held exclusively: {}", err.description),
        );
    }
    err.into()
}

/// How long one read waits for its first byte under `timeouts`.
fn read_wait(timeouts: &Timeouts) -> Duration {
    let interval_only = timeouts.read_interval == Timeouts::MAXDWORD
        && timeouts.read_total_multiplier == 0
        && timeouts.read_total_constant == 0;
    if interval_only {
        // Return immediately with whatever is buffered.
        Duration::ZERO
    } else if timeouts.read_total_constant == 0 && timeouts.read_total_multiplier == 0 {
        BLOCKING_READ
    } else {
        timeouts.read_timeout()
    }
}

fn data_bits(byte_size: u8) -> io::Result<DataBits> {
    match byte_size {
        5 => Ok(DataBits::Five),
        6 => Ok(DataBits::Six),
        7 => Ok(DataBits::Seven),
        8 => Ok(DataBits::Eight),
        other => Err(invalid(format!("unsupported byte size {other}"))),
    }
}

fn byte_size(bits: DataBits) -> u8 {
    match bits {
        DataBits::Five => 5,
        DataBits::Six => 6,
        DataBits::Seven => 7,
        DataBits::Eight => 8,
    }
}

/// The termios flow mode closest to `flags`. Software flow needs both
/// directions, as termios sets IXON and IXOFF together.
fn flow_control(flags: &ControlFlags) -> FlowControl {
    if flags.cts_flow {
        FlowControl::Hardware
    } else if flags.out_x && flags.in_x {
        FlowControl::Software
    } else {
        FlowControl::None
    }
}

fn apply_flow_control(flags: &mut ControlFlags, flow: FlowControl) {
    flags.cts_flow = flow == FlowControl::Hardware;
    flags.out_x = flow == FlowControl::Software;
    flags.in_x = flow == FlowControl::Software;
}

fn invalid(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, message)
}
