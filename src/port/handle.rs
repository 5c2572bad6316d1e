//! Port handle: acquisition, configuration and release of a device.
//!
//! A [`SerialPort`] owns its device in an `Option`. Every path that leaves the
//! device in an unknown state takes it out and closes it, so a handle either
//! works or fails fast with [`PortError::Closed`].

use super::control::{ControlBlock, FlowPolicy, Timeouts};
use super::device::CommDevice;
use super::error::PortError;
use super::mode::Mode;
use super::native::NativeDevice;
use std::io;
use std::time::Duration;
use tracing::{debug, warn};

/// Options used when opening a port.
///
/// # Example
/// ```no_run
/// use comport::{Mode, OpenOptions};
/// use std::time::Duration;
///
/// let port = OpenOptions::new(Mode::new(115200))
///     .idle_timeout(Some(Duration::from_secs(30)))
///     .open("COM3")?;
/// # Ok::<(), comport::PortError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenOptions {
    /// Line parameters applied at open.
    pub mode: Mode,

    /// Upper bound on a single read attempt when no data arrives.
    pub read_timeout: Duration,

    /// How long `read` keeps retrying on a quiet but attached device before
    /// giving up with [`PortError::ReadTimeout`]. `None` retries until data
    /// arrives or the device disappears.
    pub idle_timeout: Option<Duration>,

    /// XON/XOFF setup installed with the fixed line policy.
    pub flow_policy: FlowPolicy,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self::new(Mode::default())
    }
}

impl OpenOptions {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            read_timeout: Duration::from_secs(1),
            idle_timeout: None,
            flow_policy: FlowPolicy::default(),
        }
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn flow_policy(mut self, policy: FlowPolicy) -> Self {
        self.flow_policy = policy;
        self
    }

    /// Open the named platform device.
    ///
    /// `name` is a short device name such as `COM3` or `ttyUSB0`; absolute
    /// paths are accepted on Unix.
    pub fn open(&self, name: &str) -> Result<SerialPort<NativeDevice>, PortError> {
        self.open_with(name, NativeDevice::open)
    }

    /// Open a port on a device produced by `connect`.
    ///
    /// `connect` acquires the device; its failure is classified into
    /// [`PortError::Busy`], [`PortError::NotFound`] or a raw [`PortError::Io`].
    /// The device is then configured, and closed again if configuration fails.
    pub fn open_with<D, F>(&self, name: &str, connect: F) -> Result<SerialPort<D>, PortError>
    where
        D: CommDevice,
        F: FnOnce(&str) -> io::Result<D>,
    {
        let device = connect(name).map_err(|e| PortError::from_open(name, e))?;
        debug!(port = name, "Device acquired");

        let mut port = SerialPort {
            device: Some(device),
            name: name.to_string(),
            options: *self,
        };
        port.set_mode(&self.mode)?;
        port.apply_line_policy()?;

        debug!(port = name, mode = %self.mode, "Serial port open");
        Ok(port)
    }
}

/// Open `name` with `mode` and the default options.
pub fn open(name: &str, mode: &Mode) -> Result<SerialPort, PortError> {
    OpenOptions::new(*mode).open(name)
}

/// An open serial port.
pub struct SerialPort<D: CommDevice = NativeDevice> {
    pub(super) device: Option<D>,
    name: String,
    pub(super) options: OpenOptions,
}

impl<D: CommDevice> SerialPort<D> {
    /// The name the port was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the handle still owns its device.
    pub fn is_open(&self) -> bool {
        self.device.is_some()
    }

    pub fn options(&self) -> &OpenOptions {
        &self.options
    }

    /// Apply new line parameters.
    ///
    /// Zero baud rate and data bits fall back to 9600 and 8. If the control
    /// record cannot be read or written the port is closed, since a half
    /// applied configuration is not safe to keep using.
    pub fn set_mode(&mut self, mode: &Mode) -> Result<(), PortError> {
        let device = self.device()?;
        let result = device.comm_state().and_then(|mut block| {
            block.apply_mode(mode);
            device.set_comm_state(&block)
        });

        match result {
            Ok(()) => {
                self.options.mode = *mode;
                debug!(port = %self.name, mode = %mode, "Line mode applied");
                Ok(())
            }
            Err(err) => {
                self.invalidate("line mode rejected");
                Err(PortError::InvalidConfiguration(err))
            }
        }
    }

    /// Read the device's current control record.
    pub fn control_block(&mut self) -> Result<ControlBlock, PortError> {
        match self.device()?.comm_state() {
            Ok(block) => Ok(block),
            Err(err) => {
                self.invalidate("control record unreadable");
                Err(PortError::InvalidConfiguration(err))
            }
        }
    }

    /// Release the device. Closing an already closed port does nothing.
    pub fn close(&mut self) -> Result<(), PortError> {
        match self.device.take() {
            Some(device) => {
                device.close()?;
                debug!(port = %self.name, "Serial port closed");
                Ok(())
            }
            None => Ok(()),
        }
    }

    pub(super) fn device(&mut self) -> Result<&mut D, PortError> {
        self.device.as_mut().ok_or(PortError::Closed)
    }

    /// Close the device after a failure that leaves it in an unknown state.
    pub(super) fn invalidate(&mut self, reason: &str) {
        if let Some(device) = self.device.take() {
            warn!(port = %self.name, reason, "Closing serial port");
            if let Err(err) = device.close() {
                debug!(port = %self.name, error = %err, "Close after failure also failed");
            }
        }
    }

    /// Overlay the fixed flow-control policy and install the read timeouts.
    fn apply_line_policy(&mut self) -> Result<(), PortError> {
        let policy = self.options.flow_policy;
        let timeouts = Timeouts::for_read_timeout(self.options.read_timeout);

        let device = self.device()?;
        let result = device
            .comm_state()
            .and_then(|mut block| {
                block.apply_flow_policy(&policy);
                device.set_comm_state(&block)
            })
            .and_then(|()| device.set_timeouts(&timeouts));

        result.map_err(|err| {
            self.invalidate("line policy rejected");
            PortError::InvalidConfiguration(err)
        })
    }
}

impl<D: CommDevice> Drop for SerialPort<D> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            debug!(port = %self.name, error = %err, "Close on drop failed");
        }
    }
}

impl<D: CommDevice> std::fmt::Debug for SerialPort<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialPort")
            .field("name", &self.name)
            .field("open", &self.is_open())
            .field("mode", &self.options.mode)
            .finish()
    }
}
