//! Break signal generation.

use super::device::CommDevice;
use super::error::PortError;
use super::handle::SerialPort;
use std::time::Duration;
use tracing::debug;

impl<D: CommDevice> SerialPort<D> {
    /// Hold the line in the break state for `duration`.
    ///
    /// Blocks the calling thread for the whole duration. If the break cannot
    /// be asserted or cleared the port is closed and
    /// [`PortError::InvalidSerialPort`] is returned.
    pub fn send_break(&mut self, duration: Duration) -> Result<(), PortError> {
        if let Err(err) = self.device()?.set_break() {
            self.invalidate("break could not be asserted");
            return Err(PortError::InvalidSerialPort(err));
        }
        debug!(port = %self.name(), ?duration, "Break asserted");

        std::thread::sleep(duration);

        if let Err(err) = self.device()?.clear_break() {
            self.invalidate("break could not be cleared");
            return Err(PortError::InvalidSerialPort(err));
        }
        Ok(())
    }
}
