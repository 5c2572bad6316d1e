//! The device-control seam.
//!
//! [`CommDevice`] is the narrow set of platform primitives the port handle is
//! built on. The native implementation lives in [`super::native`]; the
//! in-memory one in [`super::mock`].

use super::control::{ControlBlock, Timeouts};
use std::io;

/// Raw operations on an open communication device.
///
/// Implementations report platform failures verbatim; classifying them and
/// deciding whether the device must be closed is the port handle's job.
pub trait CommDevice: Send + std::fmt::Debug {
    /// Fetch the current control record.
    fn comm_state(&mut self) -> io::Result<ControlBlock>;

    /// Install a control record.
    fn set_comm_state(&mut self, block: &ControlBlock) -> io::Result<()>;

    /// Fetch the control record and write it straight back. Only an attached
    /// device accepts the round trip.
    ///
    /// Backends whose native record holds values [`ControlBlock`] cannot
    /// represent override this to echo the native record untouched.
    fn echo_comm_state(&mut self) -> io::Result<()> {
        let block = self.comm_state()?;
        self.set_comm_state(&block)
    }

    /// Install a timeout record.
    fn set_timeouts(&mut self, timeouts: &Timeouts) -> io::Result<()>;

    /// One blocking read, bounded by the installed timeouts. `Ok(0)` means the
    /// timeout elapsed with no data.
    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize>;

    /// One blocking write. Returns the number of bytes accepted.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Put the transmit line into the break state.
    fn set_break(&mut self) -> io::Result<()>;

    /// Leave the break state.
    fn clear_break(&mut self) -> io::Result<()>;

    /// Release the device.
    fn close(self) -> io::Result<()>
    where
        Self: Sized;
}
