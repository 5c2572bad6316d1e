//! Mock communication device for testing.
//!
//! Provides a `MockDevice` that simulates a serial device without requiring
//! hardware. Clones share state, so a test can hand one clone to a port and
//! keep another to script reads, inject failures and inspect what happened.

use super::control::{ControlBlock, Timeouts};
use super::device::CommDevice;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// One scripted outcome for a read call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadStep {
    /// Deliver these bytes (as many as fit; the rest stays queued).
    Data(Vec<u8>),
    /// The read timeout elapses with nothing received.
    Idle,
    /// The read call itself fails.
    Fail(io::ErrorKind),
}

/// Transitions of the break condition, in the order they happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakEvent {
    Set(Instant),
    Cleared(Instant),
}

#[derive(Debug)]
struct MockDeviceState {
    block: ControlBlock,
    timeouts: Option<Timeouts>,
    reads: VecDeque<ReadStep>,
    write_log: Vec<Vec<u8>>,
    write_limit: Option<usize>,
    write_error: Option<io::ErrorKind>,
    fail_get_state: bool,
    fail_set_state: bool,
    fail_set_timeouts: bool,
    fail_set_break: bool,
    fail_clear_break: bool,
    /// Sleep for the read timeout on idle reads.
    simulate_timeouts: bool,
    /// Remaining idle reads before the device disappears.
    disconnect_after_idle: Option<usize>,
    connected: bool,
    in_break: bool,
    break_events: Vec<BreakEvent>,
    get_state_calls: usize,
    set_state_calls: usize,
    idle_reads: usize,
    close_calls: usize,
}

impl Default for MockDeviceState {
    fn default() -> Self {
        Self {
            block: ControlBlock::default(),
            timeouts: None,
            reads: VecDeque::new(),
            write_log: Vec::new(),
            write_limit: None,
            write_error: None,
            fail_get_state: false,
            fail_set_state: false,
            fail_set_timeouts: false,
            fail_set_break: false,
            fail_clear_break: false,
            simulate_timeouts: false,
            disconnect_after_idle: None,
            connected: true,
            in_break: false,
            break_events: Vec::new(),
            get_state_calls: 0,
            set_state_calls: 0,
            idle_reads: 0,
            close_calls: 0,
        }
    }
}

impl MockDeviceState {
    fn check_connected(&self) -> io::Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(io::Error::new(io::ErrorKind::NotConnected, "device removed"))
        }
    }
}

/// Scriptable in-memory [`CommDevice`].
///
/// # Example
/// ```
/// use comport::port::{MockDevice, OpenOptions};
///
/// let mock = MockDevice::new();
/// mock.push_read(b"OK\r\n");
///
/// let device = mock.clone();
/// let mut port = OpenOptions::default().open_with("MOCK0", move |_| Ok(device))?;
///
/// let mut buffer = [0u8; 16];
/// let n = port.read(&mut buffer)?;
/// assert_eq!(&buffer[..n], b"OK\r\n");
///
/// port.write(b"AT\r")?;
/// assert_eq!(mock.written(), b"AT\r");
/// # Ok::<(), comport::PortError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockDevice {
    state: Arc<Mutex<MockDeviceState>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue bytes for a future read.
    pub fn push_read(&self, data: &[u8]) {
        self.state.lock().reads.push_back(ReadStep::Data(data.to_vec()));
    }

    /// Queue `count` idle read timeouts.
    pub fn push_idle(&self, count: usize) {
        let mut state = self.state.lock();
        state.reads.extend(std::iter::repeat(ReadStep::Idle).take(count));
    }

    /// Queue a failing read.
    pub fn push_read_error(&self, kind: io::ErrorKind) {
        self.state.lock().reads.push_back(ReadStep::Fail(kind));
    }

    /// Accept at most `limit` bytes per write call.
    pub fn set_write_limit(&self, limit: Option<usize>) {
        self.state.lock().write_limit = limit;
    }

    /// Make every subsequent write fail with `kind`.
    pub fn fail_writes(&self, kind: Option<io::ErrorKind>) {
        self.state.lock().write_error = kind;
    }

    pub fn fail_get_state(&self, fail: bool) {
        self.state.lock().fail_get_state = fail;
    }

    pub fn fail_set_state(&self, fail: bool) {
        self.state.lock().fail_set_state = fail;
    }

    pub fn fail_set_timeouts(&self, fail: bool) {
        self.state.lock().fail_set_timeouts = fail;
    }

    pub fn fail_set_break(&self, fail: bool) {
        self.state.lock().fail_set_break = fail;
    }

    pub fn fail_clear_break(&self, fail: bool) {
        self.state.lock().fail_clear_break = fail;
    }

    /// Block idle reads for the installed read timeout, like real hardware.
    pub fn simulate_timeouts(&self, enabled: bool) {
        self.state.lock().simulate_timeouts = enabled;
    }

    /// Unplug the device: control-record calls fail and reads return nothing.
    pub fn disconnect(&self) {
        self.state.lock().connected = false;
    }

    /// Unplug the device after `count` more idle reads.
    pub fn disconnect_after_idle(&self, count: usize) {
        self.state.lock().disconnect_after_idle = Some(count);
    }

    /// Edit the device's control record directly.
    pub fn with_block(&self, edit: impl FnOnce(&mut ControlBlock)) {
        edit(&mut self.state.lock().block);
    }

    pub fn control_block(&self) -> ControlBlock {
        self.state.lock().block.clone()
    }

    pub fn timeouts(&self) -> Option<Timeouts> {
        self.state.lock().timeouts
    }

    /// Every write call's accepted bytes, in order.
    pub fn write_log(&self) -> Vec<Vec<u8>> {
        self.state.lock().write_log.clone()
    }

    /// All accepted bytes concatenated.
    pub fn written(&self) -> Vec<u8> {
        self.state.lock().write_log.concat()
    }

    pub fn break_events(&self) -> Vec<BreakEvent> {
        self.state.lock().break_events.clone()
    }

    pub fn in_break(&self) -> bool {
        self.state.lock().in_break
    }

    pub fn get_state_calls(&self) -> usize {
        self.state.lock().get_state_calls
    }

    pub fn set_state_calls(&self) -> usize {
        self.state.lock().set_state_calls
    }

    pub fn idle_reads(&self) -> usize {
        self.state.lock().idle_reads
    }

    pub fn close_calls(&self) -> usize {
        self.state.lock().close_calls
    }

    pub fn is_closed(&self) -> bool {
        self.close_calls() > 0
    }

    fn idle_read(&self) -> io::Result<usize> {
        let pause = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            state.idle_reads += 1;
            if let Some(remaining) = state.disconnect_after_idle.as_mut() {
                *remaining = remaining.saturating_sub(1);
                if *remaining == 0 {
                    state.connected = false;
                }
            }
            match (state.simulate_timeouts, state.timeouts) {
                (true, Some(timeouts)) => timeouts.read_timeout(),
                _ => Duration::ZERO,
            }
        };
        if !pause.is_zero() {
            std::thread::sleep(pause);
        }
        Ok(0)
    }
}

impl CommDevice for MockDevice {
    fn comm_state(&mut self) -> io::Result<ControlBlock> {
        let mut state = self.state.lock();
        state.get_state_calls += 1;
        state.check_connected()?;
        if state.fail_get_state {
            return Err(io::Error::new(io::ErrorKind::Other, "GetCommState failed"));
        }
        Ok(state.block.clone())
    }

    fn set_comm_state(&mut self, block: &ControlBlock) -> io::Result<()> {
        let mut state = self.state.lock();
        state.set_state_calls += 1;
        state.check_connected()?;
        if state.fail_set_state {
            return Err(io::Error::new(io::ErrorKind::Other, "SetCommState failed"));
        }
        if !(5..=8).contains(&block.byte_size) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported byte size {}", block.byte_size),
            ));
        }
        state.block = block.clone();
        Ok(())
    }

    fn set_timeouts(&mut self, timeouts: &Timeouts) -> io::Result<()> {
        let mut state = self.state.lock();
        state.check_connected()?;
        if state.fail_set_timeouts {
            return Err(io::Error::new(io::ErrorKind::Other, "SetCommTimeouts failed"));
        }
        state.timeouts = Some(*timeouts);
        Ok(())
    }

    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let step = {
            let mut state = self.state.lock();
            if state.connected {
                state.reads.pop_front()
            } else {
                None
            }
        };

        match step {
            Some(ReadStep::Data(data)) => {
                let n = data.len().min(buffer.len());
                buffer[..n].copy_from_slice(&data[..n]);
                if n < data.len() {
                    self.state
                        .lock()
                        .reads
                        .push_front(ReadStep::Data(data[n..].to_vec()));
                }
                Ok(n)
            }
            Some(ReadStep::Fail(kind)) => Err(io::Error::new(kind, "ReadFile failed")),
            Some(ReadStep::Idle) | None => self.idle_read(),
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut state = self.state.lock();
        if let Some(kind) = state.write_error {
            return Err(io::Error::new(kind, "WriteFile failed"));
        }
        let n = state.write_limit.map_or(data.len(), |limit| limit.min(data.len()));
        state.write_log.push(data[..n].to_vec());
        Ok(n)
    }

    fn set_break(&mut self) -> io::Result<()> {
        let mut state = self.state.lock();
        state.check_connected()?;
        if state.fail_set_break {
            return Err(io::Error::new(io::ErrorKind::Other, "SetCommBreak failed"));
        }
        state.in_break = true;
        state.break_events.push(BreakEvent::Set(Instant::now()));
        Ok(())
    }

    fn clear_break(&mut self) -> io::Result<()> {
        let mut state = self.state.lock();
        state.check_connected()?;
        if state.fail_clear_break {
            return Err(io::Error::new(io::ErrorKind::Other, "ClearCommBreak failed"));
        }
        state.in_break = false;
        state.break_events.push(BreakEvent::Cleared(Instant::now()));
        Ok(())
    }

    fn close(self) -> io::Result<()> {
        self.state.lock().close_calls += 1;
        Ok(())
    }
}
