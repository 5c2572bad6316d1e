//! Port abstraction layer for serial communication.
//!
//! [`SerialPort`] is the handle applications use. It drives a [`CommDevice`],
//! which is the platform backend in production ([`NativeDevice`]) and a
//! scripted [`MockDevice`] in tests.

pub mod control;
pub mod device;
pub mod enumerate;
pub mod error;
pub mod handle;
pub mod mock;
pub mod mode;
pub mod native;
mod signal;
mod transfer;

pub use control::{ControlBlock, ControlFlags, DtrControl, FlowPolicy, RtsControl, Timeouts};
pub use device::CommDevice;
pub use enumerate::{
    list_ports, list_registry_ports, DeviceRegistry, PortEnumerator, RegistryEntry,
    RegistryEnumerator, StaticEnumerator, SystemEnumerator,
};
pub use error::{ErrorKind, PortError};
pub use handle::{open, OpenOptions, SerialPort};
pub use mock::{BreakEvent, MockDevice, ReadStep};
pub use mode::{Mode, Parity, StopBits};
pub use native::NativeDevice;
