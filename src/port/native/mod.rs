//! Platform device-control backends.

#[cfg(unix)]
mod unix;
#[cfg(unix)]
pub use unix::NativeDevice;

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub use windows::{NativeDevice, SerialCommKey};

#[cfg(not(any(unix, windows)))]
compile_error!("comport supports Unix and Windows targets only");
