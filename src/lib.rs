//! Blocking serial port access with a fixed line policy.
//!
//! # Modules
//!
//! - `port`: open, configure, read, write and break on a serial device, plus
//!   port discovery
//! - `config`: TOML configuration with environment overrides
//! - `logging`: tracing subscriber setup for binaries
//!
//! # Example
//!
//! ```no_run
//! use comport::{list_ports, Mode, Parity};
//! use std::io::Write;
//!
//! for name in list_ports()? {
//!     println!("{name}");
//! }
//!
//! let mut port = comport::open("COM3", &Mode::new(115200).parity(Parity::Even))?;
//! port.write_all(b"AT\r")?;
//! let mut reply = [0u8; 64];
//! let n = port.read(&mut reply)?;
//! println!("{:?}", &reply[..n]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod logging;
pub mod port;

// Re-export commonly used types for convenience
pub use port::{
    list_ports, open, ErrorKind, Mode, OpenOptions, Parity, PortError, SerialPort, StopBits,
};

pub use config::{Config, ConfigError, ConfigLoader, ConfigResult};
