//! TOML configuration with environment variable overrides.
//!
//! # Configuration Resolution
//!
//! Configuration is loaded from the first of these that exists:
//!
//! 1. `COMPORT_CONFIG` environment variable (explicit path)
//! 2. `./config.toml` (current directory)
//! 3. `config.toml` in the platform config directory
//!    (`~/.config/comport/` on Linux, `%APPDATA%\comport\config\` on Windows)
//! 4. Built-in defaults (no file required)
//!
//! # Environment Overrides
//!
//! Values can be overridden with `COMPORT_<SECTION>_<KEY>`:
//! - `COMPORT_SERIAL_DEFAULT_BAUD=115200`
//! - `COMPORT_SERIAL_IDLE_TIMEOUT_MS=5000`
//! - `COMPORT_LOGGING_FORMAT=json`
//!
//! `TEST_PORT`, `TEST_BAUD` and `LOOPBACK_ENABLED` are also honored.
//!
//! # Example
//!
//! ```no_run
//! use comport::config::ConfigLoader;
//!
//! let config = ConfigLoader::load()?.into_config();
//! let port_name = config.serial.resolve_port("arduino");
//! let options = config.serial.open_options(config.serial.default_mode());
//! let port = options.open(&port_name)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod error;
mod loader;
mod schema;

pub use error::{ConfigError, ConfigResult};
pub use loader::{
    get_default_config_dir, get_default_config_path, resolve_config_path, ConfigLoader,
};
pub use schema::{Config, LogFormat, LoggingConfig, SerialConfig, TestingConfig};
