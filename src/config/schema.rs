//! Configuration schema definitions.
//!
//! Every section is `#[serde(default)]`, so a config file only needs the keys
//! it wants to change.

use super::error::{ConfigError, ConfigResult};
use crate::port::{Mode, OpenOptions, Parity, StopBits};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial line defaults
    pub serial: SerialConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
    /// Hardware testing configuration
    pub testing: TestingConfig,
}

impl Config {
    /// Check values that deserialize fine but cannot be applied to a port.
    pub fn validate(&self) -> ConfigResult<()> {
        let data_bits = self.serial.default_data_bits;
        if data_bits != 0 && !(5..=8).contains(&data_bits) {
            return Err(ConfigError::out_of_range(
                "serial",
                "default_data_bits",
                data_bits,
                "must be 5 to 8, or 0 for the default",
            ));
        }
        let read_timeout = self.serial.read_timeout_ms;
        if read_timeout == 0 {
            return Err(ConfigError::out_of_range(
                "serial",
                "read_timeout_ms",
                read_timeout,
                "must be greater than zero",
            ));
        }
        if read_timeout >= u64::from(u32::MAX) {
            return Err(ConfigError::out_of_range(
                "serial",
                "read_timeout_ms",
                read_timeout,
                "does not fit the native timeout record",
            ));
        }
        if self.serial.idle_timeout_ms == Some(0) {
            return Err(ConfigError::out_of_range(
                "serial",
                "idle_timeout_ms",
                0,
                "must be greater than zero; omit it to wait indefinitely",
            ));
        }
        Ok(())
    }
}

/// Serial port configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate used when none is given on the command line
    pub default_baud: u32,
    /// Data bits per character
    pub default_data_bits: u8,
    pub default_parity: Parity,
    pub default_stop_bits: StopBits,
    /// Upper bound on one read attempt
    pub read_timeout_ms: u64,
    /// Give up on a quiet device after this long; absent means never
    pub idle_timeout_ms: Option<u64>,
    /// Default length of a break signal
    pub break_duration_ms: u64,
    /// Friendly names for ports, e.g. `arduino = "COM3"`
    pub port_aliases: HashMap<String, String>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            default_baud: 9600,
            default_data_bits: 8,
            default_parity: Parity::None,
            default_stop_bits: StopBits::One,
            read_timeout_ms: 1000,
            idle_timeout_ms: None,
            break_duration_ms: 250,
            port_aliases: HashMap::new(),
        }
    }
}

impl SerialConfig {
    /// The line parameters described by the `default_*` keys.
    pub fn default_mode(&self) -> Mode {
        Mode::new(self.default_baud)
            .data_bits(self.default_data_bits)
            .parity(self.default_parity)
            .stop_bits(self.default_stop_bits)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_ms.map(Duration::from_millis)
    }

    pub fn break_duration(&self) -> Duration {
        Duration::from_millis(self.break_duration_ms)
    }

    /// Options for opening a port with `mode`, using this section's timeouts.
    pub fn open_options(&self, mode: Mode) -> OpenOptions {
        OpenOptions::new(mode)
            .read_timeout(self.read_timeout())
            .idle_timeout(self.idle_timeout())
    }

    /// Resolve a port name through aliases
    pub fn resolve_port(&self, name: &str) -> String {
        self.port_aliases
            .get(name)
            .cloned()
            .unwrap_or_else(|| name.to_string())
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or
    /// `comport=debug`
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, human oriented
    #[default]
    Pretty,
    /// One line per event
    Compact,
    /// Newline-delimited JSON
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        })
    }
}

/// Hardware testing configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestingConfig {
    /// Port wired for hardware tests
    pub port: Option<String>,
    pub baud: u32,
    /// Whether TX is looped back to RX on the test port
    pub loopback_enabled: bool,
    /// Idle limit for reads in hardware tests
    pub timeout_ms: u64,
}

impl Default for TestingConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud: 9600,
            loopback_enabled: false,
            timeout_ms: 2000,
        }
    }
}

impl TestingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
