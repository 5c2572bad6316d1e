//! User-facing line configuration.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Baud rate used when [`Mode::baud_rate`] is zero.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Data bits used when [`Mode::data_bits`] is zero.
pub const DEFAULT_DATA_BITS: u8 = 8;

/// Line parameters for a serial port.
///
/// Zero values select the defaults, so `Mode::default()` is 9600 8N1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Mode {
    /// Baud rate (bits per second). 0 means 9600.
    pub baud_rate: u32,

    /// Bits per character. 0 means 8.
    pub data_bits: u8,

    /// Parity checking mode.
    pub parity: Parity,

    /// Number of stop bits.
    pub stop_bits: StopBits,
}

impl Mode {
    pub fn new(baud_rate: u32) -> Self {
        Self {
            baud_rate,
            ..Self::default()
        }
    }

    pub fn data_bits(mut self, data_bits: u8) -> Self {
        self.data_bits = data_bits;
        self
    }

    pub fn parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    /// Baud rate with the zero default applied.
    pub fn effective_baud_rate(&self) -> u32 {
        if self.baud_rate == 0 {
            DEFAULT_BAUD_RATE
        } else {
            self.baud_rate
        }
    }

    /// Data bits with the zero default applied.
    pub fn effective_data_bits(&self) -> u8 {
        if self.data_bits == 0 {
            DEFAULT_DATA_BITS
        } else {
            self.data_bits
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parity = match self.parity {
            Parity::None => 'N',
            Parity::Odd => 'O',
            Parity::Even => 'E',
            Parity::Mark => 'M',
            Parity::Space => 'S',
        };
        write!(
            f,
            "{} {}{}{}",
            self.effective_baud_rate(),
            self.effective_data_bits(),
            parity,
            self.stop_bits
        )
    }
}

/// Parity checking modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
    Mark,
    Space,
}

impl Parity {
    /// Native control-record code.
    pub fn code(self) -> u8 {
        match self {
            Parity::None => 0,
            Parity::Odd => 1,
            Parity::Even => 2,
            Parity::Mark => 3,
            Parity::Space => 4,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Parity::None),
            1 => Some(Parity::Odd),
            2 => Some(Parity::Even),
            3 => Some(Parity::Mark),
            4 => Some(Parity::Space),
            _ => None,
        }
    }
}

impl FromStr for Parity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" | "n" => Ok(Parity::None),
            "odd" | "o" => Ok(Parity::Odd),
            "even" | "e" => Ok(Parity::Even),
            "mark" | "m" => Ok(Parity::Mark),
            "space" | "s" => Ok(Parity::Space),
            other => Err(format!("unknown parity '{other}'")),
        }
    }
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopBits {
    #[default]
    One,
    OnePointFive,
    Two,
}

impl StopBits {
    /// Native control-record code.
    pub fn code(self) -> u8 {
        match self {
            StopBits::One => 0,
            StopBits::OnePointFive => 1,
            StopBits::Two => 2,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(StopBits::One),
            1 => Some(StopBits::OnePointFive),
            2 => Some(StopBits::Two),
            _ => None,
        }
    }
}

impl FromStr for StopBits {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1" | "one" => Ok(StopBits::One),
            "1.5" | "one_point_five" => Ok(StopBits::OnePointFive),
            "2" | "two" => Ok(StopBits::Two),
            other => Err(format!("unknown stop bits '{other}'")),
        }
    }
}

impl fmt::Display for StopBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StopBits::One => "1",
            StopBits::OnePointFive => "1.5",
            StopBits::Two => "2",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode() {
        let mode = Mode::default();
        assert_eq!(mode.effective_baud_rate(), 9600);
        assert_eq!(mode.effective_data_bits(), 8);
        assert_eq!(mode.parity, Parity::None);
        assert_eq!(mode.stop_bits, StopBits::One);
        assert_eq!(mode.to_string(), "9600 8N1");
    }

    #[test]
    fn test_explicit_values_are_kept() {
        let mode = Mode::new(115200)
            .data_bits(7)
            .parity(Parity::Even)
            .stop_bits(StopBits::Two);
        assert_eq!(mode.effective_baud_rate(), 115200);
        assert_eq!(mode.effective_data_bits(), 7);
        assert_eq!(mode.to_string(), "115200 7E2");
    }

    #[test]
    fn test_native_codes() {
        assert_eq!(Parity::Space.code(), 4);
        assert_eq!(Parity::from_code(3), Some(Parity::Mark));
        assert_eq!(Parity::from_code(5), None);
        assert_eq!(StopBits::OnePointFive.code(), 1);
        assert_eq!(StopBits::from_code(2), Some(StopBits::Two));
        assert_eq!(StopBits::from_code(3), None);
    }

    #[test]
    fn test_parse() {
        assert_eq!("EVEN".parse::<Parity>(), Ok(Parity::Even));
        assert_eq!("s".parse::<Parity>(), Ok(Parity::Space));
        assert!("sometimes".parse::<Parity>().is_err());
        assert_eq!("1.5".parse::<StopBits>(), Ok(StopBits::OnePointFive));
        assert!("3".parse::<StopBits>().is_err());
    }

    #[test]
    fn test_mode_deserializes_with_defaults() {
        let mode: Mode = toml::from_str("baud_rate = 57600\nparity = \"odd\"").unwrap();
        assert_eq!(mode.baud_rate, 57600);
        assert_eq!(mode.data_bits, 0);
        assert_eq!(mode.parity, Parity::Odd);
        assert_eq!(mode.stop_bits, StopBits::One);
    }
}
