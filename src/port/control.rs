//! Device control record and the translation from [`Mode`] into it.
//!
//! [`ControlBlock`] mirrors the native device-control record field by field.
//! Its behavior flags are packed into a single word on the wire; that packing
//! happens only in [`ControlFlags::encode`] and [`ControlFlags::decode`].

use super::mode::{Mode, Parity, StopBits};
use std::time::Duration;

const BINARY: u32 = 0x0000_0001;
const PARITY_CHECK: u32 = 0x0000_0002;
const CTS_FLOW: u32 = 0x0000_0004;
const DSR_FLOW: u32 = 0x0000_0008;
const DTR_CONTROL_SHIFT: u32 = 4;
const DTR_CONTROL_MASK: u32 = 0x0000_0030;
const DSR_SENSITIVITY: u32 = 0x0000_0040;
const TX_CONTINUE_ON_XOFF: u32 = 0x0000_0080;
const OUT_X: u32 = 0x0000_0100;
const IN_X: u32 = 0x0000_0200;
const ERROR_CHAR: u32 = 0x0000_0400;
const NULL_STRIP: u32 = 0x0000_0800;
const RTS_CONTROL_SHIFT: u32 = 12;
const RTS_CONTROL_MASK: u32 = 0x0000_3000;
const ABORT_ON_ERROR: u32 = 0x0000_4000;
const RESERVED_MASK: u32 = 0xFFFF_8000;

/// DTR line control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DtrControl {
    #[default]
    Disable,
    Enable,
    Handshake,
    /// Bit pattern `0b11`, undefined for DTR but preserved.
    Reserved,
}

impl DtrControl {
    fn bits(self) -> u32 {
        match self {
            DtrControl::Disable => 0,
            DtrControl::Enable => 1,
            DtrControl::Handshake => 2,
            DtrControl::Reserved => 3,
        }
    }

    fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0 => DtrControl::Disable,
            1 => DtrControl::Enable,
            2 => DtrControl::Handshake,
            _ => DtrControl::Reserved,
        }
    }
}

/// RTS line control mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RtsControl {
    #[default]
    Disable,
    Enable,
    Handshake,
    Toggle,
}

impl RtsControl {
    fn bits(self) -> u32 {
        match self {
            RtsControl::Disable => 0,
            RtsControl::Enable => 1,
            RtsControl::Handshake => 2,
            RtsControl::Toggle => 3,
        }
    }

    fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0 => RtsControl::Disable,
            1 => RtsControl::Enable,
            2 => RtsControl::Handshake,
            _ => RtsControl::Toggle,
        }
    }
}

/// Behavior flags of the control record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlFlags {
    pub binary: bool,
    pub parity_check: bool,
    /// Output is gated on CTS.
    pub cts_flow: bool,
    /// Output is gated on DSR.
    pub dsr_flow: bool,
    pub dtr_control: DtrControl,
    /// Input is ignored while DSR is low.
    pub dsr_sensitivity: bool,
    pub tx_continue_on_xoff: bool,
    /// XON/XOFF on output.
    pub out_x: bool,
    /// XON/XOFF on input.
    pub in_x: bool,
    /// Replace bytes with parity errors by the error character.
    pub error_char: bool,
    /// Discard received null bytes.
    pub null_strip: bool,
    pub rts_control: RtsControl,
    pub abort_on_error: bool,
    /// Bits 15..=31, carried through untouched.
    pub reserved: u32,
}

impl ControlFlags {
    /// Pack into the native flags word.
    pub fn encode(&self) -> u32 {
        let mut word = self.reserved & RESERVED_MASK;
        let mut set = |flag: u32, on: bool| {
            if on {
                word |= flag;
            }
        };
        set(BINARY, self.binary);
        set(PARITY_CHECK, self.parity_check);
        set(CTS_FLOW, self.cts_flow);
        set(DSR_FLOW, self.dsr_flow);
        set(DSR_SENSITIVITY, self.dsr_sensitivity);
        set(TX_CONTINUE_ON_XOFF, self.tx_continue_on_xoff);
        set(OUT_X, self.out_x);
        set(IN_X, self.in_x);
        set(ERROR_CHAR, self.error_char);
        set(NULL_STRIP, self.null_strip);
        set(ABORT_ON_ERROR, self.abort_on_error);
        word | (self.dtr_control.bits() << DTR_CONTROL_SHIFT)
            | (self.rts_control.bits() << RTS_CONTROL_SHIFT)
    }

    /// Unpack the native flags word.
    pub fn decode(word: u32) -> Self {
        let has = |flag: u32| word & flag != 0;
        Self {
            binary: has(BINARY),
            parity_check: has(PARITY_CHECK),
            cts_flow: has(CTS_FLOW),
            dsr_flow: has(DSR_FLOW),
            dtr_control: DtrControl::from_bits((word & DTR_CONTROL_MASK) >> DTR_CONTROL_SHIFT),
            dsr_sensitivity: has(DSR_SENSITIVITY),
            tx_continue_on_xoff: has(TX_CONTINUE_ON_XOFF),
            out_x: has(OUT_X),
            in_x: has(IN_X),
            error_char: has(ERROR_CHAR),
            null_strip: has(NULL_STRIP),
            rts_control: RtsControl::from_bits((word & RTS_CONTROL_MASK) >> RTS_CONTROL_SHIFT),
            abort_on_error: has(ABORT_ON_ERROR),
            reserved: word & RESERVED_MASK,
        }
    }
}

/// Native device-control record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlBlock {
    pub baud_rate: u32,
    pub flags: ControlFlags,
    pub xon_limit: u16,
    pub xoff_limit: u16,
    pub byte_size: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub xon_char: u8,
    pub xoff_char: u8,
    pub error_char: u8,
    pub eof_char: u8,
    pub evt_char: u8,
}

impl Default for ControlBlock {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            flags: ControlFlags {
                binary: true,
                ..ControlFlags::default()
            },
            xon_limit: 0,
            xoff_limit: 0,
            byte_size: 8,
            parity: Parity::None,
            stop_bits: StopBits::One,
            xon_char: 0,
            xoff_char: 0,
            error_char: 0,
            eof_char: 0,
            evt_char: 0,
        }
    }
}

impl ControlBlock {
    /// Overwrite the line parameters from `mode`, applying its zero defaults.
    pub fn apply_mode(&mut self, mode: &Mode) {
        self.baud_rate = mode.effective_baud_rate();
        self.byte_size = mode.effective_data_bits();
        self.stop_bits = mode.stop_bits;
        self.parity = mode.parity;
    }

    /// Force the fixed line-control policy: DTR/RTS enabled, no hardware or
    /// software flow gating, no error substitution, the given XON/XOFF setup.
    pub fn apply_flow_policy(&mut self, policy: &FlowPolicy) {
        let flags = &mut self.flags;
        flags.dtr_control = DtrControl::Enable;
        flags.rts_control = RtsControl::Enable;
        flags.cts_flow = false;
        flags.dsr_flow = false;
        flags.dsr_sensitivity = false;
        flags.tx_continue_on_xoff = true;
        flags.in_x = false;
        flags.out_x = false;
        flags.error_char = false;
        flags.null_strip = false;
        flags.abort_on_error = false;

        self.xon_limit = policy.xon_limit;
        self.xoff_limit = policy.xoff_limit;
        self.xon_char = policy.xon_char;
        self.xoff_char = policy.xoff_char;
    }

    /// The line parameters this record currently describes.
    pub fn mode(&self) -> Mode {
        Mode {
            baud_rate: self.baud_rate,
            data_bits: self.byte_size,
            parity: self.parity,
            stop_bits: self.stop_bits,
        }
    }
}

/// XON/XOFF thresholds and characters installed at open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowPolicy {
    pub xon_limit: u16,
    pub xoff_limit: u16,
    pub xon_char: u8,
    pub xoff_char: u8,
}

impl Default for FlowPolicy {
    fn default() -> Self {
        Self {
            xon_limit: 2048,
            xoff_limit: 512,
            xon_char: 0x11,
            xoff_char: 0x13,
        }
    }
}

/// Native timeout record, all values in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub read_interval: u32,
    pub read_total_multiplier: u32,
    pub read_total_constant: u32,
    pub write_total_multiplier: u32,
    pub write_total_constant: u32,
}

impl Timeouts {
    /// "Maximum" sentinel: with both interval and multiplier set to it, a read
    /// returns as soon as any byte arrives or after the constant elapses.
    pub const MAXDWORD: u32 = u32::MAX;

    /// Bounded reads of at most `timeout`, no write timeout.
    ///
    /// The constant is at least 1 ms. Zero together with the two sentinels
    /// would make every read return at once.
    pub fn for_read_timeout(timeout: Duration) -> Self {
        let millis = u32::try_from(timeout.as_millis())
            .unwrap_or(Self::MAXDWORD - 1)
            .max(1);
        Self {
            read_interval: Self::MAXDWORD,
            read_total_multiplier: Self::MAXDWORD,
            read_total_constant: millis,
            write_total_multiplier: 0,
            write_total_constant: 0,
        }
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.read_total_constant))
    }
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::for_read_timeout(Duration::from_secs(1))
    }
}
