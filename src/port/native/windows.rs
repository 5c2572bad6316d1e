//! Win32 communications API backend.

use crate::port::control::{ControlBlock, ControlFlags, Timeouts};
use crate::port::device::CommDevice;
use crate::port::enumerate::{DeviceRegistry, RegistryEntry};
use crate::port::mode::{Parity, StopBits};
use std::ffi::OsStr;
use std::io;
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::os::windows::io::{AsRawHandle, FromRawHandle, IntoRawHandle, OwnedHandle, RawHandle};
use std::ptr;
use tracing::debug;
use winapi::shared::minwindef::{DWORD, FALSE, HKEY};
use winapi::shared::winerror::ERROR_SUCCESS;
use winapi::um::fileapi::{CreateFileW, ReadFile, WriteFile, OPEN_EXISTING};
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::winbase::{
    ClearCommBreak, GetCommState, SetCommBreak, SetCommState, SetCommTimeouts, COMMTIMEOUTS, DCB,
};
use winapi::um::winnt::{GENERIC_READ, GENERIC_WRITE, HANDLE, KEY_READ};
use winapi::um::winreg::{
    RegCloseKey, RegEnumValueW, RegOpenKeyExW, RegQueryInfoKeyW, HKEY_LOCAL_MACHINE,
};

const SERIALCOMM_KEY: &str = r"HARDWARE\DEVICEMAP\SERIALCOMM";

/// An open COM device. The handle is released on drop if [`CommDevice::close`]
/// was never called.
#[derive(Debug)]
pub struct NativeDevice {
    handle: OwnedHandle,
    path: String,
}

impl NativeDevice {
    /// Open `\\.\<name>` for exclusive reading and writing. The device must
    /// already exist.
    pub fn open(name: &str) -> io::Result<Self> {
        let path = if name.starts_with(r"\\.\") {
            name.to_string()
        } else {
            format!(r"\\.\{name}")
        };
        let wide = to_wide(&path);

        // SAFETY: wide is nul-terminated and outlives the call.
        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                GENERIC_READ | GENERIC_WRITE,
                0,
                ptr::null_mut(),
                OPEN_EXISTING,
                0,
                ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(io::Error::last_os_error());
        }
        // SAFETY: handle is valid and owned by nobody else.
        let handle = unsafe { OwnedHandle::from_raw_handle(handle as RawHandle) };

        debug!(path = %path, "Opened COM device");
        Ok(Self { handle, path })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn raw(&self) -> HANDLE {
        self.handle.as_raw_handle() as HANDLE
    }
}

impl CommDevice for NativeDevice {
    fn comm_state(&mut self) -> io::Result<ControlBlock> {
        decode_dcb(&self.raw_comm_state()?)
    }

    fn set_comm_state(&mut self, block: &ControlBlock) -> io::Result<()> {
        let mut dcb = encode_dcb(block);
        // SAFETY: dcb is a fully initialized DCB.
        check(unsafe { SetCommState(self.raw(), &mut dcb) })
    }

    /// Writes back the DCB exactly as the driver returned it, including
    /// parity or stop-bit codes with no [`Parity`]/[`StopBits`] value.
    fn echo_comm_state(&mut self) -> io::Result<()> {
        let mut dcb = self.raw_comm_state()?;
        // SAFETY: dcb was filled in by GetCommState.
        check(unsafe { SetCommState(self.raw(), &mut dcb) })
    }

    fn set_timeouts(&mut self, timeouts: &Timeouts) -> io::Result<()> {
        let mut native = COMMTIMEOUTS {
            ReadIntervalTimeout: timeouts.read_interval,
            ReadTotalTimeoutMultiplier: timeouts.read_total_multiplier,
            ReadTotalTimeoutConstant: timeouts.read_total_constant,
            WriteTotalTimeoutMultiplier: timeouts.write_total_multiplier,
            WriteTotalTimeoutConstant: timeouts.write_total_constant,
        };
        // SAFETY: native is a valid COMMTIMEOUTS.
        check(unsafe { SetCommTimeouts(self.raw(), &mut native) })
    }

    fn read(&mut self, buffer: &mut [u8]) -> io::Result<usize> {
        let len = buffer.len().min(DWORD::MAX as usize) as DWORD;
        let mut read: DWORD = 0;
        // SAFETY: buffer is valid for writes of len bytes; synchronous call.
        check(unsafe {
            ReadFile(
                self.raw(),
                buffer.as_mut_ptr().cast(),
                len,
                &mut read,
                ptr::null_mut(),
            )
        })?;
        Ok(read as usize)
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let len = data.len().min(DWORD::MAX as usize) as DWORD;
        let mut written: DWORD = 0;
        // SAFETY: data is valid for reads of len bytes; synchronous call.
        check(unsafe {
            WriteFile(
                self.raw(),
                data.as_ptr().cast(),
                len,
                &mut written,
                ptr::null_mut(),
            )
        })?;
        Ok(written as usize)
    }

    fn set_break(&mut self) -> io::Result<()> {
        // SAFETY: handle is an open comm handle.
        check(unsafe { SetCommBreak(self.raw()) })
    }

    fn clear_break(&mut self) -> io::Result<()> {
        // SAFETY: handle is an open comm handle.
        check(unsafe { ClearCommBreak(self.raw()) })
    }

    fn close(self) -> io::Result<()> {
        let handle = self.handle.into_raw_handle() as HANDLE;
        // SAFETY: ownership was just released by the OwnedHandle, so this is
        // the only close.
        check(unsafe { CloseHandle(handle) })?;
        debug!(path = %self.path, "Closed COM device");
        Ok(())
    }
}

impl NativeDevice {
    fn raw_comm_state(&self) -> io::Result<DCB> {
        // SAFETY: DCB is plain data; all-zero is a valid value.
        let mut dcb: DCB = unsafe { mem::zeroed() };
        dcb.DCBlength = mem::size_of::<DCB>() as DWORD;
        // SAFETY: dcb is a valid, writable DCB.
        check(unsafe { GetCommState(self.raw(), &mut dcb) })?;
        Ok(dcb)
    }
}

/// `HKLM\HARDWARE\DEVICEMAP\SERIALCOMM`, where serial drivers register the
/// ports they expose.
#[derive(Debug)]
pub struct SerialCommKey {
    key: HKEY,
}

impl SerialCommKey {
    pub fn open() -> io::Result<Self> {
        let subkey = to_wide(SERIALCOMM_KEY);
        let mut key: HKEY = ptr::null_mut();
        // SAFETY: subkey is nul-terminated, key is a valid out pointer.
        let status =
            unsafe { RegOpenKeyExW(HKEY_LOCAL_MACHINE, subkey.as_ptr(), 0, KEY_READ, &mut key) };
        check_status(status)?;
        Ok(Self { key })
    }
}

impl DeviceRegistry for SerialCommKey {
    fn entry_count(&self) -> io::Result<usize> {
        let mut values: DWORD = 0;
        // SAFETY: every out pointer is either null or valid.
        let status = unsafe {
            RegQueryInfoKeyW(
                self.key,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                &mut values,
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
                ptr::null_mut(),
            )
        };
        check_status(status)?;
        Ok(values as usize)
    }

    fn entry(&self, index: usize) -> io::Result<RegistryEntry> {
        let mut name = [0u16; 1024];
        let mut name_len = name.len() as DWORD;
        let mut data = [0u16; 1024];
        let mut data_len = mem::size_of_val(&data) as DWORD;

        // SAFETY: buffers and their lengths match; lengths are in/out.
        let status = unsafe {
            RegEnumValueW(
                self.key,
                index as DWORD,
                name.as_mut_ptr(),
                &mut name_len,
                ptr::null_mut(),
                ptr::null_mut(),
                data.as_mut_ptr().cast(),
                &mut data_len,
            )
        };
        check_status(status)?;

        let value = &data[..(data_len as usize / 2).min(data.len())];
        Ok(RegistryEntry {
            name: from_wide(&name[..name_len as usize]),
            value: from_wide(value),
        })
    }
}

impl Drop for SerialCommKey {
    fn drop(&mut self) {
        // SAFETY: the key was opened by RegOpenKeyExW and is closed once.
        unsafe { RegCloseKey(self.key) };
    }
}

fn decode_dcb(dcb: &DCB) -> io::Result<ControlBlock> {
    let parity = Parity::from_code(dcb.Parity)
        .ok_or_else(|| invalid_data(format!("unknown parity code {}", dcb.Parity)))?;
    let stop_bits = StopBits::from_code(dcb.StopBits)
        .ok_or_else(|| invalid_data(format!("unknown stop bits code {}", dcb.StopBits)))?;

    Ok(ControlBlock {
        baud_rate: dcb.BaudRate,
        flags: ControlFlags::decode(dcb.BitFields),
        xon_limit: dcb.XonLim,
        xoff_limit: dcb.XoffLim,
        byte_size: dcb.ByteSize,
        parity,
        stop_bits,
        xon_char: dcb.XonChar as u8,
        xoff_char: dcb.XoffChar as u8,
        error_char: dcb.ErrorChar as u8,
        eof_char: dcb.EofChar as u8,
        evt_char: dcb.EvtChar as u8,
    })
}

fn encode_dcb(block: &ControlBlock) -> DCB {
    // SAFETY: DCB is plain data; all-zero is a valid value.
    let mut dcb: DCB = unsafe { mem::zeroed() };
    dcb.DCBlength = mem::size_of::<DCB>() as DWORD;
    dcb.BaudRate = block.baud_rate;
    dcb.BitFields = block.flags.encode();
    dcb.XonLim = block.xon_limit;
    dcb.XoffLim = block.xoff_limit;
    dcb.ByteSize = block.byte_size;
    dcb.Parity = block.parity.code();
    dcb.StopBits = block.stop_bits.code();
    dcb.XonChar = block.xon_char as _;
    dcb.XoffChar = block.xoff_char as _;
    dcb.ErrorChar = block.error_char as _;
    dcb.EofChar = block.eof_char as _;
    dcb.EvtChar = block.evt_char as _;
    dcb
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn check(ok: i32) -> io::Result<()> {
    if ok == FALSE {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

fn check_status(status: i32) -> io::Result<()> {
    if status == ERROR_SUCCESS as i32 {
        Ok(())
    } else {
        Err(io::Error::from_raw_os_error(status))
    }
}

fn to_wide(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(Some(0)).collect()
}

fn from_wide(wide: &[u16]) -> String {
    let end = wide.iter().position(|&c| c == 0).unwrap_or(wide.len());
    String::from_utf16_lossy(&wide[..end])
}
