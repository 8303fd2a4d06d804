//! Control commands and caller memory access.

use crate::error::{AccelError, Result};
use crate::request::Request;

/// Control operation codes.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Run the issue loop; report whether work remains.
    Poll = 0,
    /// Submit one request record.
    Submit = 1,
}

impl TryFrom<u32> for Command {
    type Error = AccelError;

    fn try_from(code: u32) -> Result<Self> {
        match code {
            0 => Ok(Self::Poll),
            1 => Ok(Self::Submit),
            other => Err(AccelError::Unsupported(other)),
        }
    }
}

/// Access to the caller's address space.
pub trait UserMemory {
    /// Copy `buf.len()` bytes starting at `addr`.
    fn copy_from(&self, addr: usize, buf: &mut [u8]) -> Result<()>;

    /// Store a native-endian `i32` at `addr`.
    fn write_i32(&mut self, addr: usize, value: i32) -> Result<()>;
}

/// Read a request record out of caller memory.
pub fn read_request<U: UserMemory + ?Sized>(user: &U, addr: usize) -> Result<Request> {
    let mut record = [0u8; Request::RECORD_SIZE];
    user.copy_from(addr, &mut record)?;
    Ok(Request::from_record(&record))
}

/// Caller memory backed by a byte slice that starts at address `base`.
#[derive(Debug)]
pub struct SliceMemory<'a> {
    base: usize,
    bytes: &'a mut [u8],
}

impl<'a> SliceMemory<'a> {
    pub fn new(base: usize, bytes: &'a mut [u8]) -> Self {
        Self { base, bytes }
    }

    /// Store a request record at `addr`.
    pub fn write_request(&mut self, addr: usize, request: &Request) -> Result<()> {
        let range = self.range(addr, Request::RECORD_SIZE)?;
        self.bytes[range].copy_from_slice(&request.to_record());
        Ok(())
    }

    /// Load a native-endian `i32` from `addr`.
    pub fn read_i32(&self, addr: usize) -> Result<i32> {
        let mut raw = [0u8; 4];
        self.copy_from(addr, &mut raw)?;
        Ok(i32::from_ne_bytes(raw))
    }

    fn range(&self, addr: usize, len: usize) -> Result<core::ops::Range<usize>> {
        let start = addr.checked_sub(self.base).ok_or(AccelError::BadAddress(addr))?;
        let end = start.checked_add(len).ok_or(AccelError::BadAddress(addr))?;
        if end > self.bytes.len() {
            return Err(AccelError::BadAddress(addr));
        }
        Ok(start..end)
    }
}

impl UserMemory for SliceMemory<'_> {
    fn copy_from(&self, addr: usize, buf: &mut [u8]) -> Result<()> {
        let range = self.range(addr, buf.len())?;
        buf.copy_from_slice(&self.bytes[range]);
        Ok(())
    }

    fn write_i32(&mut self, addr: usize, value: i32) -> Result<()> {
        let range = self.range(addr, 4)?;
        self.bytes[range].copy_from_slice(&value.to_ne_bytes());
        Ok(())
    }
}
