//! Volatile register access to a mapped control window.

use core::ptr::{read_volatile, write_volatile};
use core::sync::atomic::{fence, Ordering};

use super::RegisterPort;
use crate::config::AcceleratorConfig;

/// The accelerator control block, mapped at `base`.
#[derive(Debug)]
pub struct MmioRegisters {
    base: usize,
    len: usize,
}

impl MmioRegisters {
    /// Wrap a mapped control window.
    ///
    /// # Safety
    ///
    /// `base..base + len` must be a live device mapping of the control block
    /// for as long as this value exists, and nothing else may drive the
    /// descriptor registers concurrently.
    pub const unsafe fn new(base: usize, len: usize) -> Self {
        Self { base, len }
    }

    /// Wrap the window described by `config`, identity-mapped.
    ///
    /// # Safety
    ///
    /// Same as [`MmioRegisters::new`] for `config.ctrl_base`.
    pub unsafe fn from_config(config: &AcceleratorConfig) -> Self {
        unsafe { Self::new(config.ctrl_base as usize, config.ctrl_window) }
    }

    pub fn base(&self) -> usize {
        self.base
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    fn reg(&self, offset: usize) -> usize {
        debug_assert!(offset % 4 == 0, "unaligned register offset {offset:#x}");
        debug_assert!(offset + 4 <= self.len, "register offset {offset:#x} outside window");
        self.base + offset
    }
}

impl RegisterPort for MmioRegisters {
    #[inline]
    fn read32(&self, offset: usize) -> u32 {
        // SAFETY: window validity is the constructor's contract
        unsafe { read_volatile(self.reg(offset) as *const u32) }
    }

    #[inline]
    fn write32(&mut self, offset: usize, value: u32) {
        // SAFETY: window validity is the constructor's contract
        unsafe { write_volatile(self.reg(offset) as *mut u32, value) };
        fence(Ordering::SeqCst);
    }
}
