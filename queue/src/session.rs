//! Exclusive device access.

use core::sync::atomic::{AtomicBool, Ordering};

use log::info;

use crate::error::{AccelError, Result};

/// Single-owner gate for one accelerator.
///
/// Opening never blocks: a second owner gets `Busy` and retries later.
#[derive(Debug)]
pub struct DeviceSession {
    available: AtomicBool,
}

impl DeviceSession {
    pub const fn new() -> Self {
        Self {
            available: AtomicBool::new(true),
        }
    }

    /// Take exclusive ownership.
    pub fn acquire(&self) -> Result<Session<'_>> {
        self.available
            .compare_exchange(true, false, Ordering::Acquire, Ordering::Relaxed)
            .map_err(|_| AccelError::Busy)?;
        info!("[ACCEL] device opened");
        Ok(Session { gate: self })
    }

    /// Check if nobody currently owns the device.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }
}

impl Default for DeviceSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof of exclusive ownership; dropping it reopens the device.
#[derive(Debug)]
pub struct Session<'a> {
    gate: &'a DeviceSession,
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        self.gate.available.store(true, Ordering::Release);
        info!("[ACCEL] device closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_acquire_busy() {
        let gate = DeviceSession::new();
        let first = gate.acquire().unwrap();
        assert!(!gate.is_available());
        assert_eq!(gate.acquire().unwrap_err(), AccelError::Busy);
        // A failed attempt leaves the owner in place
        assert!(!gate.is_available());

        drop(first);
        assert!(gate.is_available());
        let _second = gate.acquire().unwrap();
    }
}
