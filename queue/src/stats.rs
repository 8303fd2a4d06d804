//! Engine counters.

use crate::hal::Direction;

/// Running totals kept by the queue engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStats {
    /// Requests accepted and queued
    pub submitted: u64,
    /// Requests failing validation
    pub rejected: u64,
    /// Requests whose pins were rolled back
    pub rollbacks: u64,
    /// Source descriptors written
    pub src_descriptors: u64,
    /// Destination descriptors written
    pub dest_descriptors: u64,
    /// Issue loops stopped by a full FIFO
    pub stalls: u64,
    /// Operations reclaimed after the drain signal
    pub reclaimed_ops: u64,
    /// Pages unpinned by reclamation
    pub reclaimed_pages: u64,
}

impl EngineStats {
    /// Create new empty stats
    pub const fn new() -> Self {
        Self {
            submitted: 0,
            rejected: 0,
            rollbacks: 0,
            src_descriptors: 0,
            dest_descriptors: 0,
            stalls: 0,
            reclaimed_ops: 0,
            reclaimed_pages: 0,
        }
    }

    pub fn record_submitted(&mut self) {
        self.submitted = self.submitted.saturating_add(1);
    }

    pub fn record_rejected(&mut self) {
        self.rejected = self.rejected.saturating_add(1);
    }

    pub fn record_rollback(&mut self) {
        self.rollbacks = self.rollbacks.saturating_add(1);
    }

    pub fn record_stall(&mut self) {
        self.stalls = self.stalls.saturating_add(1);
    }

    pub fn record_descriptor(&mut self, side: Direction) {
        match side {
            Direction::Source => self.src_descriptors = self.src_descriptors.saturating_add(1),
            Direction::Destination => {
                self.dest_descriptors = self.dest_descriptors.saturating_add(1)
            }
        }
    }

    pub fn record_reclaim(&mut self, pages: usize) {
        self.reclaimed_ops = self.reclaimed_ops.saturating_add(1);
        self.reclaimed_pages = self.reclaimed_pages.saturating_add(pages as u64);
    }

    /// Total descriptors written on both sides
    pub fn descriptors(&self) -> u64 {
        self.src_descriptors + self.dest_descriptors
    }

    /// Reset all counters
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}
