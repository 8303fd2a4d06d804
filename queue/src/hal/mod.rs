//! Hardware boundary of the queue engine.
//!
//! Two collaborators sit below the engine:
//!
//! - [`RegisterPort`]: 32-bit loads/stores into the accelerator control block.
//! - [`PagePinner`]: pins caller ranges and hands back physical pages
//!   (re-exported from the `page-pin` crate).
//!
//! # Register map
//!
//! ```text
//! offset  write                     read
//! 0x00    source descriptor lo      source FIFO depth
//! 0x04    source descriptor hi      -
//! 0x08    dest descriptor lo        destination FIFO depth
//! 0x0c    dest descriptor hi        -
//! ```

pub mod mmio;

pub use mmio::MmioRegisters;

// Re-export page-pin utilities for convenience
pub use page_pin::{
    MemoryRegion, PageHandle, PagePinner, PinError, RegionPinner,
    PAGE_SIZE, align_down, page_offset, page_span,
};

use crate::descriptor::Descriptor;

pub const SRC_DESC_LO: usize = 0x00;
pub const SRC_DESC_HI: usize = 0x04;
pub const DEST_DESC_LO: usize = 0x08;
pub const DEST_DESC_HI: usize = 0x0c;

/// Source FIFO depth (read side of `SRC_DESC_LO`).
pub const SRC_DEPTH: usize = 0x00;
/// Destination FIFO depth (read side of `DEST_DESC_LO`).
pub const DEST_DEPTH: usize = 0x08;

/// Which of the two descriptor FIFOs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Source,
    Destination,
}

impl Direction {
    pub const fn desc_lo(self) -> usize {
        match self {
            Self::Source => SRC_DESC_LO,
            Self::Destination => DEST_DESC_LO,
        }
    }

    pub const fn desc_hi(self) -> usize {
        match self {
            Self::Source => SRC_DESC_HI,
            Self::Destination => DEST_DESC_HI,
        }
    }

    pub const fn depth_offset(self) -> usize {
        match self {
            Self::Source => SRC_DEPTH,
            Self::Destination => DEST_DEPTH,
        }
    }
}

/// Depth of both FIFOs, sampled together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FifoDepth {
    pub source: u32,
    pub destination: u32,
}

impl FifoDepth {
    pub const fn of(&self, side: Direction) -> u32 {
        match side {
            Direction::Source => self.source,
            Direction::Destination => self.destination,
        }
    }
}

/// Raw access to the accelerator control block.
///
/// Offsets are byte offsets into the control window and always 4-byte
/// aligned.
pub trait RegisterPort {
    /// Load a 32-bit register.
    fn read32(&self, offset: usize) -> u32;

    /// Store a 32-bit register.
    fn write32(&mut self, offset: usize, value: u32);

    /// Write one descriptor to a FIFO: low word, then high word.
    ///
    /// # Contract
    ///
    /// The caller has already checked that FIFO is not full. The pair is
    /// never split across calls.
    fn push_descriptor(&mut self, side: Direction, desc: Descriptor) {
        self.write32(side.desc_lo(), desc.low());
        self.write32(side.desc_hi(), desc.high());
    }

    /// Sample both FIFO depths.
    fn read_depth(&self) -> FifoDepth {
        FifoDepth {
            source: self.read32(SRC_DEPTH),
            destination: self.read32(DEST_DEPTH),
        }
    }
}

impl<T: RegisterPort + ?Sized> RegisterPort for &mut T {
    fn read32(&self, offset: usize) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&mut self, offset: usize, value: u32) {
        (**self).write32(offset, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Latch {
        regs: [u32; 4],
        writes: alloc::vec::Vec<(usize, u32)>,
    }

    impl RegisterPort for Latch {
        fn read32(&self, offset: usize) -> u32 {
            self.regs[offset / 4]
        }

        fn write32(&mut self, offset: usize, value: u32) {
            self.writes.push((offset, value));
        }
    }

    #[test]
    fn test_push_descriptor_order() {
        let mut port = Latch {
            regs: [0; 4],
            writes: alloc::vec::Vec::new(),
        };
        let desc = Descriptor::from_raw(0xAAAA_BBBB_CCCC_DDDD);
        port.push_descriptor(Direction::Destination, desc);
        port.push_descriptor(Direction::Source, desc);
        assert_eq!(
            port.writes,
            [
                (8, 0xCCCC_DDDD),
                (12, 0xAAAA_BBBB),
                (0, 0xCCCC_DDDD),
                (4, 0xAAAA_BBBB),
            ]
        );
    }

    #[test]
    fn test_read_depth() {
        let port = Latch {
            regs: [5, 0, 128, 0],
            writes: alloc::vec::Vec::new(),
        };
        let depth = port.read_depth();
        assert_eq!(depth, FifoDepth { source: 5, destination: 128 });
        assert_eq!(depth.of(Direction::Destination), 128);
    }
}
