//! Common test utilities and a register model of the accelerator FIFOs

#![allow(dead_code)]

use accel_queue::hal::{
    Direction, MemoryRegion, RegionPinner, DEST_DEPTH, DEST_DESC_HI, DEST_DESC_LO, SRC_DEPTH,
    SRC_DESC_HI, SRC_DESC_LO,
};
use accel_queue::{Descriptor, EngineConfig, QueueEngine, RegisterPort};

/// Depth value reported by a full FIFO.
pub const FULL: u32 = 128;

/// Size of the identity-mapped test address space.
pub const MAPPED: usize = 0x10_0000;

/// In-memory model of the two descriptor FIFOs.
///
/// A descriptor is latched on the high-word write, like the hardware.
#[derive(Debug, Clone)]
pub struct FifoModel {
    pub writes: Vec<(usize, u32)>,
    pub source: Vec<Descriptor>,
    pub dest: Vec<Descriptor>,
    capacity: u32,
    depth: [u32; 2],
    forced_full: [bool; 2],
    low: [u32; 2],
}

impl FifoModel {
    pub fn new() -> Self {
        Self::with_capacity(FULL)
    }

    /// FIFOs saturating at `capacity` descriptors.
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            writes: Vec::new(),
            source: Vec::new(),
            dest: Vec::new(),
            capacity,
            depth: [0; 2],
            forced_full: [false; 2],
            low: [0; 2],
        }
    }

    fn index(side: Direction) -> usize {
        match side {
            Direction::Source => 0,
            Direction::Destination => 1,
        }
    }

    /// Force a FIFO to report full (or release it).
    pub fn set_full(&mut self, side: Direction, full: bool) {
        self.forced_full[Self::index(side)] = full;
    }

    /// Set the depth a FIFO reports.
    pub fn set_depth(&mut self, side: Direction, depth: u32) {
        self.depth[Self::index(side)] = depth;
    }

    /// Hardware consumed everything on both sides.
    pub fn drain(&mut self) {
        self.depth = [0; 2];
    }

    /// Hardware consumed the source side only.
    pub fn drain_source(&mut self) {
        self.depth[0] = 0;
    }

    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    pub fn descriptor_count(&self) -> usize {
        self.source.len() + self.dest.len()
    }
}

impl RegisterPort for FifoModel {
    fn read32(&self, offset: usize) -> u32 {
        let side = match offset {
            SRC_DEPTH => 0,
            DEST_DEPTH => 1,
            other => panic!("read of unmapped register {other:#x}"),
        };
        if self.forced_full[side] {
            self.capacity
        } else {
            self.depth[side]
        }
    }

    fn write32(&mut self, offset: usize, value: u32) {
        self.writes.push((offset, value));
        match offset {
            SRC_DESC_LO => self.low[0] = value,
            DEST_DESC_LO => self.low[1] = value,
            SRC_DESC_HI | DEST_DESC_HI => {
                let side = usize::from(offset == DEST_DESC_HI);
                let desc = Descriptor::from_raw(((value as u64) << 32) | self.low[side] as u64);
                if side == 0 {
                    self.source.push(desc);
                } else {
                    self.dest.push(desc);
                }
                self.depth[side] = (self.depth[side] + 1).min(self.capacity);
            }
            other => panic!("write to unmapped register {other:#x}"),
        }
    }
}

/// Pinner identity-mapping `0..MAPPED`.
pub fn pinner() -> RegionPinner {
    RegionPinner::from_regions(&[MemoryRegion::identity(0, MAPPED)]).unwrap()
}

/// Engine over the identity pinner and an empty FIFO model.
pub fn engine() -> QueueEngine<RegionPinner, FifoModel> {
    engine_with(pinner(), FifoModel::new())
}

pub fn engine_with(pinner: RegionPinner, fifo: FifoModel) -> QueueEngine<RegionPinner, FifoModel> {
    QueueEngine::new(EngineConfig::default(), pinner, fifo).unwrap()
}

/// Engine whose FIFOs fill after `capacity` descriptors.
pub fn engine_with_capacity(capacity: u32) -> QueueEngine<RegionPinner, FifoModel> {
    let config = EngineConfig::default().with_fifo_full(capacity);
    QueueEngine::new(config, pinner(), FifoModel::with_capacity(capacity)).unwrap()
}
