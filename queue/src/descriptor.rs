//! Descriptor word encoding.
//!
//! One descriptor describes one page-sized (or smaller) chunk of a stream.
//! The word is written as two 32-bit halves, low first.
//!
//! ```text
//!  63        56 55 54            34 33                 6 5   3 2   0
//! ┌───────────┬──┬────────────────┬────────────────────┬─────┬─────┐
//! │ attribute │L │     length     │  physical address  │  0  │ op  │
//! └───────────┴──┴────────────────┴────────────────────┴─────┴─────┘
//! ```
//!
//! `op` and `attribute` are only present on the first chunk of a stream.
//! `L` marks the final source chunk.

use core::fmt;

/// Opcode field mask.
pub const OPCODE_MASK: u64 = 0x7;

/// Bit position of the chunk length.
pub const LENGTH_SHIFT: u32 = 34;

/// Width mask of the chunk length field.
pub const LENGTH_MASK: u64 = (1 << 21) - 1;

/// Last-chunk flag.
pub const LAST_CHUNK: u64 = 1 << 55;

/// Bit position of the attribute byte.
pub const ATTR_SHIFT: u32 = 56;

/// Bits of the address field (everything below the length).
const ADDRESS_MASK: u64 = ((1 << LENGTH_SHIFT) - 1) & !0x3f;

/// A packed hardware descriptor.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Default)]
pub struct Descriptor(u64);

impl Descriptor {
    /// First chunk of a stream: carries the function unit and its attribute.
    pub const fn head(addr: u64, len: usize, opcode: i32, attribute: i32, last: bool) -> Self {
        let word = Self::chunk(addr, len, last).0
            | (opcode as u64 & OPCODE_MASK)
            | (((attribute as u64) & 0xff) << ATTR_SHIFT);
        Self(word)
    }

    /// Continuation chunk.
    ///
    /// `addr` must be 64-byte aligned and below 2^34; `len` must fit
    /// [`LENGTH_MASK`].
    pub const fn chunk(addr: u64, len: usize, last: bool) -> Self {
        debug_assert!(addr & !ADDRESS_MASK == 0, "descriptor address out of range");
        debug_assert!(len as u64 <= LENGTH_MASK, "descriptor length out of range");
        let mut word = addr | ((len as u64 & LENGTH_MASK) << LENGTH_SHIFT);
        if last {
            word |= LAST_CHUNK;
        }
        Self(word)
    }

    /// Wrap a raw word read back from a register model.
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw 64-bit value.
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Half written first.
    pub const fn low(self) -> u32 {
        self.0 as u32
    }

    /// Half written second; the hardware latches the descriptor on this write.
    pub const fn high(self) -> u32 {
        (self.0 >> 32) as u32
    }

    pub const fn address(self) -> u64 {
        self.0 & ADDRESS_MASK
    }

    pub const fn length(self) -> usize {
        ((self.0 >> LENGTH_SHIFT) & LENGTH_MASK) as usize
    }

    pub const fn opcode(self) -> u8 {
        (self.0 & OPCODE_MASK) as u8
    }

    pub const fn attribute(self) -> u8 {
        (self.0 >> ATTR_SHIFT) as u8
    }

    pub const fn is_last(self) -> bool {
        self.0 & LAST_CHUNK != 0
    }
}

impl fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Descriptor")
            .field("address", &format_args!("{:#x}", self.address()))
            .field("length", &self.length())
            .field("opcode", &self.opcode())
            .field("attribute", &self.attribute())
            .field("last", &self.is_last())
            .finish()
    }
}

impl fmt::LowerHex for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}
