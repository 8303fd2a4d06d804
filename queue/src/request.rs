//! Transfer requests and their validation.

use core::mem::{offset_of, size_of};

use page_pin::{align_down, page_offset};

use crate::config::EngineConfig;
use crate::error::InvalidRequest;
use crate::length::compute_output_length;

/// One transfer request, in the caller's record layout.
///
/// The control entry point copies exactly [`Request::RECORD_SIZE`] bytes of
/// this layout out of caller memory.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Request {
    /// Source virtual address.
    pub source: usize,
    /// Destination virtual address.
    pub dest: usize,
    /// Input length in bytes.
    pub length: usize,
    /// First function unit.
    pub opcode: i32,
    /// Chaining bits and unit modifiers.
    pub attribute: i32,
}

const SOURCE_AT: usize = offset_of!(Request, source);
const DEST_AT: usize = offset_of!(Request, dest);
const LENGTH_AT: usize = offset_of!(Request, length);
const OPCODE_AT: usize = offset_of!(Request, opcode);
const ATTRIBUTE_AT: usize = offset_of!(Request, attribute);
const WORD: usize = size_of::<usize>();

impl Request {
    /// Size of the request record in caller memory.
    pub const RECORD_SIZE: usize = size_of::<Request>();

    /// Create a request.
    pub const fn new(source: usize, dest: usize, length: usize, opcode: i32, attribute: i32) -> Self {
        Self {
            source,
            dest,
            length,
            opcode,
            attribute,
        }
    }

    /// Decode a record copied verbatim from caller memory (native byte order).
    pub fn from_record(record: &[u8; Self::RECORD_SIZE]) -> Self {
        let word = |at: usize| {
            let mut bytes = [0u8; WORD];
            bytes.copy_from_slice(&record[at..at + WORD]);
            usize::from_ne_bytes(bytes)
        };
        let int = |at: usize| {
            let mut bytes = [0u8; 4];
            bytes.copy_from_slice(&record[at..at + 4]);
            i32::from_ne_bytes(bytes)
        };

        Self {
            source: word(SOURCE_AT),
            dest: word(DEST_AT),
            length: word(LENGTH_AT),
            opcode: int(OPCODE_AT),
            attribute: int(ATTRIBUTE_AT),
        }
    }

    /// Encode as the caller-side record (padding zeroed).
    pub fn to_record(&self) -> [u8; Self::RECORD_SIZE] {
        let mut record = [0u8; Self::RECORD_SIZE];
        record[SOURCE_AT..SOURCE_AT + WORD].copy_from_slice(&self.source.to_ne_bytes());
        record[DEST_AT..DEST_AT + WORD].copy_from_slice(&self.dest.to_ne_bytes());
        record[LENGTH_AT..LENGTH_AT + WORD].copy_from_slice(&self.length.to_ne_bytes());
        record[OPCODE_AT..OPCODE_AT + 4].copy_from_slice(&self.opcode.to_ne_bytes());
        record[ATTRIBUTE_AT..ATTRIBUTE_AT + 4].copy_from_slice(&self.attribute.to_ne_bytes());
        record
    }

    /// Validate against the engine configuration.
    ///
    /// Pure: touches neither memory nor hardware.
    pub fn validate(&self, config: &EngineConfig) -> Result<Validated, InvalidRequest> {
        if self.opcode < 0 || self.opcode > config.function_units {
            return Err(InvalidRequest::OpcodeOutOfRange(self.opcode));
        }

        let output_length = compute_output_length(self.opcode, self.attribute, self.length)
            .ok_or(InvalidRequest::OutputOverflow)?;

        let mask = config.alignment - 1;
        if self.source & mask != 0 {
            return Err(InvalidRequest::MisalignedSource(self.source));
        }
        if self.dest & mask != 0 {
            return Err(InvalidRequest::MisalignedDest(self.dest));
        }
        if self.length & mask != 0 {
            return Err(InvalidRequest::MisalignedLength(self.length));
        }
        if output_length & mask != 0 {
            return Err(InvalidRequest::MisalignedOutput(output_length));
        }
        if self.length == 0 || output_length == 0 {
            return Err(InvalidRequest::ZeroLength);
        }

        let source = PageSpan::new(self.source, self.length, config.page_size)
            .ok_or(InvalidRequest::AddressOverflow)?;
        let dest = PageSpan::new(self.dest, output_length, config.page_size)
            .ok_or(InvalidRequest::AddressOverflow)?;

        Ok(Validated {
            output_length,
            source,
            dest,
        })
    }
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validated {
    /// Destination length produced by the function units.
    pub output_length: usize,
    /// Pages the source range touches.
    pub source: PageSpan,
    /// Pages the destination range touches.
    pub dest: PageSpan,
}

/// Page geometry of one side of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpan {
    /// Page-aligned address of the first page.
    pub first_page: usize,
    /// Number of pages touched.
    pub pages: usize,
    /// Offset of the range within its first page.
    pub offset: usize,
    /// Length of the first chunk: rest of the first page, capped by the range.
    pub first_len: usize,
    /// Bytes of the range that fall in the last page.
    pub last_len: usize,
}

impl PageSpan {
    /// Geometry of `[addr, addr + len)`; `None` if the range wraps or is empty.
    pub fn new(addr: usize, len: usize, page_size: usize) -> Option<Self> {
        if len == 0 {
            return None;
        }
        let end = addr.checked_add(len)?;
        let first_page = align_down(addr, page_size);
        let last_page = align_down(end - 1, page_size);
        let offset = page_offset(addr, page_size);

        Some(Self {
            first_page,
            pages: (last_page - first_page) / page_size + 1,
            offset,
            first_len: (page_size - offset).min(len),
            last_len: end - last_page,
        })
    }
}
