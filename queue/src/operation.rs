//! Queued operations and their issue phase.

use alloc::vec::Vec;
use core::fmt;

use crate::hal::{PageHandle, PagePinner};
use crate::request::{PageSpan, Request};

// ============================================================================
// Phase
// ============================================================================

/// Position of an operation within the issue protocol.
///
/// ```text
/// SendSrcFirst ─> SendDestFirst ─┬─> SendSrcRest{1..n} ─┬─> SendDestRest{1..m} ─┬─> Sent
///                                │                      └───────────────────────┤
///                                └──────────────────────────────────────────────┘
/// ```
///
/// `next` is the index of the next page to issue on that side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    SendSrcFirst,
    SendDestFirst,
    SendSrcRest { next: usize },
    SendDestRest { next: usize },
    Sent,
}

impl Phase {
    /// Position in the protocol, for ordering checks.
    pub const fn rank(&self) -> u8 {
        match self {
            Self::SendSrcFirst => 0,
            Self::SendDestFirst => 1,
            Self::SendSrcRest { .. } => 2,
            Self::SendDestRest { .. } => 3,
            Self::Sent => 4,
        }
    }

    pub const fn is_sent(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendSrcFirst => write!(f, "send-src-first"),
            Self::SendDestFirst => write!(f, "send-dest-first"),
            Self::SendSrcRest { next } => write!(f, "send-src-rest[{}]", next),
            Self::SendDestRest { next } => write!(f, "send-dest-rest[{}]", next),
            Self::Sent => write!(f, "sent"),
        }
    }
}

// ============================================================================
// Pinned buffer
// ============================================================================

/// One side of a transfer: its pinned pages and chunk geometry.
#[derive(Debug)]
pub struct PinnedBuffer {
    pages: Vec<PageHandle>,
    offset: usize,
    first_len: usize,
    last_len: usize,
}

impl PinnedBuffer {
    pub(crate) fn new(pages: Vec<PageHandle>, span: &PageSpan) -> Self {
        debug_assert_eq!(pages.len(), span.pages);
        Self {
            pages,
            offset: span.offset,
            first_len: span.first_len,
            last_len: span.last_len,
        }
    }

    pub fn pages(&self) -> &[PageHandle] {
        &self.pages
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Physical address and length of chunk `index`.
    ///
    /// Chunk 0 starts at the in-page offset; later chunks start at their page
    /// base. The final chunk of a multi-page buffer carries the last-page
    /// length, every other continuation is a full page.
    pub fn chunk(&self, index: usize, page_size: usize) -> (u64, usize) {
        let page = &self.pages[index];
        if index == 0 {
            (page.phys + self.offset as u64, self.first_len)
        } else if index + 1 == self.pages.len() {
            (page.phys, self.last_len)
        } else {
            (page.phys, page_size)
        }
    }

    fn release<P: PagePinner + ?Sized>(self, pinner: &mut P, dirty: bool) -> usize {
        let count = self.pages.len();
        for page in self.pages {
            pinner.unpin(page, dirty);
        }
        count
    }
}

// ============================================================================
// Operation
// ============================================================================

/// A request whose pages are pinned, plus its issue progress.
#[derive(Debug)]
pub struct Operation {
    request: Request,
    output_length: usize,
    source: PinnedBuffer,
    dest: PinnedBuffer,
    phase: Phase,
}

impl Operation {
    pub(crate) fn new(
        request: Request,
        output_length: usize,
        source: PinnedBuffer,
        dest: PinnedBuffer,
    ) -> Self {
        Self {
            request,
            output_length,
            source,
            dest,
            phase: Phase::SendSrcFirst,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn output_length(&self) -> usize {
        self.output_length
    }

    pub fn source(&self) -> &PinnedBuffer {
        &self.source
    }

    pub fn dest(&self) -> &PinnedBuffer {
        &self.dest
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        debug_assert!(phase.rank() >= self.phase.rank(), "phase regressed");
        self.phase = phase;
    }

    /// Next unissued source page.
    pub fn src_cursor(&self) -> usize {
        match self.phase {
            Phase::SendSrcFirst => 0,
            Phase::SendDestFirst => 1,
            Phase::SendSrcRest { next } => next,
            Phase::SendDestRest { .. } | Phase::Sent => self.source.page_count(),
        }
    }

    /// Next unissued destination page.
    pub fn dest_cursor(&self) -> usize {
        match self.phase {
            Phase::SendSrcFirst | Phase::SendDestFirst => 0,
            Phase::SendSrcRest { .. } => 1,
            Phase::SendDestRest { next } => next,
            Phase::Sent => self.dest.page_count(),
        }
    }

    /// Total pages held by this operation.
    pub fn page_count(&self) -> usize {
        self.source.page_count() + self.dest.page_count()
    }

    /// Unpin every page: destination dirty, source clean.
    ///
    /// Returns the number of pages released.
    pub fn release<P: PagePinner + ?Sized>(self, pinner: &mut P) -> usize {
        self.dest.release(pinner, true) + self.source.release(pinner, false)
    }
}
