//! Firmware-agnostic page pinning.
//!
//! This crate provides the page-granular memory pinning boundary used by
//! bare-metal DMA drivers. A driver hands it a virtual byte range and gets
//! back the physical base of every page the range touches, in ascending
//! address order. The pages stay pinned until the driver releases them one
//! by one.
//!
//! # Design Philosophy
//!
//! - **Pinning never owns the pages**: the driver decides when to unpin,
//!   either on rollback or after the device is done with them
//! - **Partial success is visible**: a pin call stops at the first page it
//!   cannot pin and returns what it got; rolling back is the caller's job
//! - **Device-agnostic**: any driver can use the `PagePinner` trait
//!
//! # Memory Sources
//!
//! `RegionPinner` pins pages out of a table of mapped regions. Each region
//! maps a virtual range onto a physical range (identity mapping is just
//! `virt == phys`) and may be read-only.
//!
//! # Usage
//!
//! ```ignore
//! use page_pin::{MemoryRegion, PagePinner, RegionPinner};
//!
//! let mut pinner = RegionPinner::new();
//! pinner.add_region(MemoryRegion::new(0x10_0000, 0x8010_0000, 0x4_0000))?;
//!
//! // Pin a buffer the device will write into
//! let pages = pinner.pin(0x10_0040, 8192, true)?;
//!
//! // ... hand pages[i].phys to the device ...
//!
//! for page in pages {
//!     pinner.unpin(page, true);
//! }
//! ```

#![no_std]

extern crate alloc;

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use log::{trace, warn};
use thiserror::Error;

/// Page size (4KB).
pub const PAGE_SIZE: usize = 4096;

/// Maximum number of regions a `RegionPinner` can map.
pub const MAX_REGIONS: usize = 16;

// ============================================================================
// Utility functions
// ============================================================================

/// Align a value up to the given alignment.
#[inline]
pub const fn align_up(val: usize, align: usize) -> usize {
    (val + align - 1) & !(align - 1)
}

/// Align a value down to the given alignment.
#[inline]
pub const fn align_down(val: usize, align: usize) -> usize {
    val & !(align - 1)
}

/// Byte offset of `addr` within its page.
#[inline]
pub const fn page_offset(addr: usize, page_size: usize) -> usize {
    addr & (page_size - 1)
}

/// Convert pages to bytes.
#[inline]
pub const fn pages_to_bytes(pages: usize) -> usize {
    pages * PAGE_SIZE
}

/// Convert bytes to pages (rounded up).
#[inline]
pub const fn bytes_to_pages(bytes: usize) -> usize {
    align_up(bytes, PAGE_SIZE) / PAGE_SIZE
}

/// Number of pages touched by the half-open byte range `[addr, addr + len)`.
///
/// This is `ceil((len + addr % page_size) / page_size)`, and 0 for an empty
/// range. `addr + len` must not overflow.
#[inline]
pub const fn page_span(addr: usize, len: usize, page_size: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let first = align_down(addr, page_size);
    let last = align_down(addr + (len - 1), page_size);
    (last - first) / page_size + 1
}

// ============================================================================
// Pinning boundary
// ============================================================================

/// One pinned page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle {
    /// Page-aligned virtual address.
    pub virt: usize,
    /// Physical base of the page, stable while pinned.
    pub phys: u64,
}

impl PageHandle {
    /// Create a new page handle.
    pub const fn new(virt: usize, phys: u64) -> Self {
        Self { virt, phys }
    }
}

/// Page pinning errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PinError {
    /// No region maps the page.
    #[error("page {addr:#x} is not mapped")]
    Unmapped { addr: usize },
    /// Writable pin requested on a read-only page.
    #[error("page {addr:#x} is read-only")]
    ReadOnly { addr: usize },
    /// Range wraps the address space.
    #[error("address range overflows")]
    Overflow,
    /// Pin limit reached before any page was pinned.
    #[error("pin limit of {limit} pages reached")]
    LimitReached { limit: usize },
    /// Region is misaligned, empty, or overlaps an existing region.
    #[error("invalid memory region")]
    InvalidRegion,
    /// No room left in the region table.
    #[error("region table full")]
    TableFull,
}

/// Result type for pinning operations.
pub type Result<T> = core::result::Result<T, PinError>;

/// Pins virtual ranges into physical pages.
///
/// # Contract
/// - `pin` returns handles in ascending address order, one per page the
///   range touches (see [`page_span`])
/// - `Ok` with FEWER handles than pages means the call stopped early; the
///   returned pages ARE pinned and the caller must release them
/// - `Err` means nothing was pinned
/// - The pinner never unpins on its own
/// - Ranges are split at [`page_size`](Self::page_size) boundaries
pub trait PagePinner {
    /// Pin every page of `[address, address + length)`.
    fn pin(&mut self, address: usize, length: usize, writable: bool) -> Result<Vec<PageHandle>>;

    /// Release one page. `dirty` marks it written back before release.
    fn unpin(&mut self, handle: PageHandle, dirty: bool);

    /// Granule `pin` splits ranges at.
    fn page_size(&self) -> usize {
        PAGE_SIZE
    }
}

impl<T: PagePinner + ?Sized> PagePinner for &mut T {
    fn pin(&mut self, address: usize, length: usize, writable: bool) -> Result<Vec<PageHandle>> {
        (**self).pin(address, length, writable)
    }

    fn page_size(&self) -> usize {
        (**self).page_size()
    }

    fn unpin(&mut self, handle: PageHandle, dirty: bool) {
        (**self).unpin(handle, dirty)
    }
}

// ============================================================================
// Memory regions
// ============================================================================

/// A mapped virtual range backed by physical memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRegion {
    /// Virtual base address.
    pub virt: usize,
    /// Physical base address.
    pub phys: u64,
    /// Size in bytes.
    pub size: usize,
    /// Whether the device may write into this region.
    pub writable: bool,
}

impl MemoryRegion {
    /// Create a new writable region.
    pub const fn new(virt: usize, phys: u64, size: usize) -> Self {
        Self { virt, phys, size, writable: true }
    }

    /// Create a new read-only region.
    pub const fn read_only(virt: usize, phys: u64, size: usize) -> Self {
        Self { virt, phys, size, writable: false }
    }

    /// Identity-mapped writable region (physical = virtual).
    pub const fn identity(base: usize, size: usize) -> Self {
        Self::new(base, base as u64, size)
    }

    /// Check if region is usable for pinning (page-aligned, non-empty, no wrap).
    pub fn is_usable(&self) -> bool {
        self.size > 0
            && self.virt % PAGE_SIZE == 0
            && self.phys % PAGE_SIZE as u64 == 0
            && self.size % PAGE_SIZE == 0
            && self.virt.checked_add(self.size).is_some()
    }

    /// Check if `addr` falls inside the region.
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.virt && addr - self.virt < self.size
    }

    /// Translate a virtual address to its physical address.
    pub fn translate(&self, addr: usize) -> Option<u64> {
        if self.contains(addr) {
            Some(self.phys + (addr - self.virt) as u64)
        } else {
            None
        }
    }

    fn overlaps(&self, other: &MemoryRegion) -> bool {
        self.virt < other.virt + other.size && other.virt < self.virt + self.size
    }
}

// ============================================================================
// Region table pinner
// ============================================================================

/// Pins pages out of a fixed table of mapped regions.
///
/// Tracks a reference count per pinned page, the set of pages released
/// dirty, and call counters for diagnostics.
#[derive(Debug, Clone)]
pub struct RegionPinner {
    /// Mapped regions.
    regions: [MemoryRegion; MAX_REGIONS],
    /// Number of regions in use.
    region_count: usize,
    /// Pin reference count per page.
    pins: BTreeMap<usize, usize>,
    /// Pages released with `dirty = true`.
    dirty: BTreeSet<usize>,
    /// Maximum outstanding pin references, if any.
    limit: Option<usize>,
    pin_calls: usize,
    unpin_calls: usize,
}

impl RegionPinner {
    /// Create an empty pinner.
    pub const fn new() -> Self {
        Self {
            regions: [MemoryRegion::new(0, 0, 0); MAX_REGIONS],
            region_count: 0,
            pins: BTreeMap::new(),
            dirty: BTreeSet::new(),
            limit: None,
            pin_calls: 0,
            unpin_calls: 0,
        }
    }

    /// Create a pinner from a list of regions.
    pub fn from_regions(regions: &[MemoryRegion]) -> Result<Self> {
        let mut pinner = Self::new();
        for region in regions {
            pinner.add_region(*region)?;
        }
        Ok(pinner)
    }

    /// Cap the number of outstanding pin references.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Change the pin limit.
    pub fn set_limit(&mut self, limit: Option<usize>) {
        self.limit = limit;
    }

    /// Map a new region.
    pub fn add_region(&mut self, region: MemoryRegion) -> Result<()> {
        if !region.is_usable() {
            return Err(PinError::InvalidRegion);
        }
        if self.regions().iter().any(|r| r.overlaps(&region)) {
            return Err(PinError::InvalidRegion);
        }
        if self.region_count >= MAX_REGIONS {
            return Err(PinError::TableFull);
        }
        self.regions[self.region_count] = region;
        self.region_count += 1;
        Ok(())
    }

    /// Mapped regions.
    pub fn regions(&self) -> &[MemoryRegion] {
        &self.regions[..self.region_count]
    }

    /// Find the region mapping `addr`.
    pub fn find_region(&self, addr: usize) -> Option<&MemoryRegion> {
        self.regions().iter().find(|r| r.contains(addr))
    }

    /// Outstanding pin references across all pages.
    pub fn pinned_pages(&self) -> usize {
        self.pins.values().sum()
    }

    /// Pin references held on the page at `virt`.
    pub fn pin_count(&self, virt: usize) -> usize {
        self.pins.get(&align_down(virt, PAGE_SIZE)).copied().unwrap_or(0)
    }

    /// Check if the page at `virt` was ever released dirty.
    pub fn is_dirty(&self, virt: usize) -> bool {
        self.dirty.contains(&align_down(virt, PAGE_SIZE))
    }

    /// Drain the set of dirty pages, lowest address first.
    pub fn take_dirty(&mut self) -> Vec<usize> {
        let pages = self.dirty.iter().copied().collect();
        self.dirty.clear();
        pages
    }

    /// Number of `pin` calls so far.
    pub fn pin_calls(&self) -> usize {
        self.pin_calls
    }

    /// Number of `unpin` calls so far.
    pub fn unpin_calls(&self) -> usize {
        self.unpin_calls
    }

    /// Try to pin one page; returns why not on failure.
    fn pin_page(&mut self, virt: usize, writable: bool) -> Result<PageHandle> {
        if let Some(limit) = self.limit {
            if self.pinned_pages() >= limit {
                return Err(PinError::LimitReached { limit });
            }
        }

        let region = *self.find_region(virt).ok_or(PinError::Unmapped { addr: virt })?;
        if writable && !region.writable {
            return Err(PinError::ReadOnly { addr: virt });
        }
        let phys = region.translate(virt).ok_or(PinError::Unmapped { addr: virt })?;

        *self.pins.entry(virt).or_insert(0) += 1;
        Ok(PageHandle::new(virt, phys))
    }
}

impl Default for RegionPinner {
    fn default() -> Self {
        Self::new()
    }
}

impl PagePinner for RegionPinner {
    fn pin(&mut self, address: usize, length: usize, writable: bool) -> Result<Vec<PageHandle>> {
        self.pin_calls += 1;
        if length == 0 {
            return Ok(Vec::new());
        }

        let end = address.checked_add(length).ok_or(PinError::Overflow)?;
        let first = align_down(address, PAGE_SIZE);
        let last = align_down(end - 1, PAGE_SIZE);
        let mut pages = Vec::with_capacity(page_span(address, length, PAGE_SIZE));

        let mut virt = first;
        loop {
            match self.pin_page(virt, writable) {
                Ok(handle) => pages.push(handle),
                // Stop at the first failure, keep what we have
                Err(err) if pages.is_empty() => return Err(err),
                Err(err) => {
                    trace!(
                        "[PIN] partial pin {:#x}+{:#x}: {} page(s), stopped: {}",
                        address,
                        length,
                        pages.len(),
                        err
                    );
                    return Ok(pages);
                }
            }
            if virt == last {
                break;
            }
            virt += PAGE_SIZE;
        }

        trace!("[PIN] pinned {:#x}+{:#x}: {} page(s)", address, length, pages.len());
        Ok(pages)
    }

    fn unpin(&mut self, handle: PageHandle, dirty: bool) {
        self.unpin_calls += 1;

        let Some(count) = self.pins.get_mut(&handle.virt) else {
            warn!("[PIN] unpin of page {:#x} which is not pinned", handle.virt);
            return;
        };

        if dirty {
            self.dirty.insert(handle.virt);
        }
        *count -= 1;
        if *count == 0 {
            self.pins.remove(&handle.virt);
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pinner() -> RegionPinner {
        RegionPinner::from_regions(&[
            MemoryRegion::new(0x10_0000, 0x8000_0000, 0x4000),
            MemoryRegion::read_only(0x20_0000, 0x9000_0000, 0x2000),
        ])
        .unwrap()
    }

    #[test]
    fn test_align_functions() {
        assert_eq!(align_up(0, 4096), 0);
        assert_eq!(align_up(1, 4096), 4096);
        assert_eq!(align_up(4096, 4096), 4096);
        assert_eq!(align_down(4097, 4096), 4096);
    }

    #[test]
    fn test_page_span() {
        assert_eq!(page_span(0x1000, 0, PAGE_SIZE), 0);
        assert_eq!(page_span(0x1000, 64, PAGE_SIZE), 1);
        assert_eq!(page_span(0x1000, 4096, PAGE_SIZE), 1);
        assert_eq!(page_span(0x1040, 4096, PAGE_SIZE), 2);
        assert_eq!(page_span(0x1FC0, 128, PAGE_SIZE), 2);
        assert_eq!(page_span(0x1000, 3 * 4096, PAGE_SIZE), 3);
    }

    #[test]
    fn test_memory_region() {
        let region = MemoryRegion::new(0x1000, 0x5000, 0x2000);
        assert!(region.is_usable());
        assert_eq!(region.translate(0x1040), Some(0x5040));
        assert_eq!(region.translate(0x3000), None);

        let odd = MemoryRegion::new(0x1000, 0x5000, 1024);
        assert!(!odd.is_usable());
    }

    #[test]
    fn test_overlapping_region_rejected() {
        let mut pinner = pinner();
        let err = pinner.add_region(MemoryRegion::identity(0x10_2000, 0x4000));
        assert_eq!(err, Err(PinError::InvalidRegion));
    }

    #[test]
    fn test_pin_ascending_with_translation() {
        let mut pinner = pinner();
        let pages = pinner.pin(0x10_0040, 4096, false).unwrap();
        assert_eq!(
            pages,
            [
                PageHandle::new(0x10_0000, 0x8000_0000),
                PageHandle::new(0x10_1000, 0x8000_1000),
            ]
        );
        assert_eq!(pinner.pinned_pages(), 2);
        assert_eq!(pinner.pin_calls(), 1);
    }

    #[test]
    fn test_page_size_matches_split() {
        let mut pinner = pinner();
        assert_eq!(pinner.page_size(), PAGE_SIZE);
        let by_ref = &mut pinner;
        assert_eq!(PagePinner::page_size(&by_ref), PAGE_SIZE);

        let pages = by_ref.pin(0x10_0000, 2 * PAGE_SIZE, false).unwrap();
        assert_eq!(pages[1].virt - pages[0].virt, PAGE_SIZE);
    }

    #[test]
    fn test_pin_stops_at_unmapped_page() {
        let mut pinner = pinner();
        // Region ends at 0x10_4000, range runs one page past it
        let pages = pinner.pin(0x10_2000, 3 * 4096, true).unwrap();
        assert_eq!(pages.len(), 2);
        assert_eq!(pinner.pinned_pages(), 2);
    }

    #[test]
    fn test_pin_nothing_is_error() {
        let mut pinner = pinner();
        assert_eq!(
            pinner.pin(0x50_0000, 64, false),
            Err(PinError::Unmapped { addr: 0x50_0000 })
        );
        assert_eq!(
            pinner.pin(0x20_0000, 64, true),
            Err(PinError::ReadOnly { addr: 0x20_0000 })
        );
        assert_eq!(pinner.pinned_pages(), 0);
    }

    #[test]
    fn test_read_only_region_pins_for_read() {
        let mut pinner = pinner();
        let pages = pinner.pin(0x20_0000, 8192, false).unwrap();
        assert_eq!(pages.len(), 2);
    }

    #[test]
    fn test_pin_limit() {
        let mut pinner = pinner().with_limit(3);
        let first = pinner.pin(0x10_0000, 2 * 4096, false).unwrap();
        assert_eq!(first.len(), 2);
        let second = pinner.pin(0x10_2000, 2 * 4096, false).unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(
            pinner.pin(0x10_3000, 64, false),
            Err(PinError::LimitReached { limit: 3 })
        );
    }

    #[test]
    fn test_unpin_refcount_and_dirty() {
        let mut pinner = pinner();
        let a = pinner.pin(0x10_0000, 64, true).unwrap();
        let b = pinner.pin(0x10_0040, 64, false).unwrap();
        assert_eq!(pinner.pin_count(0x10_0000), 2);

        pinner.unpin(b[0], false);
        assert_eq!(pinner.pin_count(0x10_0000), 1);
        assert!(!pinner.is_dirty(0x10_0000));

        pinner.unpin(a[0], true);
        assert_eq!(pinner.pin_count(0x10_0000), 0);
        assert!(pinner.is_dirty(0x10_0000));
        assert_eq!(pinner.take_dirty(), [0x10_0000]);
        assert!(!pinner.is_dirty(0x10_0000));
    }

    #[test]
    fn test_unpin_unknown_page_ignored() {
        let mut pinner = pinner();
        pinner.unpin(PageHandle::new(0x10_0000, 0x8000_0000), true);
        assert_eq!(pinner.unpin_calls(), 1);
        assert!(!pinner.is_dirty(0x10_0000));
    }

    #[test]
    fn test_zero_length_and_overflow() {
        let mut pinner = pinner();
        assert_eq!(pinner.pin(0x10_0000, 0, false), Ok(Vec::new()));
        assert_eq!(pinner.pin(usize::MAX - 63, 128, false), Err(PinError::Overflow));
    }
}
