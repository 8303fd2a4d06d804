//! Queue engine: admission, issue loop and completion reclamation.
//!
//! # Queues
//!
//! ```text
//!   submit ──> pending ──(issuer, head only)──> in_flight ──(dest depth == 0)──> unpinned
//! ```
//!
//! Operations leave `pending` strictly in submission order. An operation
//! enters `in_flight` only after its last descriptor on both sides has been
//! written. The destination depth dropping to zero retires everything in
//! `in_flight` at once.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use log::{debug, trace, warn};

use crate::config::EngineConfig;
use crate::error::{AccelError, Result};
use crate::hal::{PageHandle, PagePinner, RegisterPort};
use crate::issuer::{DescriptorIssuer, Step};
use crate::operation::{Operation, PinnedBuffer};
use crate::request::Request;
use crate::stats::EngineStats;

/// Owns both queues and drives the accelerator.
///
/// All work happens synchronously inside [`submit`](Self::submit) and
/// [`poll`](Self::poll); there is no background activity.
///
/// Dropping an engine with operations outstanding does not unpin their
/// pages: the hardware may still be using them.
pub struct QueueEngine<P: PagePinner, R: RegisterPort> {
    config: EngineConfig,
    issuer: DescriptorIssuer,
    pinner: P,
    regs: R,
    pending: VecDeque<Operation>,
    in_flight: VecDeque<Operation>,
    stats: EngineStats,
}

impl<P: PagePinner, R: RegisterPort> QueueEngine<P, R> {
    /// Create an engine over a pinner and a control block.
    ///
    /// # Returns
    ///
    /// `InvalidConfig` if `config` is inconsistent or its page size differs
    /// from the one `pinner` splits ranges at.
    pub fn new(config: EngineConfig, pinner: P, regs: R) -> Result<Self> {
        config.validate()?;
        if pinner.page_size() != config.page_size {
            warn!(
                "[ACCEL] page size {:#x} does not match pinner page size {:#x}",
                config.page_size,
                pinner.page_size()
            );
            return Err(AccelError::InvalidConfig("page size differs from pinner"));
        }
        Ok(Self {
            config,
            issuer: DescriptorIssuer::new(&config),
            pinner,
            regs,
            pending: VecDeque::new(),
            in_flight: VecDeque::new(),
            stats: EngineStats::new(),
        })
    }

    // ========================================================================
    // Admission
    // ========================================================================

    /// Validate, pin and queue one request, then run the issue loop once.
    ///
    /// # Returns
    ///
    /// - `InvalidArgument` before any pinning if the request is malformed
    /// - `ResourceExhausted` if either range could not be fully pinned;
    ///   every page obtained has been released again
    ///
    /// Nothing is queued on error.
    pub fn submit(&mut self, request: Request) -> Result<()> {
        let validated = match request.validate(&self.config) {
            Ok(v) => v,
            Err(reason) => {
                self.stats.record_rejected();
                debug!("[ACCEL] rejected request: {}", reason);
                return Err(reason.into());
            }
        };

        // Both ranges are pinned before either result is checked
        let src = self.pin_range(request.source, request.length, false);
        let dest = self.pin_range(request.dest, validated.output_length, true);

        if src.len() != validated.source.pages || dest.len() != validated.dest.pages {
            let requested = validated.source.pages + validated.dest.pages;
            let pinned = src.len() + dest.len();
            for page in src.into_iter().chain(dest) {
                self.pinner.unpin(page, false);
            }
            self.stats.record_rollback();
            warn!(
                "[ACCEL] pinned {} of {} pages for {:#x} -> {:#x}, rolled back",
                pinned, requested, request.source, request.dest
            );
            return Err(AccelError::ResourceExhausted { requested, pinned });
        }

        let op = Operation::new(
            request,
            validated.output_length,
            PinnedBuffer::new(src, &validated.source),
            PinnedBuffer::new(dest, &validated.dest),
        );
        debug!(
            "[ACCEL] queued {:#x}+{:#x} -> {:#x}+{:#x} op={} attr={:#x} ({} + {} pages)",
            request.source,
            request.length,
            request.dest,
            validated.output_length,
            request.opcode,
            request.attribute,
            validated.source.pages,
            validated.dest.pages
        );
        self.pending.push_back(op);
        self.stats.record_submitted();

        self.run();
        Ok(())
    }

    /// Pin a range; a failed call counts as zero pages.
    fn pin_range(&mut self, addr: usize, len: usize, writable: bool) -> Vec<PageHandle> {
        match self.pinner.pin(addr, len, writable) {
            Ok(pages) => pages,
            Err(err) => {
                debug!("[ACCEL] pin {:#x}+{:#x} failed: {}", addr, len, err);
                Vec::new()
            }
        }
    }

    // ========================================================================
    // Issue loop
    // ========================================================================

    /// Run the issue loop and report whether work remains.
    pub fn poll(&mut self) -> bool {
        self.run();
        self.has_work()
    }

    /// One pass of the issue loop.
    ///
    /// Each iteration samples both depths, retires `in_flight` on the drain
    /// signal, then steps the head of `pending` once. Returns on backpressure
    /// or when `pending` is empty.
    fn run(&mut self) {
        loop {
            let depth = self.regs.read_depth();
            trace!("[ACCEL] depth src={} dest={}", depth.source, depth.destination);

            if depth.destination == 0 && !self.in_flight.is_empty() {
                self.reclaim();
            }

            let Some(head) = self.pending.front_mut() else {
                break;
            };

            match self.issuer.step(head, depth, &mut self.regs) {
                Step::Issued(side) => self.stats.record_descriptor(side),
                Step::Finished(side) => {
                    self.stats.record_descriptor(side);
                    self.retire_head();
                }
                Step::Stalled(side) => {
                    self.stats.record_stall();
                    trace!("[ACCEL] {:?} FIFO full, yielding", side);
                    return;
                }
                Step::AlreadySent => self.retire_head(),
            }
        }
    }

    /// Move the fully issued head of `pending` to `in_flight`.
    fn retire_head(&mut self) {
        if let Some(op) = self.pending.pop_front() {
            self.in_flight.push_back(op);
        }
    }

    /// Release every in-flight operation.
    fn reclaim(&mut self) {
        let count = self.in_flight.len();
        while let Some(op) = self.in_flight.pop_front() {
            let pages = op.release(&mut self.pinner);
            self.stats.record_reclaim(pages);
        }
        debug!("[ACCEL] reclaimed {} finished operation(s)", count);
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Operations not yet fully issued.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Operations fully issued and awaiting the drain signal.
    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    /// Check if anything is pending or in flight.
    pub fn has_work(&self) -> bool {
        !self.pending.is_empty() || !self.in_flight.is_empty()
    }

    /// Operation currently being issued.
    pub fn head(&self) -> Option<&Operation> {
        self.pending.front()
    }

    /// Operations awaiting completion, oldest first.
    pub fn in_flight(&self) -> impl Iterator<Item = &Operation> {
        self.in_flight.iter()
    }

    pub fn pinner(&self) -> &P {
        &self.pinner
    }

    pub fn registers(&self) -> &R {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut R {
        &mut self.regs
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset();
    }

    /// Tear down, returning the pinner and control block.
    ///
    /// Outstanding operations are dropped without unpinning.
    pub fn into_parts(self) -> (P, R) {
        if self.has_work() {
            warn!(
                "[ACCEL] engine dropped with {} pending, {} in flight",
                self.pending.len(),
                self.in_flight.len()
            );
        }
        (self.pinner, self.regs)
    }
}
