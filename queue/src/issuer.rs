//! Descriptor issue state machine.
//!
//! [`DescriptorIssuer::step`] writes at most one descriptor per call and
//! advances the operation's [`Phase`]. A full FIFO leaves the operation
//! untouched so the next call resumes at the same phase.

use log::trace;

use crate::config::EngineConfig;
use crate::descriptor::Descriptor;
use crate::hal::{Direction, FifoDepth, RegisterPort};
use crate::operation::{Operation, Phase};

/// Outcome of one issuer step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// One descriptor written; the operation has more to send.
    Issued(Direction),
    /// Final descriptor written; the operation is now `Sent`.
    Finished(Direction),
    /// FIFO full; nothing written.
    Stalled(Direction),
    /// Operation was already `Sent`.
    AlreadySent,
}

/// Turns an operation's pinned pages into register writes.
#[derive(Debug, Clone, Copy)]
pub struct DescriptorIssuer {
    page_size: usize,
    fifo_full: u32,
}

impl DescriptorIssuer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            page_size: config.page_size,
            fifo_full: config.fifo_full,
        }
    }

    /// Check if `side` can take another descriptor.
    #[inline]
    fn blocked(&self, depth: &FifoDepth, side: Direction) -> bool {
        depth.of(side) == self.fifo_full
    }

    /// Issue at most one descriptor for `op`.
    ///
    /// # Arguments
    ///
    /// * `op` - Head of the pending queue
    /// * `depth` - FIFO depths sampled for this step
    /// * `regs` - Control block
    ///
    /// # Returns
    ///
    /// What happened; on [`Step::Stalled`] neither the registers nor `op`
    /// were touched.
    pub fn step<R: RegisterPort + ?Sized>(
        &self,
        op: &mut Operation,
        depth: FifoDepth,
        regs: &mut R,
    ) -> Step {
        let src_pages = op.source().page_count();
        let dest_pages = op.dest().page_count();

        match op.phase() {
            Phase::SendSrcFirst => {
                if self.blocked(&depth, Direction::Source) {
                    return Step::Stalled(Direction::Source);
                }
                let (addr, len) = op.source().chunk(0, self.page_size);
                let req = op.request();
                let desc = Descriptor::head(addr, len, req.opcode, req.attribute, src_pages == 1);
                self.write(regs, Direction::Source, desc);
                op.set_phase(Phase::SendDestFirst);
                Step::Issued(Direction::Source)
            }

            Phase::SendDestFirst => {
                if self.blocked(&depth, Direction::Destination) {
                    return Step::Stalled(Direction::Destination);
                }
                let (addr, len) = op.dest().chunk(0, self.page_size);
                let req = op.request();
                let desc = Descriptor::head(addr, len, req.opcode, req.attribute, false);
                self.write(regs, Direction::Destination, desc);

                let next = if src_pages > 1 {
                    Phase::SendSrcRest { next: 1 }
                } else if dest_pages > 1 {
                    Phase::SendDestRest { next: 1 }
                } else {
                    Phase::Sent
                };
                self.advance(op, next, Direction::Destination)
            }

            Phase::SendSrcRest { next: index } => {
                if self.blocked(&depth, Direction::Source) {
                    return Step::Stalled(Direction::Source);
                }
                let (addr, len) = op.source().chunk(index, self.page_size);
                let last = index + 1 == src_pages;
                self.write(regs, Direction::Source, Descriptor::chunk(addr, len, last));

                let next = if !last {
                    Phase::SendSrcRest { next: index + 1 }
                } else if dest_pages > 1 {
                    Phase::SendDestRest { next: 1 }
                } else {
                    Phase::Sent
                };
                self.advance(op, next, Direction::Source)
            }

            Phase::SendDestRest { next: index } => {
                if self.blocked(&depth, Direction::Destination) {
                    return Step::Stalled(Direction::Destination);
                }
                let (addr, len) = op.dest().chunk(index, self.page_size);
                let last = index + 1 == dest_pages;
                // Destination streams end by length, never flagged
                self.write(regs, Direction::Destination, Descriptor::chunk(addr, len, false));

                let next = if last {
                    Phase::Sent
                } else {
                    Phase::SendDestRest { next: index + 1 }
                };
                self.advance(op, next, Direction::Destination)
            }

            Phase::Sent => Step::AlreadySent,
        }
    }

    fn write<R: RegisterPort + ?Sized>(&self, regs: &mut R, side: Direction, desc: Descriptor) {
        trace!("[ACCEL] issue {:?} {:016x}", side, desc);
        regs.push_descriptor(side, desc);
    }

    fn advance(&self, op: &mut Operation, next: Phase, side: Direction) -> Step {
        op.set_phase(next);
        if next.is_sent() {
            Step::Finished(side)
        } else {
            Step::Issued(side)
        }
    }
}
