//! Descriptor-queue engine for a memory-mapped stream accelerator.
//!
//! The accelerator takes work through two descriptor FIFOs, one per
//! direction, behind four 32-bit registers. Callers submit transfer
//! requests; the engine pins both buffers, splits them into page-sized
//! chunks and feeds one descriptor per chunk while the FIFOs have room.
//! Completion is observed by polling: the destination FIFO running empty
//! retires everything in flight.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ Accelerator   DeviceSession (one owner) + Mutex<QueueEngine> │
//! │   Handle::ioctl ── Command::{Poll, Submit} ── UserMemory     │
//! ├──────────────────────────────────────────────────────────────┤
//! │ QueueEngine   validate ─> pin ─> pending ─> in_flight        │
//! │                            │        │            │           │
//! │                            │  DescriptorIssuer   │ reclaim   │
//! ├────────────────────────────┼────────┼────────────┼───────────┤
//! │ hal                   PagePinner  RegisterPort  PagePinner   │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use accel_queue::{Accelerator, AcceleratorConfig, MmioRegisters, Request};
//!
//! let config = AcceleratorConfig::default();
//! let regs = unsafe { MmioRegisters::from_config(&config) };
//! let dev = Accelerator::with_config(config.engine, pinner, regs)?;
//!
//! let handle = dev.open()?;
//! handle.submit(Request::new(src, dst, 4096, 1, 0))?;
//! while handle.poll() {}
//! ```

#![no_std]

extern crate alloc;

pub mod config;
pub mod control;
pub mod descriptor;
pub mod device;
pub mod engine;
pub mod error;
pub mod hal;
pub mod issuer;
pub mod length;
pub mod operation;
pub mod request;
pub mod session;
pub mod stats;

pub use config::{AcceleratorConfig, EngineConfig};
pub use control::{Command, SliceMemory, UserMemory};
pub use descriptor::Descriptor;
pub use device::{Accelerator, Handle};
pub use engine::QueueEngine;
pub use error::{AccelError, InvalidRequest, Result};
pub use hal::{Direction, FifoDepth, MmioRegisters, RegisterPort};
pub use issuer::{DescriptorIssuer, Step};
pub use length::compute_output_length;
pub use operation::{Operation, Phase, PinnedBuffer};
pub use request::{PageSpan, Request, Validated};
pub use session::{DeviceSession, Session};
pub use stats::EngineStats;
