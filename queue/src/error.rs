//! Accelerator error types

use thiserror::Error;

/// Result type for accelerator operations.
pub type Result<T> = core::result::Result<T, AccelError>;

const EFAULT: i32 = 14;
const ENOMEM: i32 = 12;
const EBUSY: i32 = 16;
const EINVAL: i32 = 22;
const ENOSYS: i32 = 38;

/// Why a request was rejected before touching memory or hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum InvalidRequest {
    /// Opcode outside `[0, function units]`.
    #[error("opcode {0} out of range")]
    OpcodeOutOfRange(i32),
    /// Zero-length transfer.
    #[error("zero-length transfer")]
    ZeroLength,
    /// Source address not aligned.
    #[error("source address {0:#x} misaligned")]
    MisalignedSource(usize),
    /// Destination address not aligned.
    #[error("destination address {0:#x} misaligned")]
    MisalignedDest(usize),
    /// Input length not aligned.
    #[error("length {0} misaligned")]
    MisalignedLength(usize),
    /// Computed output length not aligned.
    #[error("output length {0} misaligned")]
    MisalignedOutput(usize),
    /// Output length does not fit in a `usize`.
    #[error("output length overflows")]
    OutputOverflow,
    /// Source or destination range wraps the address space.
    #[error("address range overflows")]
    AddressOverflow,
}

/// Accelerator errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccelError {
    /// Malformed request; nothing was pinned or written.
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] InvalidRequest),
    /// Not every page could be pinned; all pins were rolled back.
    #[error("pinned {pinned} of {requested} pages")]
    ResourceExhausted { requested: usize, pinned: usize },
    /// Device already owned by another session.
    #[error("device busy")]
    Busy,
    /// Unknown control command.
    #[error("unsupported command {0}")]
    Unsupported(u32),
    /// Caller memory could not be read or written.
    #[error("bad address {0:#x}")]
    BadAddress(usize),
    /// Engine configuration rejected.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

impl AccelError {
    /// Negative errno returned by the control entry point.
    pub const fn errno(&self) -> i32 {
        match self {
            Self::InvalidArgument(_) | Self::InvalidConfig(_) => -EINVAL,
            Self::ResourceExhausted { .. } => -ENOMEM,
            Self::Busy => -EBUSY,
            Self::Unsupported(_) => -ENOSYS,
            Self::BadAddress(_) => -EFAULT,
        }
    }

    /// Check if the request itself was malformed.
    pub const fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }
}
