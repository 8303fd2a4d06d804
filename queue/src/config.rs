//! Engine and device configuration.

use crate::descriptor::LENGTH_MASK;
use crate::error::{AccelError, Result};

/// Depth value the hardware reports when a descriptor FIFO is full.
pub const DEFAULT_FIFO_FULL: u32 = 128;

/// Number of function units behind the opcode field.
pub const NR_FUNCTION_UNITS: i32 = 3;

/// Required alignment of addresses and lengths (bytes).
pub const TRANSFER_ALIGN: usize = 64;

/// Physical base of the accelerator control block.
pub const CTRL_BASE: u64 = 0x4001_2000;

/// Size of the mapped control window.
pub const CTRL_WINDOW: usize = 4096;

/// Queue engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Page size used to split transfers into chunks. Must match the
    /// pinner's page size.
    pub page_size: usize,
    /// Depth register value meaning "FIFO full".
    pub fifo_full: u32,
    /// Highest valid opcode.
    pub function_units: i32,
    /// Required alignment of addresses and lengths.
    pub alignment: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_size: page_pin::PAGE_SIZE,
            fifo_full: DEFAULT_FIFO_FULL,
            function_units: NR_FUNCTION_UNITS,
            alignment: TRANSFER_ALIGN,
        }
    }
}

impl EngineConfig {
    /// Same defaults with a different FIFO capacity.
    pub const fn with_fifo_full(mut self, fifo_full: u32) -> Self {
        self.fifo_full = fifo_full;
        self
    }

    /// Check the configuration is internally consistent.
    pub fn validate(&self) -> Result<()> {
        if !self.page_size.is_power_of_two() {
            return Err(AccelError::InvalidConfig("page size must be a power of two"));
        }
        // A full page must fit the descriptor length field
        if self.page_size as u64 > LENGTH_MASK {
            return Err(AccelError::InvalidConfig("page size exceeds descriptor length"));
        }
        if !self.alignment.is_power_of_two() {
            return Err(AccelError::InvalidConfig("alignment must be a power of two"));
        }
        if self.alignment > self.page_size {
            return Err(AccelError::InvalidConfig("alignment larger than a page"));
        }
        if self.fifo_full == 0 {
            return Err(AccelError::InvalidConfig("FIFO capacity must be non-zero"));
        }
        if self.function_units < 0 {
            return Err(AccelError::InvalidConfig("negative function unit count"));
        }
        Ok(())
    }
}

/// Full device configuration: engine plus control block location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcceleratorConfig {
    /// Engine parameters.
    pub engine: EngineConfig,
    /// Physical base of the control registers.
    pub ctrl_base: u64,
    /// Size of the control window in bytes.
    pub ctrl_window: usize,
}

impl Default for AcceleratorConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            ctrl_base: CTRL_BASE,
            ctrl_window: CTRL_WINDOW,
        }
    }
}

impl AcceleratorConfig {
    /// Control block at a non-default address.
    pub fn at(ctrl_base: u64) -> Self {
        Self {
            ctrl_base,
            ..Self::default()
        }
    }

    /// Check the configuration is internally consistent.
    pub fn validate(&self) -> Result<()> {
        self.engine.validate()?;
        // Two descriptor register pairs: offsets 0..16
        if self.ctrl_window < 16 {
            return Err(AccelError::InvalidConfig("control window too small"));
        }
        if self.ctrl_base % 4 != 0 {
            return Err(AccelError::InvalidConfig("control base misaligned"));
        }
        Ok(())
    }
}
