//! machine configuration
//!
//! the sanctum partitioning scheme carves a fixed number of equally
//! sized enclave regions out of a 2 GB dram, so the board is only
//! defined for one processor/memory shape. everything else is rejected
//! before assembly starts.
use std::path::PathBuf;

use crate::board;

/// the only supported processor word size
pub const SANCTUM_XLEN: u32 = 64;
/// the only supported page-table granularity (4 KB pages)
pub const SANCTUM_PAGE_SHIFT: u32 = 12;
/// the only supported dram size
pub const SANCTUM_RAM_SIZE: u64 = 0x8000_0000;
pub const SANCTUM_CPUS_MAX: usize = 4;
pub const SANCTUM_CLOCK_FREQ: u64 = 1_250_000_000;
/// factory secret handed to the puf when none is configured
pub const SANCTUM_PUF_SECRET: u64 = 0xDEADBEEFABADCAFE;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineConfig {
    pub xlen: u32,
    pub page_shift: u32,
    pub ram_size: u64,
    pub harts: usize,
    /// model enclave memory partitioning (zero device, llc controller)
    pub partitioned: bool,
    /// raw boot rom image placed at the reset vector
    pub firmware: Option<PathBuf>,
    pub puf_secret: u64,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            xlen: SANCTUM_XLEN,
            page_shift: SANCTUM_PAGE_SHIFT,
            ram_size: SANCTUM_RAM_SIZE,
            harts: 1,
            partitioned: true,
            firmware: None,
            puf_secret: SANCTUM_PUF_SECRET,
        }
    }
}

impl MachineConfig {

    pub fn with_xlen(mut self, xlen: u32) -> Self {
        self.xlen = xlen;
        self
    }

    pub fn with_page_shift(mut self, page_shift: u32) -> Self {
        self.page_shift = page_shift;
        self
    }

    pub fn with_ram_size(mut self, ram_size: u64) -> Self {
        self.ram_size = ram_size;
        self
    }

    pub fn with_harts(mut self, harts: usize) -> Self {
        self.harts = harts;
        self
    }

    pub fn with_partitioning(mut self, partitioned: bool) -> Self {
        self.partitioned = partitioned;
        self
    }

    pub fn with_firmware(mut self, path: impl Into<PathBuf>) -> Self {
        self.firmware = Some(path.into());
        self
    }

    pub fn with_puf_secret(mut self, secret: u64) -> Self {
        self.puf_secret = secret;
        self
    }

    /// check that the configuration is the one shape sanctum supports
    pub fn validate(&self) -> Result<(), board::Error> {
        if self.xlen != SANCTUM_XLEN {
            return Err(board::Error::UnsupportedXlen(self.xlen));
        }
        if self.page_shift != SANCTUM_PAGE_SHIFT {
            return Err(board::Error::UnsupportedPageShift(self.page_shift));
        }
        if self.ram_size != SANCTUM_RAM_SIZE {
            return Err(board::Error::UnsupportedRamSize(self.ram_size));
        }
        if self.harts == 0 || self.harts > SANCTUM_CPUS_MAX {
            return Err(board::Error::UnsupportedHartCount(self.harts));
        }
        Ok(())
    }
}
