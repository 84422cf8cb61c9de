//! board errors
//!
//! every variant is a fatal configuration error: the board must not
//! start accepting guest traffic once one of these has been raised.

use std::path::PathBuf;

use thiserror::Error;

use crate::board::RegionId;
use crate::context;
use crate::context::Address;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unsupported processor word size {0}, sanctum requires rv64")]
    UnsupportedXlen(u32),
    #[error("unsupported page shift {0}, sanctum requires 4 KB pages")]
    UnsupportedPageShift(u32),
    #[error("unsupported ram size {0:#x}, sanctum is only defined for 2 GB of dram")]
    UnsupportedRamSize(u64),
    #[error("unsupported hart count {0}")]
    UnsupportedHartCount(usize),
    #[error("partition table region {0} is malformed: base {1}, size {2:#x}")]
    InvalidRegion(RegionId, Address, u64),
    #[error("partition table lists {0} more than once")]
    DuplicateRegion(RegionId),
    #[error("partition table regions {first} and {second} overlap")]
    Overlap { first: RegionId, second: RegionId },
    #[error("partition table has no {0} region")]
    MissingRegion(RegionId),
    #[error("region {0} is already backed")]
    RegionInUse(RegionId),
    #[error("device of {size:#x} bytes at {base} does not fit region {region}")]
    DeviceMismatch { region: RegionId, base: Address, size: u64 },
    #[error("failed to read firmware {}", path.display())]
    Firmware { path: PathBuf, source: std::io::Error },
    #[error("firmware of {size:#x} bytes does not fit the {capacity:#x} byte boot rom")]
    FirmwareTooLarge { size: usize, capacity: u64 },
    #[error(transparent)]
    Context(#[from] context::Error),
}
