//! context errors

use thiserror::Error;

use crate::context::{AccessType, Address, RegionIx};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum Error {
    #[error("access to unmapped address {0}")]
    Unmapped(Address),
    #[error("new region at {0} conflicts with region at {1}")]
    MapConflict(Address, Address),
    #[error("new overlay at {0} conflicts with overlay at {1}")]
    OverlayConflict(Address, Address),
    #[error("access of {size} bytes at {address} leaves its region")]
    OutOfBounds { address: Address, size: usize },
    #[error("{1} access violation at {0}")]
    AccessViolation(Address, AccessType),
    #[error("address unaligned: {0}")]
    UnalignedAddress(Address),
    #[error("size unaligned: {0:#x}, expected {1:#x}-aligned")]
    UnalignedSize(u64, u64),
    #[error("unsupported access size: {0} bytes")]
    InvalidSize(usize),
    #[error("no region mapped as {0}")]
    InvalidRegion(RegionIx),
}
