//! context types
//!
//! various struct and type definitions for the address space
use std::fmt;
use std::ops::Range;

use bitflags::bitflags;

use crate::context::Address;

/// the default memory block alignment size
pub const DEFAULT_ALIGNMENT_SIZE: u64 = 0x1000u64;

bitflags! {
    #[derive(Clone, Copy, Hash, PartialEq, Eq, Debug)]
    pub struct AccessType: u8 {
        const R = 0b0100;    // read
        const W = 0b0010;    // write
        const X = 0b0001;    // fetch/execute
    }
}

impl fmt::Display for AccessType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flag = |set: AccessType, c: char| if self.contains(set) { c } else { '-' };
        write!(f, "{}{}{}", flag(AccessType::R, 'r'), flag(AccessType::W, 'w'), flag(AccessType::X, 'x'))
    }
}

/// byte order used when the address space turns words into bus bytes
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Endian {
    Big,
    Little,
}

/// handle to a region mapped into an address space
///
/// handles stay valid for the lifetime of the address space, even
/// after the region they name has been unmapped
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionIx(pub(crate) usize);

impl nohash_hasher::IsEnabled for RegionIx {}

impl fmt::Display for RegionIx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// the kind of backing behind a mapped region
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum BackingKind {
    Ram,
    Rom,
    Mmio,
}

/// a snapshot of one mapped region, for reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionInfo {
    pub ix: RegionIx,
    pub name: String,
    pub range: Range<Address>,
    pub kind: BackingKind,
    pub access: AccessType,
    pub overlay: bool,
}

impl RegionInfo {
    pub fn size(&self) -> u64 {
        self.range.end - self.range.start
    }
}
