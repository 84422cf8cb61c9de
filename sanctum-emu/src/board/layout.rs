//! sanctum partition table
//!
//! the fixed physical memory layout of the board
//!
//! | Region      | Base          | Size         |
//! |-------------|---------------|--------------|
//! | boot rom    | 0x0_0000_1000 | 0x11000      |
//! | puf         | 0x0_0020_0000 | 0x20         |
//! | elf loader  | 0x0_0100_0000 | 0x1000       |
//! | clint       | 0x0_0200_0000 | 0xc0000      |
//! | dram        | 0x0_8000_0000 | 0x8000_0000  |
//! | zero device | 0x1_8000_0000 | 0x8000_0000  |
//! | llc control | 0x2_0000_0000 | 0x8          |
//!
//! the last two only exist when enclave partitioning is modeled. the
//! zero device is the one region allowed to overlap dram.
use std::fmt;
use std::ops::Range;

use crate::board;
use crate::context::Address;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegionId {
    BootRom,
    Puf,
    ElfLoader,
    Clint,
    Dram,
    ZeroDevice,
    LlcCtrl,
}

impl RegionId {
    pub fn name(&self) -> &'static str {
        match self {
            RegionId::BootRom => "riscv.sanctum.mrom",
            RegionId::Puf => "riscv.puf",
            RegionId::ElfLoader => "riscv.sanctum.elfldr",
            RegionId::Clint => "riscv.aclint",
            RegionId::Dram => "riscv.sanctum.ram",
            RegionId::ZeroDevice => "riscv.zero_device",
            RegionId::LlcCtrl => "riscv.sanctum.llc_controller",
        }
    }

    /// pairs of regions that are allowed to intersect
    fn may_overlap(a: RegionId, b: RegionId) -> bool {
        matches!(
            (a, b),
            (RegionId::Dram, RegionId::ZeroDevice) | (RegionId::ZeroDevice, RegionId::Dram)
        )
    }
}

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// a partition table entry
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct Region {
    pub id: RegionId,
    pub base: Address,
    pub size: u64,
}

impl Region {
    pub const fn new(id: RegionId, base: u64, size: u64) -> Self {
        Self { id, base: Address::new(base), size }
    }

    pub fn range(&self) -> Range<Address> {
        self.base.range(self.size)
    }

    pub fn end(&self) -> Address {
        self.base + self.size
    }

    pub fn contains(&self, address: Address) -> bool {
        self.range().contains(&address)
    }

    fn intersects(&self, other: &Region) -> bool {
        self.base < other.end() && other.base < self.end()
    }
}

pub const SANCTUM_MROM: Region = Region::new(RegionId::BootRom, 0x1000, 0x11000);
pub const SANCTUM_PUF: Region = Region::new(RegionId::Puf, 0x200000, 0x20);
pub const SANCTUM_ELFLD: Region = Region::new(RegionId::ElfLoader, 0x1000000, 0x1000);
pub const SANCTUM_CLINT: Region = Region::new(RegionId::Clint, 0x2000000, 0xc0000);
pub const SANCTUM_DRAM: Region = Region::new(RegionId::Dram, 0x80000000, 0x80000000);
pub const SANCTUM_ZERO_DEVICE: Region = Region::new(RegionId::ZeroDevice, 0x180000000, 0x80000000);
pub const SANCTUM_LLC_CTRL: Region = Region::new(RegionId::LlcCtrl, 0x200000000, 0x8);

/// an immutable, validated partition table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    regions: Vec<Region>,
}

impl PartitionTable {

    /// validate `regions` and build a table from them
    ///
    /// fails if a region is empty, wraps the top of the bus, appears
    /// twice, or intersects another region (other than the dram and
    /// zero device pair)
    pub fn new(regions: Vec<Region>) -> Result<Self, board::Error> {
        for (i, region) in regions.iter().enumerate() {
            if region.size == 0 || region.base.checked_add(region.size).is_none() {
                return Err(board::Error::InvalidRegion(region.id, region.base, region.size));
            }
            for other in &regions[..i] {
                if other.id == region.id {
                    return Err(board::Error::DuplicateRegion(region.id));
                }
                if region.intersects(other) && !RegionId::may_overlap(region.id, other.id) {
                    return Err(board::Error::Overlap { first: other.id, second: region.id });
                }
            }
        }
        Ok(Self { regions })
    }

    /// the sanctum table, with or without the enclave partitioning regions
    pub fn sanctum(partitioned: bool) -> Result<Self, board::Error> {
        let mut regions = vec![
            SANCTUM_MROM,
            SANCTUM_PUF,
            SANCTUM_ELFLD,
            SANCTUM_CLINT,
            SANCTUM_DRAM,
        ];
        if partitioned {
            regions.push(SANCTUM_ZERO_DEVICE);
            regions.push(SANCTUM_LLC_CTRL);
        }
        Self::new(regions)
    }

    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.iter().find(|region| region.id == id)
    }

    /// like `get`, but a missing region is a configuration error
    pub fn require(&self, id: RegionId) -> Result<&Region, board::Error> {
        self.get(id).ok_or(board::Error::MissingRegion(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.regions.iter()
    }

    /// the regions covering `address`
    ///
    /// where the zero device overlaps dram, it is returned first
    pub fn lookup(&self, address: impl Into<Address>) -> Vec<&Region> {
        let address = address.into();
        let mut hits = self.regions.iter()
            .filter(|region| region.contains(address))
            .collect::<Vec<_>>();
        hits.sort_by_key(|region| region.id != RegionId::ZeroDevice);
        hits
    }
}
