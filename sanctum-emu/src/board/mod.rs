//! board module
//!
//! assembles the sanctum board: validates the machine configuration,
//! builds the partition table and maps every region the core models into
//! one address space. once `Platform::assemble` returns, all further
//! behavior is address-routed; nothing here runs again.
//!
//! the timer/ipi controller window is reserved in the table but left
//! empty. external glue fills it (and any other reserved window) through
//! `Platform::attach`.
use std::collections::BTreeMap;
use std::ops::Range;

use byteorder::{ByteOrder, LittleEndian};

use crate::context::{Address, AddressSpace, Endian, RegionIx};
use crate::peripheral::generic::scratch::ScratchRegisters;
use crate::peripheral::{MappedPeripheral, Puf, ZeroDevice};

pub mod config;
pub mod error;
pub mod layout;

pub use config::*;
pub use error::Error;
pub use layout::{PartitionTable, Region, RegionId};

/// number of equally sized enclave regions carved out of dram
pub const ENCLAVE_REGION_COUNT: u64 = 64;

/// the default reset vector, jumps to 0x80002000
pub const DEFAULT_RESET_VECTOR: [u32; 4] = [
    0x000402b7, // 0: lui   t0,0x40
    0x0012829b, // 4: addiw t0,t0,1
    0x00d29293, // 8: slli  t0,t0,0xd
    0x00028067, // c: jr    t0
];

/// size of the status block at the base of the elf loader window
pub const ELFLD_STATUS_SIZE: usize = 0x10;

/// an assembled sanctum board
pub struct Platform {
    config: MachineConfig,
    table: PartitionTable,
    space: AddressSpace,
    backed: BTreeMap<RegionId, RegionIx>,
}

impl Platform {

    /// assemble the board described by `config`
    pub fn assemble(config: MachineConfig) -> Result<Self, Error> {
        config.validate()?;
        let table = PartitionTable::sanctum(config.partitioned)?;
        let reset_vec = Self::reset_vector(&config)?;

        let mut platform = Self {
            config,
            table,
            space: AddressSpace::new_with(Endian::Little),
            backed: BTreeMap::new(),
        };

        // main memory
        let dram = *platform.table.require(RegionId::Dram)?;
        let ix = platform.space.map_ram(dram.id.name(), dram.base, platform.config.ram_size)?;
        platform.backed.insert(dram.id, ix);

        // boot rom with the reset vector at its base
        let mrom = *platform.table.require(RegionId::BootRom)?;
        if reset_vec.len() as u64 > mrom.size {
            return Err(Error::FirmwareTooLarge { size: reset_vec.len(), capacity: mrom.size });
        }
        let ix = platform.space.map_rom(mrom.id.name(), mrom.base, mrom.size)?;
        platform.space.load_rom(ix, 0, &reset_vec)?;
        platform.backed.insert(mrom.id, ix);

        if platform.config.partitioned {
            // the zero device goes on the overlay layer, after anything it may shadow
            let zero = *platform.table.require(RegionId::ZeroDevice)?;
            let shadowed = platform.space.region_at(zero.base).map(|info| info.ix);
            let ix = ZeroDevice::attach(&mut platform.space, shadowed, zero.base, zero.size)?;
            platform.backed.insert(zero.id, ix);

            let llc = *platform.table.require(RegionId::LlcCtrl)?;
            let ix = platform.space
                .map_mmio(Box::new(ScratchRegisters::new_with(llc.id.name(), llc.base, llc.size)))?;
            platform.backed.insert(llc.id, ix);
        }

        // puf
        let puf = *platform.table.require(RegionId::Puf)?;
        platform.attach(RegionId::Puf, Box::new(Puf::new(puf.base, platform.config.puf_secret)))?;

        // elf loader status window
        let elfld = *platform.table.require(RegionId::ElfLoader)?;
        let ix = platform.space.map_rom(elfld.id.name(), elfld.base, elfld.size)?;
        platform.space.load_rom(ix, 0, &[0u8; ELFLD_STATUS_SIZE])?;
        platform.backed.insert(elfld.id, ix);

        log::debug!(
            "sanctum assembled: {} hart(s), {:#x} bytes dram, partitioning {}",
            platform.config.harts,
            platform.config.ram_size,
            if platform.config.partitioned { "on" } else { "off" },
        );

        Ok(platform)
    }

    /// the boot rom image: the firmware file if one is configured,
    /// otherwise the default reset vector
    fn reset_vector(config: &MachineConfig) -> Result<Vec<u8>, Error> {
        match &config.firmware {
            Some(path) => std::fs::read(path)
                .map_err(|source| Error::Firmware { path: path.clone(), source }),
            None => {
                let mut bytes = vec![0u8; DEFAULT_RESET_VECTOR.len() * 4];
                LittleEndian::write_u32_into(&DEFAULT_RESET_VECTOR, &mut bytes);
                Ok(bytes)
            },
        }
    }

    /// map `peripheral` into the reserved window `id`
    ///
    /// the peripheral must start at the window base and fit inside it
    pub fn attach(
        &mut self,
        id: RegionId,
        peripheral: Box<dyn MappedPeripheral>,
    ) -> Result<RegionIx, Error> {
        let region = *self.table.require(id)?;
        if self.backed.contains_key(&id) {
            return Err(Error::RegionInUse(id));
        }
        if peripheral.base() != region.base || peripheral.size() > region.size {
            return Err(Error::DeviceMismatch {
                region: id,
                base: peripheral.base(),
                size: peripheral.size(),
            });
        }
        let ix = self.space.map_mmio(peripheral)?;
        self.backed.insert(id, ix);
        Ok(ix)
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn table(&self) -> &PartitionTable {
        &self.table
    }

    pub fn space(&self) -> &AddressSpace {
        &self.space
    }

    /// the address space region backing a partition table entry, if any
    pub fn backing(&self, id: RegionId) -> Option<RegionIx> {
        self.backed.get(&id).copied()
    }

    /// the address space region holding the puf
    pub fn puf(&self) -> Option<RegionIx> {
        self.backing(RegionId::Puf)
    }

    /// table entries that nothing has been attached to yet
    pub fn reserved(&self) -> impl Iterator<Item = &Region> {
        self.table.iter().filter(|region| !self.backed.contains_key(&region.id))
    }

    /// the physical range of enclave region `index`
    ///
    /// `None` when partitioning is not modeled or the index is out of range
    pub fn enclave_region(&self, index: u64) -> Option<Range<Address>> {
        if !self.config.partitioned || index >= ENCLAVE_REGION_COUNT {
            return None;
        }
        let dram = self.table.get(RegionId::Dram)?;
        let size = self.config.ram_size / ENCLAVE_REGION_COUNT;
        Some((dram.base + index * size).range(size))
    }

    /// an independent copy of the board, including all device state
    pub fn fork(&self) -> Self {
        Self {
            config: self.config.clone(),
            table: self.table.clone(),
            space: self.space.fork(),
            backed: self.backed.clone(),
        }
    }
}
