//! memory_map module
//!
//! implements AddressSpace to route physical accesses to mapped regions
//!
//! regions live on one of two layers. the base layer holds ram, rom and
//! peripherals and never allows two entries to intersect. the overlay
//! layer sits above it: an overlay may shadow any part of the base layer,
//! and for as long as it is mapped every access inside its window is
//! routed to it. overlays may not intersect each other.
//!
//! mapping is a setup step and takes `&mut self`. accesses take `&self`
//! and lock only the region they hit, so one address space can be shared
//! between harts while each region still sees its accesses one at a time.
use std::ops::Range;

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use iset::IntervalMap;
use nohash_hasher::IntMap;
use parking_lot::{Mutex, RwLock};

use crate::context;
use crate::context::{
    AccessType,
    Address,
    BackingKind,
    Endian,
    RamState,
    RegionInfo,
    RegionIx,
    RomState,
    DEFAULT_ALIGNMENT_SIZE,
};
use crate::peripheral::traits::MappedPeripheral;

/// a region's backing, each behind its own lock
enum Backing {
    Ram(RwLock<RamState>),
    Rom(RwLock<RomState>),
    Mmio(Mutex<Box<dyn MappedPeripheral>>),
}

impl Backing {
    fn kind(&self) -> BackingKind {
        match self {
            Backing::Ram(_) => BackingKind::Ram,
            Backing::Rom(_) => BackingKind::Rom,
            Backing::Mmio(_) => BackingKind::Mmio,
        }
    }

    fn fork(&self) -> Self {
        match self {
            Backing::Ram(state) => Backing::Ram(RwLock::new(state.read().clone())),
            Backing::Rom(state) => Backing::Rom(RwLock::new(state.read().clone())),
            Backing::Mmio(periph) => Backing::Mmio(Mutex::new(periph.lock().clone())),
        }
    }
}

struct Mapped {
    name: String,
    range: Range<Address>,
    access: AccessType,
    overlay: bool,
    backing: Backing,
}

/// a physical address space
pub struct AddressSpace {
    endian: Endian,
    next: usize,
    regions: IntMap<RegionIx, Mapped>,
    segments: IntervalMap<Address, RegionIx>,
    overlays: IntervalMap<Address, RegionIx>,
}

impl AddressSpace {

    /// creates a new empty address space
    pub fn new_with(endian: Endian) -> Self {
        Self {
            endian,
            next: 0,
            regions: IntMap::default(),
            segments: IntervalMap::new(),
            overlays: IntervalMap::new(),
        }
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    /// map zero-initialized ram at `base`
    ///
    /// base and size must both be 0x1000-aligned
    pub fn map_ram(
        &mut self,
        name: impl Into<String>,
        base: impl Into<Address>,
        size: u64,
    ) -> Result<RegionIx, context::Error> {
        let base = base.into();
        if !base.is_aligned(DEFAULT_ALIGNMENT_SIZE) {
            return Err(context::Error::UnalignedAddress(base));
        }
        if size % DEFAULT_ALIGNMENT_SIZE != 0 {
            return Err(context::Error::UnalignedSize(size, DEFAULT_ALIGNMENT_SIZE));
        }
        let backing = Backing::Ram(RwLock::new(RamState::new_with(size)));
        self.insert(name.into(), base, size, AccessType::all(), false, backing)
    }

    /// map zero-initialized rom at `base`
    pub fn map_rom(
        &mut self,
        name: impl Into<String>,
        base: impl Into<Address>,
        size: u64,
    ) -> Result<RegionIx, context::Error> {
        let backing = Backing::Rom(RwLock::new(RomState::new_with(size)));
        self.insert(name.into(), base.into(), size, AccessType::R | AccessType::X, false, backing)
    }

    /// map a peripheral at its own base address on the base layer
    pub fn map_mmio(
        &mut self,
        peripheral: Box<dyn MappedPeripheral>,
    ) -> Result<RegionIx, context::Error> {
        let name = peripheral.name().to_string();
        let (base, size) = (peripheral.base(), peripheral.size());
        let backing = Backing::Mmio(Mutex::new(peripheral));
        self.insert(name, base, size, AccessType::R | AccessType::W, false, backing)
    }

    /// map a peripheral on the overlay layer
    ///
    /// the overlay takes priority over whatever is mapped beneath it
    pub fn map_overlay(
        &mut self,
        peripheral: Box<dyn MappedPeripheral>,
    ) -> Result<RegionIx, context::Error> {
        let name = peripheral.name().to_string();
        let (base, size) = (peripheral.base(), peripheral.size());
        let backing = Backing::Mmio(Mutex::new(peripheral));
        self.insert(name, base, size, AccessType::R | AccessType::W, true, backing)
    }

    /// detach an overlay, exposing the regions beneath it again
    pub fn unmap_overlay(&mut self, ix: RegionIx) -> Result<(), context::Error> {
        match self.regions.get(&ix) {
            Some(mapped) if mapped.overlay => {
                self.overlays.remove(mapped.range.clone());
                self.regions.remove(&ix);
                Ok(())
            },
            _ => Err(context::Error::InvalidRegion(ix)),
        }
    }

    fn insert(
        &mut self,
        name: String,
        base: Address,
        size: u64,
        access: AccessType,
        overlay: bool,
        backing: Backing,
    ) -> Result<RegionIx, context::Error> {
        let end = base.checked_add(size)
            .filter(|_| size > 0)
            .ok_or(context::Error::OutOfBounds { address: base, size: size as usize })?;
        let range = base..end;

        // check for collision on the layer being mapped into
        let layer = if overlay { &self.overlays } else { &self.segments };
        if let Some(Range { start, .. }) = layer.intervals(range.clone()).next() {
            return Err(if overlay {
                context::Error::OverlayConflict(base, start)
            } else {
                context::Error::MapConflict(base, start)
            });
        }

        let ix = RegionIx(self.next);
        self.next += 1;

        log::debug!(
            "mapped {} {} [{}, {}) {}{}",
            ix, name, base, end, access, if overlay { " overlay" } else { "" },
        );

        if overlay {
            self.overlays.insert(range.clone(), ix);
        } else {
            self.segments.insert(range.clone(), ix);
        }
        self.regions.insert(ix, Mapped { name, range, access, overlay, backing });

        Ok(ix)
    }

    /// find the region serving `address`, overlays first
    ///
    /// returns the region and how many of the `size` bytes it takes. an
    /// access that runs past the end of a peripheral window is clipped to
    /// the window, so the device sees (and absorbs) a short access. any
    /// other access must lie inside one region, and an access that starts
    /// on the base layer may not reach into an overlay above it.
    fn route(&self, address: Address, size: usize) -> Result<(&Mapped, usize), context::Error> {
        let ix = self.overlays.values_overlap(address).next()
            .or_else(|| self.segments.values_overlap(address).next())
            .copied();
        let Some(ix) = ix else {
            log::warn!(target: "guest_error", "access of {} bytes to unmapped address {}", size, address);
            return Err(context::Error::Unmapped(address));
        };
        let mapped = self.regions.get(&ix)
            .ok_or(context::Error::InvalidRegion(ix))?;
        let end = address.checked_add(size as u64);

        if !mapped.overlay {
            let span = address..end.unwrap_or(Address::new(u64::MAX));
            let shadow = Some(span)
                .filter(|span| span.start < span.end)
                .and_then(|span| self.overlays.intervals(span).next());
            if let Some(Range { start, .. }) = shadow {
                log::warn!(
                    target: "guest_error",
                    "access of {} bytes at {} in {} reaches into the overlay at {}",
                    size, address, mapped.name, start,
                );
                return Err(context::Error::OutOfBounds { address, size });
            }
        }

        if end.is_some_and(|end| end <= mapped.range.end) {
            return Ok((mapped, size));
        }
        if matches!(mapped.backing, Backing::Mmio(_)) {
            let len = (mapped.range.end - address) as usize;
            log::warn!(
                target: "guest_error",
                "access of {} bytes at {} runs past the end of {}, clipped to {} bytes",
                size, address, mapped.name, len,
            );
            return Ok((mapped, len));
        }

        log::warn!(
            target: "guest_error",
            "access of {} bytes at {} runs past the end of {}", size, address, mapped.name,
        );
        Err(context::Error::OutOfBounds { address, size })
    }

    /// read `buf.len()` bytes starting at `address`
    ///
    /// bytes clipped off the end of a peripheral window read as zero
    pub fn read(&self, address: impl Into<Address>, buf: &mut [u8]) -> Result<(), context::Error> {
        let address = address.into();
        let (mapped, len) = self.route(address, buf.len())?;
        let offset = address - mapped.range.start;
        let (head, tail) = buf.split_at_mut(len);
        tail.fill(0);
        match &mapped.backing {
            Backing::Ram(state) => state.read().read_bytes(offset, head),
            Backing::Rom(state) => state.read().read_bytes(offset, head),
            Backing::Mmio(periph) => periph.lock().read(offset, head),
        }
        Ok(())
    }

    /// write `bytes` starting at `address`
    ///
    /// bytes clipped off the end of a peripheral window are dropped
    pub fn write(&self, address: impl Into<Address>, bytes: &[u8]) -> Result<(), context::Error> {
        let address = address.into();
        let (mapped, len) = self.route(address, bytes.len())?;
        if !mapped.access.contains(AccessType::W) {
            log::warn!(
                target: "guest_error",
                "write of {} bytes to read-only {} at {}", bytes.len(), mapped.name, address,
            );
            return Err(context::Error::AccessViolation(address, AccessType::W));
        }
        let offset = address - mapped.range.start;
        let bytes = &bytes[..len];
        match &mapped.backing {
            Backing::Ram(state) => state.write().write_bytes(offset, bytes),
            Backing::Rom(_) => return Err(context::Error::AccessViolation(address, AccessType::W)),
            Backing::Mmio(periph) => periph.lock().write(offset, bytes),
        }
        Ok(())
    }

    /// read a word of `size` bytes (1 to 8) in the address space's byte order
    pub fn read_val(&self, address: impl Into<Address>, size: usize) -> Result<u64, context::Error> {
        if size == 0 || size > 8 {
            return Err(context::Error::InvalidSize(size));
        }
        let mut buf = [0u8; 8];
        self.read(address, &mut buf[..size])?;
        Ok(match self.endian {
            Endian::Big => BigEndian::read_uint(&buf, size),
            Endian::Little => LittleEndian::read_uint(&buf, size),
        })
    }

    /// write the low `size` bytes (1 to 8) of `value` in the address space's byte order
    pub fn write_val(
        &self,
        address: impl Into<Address>,
        value: u64,
        size: usize,
    ) -> Result<(), context::Error> {
        if size == 0 || size > 8 {
            return Err(context::Error::InvalidSize(size));
        }
        let value = if size == 8 { value } else { value & ((1u64 << (size * 8)) - 1) };
        let mut buf = [0u8; 8];
        match self.endian {
            Endian::Big => BigEndian::write_uint(&mut buf, value, size),
            Endian::Little => LittleEndian::write_uint(&mut buf, value, size),
        }
        self.write(address, &buf[..size])
    }

    /// place `bytes` into a rom region at `offset` from its base
    ///
    /// this is the loader path used while assembling a board; it is not
    /// reachable from guest accesses
    pub fn load_rom(&self, ix: RegionIx, offset: u64, bytes: &[u8]) -> Result<(), context::Error> {
        let mapped = self.regions.get(&ix)
            .ok_or(context::Error::InvalidRegion(ix))?;
        let Backing::Rom(state) = &mapped.backing else {
            return Err(context::Error::InvalidRegion(ix));
        };
        let size = mapped.range.end - mapped.range.start;
        let fits = offset.checked_add(bytes.len() as u64)
            .is_some_and(|end| end <= size);
        if !fits {
            return Err(context::Error::OutOfBounds {
                address: mapped.range.start + offset,
                size: bytes.len(),
            });
        }
        state.write().load(offset, bytes);
        Ok(())
    }

    /// run `f` against the peripheral mapped at `ix`, holding its lock
    ///
    /// returns `None` if `ix` is not a peripheral
    pub fn peripheral<R>(
        &self,
        ix: RegionIx,
        f: impl FnOnce(&mut dyn MappedPeripheral) -> R,
    ) -> Option<R> {
        match &self.regions.get(&ix)?.backing {
            Backing::Mmio(periph) => {
                let mut periph = periph.lock();
                Some(f(&mut **periph))
            },
            _ => None,
        }
    }

    /// describe a mapped region
    pub fn region(&self, ix: RegionIx) -> Option<RegionInfo> {
        self.regions.get(&ix).map(|mapped| RegionInfo {
            ix,
            name: mapped.name.clone(),
            range: mapped.range.clone(),
            kind: mapped.backing.kind(),
            access: mapped.access,
            overlay: mapped.overlay,
        })
    }

    /// the region an access at `address` would currently be routed to
    pub fn region_at(&self, address: impl Into<Address>) -> Option<RegionInfo> {
        let address = address.into();
        self.overlays.values_overlap(address).next()
            .or_else(|| self.segments.values_overlap(address).next())
            .and_then(|ix| self.region(*ix))
    }

    /// all mapped regions in ascending base order, base layer first
    pub fn regions(&self) -> Vec<RegionInfo> {
        let mut regions = self.regions.keys()
            .filter_map(|ix| self.region(*ix))
            .collect::<Vec<_>>();
        regions.sort_by_key(|info| (info.overlay, info.range.start));
        regions
    }

    /// deep copy of every region, including peripheral state
    pub fn fork(&self) -> Self {
        let regions = self.regions.iter()
            .map(|(ix, mapped)| {
                (*ix, Mapped {
                    name: mapped.name.clone(),
                    range: mapped.range.clone(),
                    access: mapped.access,
                    overlay: mapped.overlay,
                    backing: mapped.backing.fork(),
                })
            })
            .collect();
        Self {
            endian: self.endian,
            next: self.next,
            regions,
            segments: self.segments.clone(),
            overlays: self.overlays.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peripheral::generic::scratch::ScratchRegisters;

    #[test]
    fn test_map_ram() {
        let mut space = AddressSpace::new_with(Endian::Little);
        let mem_base = Address::from(0x0u64);

        space.map_ram("ram", mem_base, 0x2000)
            .expect("map_ram() failed:");
        space.map_ram("bad", mem_base + 0x2000u64, 0x500)
            .expect_err("map_ram() should have failed with UnalignedSize");
        assert_eq!(
            space.map_ram("bad", mem_base + 0x1000u64, 0x2000),
            Err(context::Error::MapConflict(Address::from(0x1000u64), mem_base)),
        );
        space.map_ram("bad", mem_base + 0x500u64, 0x2000)
            .expect_err("map_ram() should have failed with UnalignedAddress");
    }

    #[test]
    fn test_read_write_routing() {
        env_logger::try_init().ok();

        let mut space = AddressSpace::new_with(Endian::Little);
        space.map_ram("ram", 0x8000_0000u64, 0x2000).expect("map_ram() failed");
        let rom = space.map_rom("rom", 0x1000u64, 0x100).expect("map_rom() failed");
        space.map_mmio(Box::new(ScratchRegisters::new_with("scratch", 0x4000u64, 0x10)))
            .expect("map_mmio() failed");

        // ram
        space.write_val(0x8000_1ffcu64, 0xdeadbeef, 4).expect("write_val() failed");
        assert_eq!(space.read_val(0x8000_1ffcu64, 4), Ok(0xdeadbeef));
        let mut bytes = [0u8; 4];
        space.read(0x8000_1ffcu64, &mut bytes).expect("read() failed");
        assert_eq!(bytes, [0xef, 0xbe, 0xad, 0xde], "ram is little endian");

        // narrow writes only keep the low bytes
        space.write_val(0x8000_0000u64, 0x1234_5678, 2).expect("write_val() failed");
        assert_eq!(space.read_val(0x8000_0000u64, 8), Ok(0x5678));

        // rom
        space.load_rom(rom, 0, &[0x13, 0x00, 0x00, 0x00]).expect("load_rom() failed");
        assert_eq!(space.read_val(0x1000u64, 4), Ok(0x13));
        assert_eq!(
            space.write_val(0x1000u64, 0, 4),
            Err(context::Error::AccessViolation(Address::from(0x1000u64), AccessType::W)),
        );
        assert_eq!(space.read_val(0x1000u64, 4), Ok(0x13), "rom write must not land");
        space.load_rom(rom, 0xfe, &[0u8; 4])
            .expect_err("load_rom() should have failed with OutOfBounds");

        // mmio
        space.write_val(0x4008u64, 0xabcd, 8).expect("write_val() failed");
        assert_eq!(space.read_val(0x4008u64, 8), Ok(0xabcd));

        // unmapped, straddling and malformed
        assert_eq!(
            space.read_val(0x5000u64, 4),
            Err(context::Error::Unmapped(Address::from(0x5000u64))),
        );
        space.write_val(0x9000_0000u64, 0, 4)
            .expect_err("write_val() should have failed with Unmapped");
        assert_eq!(
            space.read_val(0x8000_1ffeu64, 4),
            Err(context::Error::OutOfBounds { address: Address::from(0x8000_1ffeu64), size: 4 }),
        );
        assert_eq!(space.read_val(0x8000_0000u64, 9), Err(context::Error::InvalidSize(9)));
    }

    #[test]
    fn test_big_endian_words() {
        let mut space = AddressSpace::new_with(Endian::Big);
        assert_eq!(space.endian(), Endian::Big);
        space.map_ram("ram", 0x0u64, 0x1000).expect("map_ram() failed");

        space.write_val(0x10u64, 0x0102_0304, 4).expect("write_val() failed");
        let mut bytes = [0u8; 4];
        space.read(0x10u64, &mut bytes).expect("read() failed");
        assert_eq!(bytes, [1, 2, 3, 4]);
    }

    #[test]
    fn test_overlay_priority() {
        let mut space = AddressSpace::new_with(Endian::Little);
        let ram = space.map_ram("ram", 0x8000_0000u64, 0x4000).expect("map_ram() failed");
        space.write(0x8000_1000u64, &[0x55; 16]).expect("write() failed");

        let overlay = space
            .map_overlay(Box::new(ScratchRegisters::new_with("overlay", 0x8000_1000u64, 0x1000)))
            .expect("map_overlay() failed");
        assert_eq!(space.region_at(0x8000_1008u64).map(|info| info.ix), Some(overlay));
        assert_eq!(space.region_at(0x8000_2000u64).map(|info| info.ix), Some(ram));

        // the scratch overlay starts zeroed and hides the ram beneath
        assert_eq!(space.read_val(0x8000_1000u64, 8), Ok(0));
        space.write_val(0x8000_1000u64, 0x77, 1).expect("write_val() failed");

        // overlays may not overlap each other
        space.map_overlay(Box::new(ScratchRegisters::new_with("again", 0x8000_1800u64, 0x1000)))
            .expect_err("map_overlay() should have failed with OverlayConflict");

        space.unmap_overlay(overlay).expect("unmap_overlay() failed");
        assert_eq!(
            space.read_val(0x8000_1000u64, 1),
            Ok(0x55),
            "ram beneath the overlay must be untouched",
        );
        assert_eq!(space.unmap_overlay(overlay), Err(context::Error::InvalidRegion(overlay)));
        assert_eq!(space.unmap_overlay(ram), Err(context::Error::InvalidRegion(ram)));
    }

    #[test]
    fn test_fork_is_independent() {
        let mut space = AddressSpace::new_with(Endian::Little);
        space.map_ram("ram", 0x0u64, 0x1000).expect("map_ram() failed");
        space.map_mmio(Box::new(ScratchRegisters::new_with("scratch", 0x2000u64, 0x8)))
            .expect("map_mmio() failed");
        space.write_val(0x0u64, 1, 8).expect("write_val() failed");
        space.write_val(0x2000u64, 1, 8).expect("write_val() failed");

        let fork = space.fork();
        fork.write_val(0x0u64, 2, 8).expect("write_val() failed");
        fork.write_val(0x2000u64, 2, 8).expect("write_val() failed");

        assert_eq!(space.read_val(0x0u64, 8), Ok(1));
        assert_eq!(space.read_val(0x2000u64, 8), Ok(1));
        assert_eq!(fork.read_val(0x0u64, 8), Ok(2));
        assert_eq!(fork.read_val(0x2000u64, 8), Ok(2));
        assert_eq!(fork.regions(), space.regions());
    }

    #[test]
    fn test_base_access_may_not_reach_into_overlay() {
        env_logger::try_init().ok();

        let mut space = AddressSpace::new_with(Endian::Little);
        space.map_ram("ram", 0x8000_0000u64, 0x4000).expect("map_ram() failed");
        space.write(0x8000_2000u64, &[0x55; 8]).expect("write() failed");
        space.map_overlay(Box::new(ScratchRegisters::new_with("overlay", 0x8000_2000u64, 0x1000)))
            .expect("map_overlay() failed");

        let err = context::Error::OutOfBounds { address: Address::from(0x8000_1ffcu64), size: 8 };
        assert_eq!(space.read_val(0x8000_1ffcu64, 8), Err(err.clone()));
        assert_eq!(space.write_val(0x8000_1ffcu64, u64::MAX, 8), Err(err));

        // nothing landed on either side of the boundary
        assert_eq!(space.read_val(0x8000_1ff8u64, 4), Ok(0));
        assert_eq!(space.read_val(0x8000_1ffcu64, 4), Ok(0));
        assert_eq!(space.read_val(0x8000_2000u64, 4), Ok(0));

        // accesses that stay below the overlay are untouched by the check
        space.write_val(0x8000_1ff8u64, 0x1234, 8).expect("write_val() failed");
        assert_eq!(space.read_val(0x8000_1ff8u64, 8), Ok(0x1234));
    }

    #[test]
    fn test_mmio_access_is_clipped_to_window() {
        let mut space = AddressSpace::new_with(Endian::Little);
        space.map_mmio(Box::new(ScratchRegisters::new_with("scratch", 0x4000u64, 0x10)))
            .expect("map_mmio() failed");
        space.map_mmio(Box::new(ScratchRegisters::new_with("next", 0x4010u64, 0x10)))
            .expect("map_mmio() failed");

        space.write_val(0x400cu64, 0x1122_3344_5566_7788, 8).expect("clipped write must not fault");
        assert_eq!(space.read_val(0x400cu64, 4), Ok(0x5566_7788));
        assert_eq!(space.read_val(0x4010u64, 8), Ok(0), "clipped bytes must not spill over");

        // the clipped tail reads as zero
        assert_eq!(space.read_val(0x400cu64, 8), Ok(0x5566_7788));
    }

    #[test]
    fn test_peripheral_inspection() {
        let mut space = AddressSpace::new_with(Endian::Little);
        let ram = space.map_ram("ram", 0x0u64, 0x1000).expect("map_ram() failed");
        let scratch = space
            .map_mmio(Box::new(ScratchRegisters::new_with("scratch", 0x2000u64, 0x8)))
            .expect("map_mmio() failed");
        space.write_val(0x2000u64, 0x99, 8).expect("write_val() failed");

        let value = space.peripheral(scratch, |periph| {
            let mut buf = [0u8; 8];
            periph.read(0, &mut buf);
            (periph.name().to_string(), LittleEndian::read_u64(&buf))
        });
        assert_eq!(value, Some(("scratch".to_string(), 0x99)));
        assert_eq!(space.peripheral(ram, |periph| periph.size()), None);
    }
}
