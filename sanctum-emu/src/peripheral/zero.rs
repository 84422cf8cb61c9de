//! zero device
//!
//! a read-only window that always reads as zero. it is attached on the
//! overlay layer so that it hides whatever memory sits beneath it; the
//! shadowed storage is never read or modified through the device.

use crate::context;
use crate::context::{Address, AddressSpace, RegionIx};
use crate::peripheral::traits::MappedPeripheral;

#[derive(Clone, Debug)]
pub struct ZeroDevice {
    base: Address,
    size: u64,
    shadowed: Option<RegionIx>,
}

impl ZeroDevice {

    pub fn new_with(base: impl Into<Address>, size: u64, shadowed: Option<RegionIx>) -> Self {
        Self {
            base: base.into(),
            size,
            shadowed,
        }
    }

    /// create a zero device over `[base, base + size)` and attach it to
    /// `space` as an overlay
    ///
    /// `shadowed` names the region being hidden, if there is one. it is
    /// recorded for inspection only.
    pub fn attach(
        space: &mut AddressSpace,
        shadowed: Option<RegionIx>,
        base: impl Into<Address>,
        size: u64,
    ) -> Result<RegionIx, context::Error> {
        let device = Self::new_with(base, size, shadowed);
        space.map_overlay(Box::new(device))
    }

    /// the region this device was layered over
    pub fn shadowed(&self) -> Option<RegionIx> {
        self.shadowed
    }
}

impl MappedPeripheral for ZeroDevice {

    fn name(&self) -> &str {
        "zero_device"
    }

    fn base(&self) -> Address {
        self.base
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn read(&mut self, _offset: u64, buf: &mut [u8]) {
        buf.fill(0);
    }

    fn write(&mut self, offset: u64, _bytes: &[u8]) {
        log::info!(target: "zero_device", "a zero_device is read only: address {:016x}", offset);
    }
}
