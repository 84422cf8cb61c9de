//! scratch register peripheral
//!
//! a memory-mapped register window that basically acts just like
//! concrete memory. the sanctum llc partition controller is modeled
//! this way: software programs it, nothing in the model reacts yet.

use crate::context::Address;
use crate::peripheral::traits::MappedPeripheral;

#[derive(Clone)]
pub struct ScratchRegisters {
    name: String,
    base: Address,
    backing: Vec<u8>,
}

impl ScratchRegisters {

    pub fn new_with(name: impl Into<String>, base: impl Into<Address>, size: u64) -> Self {
        Self {
            name: name.into(),
            base: base.into(),
            backing: vec![0u8; size as usize],
        }
    }

    fn span(&self, offset: u64, len: usize) -> std::ops::Range<usize> {
        let start = offset as usize;
        start..start + len
    }
}

impl MappedPeripheral for ScratchRegisters {

    fn name(&self) -> &str {
        &self.name
    }

    fn base(&self) -> Address {
        self.base
    }

    fn size(&self) -> u64 {
        self.backing.len() as u64
    }

    fn read(&mut self, offset: u64, buf: &mut [u8]) {
        let span = self.span(offset, buf.len());
        buf.copy_from_slice(&self.backing[span]);
    }

    fn write(&mut self, offset: u64, bytes: &[u8]) {
        let span = self.span(offset, bytes.len());
        self.backing[span].copy_from_slice(bytes);
    }
}
