//! peripheral traits
//!
//! defines various traits for the peripheral module
use dyn_clone::{ DynClone, clone_trait_object };

use crate::context::Address;

/// memory-mapped peripheral state trait
///
/// a peripheral owns a window of register space in the address space.
/// the address space routes any access that falls inside the window to
/// the peripheral with the offset relative to `base()`, and guarantees
/// that `offset + buf.len()` never leaves the window.
///
/// reads and writes are infallible: guests may issue any address and
/// width, and a peripheral is expected to absorb misuse itself (log it
/// and answer with a benign default) rather than fault the caller.
///
/// the address space must be able to clone a peripheral's state for
/// deterministic fork and restore. DynClone is necessary to get around
/// the inability implement clone for trait objects.
pub trait MappedPeripheral: DynClone + Send {

    /// a short name used in diagnostics
    fn name(&self) -> &str;

    /// return the base address of the register window
    fn base(&self) -> Address;

    /// return the size of the register window in bytes
    fn size(&self) -> u64;

    /// fill `buf` with the bytes read at `offset`; the access width is `buf.len()`
    fn read(&mut self, offset: u64, buf: &mut [u8]);

    /// write `bytes` at `offset`; the access width is `bytes.len()`
    fn write(&mut self, offset: u64, bytes: &[u8]);
}

clone_trait_object!(MappedPeripheral);
