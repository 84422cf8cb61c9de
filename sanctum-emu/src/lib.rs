//! sanctum-emu
//!
//! device models and the physical address space of the sanctum secure
//! enclave board: a puf-style identity device, a read-only zero overlay
//! for inaccessible memory partitions, and the fixed partition table that
//! places them next to dram, the boot rom and the elf loader window.
//!
//! the crate does not execute guest code. a cpu model issues its loads
//! and stores against [`context::AddressSpace`], which routes them to the
//! region that owns the address.

pub mod board;
pub mod context;
pub mod peripheral;

pub use board::{MachineConfig, Platform};
pub use context::{Address, AddressSpace};
