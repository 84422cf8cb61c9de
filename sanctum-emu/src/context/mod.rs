//! context module
//!
//! the physical address space that guest accesses are routed through,
//! and the ram/rom backings that live in it

pub mod address;
pub mod error;
pub mod memory_map;
pub mod state;
pub mod types;

pub use address::Address;
pub use error::Error;
pub use memory_map::AddressSpace;
pub use state::{RamState, RomState};
pub use types::*;
