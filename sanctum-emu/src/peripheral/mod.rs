//! peripheral module
//!
//! memory-mapped device models of the sanctum board

pub mod traits;
pub mod generic;
pub mod puf;
pub mod zero;

pub use traits::MappedPeripheral;
pub use puf::{Puf, PufResponse, PlaceholderResponse};
pub use zero::ZeroDevice;
