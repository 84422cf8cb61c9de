//! physical addresses
//!
//! a thin newtype over the 64-bit physical address bus

use std::fmt;
use std::ops::{Add, Range, Sub};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Address(u64);

impl Address {
    pub const fn new(offset: u64) -> Self {
        Self(offset)
    }

    /// the raw bus offset of the address
    pub const fn offset(&self) -> u64 {
        self.0
    }

    /// add a byte count without wrapping past the top of the bus
    pub fn checked_add(&self, size: u64) -> Option<Self> {
        self.0.checked_add(size).map(Self)
    }

    /// returns true if the address is a multiple of `align`
    pub fn is_aligned(&self, align: u64) -> bool {
        self.0 % align == 0
    }

    /// the half-open range `[self, self + size)`
    pub fn range(&self, size: u64) -> Range<Address> {
        *self..(*self + size)
    }
}

impl From<u64> for Address {
    fn from(offset: u64) -> Self {
        Self(offset)
    }
}

impl From<u32> for Address {
    fn from(offset: u32) -> Self {
        Self(offset as u64)
    }
}

impl From<usize> for Address {
    fn from(offset: usize) -> Self {
        Self(offset as u64)
    }
}

impl From<Address> for u64 {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl Add<u64> for Address {
    type Output = Self;

    fn add(self, rhs: u64) -> Self {
        Self(self.0 + rhs)
    }
}

impl Add<usize> for Address {
    type Output = Self;

    fn add(self, rhs: usize) -> Self {
        Self(self.0 + rhs as u64)
    }
}

/// distance in bytes between two addresses
impl Sub<Address> for Address {
    type Output = u64;

    fn sub(self, rhs: Address) -> u64 {
        self.0 - rhs.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}
