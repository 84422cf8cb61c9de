//! generic peripherals

pub mod scratch;
