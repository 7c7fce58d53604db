//! Board drivers.

pub mod watchdog;
