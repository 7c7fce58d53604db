//! Application core. Pure bootloader logic, zero I/O.
//!
//! The service that ties the ACI link, the session bookkeeping and the DFU
//! engine together.  All interaction with hardware happens through **port
//! traits** defined in [`ports`], so this layer runs unchanged against the
//! simulated radio and test fakes.

pub mod events;
pub mod ports;
pub mod service;
