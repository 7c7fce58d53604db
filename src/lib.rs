//! bledfu: over-the-air firmware update through an nRF8001 BLE co-processor.
//!
//! Exposes the pure-logic modules for integration testing and external
//! inspection. All ESP-IDF-specific code is guarded by
//! `#[cfg(target_os = "espidf")]` within each module.

#![deny(unused_must_use)]

pub mod aci;
pub mod app;
pub mod config;
pub mod dfu;

mod error;
mod pins;

pub use error::{Error, Result};

// Board-facing modules; the ESP-IDF implementations are guarded by cfg
// attributes inside.
pub mod adapters;
pub mod drivers;
