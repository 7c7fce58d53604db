//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against the simulated radio and mock adapters.  All tests run on the
//! host (x86_64) with no real hardware required.

#![cfg(not(target_os = "espidf"))]

mod dfu_flow_tests;
mod link_tests;
mod mock_hw;
mod service_tests;
