//! Default GPIO assignments for the nRF8001 breakout on the ESP32-S3 board.
//!
//! These seed [`AciPins::default`](crate::config::AciPins); a provisioned
//! [`BootConfig`](crate::config::BootConfig) overrides them.

// ---------------------------------------------------------------------------
// ACI handshake lines
// ---------------------------------------------------------------------------

/// REQN: host request, active LOW output.
pub const REQN_GPIO: u8 = 10;
/// RDYN: peer ready, active LOW input (pull-up).
pub const RDYN_GPIO: u8 = 11;
/// nRF8001 RESET, active LOW output.
pub const RESET_GPIO: u8 = 12;

// ---------------------------------------------------------------------------
// SPI2 bus (LSB-first, mode 0, ≤ 3 MHz)
// ---------------------------------------------------------------------------

pub const MOSI_GPIO: u8 = 35;
pub const MISO_GPIO: u8 = 37;
pub const SCK_GPIO: u8 = 36;
