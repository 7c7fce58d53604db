//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter      | Implements | Connects to                          |
//! |--------------|------------|--------------------------------------|
//! | `hal_port`   | AciPort    | embedded-hal SPI bus + REQN/RDYN/RESET |
//! | `log_sink`   | EventSink  | Serial log output                    |
//! | `nvs`        | ConfigPort | NVS / in-memory store                |
//! | `ota_flash`  | FlashPort  | Inactive OTA partition (ESP-IDF only)|
//! | `sim_radio`  | AciPort    | Scripted nRF8001 (host builds only)  |

pub mod hal_port;
pub mod log_sink;
pub mod nvs;
#[cfg(target_os = "espidf")]
pub mod ota_flash;
#[cfg(not(target_os = "espidf"))]
pub mod sim_radio;
