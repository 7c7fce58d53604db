//! Bootloader configuration.
//!
//! Pin assignments, the credit budget, the DFU pipe numbers and the
//! advertising parameters.  Persisted through
//! [`ConfigPort`](crate::app::ports::ConfigPort) as postcard, or parsed
//! from the legacy EEPROM block written by the application before it
//! jumps into the bootloader.

use serde::{Deserialize, Serialize};

use crate::aci::session::MAX_PIPES;
use crate::app::ports::ConfigError;
use crate::pins;

/// GPIO numbers for the ACI lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AciPins {
    pub reqn: u8,
    pub rdyn: u8,
    pub mosi: u8,
    pub miso: u8,
    pub sck: u8,
    pub reset: u8,
}

impl Default for AciPins {
    fn default() -> Self {
        Self {
            reqn: pins::REQN_GPIO,
            rdyn: pins::RDYN_GPIO,
            mosi: pins::MOSI_GPIO,
            miso: pins::MISO_GPIO,
            sck: pins::SCK_GPIO,
            reset: pins::RESET_GPIO,
        }
    }
}

/// Pipe numbers of the DFU service in the nRF8001 setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DfuPipes {
    /// DFU packet characteristic (firmware bytes in).
    pub packet_rx: u8,
    /// Control point notifications (responses out).
    pub control_tx: u8,
    /// Control point writes (opcodes in).
    pub control_rx: u8,
}

impl Default for DfuPipes {
    fn default() -> Self {
        Self {
            packet_rx: 8,
            control_tx: 9,
            control_rx: 10,
        }
    }
}

/// Core bootloader configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootConfig {
    /// The application has provisioned the radio for DFU.
    pub valid: bool,
    pub pins: AciPins,
    /// Transmit credit budget of the nRF8001.
    pub credit_total: u8,
    pub pipes: DfuPipes,
    /// Advertising timeout in seconds (0 = no timeout).
    pub conn_timeout: u16,
    /// Advertising interval in 0.625 ms units.
    pub adv_interval: u16,
    /// Packets between receipt notifications until the central asks (0 = off).
    pub notify_interval: u16,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            valid: false,
            pins: AciPins::default(),
            credit_total: 2,
            pipes: DfuPipes::default(),
            conn_timeout: 180,
            adv_interval: 0x0050, // 50 ms
            notify_interval: 0,
        }
    }
}

// ── Legacy EEPROM layout ──────────────────────────────────────
//
// base+1   valid marker (1 = provisioned)
// base+2   6 × (port, pin mask): REQN, RDYN, MOSI, MISO, SCK, RESET
// base+14  credit total
// base+15  pipes: packet rx, control tx, control rx
// base+18  advertising timeout, u16 LE
// base+20  advertising interval, u16 LE

const EEPROM_VALID: usize = 1;
const EEPROM_PINS: usize = 2;
const EEPROM_CREDIT: usize = 14;
const EEPROM_PIPES: usize = 15;
const EEPROM_TIMEOUT: usize = 18;
const EEPROM_INTERVAL: usize = 20;

/// Bytes of EEPROM the bootloader block occupies.
pub const EEPROM_BLOCK_LEN: usize = 22;

impl BootConfig {
    /// Parse the block the application leaves at the top of EEPROM.
    ///
    /// Port/mask pairs become linear GPIO numbers (`port * 8 + bit`).
    pub fn from_eeprom(block: &[u8]) -> Result<Self, ConfigError> {
        if block.len() < EEPROM_BLOCK_LEN {
            return Err(ConfigError::Corrupted);
        }
        if block[EEPROM_VALID] != 1 {
            return Err(ConfigError::NotFound);
        }

        let mut lines = [0u8; 6];
        for (i, line) in lines.iter_mut().enumerate() {
            let port = block[EEPROM_PINS + 2 * i];
            let mask = block[EEPROM_PINS + 2 * i + 1];
            if mask.count_ones() != 1 {
                return Err(ConfigError::Corrupted);
            }
            *line = port
                .checked_mul(8)
                .and_then(|base| base.checked_add(mask.trailing_zeros() as u8))
                .ok_or(ConfigError::Corrupted)?;
        }
        let [reqn, rdyn, mosi, miso, sck, reset] = lines;

        let cfg = Self {
            valid: true,
            pins: AciPins {
                reqn,
                rdyn,
                mosi,
                miso,
                sck,
                reset,
            },
            credit_total: block[EEPROM_CREDIT],
            pipes: DfuPipes {
                packet_rx: block[EEPROM_PIPES],
                control_tx: block[EEPROM_PIPES + 1],
                control_rx: block[EEPROM_PIPES + 2],
            },
            conn_timeout: u16::from_le_bytes([block[EEPROM_TIMEOUT], block[EEPROM_TIMEOUT + 1]]),
            adv_interval: u16::from_le_bytes([block[EEPROM_INTERVAL], block[EEPROM_INTERVAL + 1]]),
            notify_interval: 0,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Range-check every field the link depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let DfuPipes {
            packet_rx,
            control_tx,
            control_rx,
        } = self.pipes;

        if self.credit_total == 0 {
            return Err(ConfigError::ValidationFailed("credit_total must be >= 1"));
        }
        if [packet_rx, control_tx, control_rx]
            .iter()
            .any(|&p| p >= MAX_PIPES)
        {
            return Err(ConfigError::ValidationFailed("pipe numbers must be < 62"));
        }
        if packet_rx == control_tx || packet_rx == control_rx || control_tx == control_rx {
            return Err(ConfigError::ValidationFailed("DFU pipes must be distinct"));
        }
        if !(0x0020..=0x4000).contains(&self.adv_interval) {
            return Err(ConfigError::ValidationFailed(
                "adv_interval must be 0x0020–0x4000",
            ));
        }
        Ok(())
    }
}
