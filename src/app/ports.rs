//! Port traits: the hexagonal boundary between the bootloader core and the board.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ BleBootloader (domain)
//! ```
//!
//! Driven adapters (SPI/GPIO, flash, reset, config storage, event sinks)
//! implement these traits.  [`BleBootloader`](super::service::BleBootloader)
//! consumes them via generics, so the link, session and DFU logic never
//! touch a register directly and run unchanged against test fakes.

use core::fmt;

use crate::config::BootConfig;

// ───────────────────────────────────────────────────────────────
// ACI port (driven adapter: transport ↔ SPI + REQN/RDYN/RESET lines)
// ───────────────────────────────────────────────────────────────

/// The narrow hardware contract the ACI transport needs.
///
/// Line polarity is the adapter's business: `is_ready` and `set_request`
/// speak in terms of "asserted", whatever the electrical level.
pub trait AciPort {
    /// Clock one byte out and return the byte clocked in.
    fn exchange(&mut self, byte: u8) -> Result<u8, PortError>;

    /// Whether the peer is signalling ready (RDYN asserted).
    fn is_ready(&mut self) -> bool;

    /// Drive the request line (REQN).
    fn set_request(&mut self, asserted: bool);

    /// Pulse the peer's reset pin and leave the other lines idle.
    fn pulse_reset(&mut self);

    /// Busy-wait for `ms` milliseconds.
    fn delay_ms(&mut self, ms: u32);
}

// ───────────────────────────────────────────────────────────────
// Flash port (driven adapter: DFU engine → program memory)
// ───────────────────────────────────────────────────────────────

/// Page-granular program memory.
pub trait FlashPort {
    /// Largest image, in bytes, the target region accepts.
    fn capacity(&self) -> u32;

    /// Erase the page at `address` and program it with `page`.
    fn program_page(&mut self, address: u32, page: &[u8]) -> Result<(), FlashError>;

    /// Make the freshly written image bootable.
    fn commit(&mut self) -> Result<(), FlashError> {
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Reset port (driven adapter: domain → hardware restart)
// ───────────────────────────────────────────────────────────────

/// Irreversible system restart.
///
/// On hardware this never returns.  Test doubles record the request and
/// return so the terminal state can be asserted.
pub trait ResetPort {
    fn system_reset(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists [`BootConfig`].
///
/// Implementations MUST validate before persisting; out-of-range pipe
/// numbers or a zero credit budget would leave the bootloader unreachable.
pub trait ConfigPort {
    /// Load configuration.  Returns [`BootConfig::default()`] if nothing is stored.
    fn load(&self) -> Result<BootConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &BootConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The bootloader emits structured [`BootEvent`](super::events::BootEvent)s
/// through this port.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::BootEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`AciPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortError {
    /// The SPI bus reported a transfer error.
    Bus,
    /// A control line could not be read or driven.
    Pin,
}

/// Errors from [`FlashPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashError {
    /// Address or length falls outside the writable region.
    OutOfRange,
    /// Page erase failed.
    EraseFailed,
    /// Page program failed.
    WriteFailed,
    /// The image could not be marked bootable.
    CommitFailed,
}

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No config found in storage (first boot / not provisioned).
    NotFound,
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    IoError,
}

impl fmt::Display for PortError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bus => write!(f, "SPI bus error"),
            Self::Pin => write!(f, "GPIO line error"),
        }
    }
}

impl fmt::Display for FlashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange => write!(f, "flash address out of range"),
            Self::EraseFailed => write!(f, "page erase failed"),
            Self::WriteFailed => write!(f, "page program failed"),
            Self::CommitFailed => write!(f, "image commit failed"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}
