//! Outbound bootloader events.
//!
//! The [`BleBootloader`](super::service::BleBootloader) emits these through
//! the [`EventSink`](super::ports::EventSink) port.  Adapters decide what
//! to do with them; on the board they go to the serial log.

use crate::dfu::DfuState;

use super::service::EntryPath;

/// Structured events emitted by the bootloader core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootEvent {
    /// The service has started the radio.
    Started(EntryPath),

    /// Advertising for a central.
    Connecting { timeout: u16, adv_interval: u16 },

    Connected,

    Disconnected,

    /// The DFU engine moved between states.
    DfuStateChanged { from: DfuState, to: DfuState },

    /// The system reset was requested.  Only observable off-target.
    ResetIssued,
}
