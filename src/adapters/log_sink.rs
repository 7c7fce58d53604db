//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing bootloader events to the logger
//! (UART / USB-CDC on the board).

use log::info;

use crate::app::events::BootEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`BootEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &BootEvent) {
        match event {
            BootEvent::Started(entry) => {
                info!("START | entry={:?}", entry);
            }
            BootEvent::Connecting {
                timeout,
                adv_interval,
            } => {
                info!(
                    "LINK  | advertising timeout={}s interval={:.1}ms",
                    timeout,
                    f32::from(*adv_interval) * 0.625
                );
            }
            BootEvent::Connected => info!("LINK  | connected"),
            BootEvent::Disconnected => info!("LINK  | disconnected"),
            BootEvent::DfuStateChanged { from, to } => {
                info!("DFU   | {} -> {}", from, to);
            }
            BootEvent::ResetIssued => info!("RESET | system reset issued"),
        }
    }
}
