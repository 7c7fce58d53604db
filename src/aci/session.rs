//! Link session bookkeeping and the credit model.
//!
//! Every event pulled off the transport updates [`SessionState`] before
//! anything above sees it.  Sends on a data pipe are gated on the pipe
//! being open and a credit being available; the credit is consumed only
//! once the transport has actually queued the frame.

use log::{debug, info, warn};

use super::codec::{AciCommand, AciEvent, ConnectionTiming, DeviceMode, PIPES_ARRAY_SIZE, status};
use super::transport::TransportLink;
use crate::app::ports::AciPort;

/// Number of pipes the nRF8001 can expose.
pub const MAX_PIPES: u8 = 62;

/// Host-side view of the link: pipe bitmaps, credit budget, timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pipes_open: [u8; PIPES_ARRAY_SIZE],
    pipes_closed: [u8; PIPES_ARRAY_SIZE],
    credit_total: u8,
    credit_available: u8,
    timing: ConnectionTiming,
    confirmation_pending: bool,
    device_mode: Option<DeviceMode>,
    connected: bool,
}

impl SessionState {
    /// A fresh session with a full credit budget of `credit_total`.
    pub fn new(credit_total: u8) -> Self {
        Self {
            pipes_open: [0; PIPES_ARRAY_SIZE],
            pipes_closed: [0; PIPES_ARRAY_SIZE],
            credit_total,
            credit_available: credit_total,
            timing: ConnectionTiming::default(),
            confirmation_pending: false,
            device_mode: None,
            connected: false,
        }
    }

    // ── Event bookkeeping ─────────────────────────────────────

    /// Fold a received event into local state.
    pub fn apply(&mut self, event: &AciEvent) {
        match event {
            AciEvent::DeviceStarted {
                mode,
                credit_available,
                ..
            } => {
                self.device_mode = Some(*mode);
                self.credit_total = *credit_available;
                self.credit_available = *credit_available;
            }
            AciEvent::Connected { timing, .. } => {
                self.connected = true;
                self.timing = *timing;
                self.credit_available = self.credit_total;
            }
            AciEvent::PipeStatus { open, closed } => {
                self.pipes_open = *open;
                self.pipes_closed = *closed;
            }
            AciEvent::Disconnected { .. } => {
                self.connected = false;
                self.pipes_open = [0; PIPES_ARRAY_SIZE];
                self.pipes_closed = [0; PIPES_ARRAY_SIZE];
                self.confirmation_pending = false;
                self.credit_available = self.credit_total;
            }
            AciEvent::Timing(timing) => {
                self.timing = *timing;
            }
            AciEvent::DataCredit { credit } => self.return_credit(*credit),
            AciEvent::PipeError {
                pipe, error_code, ..
            } => {
                // A failed send hands its credit back, unless the failure was
                // the remote ATT layer rejecting a write that did go out.
                if *error_code != status::ERROR_PEER_ATT_ERROR {
                    self.return_credit(1);
                }
                debug!("ACI: pipe {} error 0x{:02X}", pipe, error_code);
            }
            _ => {}
        }
    }

    fn return_credit(&mut self, credit: u8) {
        let granted = self.credit_available.saturating_add(credit);
        if granted > self.credit_total {
            warn!(
                "ACI: credit over-grant ({} + {} > {}), clamping",
                self.credit_available, credit, self.credit_total
            );
        }
        self.credit_available = granted.min(self.credit_total);
    }

    /// Receive, decode and apply the next event.
    pub fn next_event<P: AciPort>(&mut self, link: &mut TransportLink<P>) -> Option<AciEvent> {
        let frame = link.try_receive()?;
        match AciEvent::decode(&frame) {
            Ok(event) => {
                self.apply(&event);
                Some(event)
            }
            Err(e) => {
                warn!("ACI: dropping event ({})", e);
                None
            }
        }
    }

    // ── Pipe state ────────────────────────────────────────────

    /// Whether `pipe` is currently open.
    pub fn is_pipe_available(&self, pipe: u8) -> bool {
        bit(&self.pipes_open, pipe)
    }

    pub fn is_pipe_closed(&self, pipe: u8) -> bool {
        bit(&self.pipes_closed, pipe)
    }

    /// Force `pipe` open without a pipe-status event.
    ///
    /// Used when entering the bootloader from a live application
    /// connection, where the status event was consumed before the jump.
    pub fn mark_pipe_open(&mut self, pipe: u8) {
        if pipe >= MAX_PIPES {
            return;
        }
        let (byte, mask) = locate(pipe);
        self.pipes_open[byte] |= mask;
        self.pipes_closed[byte] &= !mask;
    }

    // ── Credit ────────────────────────────────────────────────

    pub fn credit_available(&self) -> u8 {
        self.credit_available
    }

    pub fn credit_total(&self) -> u8 {
        self.credit_total
    }

    /// Guarantee at least `credit` transmit credits, within the budget.
    pub fn ensure_credit(&mut self, credit: u8) {
        let floor = credit.min(self.credit_total);
        self.credit_available = self.credit_available.max(floor);
    }

    // ── Connection ────────────────────────────────────────────

    pub fn timing(&self) -> ConnectionTiming {
        self.timing
    }

    pub fn device_mode(&self) -> Option<DeviceMode> {
        self.device_mode
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn confirmation_pending(&self) -> bool {
        self.confirmation_pending
    }

    // ── Commands ──────────────────────────────────────────────

    /// Send `data` on `pipe`.  Requires the pipe open and a credit.
    #[must_use]
    pub fn send_data<P: AciPort>(&mut self, link: &mut TransportLink<P>, pipe: u8, data: &[u8]) -> bool {
        if !self.is_pipe_available(pipe) || self.credit_available == 0 {
            return false;
        }

        let frame = match (AciCommand::SendData { pipe, data }).encode() {
            Ok(f) => f,
            Err(e) => {
                warn!("ACI: send on pipe {} rejected ({})", pipe, e);
                return false;
            }
        };

        let sent = link.send(&frame);
        if sent {
            self.credit_available -= 1;
        }
        sent
    }

    /// Start advertising; the peer answers with a connected event.
    #[must_use]
    pub fn connect<P: AciPort>(
        &mut self,
        link: &mut TransportLink<P>,
        timeout: u16,
        adv_interval: u16,
    ) -> bool {
        let sent = send_command(
            link,
            AciCommand::Connect {
                timeout,
                adv_interval,
            },
        );
        if sent {
            info!(
                "ACI: advertising (timeout {}s, interval {})",
                timeout, adv_interval
            );
        }
        sent
    }

    /// Tear down the connection.  Pipe bitmaps are cleared as soon as the
    /// request is queued.
    #[must_use]
    pub fn disconnect<P: AciPort>(&mut self, link: &mut TransportLink<P>, reason: u8) -> bool {
        let sent = send_command(link, AciCommand::Disconnect { reason });
        if sent {
            self.pipes_open = [0; PIPES_ARRAY_SIZE];
            self.pipes_closed = [0; PIPES_ARRAY_SIZE];
        }
        sent
    }

    /// Reset the radio without touching its setup data.
    #[must_use]
    pub fn radio_reset<P: AciPort>(&mut self, link: &mut TransportLink<P>) -> bool {
        send_command(link, AciCommand::RadioReset)
    }
}

fn send_command<P: AciPort>(link: &mut TransportLink<P>, cmd: AciCommand<'_>) -> bool {
    match cmd.encode() {
        Ok(frame) => link.send(&frame),
        Err(e) => {
            warn!("ACI: {:?} not encoded ({})", cmd, e);
            false
        }
    }
}

fn locate(pipe: u8) -> (usize, u8) {
    ((pipe / 8) as usize, 1 << (pipe % 8))
}

fn bit(bitmap: &[u8; PIPES_ARRAY_SIZE], pipe: u8) -> bool {
    if pipe >= MAX_PIPES {
        return false;
    }
    let (byte, mask) = locate(pipe);
    bitmap[byte] & mask != 0
}
