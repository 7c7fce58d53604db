//! Over-the-air firmware update engine.
//!
//! ```text
//!   packet pipe ──┐
//!                 ├─▶ DfuEvent ─▶ route(state, event) ─▶ handler ─▶ next state
//!   control pipe ─┘                                         │
//!                                                           ├─▶ FlashPort (pages)
//!                                                           └─▶ outbox ─▶ control-tx pipe
//! ```
//!
//! A transfer runs Idle → Ready → (ReceivingInit) → ReceivingData →
//! Validated, then a reset request drives the link down and restarts the
//! system.  Responses are queued in a small outbox and sent as credit
//! allows, so a burst of notifications never blocks page programming.

pub mod context;
pub mod control;
mod handlers;
pub mod image;
pub mod route;

use core::fmt;

use heapless::Deque;
use log::{error, info};

use crate::aci::{SessionState, TransportLink};
use crate::app::ports::{AciPort, FlashPort, ResetPort};
use crate::config::DfuPipes;
pub use context::DfuContext;
pub use control::{ControlMessage, ControlOp, ResultCode};
pub use image::DfuSession;
use route::route;

/// Responses that may wait for transmit credit.
pub const OUTBOX_DEPTH: usize = 4;

/// Credit reserved for control responses when a transfer starts.
pub const RESPONSE_CREDIT: u8 = 2;

// ---------------------------------------------------------------------------
// States and events
// ---------------------------------------------------------------------------

/// Outcome of a validate request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DfuState {
    /// Waiting for the image length.
    Idle,
    /// Image length accepted.
    Ready,
    ReceivingInit,
    ReceivingData,
    Validated(Validity),
    /// A transfer error; only reset leaves this state.
    Failed,
    /// Disconnect requested, waiting for the link to drop.
    AwaitingReset,
    /// System reset issued.
    Terminated,
}

impl DfuState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Ready => "Ready",
            Self::ReceivingInit => "ReceivingInit",
            Self::ReceivingData => "ReceivingData",
            Self::Validated(Validity::Valid) => "Valid",
            Self::Validated(Validity::Invalid) => "Invalid",
            Self::Failed => "Failed",
            Self::AwaitingReset => "AwaitingReset",
            Self::Terminated => "Terminated",
        }
    }

    /// No event leaves this state.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::AwaitingReset | Self::Terminated)
    }
}

impl fmt::Display for DfuState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One write from the central, classified by the pipe it arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DfuEvent<'a> {
    /// Bytes on the packet pipe.
    Packet(&'a [u8]),
    /// A control-point write; `payload` is the whole write, opcode included.
    Control { opcode: u8, payload: &'a [u8] },
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// DFU state machine writing `PAGE`-byte flash pages.
pub struct DfuEngine<const PAGE: usize> {
    state: DfuState,
    pipes: DfuPipes,
    image: DfuSession<PAGE>,
    outbox: Deque<ControlMessage, OUTBOX_DEPTH>,
    default_notify_interval: u16,
}

impl<const PAGE: usize> DfuEngine<PAGE> {
    pub fn new(pipes: DfuPipes, notify_interval: u16) -> Self {
        Self {
            state: DfuState::Idle,
            pipes,
            image: DfuSession::new(notify_interval),
            outbox: Deque::new(),
            default_notify_interval: notify_interval,
        }
    }

    pub fn state(&self) -> DfuState {
        self.state
    }

    /// Progress of the current transfer.
    pub fn session(&self) -> &DfuSession<PAGE> {
        &self.image
    }

    pub fn pipes(&self) -> DfuPipes {
        self.pipes
    }

    /// Responses waiting for credit.
    pub fn pending_responses(&self) -> usize {
        self.outbox.len()
    }

    /// Whether writes on `pipe` belong to the update service.
    pub fn is_dfu_pipe(&self, pipe: u8) -> bool {
        pipe == self.pipes.packet_rx || pipe == self.pipes.control_rx
    }

    /// Classify a write by its pipe.  `None` for foreign pipes and empty
    /// control writes.
    pub fn classify<'d>(&self, pipe: u8, data: &'d [u8]) -> Option<DfuEvent<'d>> {
        if pipe == self.pipes.packet_rx {
            Some(DfuEvent::Packet(data))
        } else if pipe == self.pipes.control_rx {
            data.first().map(|&opcode| DfuEvent::Control {
                opcode,
                payload: data,
            })
        } else {
            None
        }
    }

    /// Feed one pipe write through the state machine and push out any
    /// responses it produced.  Returns the state afterwards.
    pub fn update<P, F, R>(&mut self, pipe: u8, data: &[u8], ctx: &mut DfuContext<'_, P, F, R>) -> DfuState
    where
        P: AciPort,
        F: FlashPort,
        R: ResetPort,
    {
        if let Some(event) = self.classify(pipe, data) {
            self.dispatch(&event, ctx);
        }
        self.state
    }

    /// Route `event` and run its handler.
    pub fn dispatch<P, F, R>(&mut self, event: &DfuEvent<'_>, ctx: &mut DfuContext<'_, P, F, R>)
    where
        P: AciPort,
        F: FlashPort,
        R: ResetPort,
    {
        let Some(handler) = route(self.state, event) else {
            return;
        };
        let next = self.run(handler, event, ctx);
        self.transition(next);
        self.flush_responses(ctx.link, ctx.session);
    }

    /// Send queued responses while the link accepts them.  Returns how
    /// many went out.
    pub fn flush_responses<P: AciPort>(
        &mut self,
        link: &mut TransportLink<P>,
        session: &mut SessionState,
    ) -> usize {
        let mut sent = 0;
        while let Some(msg) = self.outbox.front() {
            let bytes = msg.encode();
            if !session.send_data(link, self.pipes.control_tx, &bytes) {
                break;
            }
            self.outbox.pop_front();
            sent += 1;
        }
        sent
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn respond(&mut self, msg: ControlMessage) {
        if let Err(msg) = self.outbox.push_back(msg) {
            error!("DFU: response outbox full, dropping {:?}", msg);
        }
    }

    pub(crate) fn transition(&mut self, next: DfuState) {
        if next == self.state {
            return;
        }
        info!("DFU transition: {} -> {}", self.state, next);
        if next == DfuState::Idle {
            self.image = DfuSession::new(self.default_notify_interval);
        }
        self.state = next;
    }
}
