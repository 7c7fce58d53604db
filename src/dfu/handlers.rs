//! Handler bodies for each routed event.
//!
//! Every handler returns the state to move to.  Responses are queued on
//! the outbox; the engine flushes it after the handler returns.

use log::{error, info, warn};

use super::control::{ControlMessage, ResultCode, procedure};
use super::route::Handler;
use super::{DfuContext, DfuEngine, DfuEvent, DfuState, RESPONSE_CREDIT, Validity};
use crate::aci::AciEvent;
use crate::aci::codec::REASON_TERMINATE;
use crate::app::ports::{AciPort, FlashPort, ResetPort};

impl<const PAGE: usize> DfuEngine<PAGE> {
    pub(super) fn run<P, F, R>(
        &mut self,
        handler: Handler,
        event: &DfuEvent<'_>,
        ctx: &mut DfuContext<'_, P, F, R>,
    ) -> DfuState
    where
        P: AciPort,
        F: FlashPort,
        R: ResetPort,
    {
        let data = match *event {
            DfuEvent::Packet(data) => data,
            DfuEvent::Control { payload, .. } => payload,
        };

        match handler {
            Handler::ImageSizeSet => self.image_size_set(data, ctx),
            Handler::BeginInit => DfuState::ReceivingInit,
            Handler::InitPacket => {
                // Init packet contents are not interpreted.
                self.respond(ControlMessage::response(procedure::INIT, ResultCode::Success));
                DfuState::ReceivingInit
            }
            Handler::BeginTransfer => {
                info!("DFU: receiving {} byte image", self.image.image_len());
                DfuState::ReceivingData
            }
            Handler::DataPacket => self.data_packet(data, ctx),
            Handler::Validate => self.validate(ctx),
            Handler::Reset => self.reset(ctx),
            Handler::NotificationSet => self.notification_set(data),
            Handler::ReportImageSize => {
                self.respond(ControlMessage::ImageSize {
                    received: self.image.bytes_received(),
                });
                self.state
            }
            Handler::Reject { procedure, result } => {
                warn!(
                    "DFU: request 0x{:02X} refused in {} ({})",
                    procedure, self.state, result
                );
                self.respond(ControlMessage::response(procedure, result));
                self.state
            }
        }
    }

    // ── Start ─────────────────────────────────────────────────

    fn image_size_set<P, F, R>(&mut self, data: &[u8], ctx: &mut DfuContext<'_, P, F, R>) -> DfuState
    where
        P: AciPort,
        F: FlashPort,
        R: ResetPort,
    {
        // The central may have enabled notifications before the jump into
        // the bootloader; the pipe-status event announcing it is gone.
        ctx.session.mark_pipe_open(self.pipes.control_tx);
        ctx.session.ensure_credit(RESPONSE_CREDIT);

        let image_len = match data.first_chunk::<4>() {
            Some(bytes) => u32::from_le_bytes(*bytes),
            None => {
                warn!("DFU: image size packet too short ({} bytes)", data.len());
                self.respond(ControlMessage::response(procedure::START, ResultCode::DataSize));
                return DfuState::Idle;
            }
        };

        let capacity = ctx.flash.capacity();
        if image_len == 0 || image_len > capacity {
            warn!(
                "DFU: image of {} bytes does not fit ({} available)",
                image_len, capacity
            );
            self.respond(ControlMessage::response(procedure::START, ResultCode::DataSize));
            return DfuState::Idle;
        }

        self.image.begin(image_len);
        info!("DFU: image size {} bytes", image_len);
        self.respond(ControlMessage::response(procedure::START, ResultCode::Success));
        DfuState::Ready
    }

    // ── Transfer ──────────────────────────────────────────────

    fn data_packet<P, F, R>(&mut self, data: &[u8], ctx: &mut DfuContext<'_, P, F, R>) -> DfuState
    where
        P: AciPort,
        F: FlashPort,
        R: ResetPort,
    {
        if self.image.is_complete() {
            warn!("DFU: {} bytes after end of image", data.len());
            self.respond(ControlMessage::response(
                procedure::RECEIVE_APP,
                ResultCode::DataSize,
            ));
            return DfuState::Failed;
        }

        let take = data.len().min(self.image.remaining() as usize);
        if take < data.len() {
            warn!(
                "DFU: dropping {} bytes past end of image",
                data.len() - take
            );
        }

        let flash = &mut *ctx.flash;
        if let Err(e) = self
            .image
            .absorb(&data[..take], |addr, page| flash.program_page(addr, page))
        {
            return self.flash_failed(e);
        }

        if self.image.count_packet() {
            self.respond(ControlMessage::ReceiptNotification {
                received: self.image.bytes_received(),
            });
        }

        if self.image.is_complete() {
            if let Err(e) = self.image.finish(|addr, page| flash.program_page(addr, page)) {
                return self.flash_failed(e);
            }
            info!(
                "DFU: image received ({} bytes, {} pages)",
                self.image.bytes_received(),
                self.image.pages_written()
            );
            self.respond(ControlMessage::response(
                procedure::RECEIVE_APP,
                ResultCode::Success,
            ));
        }
        DfuState::ReceivingData
    }

    fn flash_failed(&mut self, e: impl core::fmt::Display) -> DfuState {
        error!(
            "DFU: page write at 0x{:06X} failed: {}",
            self.image.page_address(),
            e
        );
        self.respond(ControlMessage::response(
            procedure::RECEIVE_APP,
            ResultCode::OperationFailed,
        ));
        DfuState::Failed
    }

    fn validate<P, F, R>(&mut self, ctx: &mut DfuContext<'_, P, F, R>) -> DfuState
    where
        P: AciPort,
        F: FlashPort,
        R: ResetPort,
    {
        if !self.image.is_complete() {
            warn!(
                "DFU: validate with {} of {} bytes",
                self.image.bytes_received(),
                self.image.image_len()
            );
            self.respond(ControlMessage::response(procedure::VALIDATE, ResultCode::CrcError));
            return DfuState::Validated(Validity::Invalid);
        }

        match ctx.flash.commit() {
            Ok(()) => {
                self.respond(ControlMessage::response(procedure::VALIDATE, ResultCode::Success));
                DfuState::Validated(Validity::Valid)
            }
            Err(e) => {
                error!("DFU: image commit failed: {}", e);
                self.respond(ControlMessage::response(
                    procedure::VALIDATE,
                    ResultCode::OperationFailed,
                ));
                DfuState::Validated(Validity::Invalid)
            }
        }
    }

    fn notification_set(&mut self, payload: &[u8]) -> DfuState {
        match payload.get(1..3) {
            Some(&[lo, hi]) => {
                let interval = u16::from_le_bytes([lo, hi]);
                info!("DFU: receipt every {} packets", interval);
                self.image.set_notify_interval(interval);
            }
            _ => warn!("DFU: receipt request without interval"),
        }
        self.state
    }

    // ── Reset ─────────────────────────────────────────────────

    /// Drop the link, spin until the peer confirms, then restart.
    ///
    /// Blocks the caller.  The disconnect is retried until the transport
    /// accepts it; a peer that never confirms leaves the watchdog to end
    /// the wait.
    fn reset<P, F, R>(&mut self, ctx: &mut DfuContext<'_, P, F, R>) -> DfuState
    where
        P: AciPort,
        F: FlashPort,
        R: ResetPort,
    {
        self.transition(DfuState::AwaitingReset);

        let mut requested = false;
        loop {
            if !requested {
                requested = ctx.session.disconnect(ctx.link, REASON_TERMINATE);
            }
            if let Some(AciEvent::Disconnected { .. }) = ctx.session.next_event(ctx.link) {
                break;
            }
        }

        info!("DFU: link down, resetting");
        ctx.reset.system_reset();
        DfuState::Terminated
    }
}
