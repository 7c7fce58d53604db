//! Bootloader service: the hexagonal core.
//!
//! [`BleBootloader`] owns the ACI link, the session bookkeeping and the
//! DFU engine, plus the flash and reset ports the engine writes through.
//! Each [`poll`](BleBootloader::poll) is one step of the cooperative loop:
//! retry pending responses, pull one event, act on it.
//!
//! ```text
//!  AciPort ◀──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!               │         BleBootloader        │
//!  FlashPort ◀──│  link · session · DfuEngine  │
//!  ResetPort ◀──└──────────────────────────────┘
//! ```

use log::{debug, info, warn};

use crate::aci::codec::{command, status};
use crate::aci::{AciEvent, DeviceMode, SessionState, TransportLink};
use crate::config::BootConfig;
use crate::dfu::{DfuContext, DfuEngine, DfuState};

use super::events::BootEvent;
use super::ports::{AciPort, EventSink, FlashPort, ResetPort};

/// Back-off after the radio reports a hardware error on start-up.
pub const HW_ERROR_BACKOFF_MS: u32 = 20;

/// How control reached the bootloader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPath {
    /// Power-on or no valid application: the radio is reset by pin.
    ColdBoot,
    /// The application jumped here with the radio still running.
    FromApplication,
}

// ───────────────────────────────────────────────────────────────
// BleBootloader
// ───────────────────────────────────────────────────────────────

pub struct BleBootloader<P, F, R, const PAGE: usize>
where
    P: AciPort,
    F: FlashPort,
    R: ResetPort,
{
    link: TransportLink<P>,
    session: SessionState,
    dfu: DfuEngine<PAGE>,
    flash: F,
    reset: R,
    config: BootConfig,
    dfu_mode: bool,
}

impl<P, F, R, const PAGE: usize> BleBootloader<P, F, R, PAGE>
where
    P: AciPort,
    F: FlashPort,
    R: ResetPort,
{
    /// Construct the service.  Nothing touches the radio until
    /// [`start`](Self::start).
    pub fn new(port: P, flash: F, reset: R, config: BootConfig) -> Self {
        Self {
            link: TransportLink::new(port),
            session: SessionState::new(config.credit_total),
            dfu: DfuEngine::new(config.pipes, config.notify_interval),
            flash,
            reset,
            config,
            dfu_mode: false,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Bring the radio up.  The connect follows from the event the radio
    /// answers with.
    pub fn start(&mut self, entry: EntryPath, sink: &mut impl EventSink) {
        match entry {
            EntryPath::ColdBoot => self.link.pin_reset(),
            EntryPath::FromApplication => {
                if !self.session.radio_reset(&mut self.link) {
                    warn!("ACI: radio reset not queued");
                }
            }
        }
        info!("Bootloader started ({:?})", entry);
        sink.emit(&BootEvent::Started(entry));
    }

    /// Run one step of the event loop.
    ///
    /// Returns `true` when the peer showed signs of life (connected, credit,
    /// pipe error, DFU data); the caller feeds the watchdog on that.
    pub fn poll(&mut self, sink: &mut impl EventSink) -> bool {
        self.dfu.flush_responses(&mut self.link, &mut self.session);

        match self.session.next_event(&mut self.link) {
            Some(event) => self.dispatch(event, sink),
            None => false,
        }
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn dfu_state(&self) -> DfuState {
        self.dfu.state()
    }

    pub fn dfu(&self) -> &DfuEngine<PAGE> {
        &self.dfu
    }

    /// A DFU write has been seen since start.
    pub fn is_dfu_mode(&self) -> bool {
        self.dfu_mode
    }

    pub fn session(&self) -> &SessionState {
        &self.session
    }

    pub fn link(&self) -> &TransportLink<P> {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut TransportLink<P> {
        &mut self.link
    }

    pub fn flash(&self) -> &F {
        &self.flash
    }

    pub fn reset_port(&self) -> &R {
        &self.reset
    }

    pub fn config(&self) -> &BootConfig {
        &self.config
    }

    // ── Internal ──────────────────────────────────────────────

    fn dispatch(&mut self, event: AciEvent, sink: &mut impl EventSink) -> bool {
        match event {
            AciEvent::DeviceStarted { mode, hw_error, .. } => {
                match (mode, hw_error) {
                    (DeviceMode::Standby, false) => self.advertise(sink),
                    (DeviceMode::Standby, true) => {
                        warn!("ACI: radio reports hardware error, backing off");
                        self.link.port_mut().delay_ms(HW_ERROR_BACKOFF_MS);
                    }
                    (mode, _) => debug!("ACI: radio started in {:?}", mode),
                }
                false
            }
            AciEvent::CommandResponse {
                command: cmd,
                status: st,
            } => {
                if st != status::SUCCESS {
                    warn!("ACI: command 0x{:02X} failed (0x{:02X})", cmd, st);
                } else if cmd == command::RADIO_RESET {
                    self.advertise(sink);
                }
                false
            }
            AciEvent::Connected { .. } => {
                info!("ACI: central connected");
                sink.emit(&BootEvent::Connected);
                true
            }
            AciEvent::Disconnected {
                aci_status,
                btle_status,
            } => {
                info!(
                    "ACI: disconnected (aci 0x{:02X}, btle 0x{:02X})",
                    aci_status, btle_status
                );
                sink.emit(&BootEvent::Disconnected);
                if !self.dfu.state().is_terminal() {
                    self.advertise(sink);
                }
                false
            }
            AciEvent::DataCredit { .. } | AciEvent::PipeError { .. } => true,
            AciEvent::DataReceived { pipe, data } => {
                if !self.dfu.is_dfu_pipe(pipe) {
                    debug!("ACI: {} bytes on foreign pipe {}", data.len(), pipe);
                    return false;
                }
                if !self.dfu_mode {
                    info!("Entering DFU mode");
                    self.dfu_mode = true;
                }
                self.feed_dfu(pipe, &data, sink);
                true
            }
            _ => false,
        }
    }

    fn feed_dfu(&mut self, pipe: u8, data: &[u8], sink: &mut impl EventSink) {
        let from = self.dfu.state();
        let mut ctx = DfuContext::new(
            &mut self.link,
            &mut self.session,
            &mut self.flash,
            &mut self.reset,
        );
        let to = self.dfu.update(pipe, data, &mut ctx);

        if to != from {
            sink.emit(&BootEvent::DfuStateChanged { from, to });
        }
        if to == DfuState::Terminated {
            sink.emit(&BootEvent::ResetIssued);
        }
    }

    fn advertise(&mut self, sink: &mut impl EventSink) {
        let timeout = self.config.conn_timeout;
        let adv_interval = self.config.adv_interval;
        if self.session.connect(&mut self.link, timeout, adv_interval) {
            sink.emit(&BootEvent::Connecting {
                timeout,
                adv_interval,
            });
        } else {
            warn!("ACI: connect not queued");
        }
    }
}
