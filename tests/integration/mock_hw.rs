//! Mock hardware for integration tests.
//!
//! Wraps the simulated nRF8001 and records every flash write, reset and
//! emitted event so tests can assert on the full history without real
//! SPI, flash or restart hardware.

use std::cell::RefCell;

use bledfu::adapters::sim_radio::SimulatedRadio;
use bledfu::app::events::BootEvent;
use bledfu::app::ports::{ConfigError, ConfigPort, EventSink, FlashError, FlashPort, ResetPort};
use bledfu::app::service::BleBootloader;
use bledfu::config::{BootConfig, DfuPipes};
use bledfu::dfu::DfuState;

/// Page size used by every bench in this suite.
pub const PAGE: usize = 128;

pub const PIPES: DfuPipes = DfuPipes {
    packet_rx: 8,
    control_tx: 9,
    control_rx: 10,
};

// ── Radio ─────────────────────────────────────────────────────

/// A radio that behaves like a cooperative central: data is credited
/// back, connects open the DFU pipes and disconnects are confirmed.
pub fn cooperative_radio() -> SimulatedRadio {
    let mut radio = SimulatedRadio::new();
    radio.set_auto_credit(true);
    radio.set_auto_disconnect(true);
    radio.set_auto_connect(&[PIPES.packet_rx, PIPES.control_tx, PIPES.control_rx]);
    radio
}

// ── FakeFlash ─────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct FakeFlash {
    pub pages: Vec<(u32, Vec<u8>)>,
    pub capacity: u32,
    pub fail_at: Option<u32>,
    pub commits: usize,
}

#[allow(dead_code)]
impl FakeFlash {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            ..Default::default()
        }
    }

    /// Concatenated page contents in address order.
    pub fn image(&self) -> Vec<u8> {
        let mut pages = self.pages.clone();
        pages.sort_by_key(|(addr, _)| *addr);
        pages.into_iter().flat_map(|(_, p)| p).collect()
    }
}

impl FlashPort for FakeFlash {
    fn capacity(&self) -> u32 {
        self.capacity
    }

    fn program_page(&mut self, address: u32, page: &[u8]) -> Result<(), FlashError> {
        if self.fail_at == Some(address) {
            return Err(FlashError::WriteFailed);
        }
        if address + page.len() as u32 > self.capacity {
            return Err(FlashError::OutOfRange);
        }
        self.pages.push((address, page.to_vec()));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), FlashError> {
        self.commits += 1;
        Ok(())
    }
}

// ── FakeReset ─────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct FakeReset {
    pub count: usize,
}

impl ResetPort for FakeReset {
    fn system_reset(&mut self) {
        self.count += 1;
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<BootEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// DFU states entered, in order.
    pub fn dfu_path(&self) -> Vec<DfuState> {
        self.events
            .iter()
            .filter_map(|e| match e {
                BootEvent::DfuStateChanged { to, .. } => Some(*to),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, event: &BootEvent) -> usize {
        self.events.iter().filter(|e| *e == event).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &BootEvent) {
        self.events.push(*event);
    }
}

// ── MemConfig ─────────────────────────────────────────────────

/// In-memory [`ConfigPort`] with the same validate-before-save contract
/// as the NVS store.
#[derive(Debug, Default)]
pub struct MemConfig {
    stored: RefCell<Option<BootConfig>>,
    pub saves: RefCell<usize>,
}

impl ConfigPort for MemConfig {
    fn load(&self) -> Result<BootConfig, ConfigError> {
        Ok(self.stored.borrow().clone().unwrap_or_default())
    }

    fn save(&self, config: &BootConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.stored.borrow_mut() = Some(config.clone());
        *self.saves.borrow_mut() += 1;
        Ok(())
    }
}

// ── Bench ─────────────────────────────────────────────────────

pub type Bootloader = BleBootloader<SimulatedRadio, FakeFlash, FakeReset, PAGE>;

/// A bootloader on the simulated radio plus the sink it reports to.
pub struct Bench {
    pub boot: Bootloader,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Bench {
    pub fn new(config: BootConfig) -> Self {
        Self::with_parts(cooperative_radio(), FakeFlash::new(16 * 1024), config)
    }

    pub fn with_parts(radio: SimulatedRadio, flash: FakeFlash, config: BootConfig) -> Self {
        Self {
            boot: BleBootloader::new(radio, flash, FakeReset::default(), config),
            sink: RecordingSink::new(),
        }
    }

    pub fn radio(&self) -> &SimulatedRadio {
        self.boot.link().port()
    }

    pub fn radio_mut(&mut self) -> &mut SimulatedRadio {
        self.boot.link_mut().port_mut()
    }

    /// Poll until the radio, both queues and the response outbox are idle.
    /// Returns how many polls reported peer activity.
    pub fn settle(&mut self) -> usize {
        let mut active = 0;
        for _ in 0..512 {
            if self.boot.poll(&mut self.sink) {
                active += 1;
            }
            let link = self.boot.link();
            if link.port().pending_events() == 0
                && link.is_tx_empty()
                && link.is_rx_empty()
                && self.boot.dfu().pending_responses() == 0
            {
                break;
            }
        }
        active
    }

    /// Cold boot through to an open connection with the DFU pipes up.
    pub fn connect(&mut self) {
        self.boot
            .start(bledfu::app::service::EntryPath::ColdBoot, &mut self.sink);
        self.radio_mut().push_device_started(0x03, false, 2);
        self.settle();
    }

    pub fn packet(&mut self, data: &[u8]) -> DfuState {
        self.radio_mut().push_data(PIPES.packet_rx, data);
        self.settle();
        self.boot.dfu_state()
    }

    pub fn control(&mut self, bytes: &[u8]) -> DfuState {
        self.radio_mut().push_data(PIPES.control_rx, bytes);
        self.settle();
        self.boot.dfu_state()
    }

    /// Everything sent on the control-TX pipe so far.
    pub fn responses(&self) -> Vec<Vec<u8>> {
        self.radio().sent_on_pipe(PIPES.control_tx)
    }

    /// Send `image` in packets of `chunk` bytes after declaring its length.
    pub fn upload(&mut self, image: &[u8], chunk: usize) {
        assert_eq!(self.packet(&(image.len() as u32).to_le_bytes()), DfuState::Ready);
        assert_eq!(self.control(&[3]), DfuState::ReceivingData);
        for c in image.chunks(chunk) {
            self.packet(c);
        }
    }

    pub fn flash(&self) -> &FakeFlash {
        self.boot.flash()
    }

    pub fn resets(&self) -> usize {
        self.boot.reset_port().count
    }
}
