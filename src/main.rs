//! bledfu firmware entry point.
//!
//! Wires the board peripherals into the bootloader core and runs the
//! cooperative poll loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  HalPort           OtaFlash      Watchdog     LogEventSink     │
//! │  (AciPort)         (FlashPort)   (ResetPort)  (EventSink)      │
//! │  NvsConfigStore (ConfigPort)                                   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            BleBootloader (pure logic)                  │    │
//! │  │  TransportLink · SessionState · DfuEngine              │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

// ── Imports ───────────────────────────────────────────────────
use anyhow::{Context, Result};
use log::{info, warn};

use esp_idf_hal::delay::Ets;
use esp_idf_hal::gpio::{AnyIOPin, AnyOutputPin, PinDriver, Pull};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::spi::config::{BitOrder, Config as SpiConfig, DriverConfig, MODE_0};
use esp_idf_hal::spi::{SpiBusDriver, SpiDriver};
use esp_idf_hal::units::FromValueType;

use bledfu::adapters::hal_port::HalPort;
use bledfu::adapters::log_sink::LogEventSink;
use bledfu::adapters::nvs::NvsConfigStore;
use bledfu::adapters::ota_flash::{self, OtaFlash};
use bledfu::app::ports::ConfigPort;
use bledfu::app::service::{BleBootloader, EntryPath};
use bledfu::config::BootConfig;
use bledfu::drivers::watchdog::Watchdog;

/// Flash page the DFU engine buffers before each write.
const PAGE_SIZE: usize = 256;

/// nRF8001 SPI clock ceiling.
const SPI_BAUDRATE_MHZ: u32 = 2;

// ── Main ──────────────────────────────────────────────────────

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("bledfu v{}", env!("CARGO_PKG_VERSION"));

    ota_flash::mark_running_valid();
    let watchdog = Watchdog::new();

    // ── 2. Load config from NVS (or defaults) ─────────────────
    let config = match NvsConfigStore::new().and_then(|nvs| nvs.load()) {
        Ok(cfg) if cfg.validate().is_ok() => cfg,
        Ok(_) => {
            warn!("Stored config failed validation, using defaults");
            BootConfig::default()
        }
        Err(e) => {
            warn!("NVS config load failed ({}), using defaults", e);
            BootConfig::default()
        }
    };
    if !config.valid {
        warn!("Radio not provisioned by the application; using default pipes");
    }

    // ── 3. ACI port: SPI2 (LSB-first, mode 0) + handshake lines ─
    let peripherals = Peripherals::take().context("peripherals already taken")?;
    let pins = config.pins;

    // SAFETY: the GPIO numbers come from a validated config and no other
    // driver claims them.
    let (sck, mosi, miso, reqn, rdyn, reset) = unsafe {
        (
            AnyOutputPin::new(i32::from(pins.sck)),
            AnyOutputPin::new(i32::from(pins.mosi)),
            AnyIOPin::new(i32::from(pins.miso)),
            AnyOutputPin::new(i32::from(pins.reqn)),
            AnyIOPin::new(i32::from(pins.rdyn)),
            AnyOutputPin::new(i32::from(pins.reset)),
        )
    };

    let driver = SpiDriver::new(
        peripherals.spi2,
        sck,
        mosi,
        Some(miso),
        &DriverConfig::new(),
    )?;
    let bus = SpiBusDriver::new(
        driver,
        &SpiConfig::new()
            .baudrate(SPI_BAUDRATE_MHZ.MHz().into())
            .data_mode(MODE_0)
            .bit_order(BitOrder::LsbFirst),
    )?;

    let reqn = PinDriver::output(reqn)?;
    let mut rdyn = PinDriver::input(rdyn)?;
    rdyn.set_pull(Pull::Up)?;
    let reset = PinDriver::output(reset)?;

    let port = HalPort::new(bus, reqn, rdyn, reset, Ets)
        .map_err(|e| anyhow::anyhow!("ACI port init failed: {}", e))?;

    // ── 4. Flash target: the inactive OTA slot ────────────────
    let capacity = ota_slot_size().context("no OTA partition to update")?;
    info!("OTA slot: {} bytes", capacity);
    let flash = OtaFlash::new(capacity);

    // ── 5. Bootloader service ─────────────────────────────────
    let entry = entry_path();
    let mut sink = LogEventSink::new();
    let mut boot: BleBootloader<_, _, _, PAGE_SIZE> =
        BleBootloader::new(port, flash, watchdog, config);
    boot.start(entry, &mut sink);

    info!("Bootloader ready. Entering event loop.");

    // ── 6. Event loop ─────────────────────────────────────────
    loop {
        if boot.poll(&mut sink) {
            boot.reset_port().feed();
        }
    }
}

/// A software restart means the application handed over with the radio
/// still running; anything else is a cold start.
fn entry_path() -> EntryPath {
    // SAFETY: read-only query of the reset cause.
    let reason = unsafe { esp_idf_svc::sys::esp_reset_reason() };
    if reason == esp_idf_svc::sys::esp_reset_reason_t_ESP_RST_SW {
        EntryPath::FromApplication
    } else {
        EntryPath::ColdBoot
    }
}

fn ota_slot_size() -> Option<u32> {
    // SAFETY: the partition table is static for the lifetime of the program.
    unsafe {
        let part = esp_idf_svc::sys::esp_ota_get_next_update_partition(core::ptr::null());
        part.as_ref().map(|p| p.size)
    }
}
