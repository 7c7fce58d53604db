//! Bootloader service: entry paths, connection upkeep and a complete
//! connect → update → activate session.

use bledfu::aci::codec::{command, status};
use bledfu::adapters::nvs::NvsConfigStore;
use bledfu::app::events::BootEvent;
use bledfu::app::ports::{ConfigError, ConfigPort};
use bledfu::app::service::{BleBootloader, EntryPath, HW_ERROR_BACKOFF_MS};
use bledfu::config::{BootConfig, DfuPipes};
use bledfu::dfu::{DfuState, Validity};
use bledfu::drivers::watchdog::Watchdog;

use crate::mock_hw::{Bench, FakeFlash, MemConfig, PAGE, PIPES, RecordingSink, cooperative_radio};

// ── Entry paths ───────────────────────────────────────────────

#[test]
fn cold_boot_connects_once_radio_is_up() {
    let mut b = Bench::new(BootConfig::default());
    b.connect();

    assert_eq!(b.radio().resets(), 1);
    assert_eq!(
        b.radio().sent_commands(command::CONNECT),
        vec![&[5, command::CONNECT, 0, 180, 0, 0x50][..]]
    );
    assert!(b.boot.session().is_connected());
    assert_eq!(
        &b.sink.events[..3],
        &[
            BootEvent::Started(EntryPath::ColdBoot),
            BootEvent::Connecting {
                timeout: 180,
                adv_interval: 0x50
            },
            BootEvent::Connected,
        ]
    );
}

#[test]
fn handover_from_application_resets_radio_over_the_link() {
    let mut b = Bench::new(BootConfig::default());
    b.boot.start(EntryPath::FromApplication, &mut b.sink);
    b.settle();

    assert_eq!(b.radio().resets(), 0, "radio keeps running");
    assert_eq!(b.radio().sent_commands(command::RADIO_RESET).len(), 1);

    b.radio_mut()
        .push_command_response(command::RADIO_RESET, status::SUCCESS);
    b.settle();
    assert_eq!(b.radio().sent_commands(command::CONNECT).len(), 1);
    assert!(b.boot.session().is_pipe_available(PIPES.control_tx));
}

#[test]
fn failed_radio_reset_does_not_advertise() {
    let mut b = Bench::new(BootConfig::default());
    b.boot.start(EntryPath::FromApplication, &mut b.sink);
    b.radio_mut().push_command_response(command::RADIO_RESET, 0x83);
    b.settle();
    assert!(b.radio().sent_commands(command::CONNECT).is_empty());
}

#[test]
fn hardware_error_backs_off() {
    let mut b = Bench::new(BootConfig::default());
    b.boot.start(EntryPath::ColdBoot, &mut b.sink);
    b.radio_mut().push_device_started(0x03, true, 2);
    b.settle();

    assert!(b.radio().sent_commands(command::CONNECT).is_empty());
    assert!(b.radio().delays().contains(&HW_ERROR_BACKOFF_MS));
}

// ── Connection upkeep ─────────────────────────────────────────

#[test]
fn central_dropping_out_triggers_readvertise() {
    let mut b = Bench::new(BootConfig::default());
    b.connect();
    b.radio_mut().push_disconnected();
    b.settle();

    assert_eq!(b.radio().sent_commands(command::CONNECT).len(), 2);
    assert_eq!(b.sink.count(&BootEvent::Disconnected), 1);
    assert_eq!(b.sink.count(&BootEvent::Connected), 2);
}

#[test]
fn activity_reported_only_for_peer_traffic() {
    let mut b = Bench::new(BootConfig::default());
    b.connect();

    b.radio_mut().push_event(&[2, 0x87, 0x00]);
    assert_eq!(b.settle(), 0, "bond status is not peer activity");

    b.radio_mut().push_data(PIPES.packet_rx, &64u32.to_le_bytes());
    assert!(b.settle() >= 1);
    assert!(b.boot.is_dfu_mode());
}

#[test]
fn credit_stays_within_budget_under_over_grant() {
    let mut b = Bench::new(BootConfig::default());
    b.connect();
    b.radio_mut().push_credit(5);
    b.radio_mut().push_pipe_error(PIPES.control_tx, 0x92);
    b.settle();

    let s = b.boot.session();
    assert_eq!(s.credit_available(), s.credit_total());
}

// ── Full session ──────────────────────────────────────────────

#[test]
fn complete_update_then_activate_resets_once() {
    let mut b = Bench::new(BootConfig::default());
    b.connect();

    let image: Vec<u8> = (0..300u32).map(|i| i as u8).collect();
    b.upload(&image, 20);
    assert_eq!(b.control(&[4]), DfuState::Validated(Validity::Valid));
    assert_eq!(b.control(&[5]), DfuState::Terminated);

    assert_eq!(b.resets(), 1);
    assert_eq!(&b.flash().image()[..300], &image[..]);
    assert_eq!(b.flash().pages.len(), 3);

    assert_eq!(
        b.radio().sent_commands(command::DISCONNECT),
        vec![&[2, command::DISCONNECT, 0x01][..]]
    );
    // The confirming disconnect is consumed by the reset wait.
    assert_eq!(b.radio().sent_commands(command::CONNECT).len(), 1);

    assert_eq!(
        b.sink.dfu_path(),
        vec![
            DfuState::Ready,
            DfuState::ReceivingData,
            DfuState::Validated(Validity::Valid),
            DfuState::Terminated,
        ]
    );
    assert_eq!(b.sink.count(&BootEvent::ResetIssued), 1);

    // Nothing moves the engine once terminated.
    assert_eq!(b.control(&[6]), DfuState::Terminated);
    assert_eq!(b.resets(), 1);
}

#[test]
fn watchdog_serves_as_reset_port() {
    let mut boot: BleBootloader<_, _, _, PAGE> = BleBootloader::new(
        cooperative_radio(),
        FakeFlash::new(4096),
        Watchdog::new(),
        BootConfig::default(),
    );
    let mut sink = RecordingSink::new();
    boot.start(EntryPath::ColdBoot, &mut sink);
    boot.link_mut().port_mut().push_device_started(0x03, false, 2);
    boot.link_mut().port_mut().push_data(PIPES.control_rx, &[6]);

    for _ in 0..32 {
        if boot.poll(&mut sink) {
            boot.reset_port().feed();
        }
    }
    assert_eq!(boot.dfu_state(), DfuState::Terminated);
    assert!(boot.reset_port().reset_requested());
    assert!(boot.reset_port().feeds() >= 1);
}

// ── Configuration ─────────────────────────────────────────────

#[test]
fn provisioned_pipes_route_the_update() {
    let pipes = DfuPipes {
        packet_rx: 12,
        control_tx: 13,
        control_rx: 14,
    };
    let store = MemConfig::default();
    store
        .save(&BootConfig {
            valid: true,
            pipes,
            ..Default::default()
        })
        .unwrap();
    let cfg = store.load().unwrap();

    let mut radio = cooperative_radio();
    radio.set_auto_connect(&[12, 13, 14]);
    let mut b = Bench::with_parts(radio, FakeFlash::new(4096), cfg);
    b.connect();

    b.radio_mut().push_data(PIPES.packet_rx, &64u32.to_le_bytes());
    b.settle();
    assert_eq!(b.boot.dfu_state(), DfuState::Idle, "default pipe is foreign now");

    b.radio_mut().push_data(12, &64u32.to_le_bytes());
    b.settle();
    assert_eq!(b.boot.dfu_state(), DfuState::Ready);
    assert_eq!(b.radio().sent_on_pipe(13), vec![vec![16, 1, 1]]);
}

#[test]
fn invalid_config_never_persisted() {
    let store = MemConfig::default();
    let bad = BootConfig {
        pipes: DfuPipes {
            packet_rx: 8,
            control_tx: 8,
            control_rx: 10,
        },
        ..Default::default()
    };
    assert!(matches!(store.save(&bad), Err(ConfigError::ValidationFailed(_))));
    assert_eq!(*store.saves.borrow(), 0);
    assert_eq!(store.load().unwrap(), BootConfig::default());
}

#[test]
fn nvs_store_persists_across_loads() {
    let nvs = NvsConfigStore::new().unwrap();
    let cfg = BootConfig {
        valid: true,
        notify_interval: 5,
        conn_timeout: 30,
        ..Default::default()
    };
    nvs.save(&cfg).unwrap();
    assert_eq!(nvs.load().unwrap(), cfg);
}
