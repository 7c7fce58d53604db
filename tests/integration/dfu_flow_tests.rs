//! End-to-end DFU transfers over the simulated radio.
//!
//! Every byte here travels the full path: scripted event frame, SPI
//! exchange, rx queue, event decode, session bookkeeping, DFU engine,
//! flash port, and the response back out on the control-TX pipe.

use bledfu::config::BootConfig;
use bledfu::dfu::{DfuState, Validity};

use crate::mock_hw::{Bench, PAGE, PIPES};

/// Bytes per write from a typical central.
const CHUNK: usize = 20;

fn bench() -> Bench {
    let mut b = Bench::new(BootConfig::default());
    b.connect();
    b
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

// ── Scenario A: full image ────────────────────────────────────

#[test]
fn full_image_programs_two_pages_and_validates() {
    let mut b = bench();
    let image = pattern(2 * PAGE);

    assert_eq!(b.packet(&256u32.to_le_bytes()), DfuState::Ready);
    assert_eq!(b.responses(), vec![vec![16, 1, 1]]);

    assert_eq!(b.control(&[3]), DfuState::ReceivingData);
    for c in image.chunks(CHUNK) {
        b.packet(c);
    }

    assert_eq!(b.flash().pages.len(), 2);
    assert_eq!(b.flash().pages[0].0, 0);
    assert_eq!(b.flash().pages[1].0, PAGE as u32);
    assert_eq!(b.flash().image(), image);
    assert_eq!(b.responses().last(), Some(&vec![16, 3, 1]));

    assert_eq!(b.control(&[4]), DfuState::Validated(Validity::Valid));
    assert_eq!(b.responses().last(), Some(&vec![16, 4, 1]));
    assert_eq!(b.flash().commits, 1);
}

// ── Scenario B: short image ───────────────────────────────────

#[test]
fn short_image_reports_crc_error() {
    let mut b = bench();
    assert_eq!(b.packet(&256u32.to_le_bytes()), DfuState::Ready);
    b.control(&[3]);
    for c in pattern(200).chunks(CHUNK) {
        b.packet(c);
    }

    assert_eq!(b.control(&[4]), DfuState::Validated(Validity::Invalid));
    assert_eq!(b.responses().last(), Some(&vec![16, 4, 5]));
    assert_eq!(b.flash().pages.len(), 1, "partial page stays buffered");
    assert_eq!(b.flash().commits, 0);
}

// ── Scenario C: receipt notifications ─────────────────────────

#[test]
fn receipt_every_ten_packets_carries_byte_count() {
    let mut b = bench();
    assert_eq!(b.packet(&4096u32.to_le_bytes()), DfuState::Ready);
    b.control(&[3]);
    b.control(&[8, 10, 0]);

    for _ in 0..10 {
        b.packet(&[0xA5; CHUNK]);
    }
    let receipts: Vec<_> = b.responses().into_iter().filter(|r| r[0] == 17).collect();
    assert_eq!(receipts, vec![vec![17, 200, 0, 0, 0]]);

    for _ in 0..10 {
        b.packet(&[0xA5; CHUNK]);
    }
    let receipts: Vec<_> = b.responses().into_iter().filter(|r| r[0] == 17).collect();
    assert_eq!(receipts.last(), Some(&vec![17, 144, 1, 0, 0]));
}

#[test]
fn configured_notify_interval_applies_from_start() {
    let cfg = BootConfig {
        notify_interval: 2,
        ..Default::default()
    };
    let mut b = Bench::new(cfg);
    b.connect();
    b.upload(&pattern(80), CHUNK);

    let receipts: Vec<_> = b.responses().into_iter().filter(|r| r[0] == 17).collect();
    assert_eq!(receipts, vec![vec![17, 40, 0, 0, 0], vec![17, 80, 0, 0, 0]]);
}

// ── Scenario D: pipe availability ─────────────────────────────

#[test]
fn pipe_availability_follows_status_and_disconnect() {
    let mut b = Bench::new(BootConfig::default());
    assert!(!b.boot.session().is_pipe_available(PIPES.control_tx));

    b.connect();
    assert!(b.boot.session().is_pipe_available(PIPES.control_tx));
    assert!(!b.boot.session().is_pipe_available(3));

    b.radio_mut().set_auto_connect(&[]);
    b.radio_mut().push_disconnected();
    b.settle();
    assert!(!b.boot.session().is_pipe_available(PIPES.control_tx));
}

// ── Failure paths ─────────────────────────────────────────────

#[test]
fn final_page_padded_with_erased_bytes() {
    let mut b = bench();
    let image = pattern(PAGE + 5);
    b.upload(&image, CHUNK);

    let flash = b.flash();
    assert_eq!(flash.pages.len(), 2);
    let (_, last) = &flash.pages[1];
    assert_eq!(&last[..5], &image[PAGE..]);
    assert!(last[5..].iter().all(|&x| x == 0xFF));
}

#[test]
fn overrun_fails_and_blocks_validate() {
    let mut b = bench();
    b.upload(&pattern(40), CHUNK);
    assert_eq!(b.packet(&[1, 2, 3]), DfuState::Failed);
    assert_eq!(b.responses().last(), Some(&vec![16, 3, 4]));

    assert_eq!(b.control(&[4]), DfuState::Failed);
    assert_eq!(b.responses().last(), Some(&vec![16, 4, 2]));
}

#[test]
fn image_larger_than_flash_rejected() {
    let mut b = bench();
    assert_eq!(b.packet(&(1u32 << 20).to_le_bytes()), DfuState::Idle);
    assert_eq!(b.responses(), vec![vec![16, 1, 4]]);
}

#[test]
fn image_size_query_mid_transfer() {
    let mut b = bench();
    assert_eq!(b.packet(&1000u32.to_le_bytes()), DfuState::Ready);
    b.control(&[3]);
    b.packet(&[0; CHUNK]);
    b.packet(&[0; CHUNK]);
    b.control(&[7]);
    assert_eq!(b.responses().last(), Some(&vec![16, 7, 1, 40, 0, 0, 0]));
}

#[test]
fn unknown_opcode_not_supported() {
    let mut b = bench();
    assert_eq!(b.control(&[0x33]), DfuState::Idle);
    assert_eq!(b.responses(), vec![vec![16, 0x33, 3]]);
}
