//! Fuzz target: `AciEvent::decode` behind the SPI transport
//!
//! Replays arbitrary bytes as event frames from the simulated radio and
//! asserts that the link and the session never panic, never hand up a frame
//! longer than the link maximum, and keep the credit invariant.
//!
//! cargo fuzz run fuzz_event_decoder

#![no_main]

use bledfu::aci::{AciEvent, Frame, MAX_PAYLOAD, SessionState, TransportLink};
use bledfu::adapters::sim_radio::SimulatedRadio;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Direct decode of whatever the bytes claim to be.
    if let Some(frame) = Frame::from_bytes(data) {
        assert!(frame.len() <= MAX_PAYLOAD);
        let _ = AciEvent::decode(&frame);
    }

    // The same bytes split into frames and clocked through the link.
    let mut radio = SimulatedRadio::new();
    for chunk in data.chunks(MAX_PAYLOAD + 1) {
        radio.push_event(chunk);
    }
    let mut link = TransportLink::new(radio);
    let mut session = SessionState::new(2);

    for _ in 0..64 {
        let _ = session.next_event(&mut link);
        assert!(session.credit_available() <= session.credit_total());
        if link.port().pending_events() == 0 && link.is_rx_empty() {
            break;
        }
    }
});
