//! ACI link over the simulated radio: what reaches the wire, and how the
//! session reacts to what comes back.

use bledfu::aci::codec::{AciCommand, AciEvent, MAX_PIPE_DATA, command, event};
use bledfu::aci::{Frame, SessionState, TransportLink};
use bledfu::adapters::sim_radio::SimulatedRadio;

use crate::mock_hw::PIPES;

fn drain(link: &mut TransportLink<SimulatedRadio>, session: &mut SessionState) -> Vec<AciEvent> {
    let mut events = Vec::new();
    for _ in 0..32 {
        if let Some(e) = session.next_event(link) {
            events.push(e);
        }
        if link.is_tx_empty() && link.is_rx_empty() && link.port().pending_events() == 0 {
            break;
        }
    }
    events
}

#[test]
fn connect_frame_on_the_wire_decodes_back() {
    let mut link = TransportLink::new(SimulatedRadio::new());
    let mut session = SessionState::new(2);
    assert!(session.connect(&mut link, 0x1234, 0x0800));
    drain(&mut link, &mut session);

    let sent = link.port().sent_commands(command::CONNECT);
    assert_eq!(sent, vec![&[5, command::CONNECT, 0x12, 0x34, 0x08, 0x00][..]]);

    let frame = Frame::from_bytes(sent[0]).unwrap();
    assert_eq!(
        AciCommand::decode(&frame),
        Ok(AciCommand::Connect {
            timeout: 0x1234,
            adv_interval: 0x0800
        })
    );
}

#[test]
fn send_needs_open_pipe_and_credit() {
    let mut radio = SimulatedRadio::new();
    radio.set_auto_credit(true);
    let mut link = TransportLink::new(radio);
    let mut session = SessionState::new(1);

    assert!(!session.send_data(&mut link, PIPES.control_tx, &[16, 1, 1]));

    link.port_mut().push_pipe_status(&[PIPES.control_tx]);
    drain(&mut link, &mut session);
    assert!(session.send_data(&mut link, PIPES.control_tx, &[16, 1, 1]));
    assert_eq!(session.credit_available(), 0);
    assert!(!session.send_data(&mut link, PIPES.control_tx, &[16, 1, 1]));

    let events = drain(&mut link, &mut session);
    assert!(events.contains(&AciEvent::DataCredit { credit: 1 }));
    assert_eq!(session.credit_available(), 1);
    assert_eq!(link.port().sent_on_pipe(PIPES.control_tx), vec![vec![16, 1, 1]]);
}

#[test]
fn oversized_payload_never_queued() {
    let mut link = TransportLink::new(SimulatedRadio::new());
    let mut session = SessionState::new(2);
    session.mark_pipe_open(PIPES.control_tx);

    let big = [0u8; MAX_PIPE_DATA + 1];
    assert!(!session.send_data(&mut link, PIPES.control_tx, &big));
    assert!(link.is_tx_empty());
    assert_eq!(session.credit_available(), 2);

    let max = [0u8; MAX_PIPE_DATA];
    assert!(session.send_data(&mut link, PIPES.control_tx, &max));
    drain(&mut link, &mut session);
    assert_eq!(link.port().sent()[0].len(), 32);
}

#[test]
fn tx_queue_holds_three_frames() {
    let mut radio = SimulatedRadio::new();
    radio.set_busy(true);
    let mut link = TransportLink::new(radio);
    let mut session = SessionState::new(2);

    assert!(session.radio_reset(&mut link));
    assert!(session.radio_reset(&mut link));
    assert!(session.radio_reset(&mut link));
    assert!(!session.radio_reset(&mut link), "fourth slot is the sentinel");

    link.port_mut().set_busy(false);
    drain(&mut link, &mut session);
    assert_eq!(link.port().sent_commands(command::RADIO_RESET).len(), 3);
}

#[test]
fn disconnect_clears_pipes_before_confirmation() {
    let mut radio = SimulatedRadio::new();
    radio.push_pipe_status(&[PIPES.packet_rx, PIPES.control_tx]);
    let mut link = TransportLink::new(radio);
    let mut session = SessionState::new(2);
    drain(&mut link, &mut session);
    assert!(session.is_pipe_available(PIPES.packet_rx));

    assert!(session.disconnect(&mut link, 0x01));
    assert!(!session.is_pipe_available(PIPES.packet_rx));
    drain(&mut link, &mut session);
    assert_eq!(
        link.port().sent_commands(command::DISCONNECT),
        vec![&[2, command::DISCONNECT, 0x01][..]]
    );
}

#[test]
fn truncated_event_dropped_and_link_continues() {
    let mut radio = SimulatedRadio::new();
    radio.push_event(&[2, event::CONNECTED, 0x01]);
    radio.push_credit(1);
    let mut link = TransportLink::new(radio);
    let mut session = SessionState::new(2);

    let events = drain(&mut link, &mut session);
    assert_eq!(events, vec![AciEvent::DataCredit { credit: 1 }]);
    assert!(!session.is_connected());
}

#[test]
fn pin_reset_discards_queued_work() {
    let mut radio = SimulatedRadio::new();
    radio.set_busy(true);
    let mut link = TransportLink::new(radio);
    let mut session = SessionState::new(2);
    assert!(session.radio_reset(&mut link));

    link.pin_reset();
    assert!(link.is_tx_empty());
    assert!(!link.port().request_asserted());
    assert_eq!(link.port().resets(), 1);
    assert_eq!(link.port().delays(), &[30]);
}
