//! Simulated nRF8001 for host builds.
//!
//! Implements [`AciPort`] at the byte level: it asserts ready whenever it
//! has an event queued or the host is requesting, answers each transfer
//! from its event script, and records every frame the host clocks out.
//! Optional behaviours mimic the real controller closely enough to drive
//! a full DFU session:
//!
//! - `auto_credit`: every send-data is acknowledged with one data credit.
//! - `auto_disconnect`: a disconnect command is answered with a
//!   disconnected event.
//! - `auto_connect`: a connect command is answered with a connected event
//!   followed by a pipe-status event opening the given pipes.

use std::collections::VecDeque;

use log::debug;

use crate::aci::codec::{PIPES_ARRAY_SIZE, command, event};
use crate::app::ports::{AciPort, PortError};

#[derive(Debug, Default)]
pub struct SimulatedRadio {
    inbound: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    request: bool,
    busy: bool,
    bus_fault: bool,
    clocked: Vec<u8>,
    outgoing: Option<Vec<u8>>,
    request_edges: usize,
    resets: usize,
    delays: Vec<u32>,
    auto_credit: bool,
    auto_disconnect: bool,
    auto_connect: Option<Vec<u8>>,
}

impl SimulatedRadio {
    pub fn new() -> Self {
        Self::default()
    }

    /// A radio with `events` already waiting to be read.
    pub fn with_events(events: &[&[u8]]) -> Self {
        let mut radio = Self::new();
        for e in events {
            radio.push_event(e);
        }
        radio
    }

    // ── Scripting ─────────────────────────────────────────────

    /// Queue a raw event frame `[len, opcode, params..]`.
    pub fn push_event(&mut self, bytes: &[u8]) {
        self.inbound.push_back(bytes.to_vec());
    }

    pub fn push_device_started(&mut self, mode: u8, hw_error: bool, credit: u8) {
        self.push_event(&[4, event::DEVICE_STARTED, mode, u8::from(hw_error), credit]);
    }

    pub fn push_command_response(&mut self, command: u8, status: u8) {
        self.push_event(&[3, event::CMD_RSP, command, status]);
    }

    pub fn push_connected(&mut self) {
        self.push_event(&[
            15,
            event::CONNECTED,
            0x01,
            0xC0,
            0xFF,
            0xEE,
            0x01,
            0x02,
            0x03,
            0x18,
            0x00,
            0x00,
            0x00,
            0xF4,
            0x01,
            0x00,
        ]);
    }

    pub fn push_disconnected(&mut self) {
        self.push_event(&[3, event::DISCONNECTED, 0x03, 0x13]);
    }

    pub fn push_pipe_status(&mut self, open_pipes: &[u8]) {
        let mut frame = vec![0u8; 2 + 2 * PIPES_ARRAY_SIZE];
        frame[0] = (1 + 2 * PIPES_ARRAY_SIZE) as u8;
        frame[1] = event::PIPE_STATUS;
        for &p in open_pipes {
            frame[2 + (p / 8) as usize] |= 1 << (p % 8);
        }
        self.inbound.push_back(frame);
    }

    /// Data written by the central on `pipe`.
    pub fn push_data(&mut self, pipe: u8, data: &[u8]) {
        let mut frame = vec![(2 + data.len()) as u8, event::DATA_RECEIVED, pipe];
        frame.extend_from_slice(data);
        self.inbound.push_back(frame);
    }

    pub fn push_credit(&mut self, credit: u8) {
        self.push_event(&[2, event::DATA_CREDIT, credit]);
    }

    pub fn push_pipe_error(&mut self, pipe: u8, error_code: u8) {
        self.push_event(&[3, event::PIPE_ERROR, pipe, error_code]);
    }

    pub fn set_busy(&mut self, busy: bool) {
        self.busy = busy;
    }

    pub fn set_bus_fault(&mut self, fault: bool) {
        self.bus_fault = fault;
    }

    pub fn set_auto_credit(&mut self, on: bool) {
        self.auto_credit = on;
    }

    pub fn set_auto_disconnect(&mut self, on: bool) {
        self.auto_disconnect = on;
    }

    /// Answer connect commands by connecting and opening `pipes`.
    pub fn set_auto_connect(&mut self, pipes: &[u8]) {
        self.auto_connect = Some(pipes.to_vec());
    }

    // ── Inspection ────────────────────────────────────────────

    /// Every non-empty frame the host has clocked out, in order.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    pub fn take_sent(&mut self) -> Vec<Vec<u8>> {
        core::mem::take(&mut self.sent)
    }

    /// Commands with the given opcode.
    pub fn sent_commands(&self, opcode: u8) -> Vec<&[u8]> {
        self.sent
            .iter()
            .filter(|f| f.get(1) == Some(&opcode))
            .map(Vec::as_slice)
            .collect()
    }

    /// Payloads of send-data commands on `pipe`.
    pub fn sent_on_pipe(&self, pipe: u8) -> Vec<Vec<u8>> {
        self.sent
            .iter()
            .filter(|f| f.get(1) == Some(&command::SEND_DATA) && f.get(2) == Some(&pipe))
            .map(|f| f[3..].to_vec())
            .collect()
    }

    pub fn pending_events(&self) -> usize {
        self.inbound.len()
    }

    pub fn request_asserted(&self) -> bool {
        self.request
    }

    pub fn request_edges(&self) -> usize {
        self.request_edges
    }

    pub fn resets(&self) -> usize {
        self.resets
    }

    pub fn delays(&self) -> &[u32] {
        &self.delays
    }

    // ── Internal ──────────────────────────────────────────────

    fn finish_transfer(&mut self) {
        let bytes = core::mem::take(&mut self.clocked);
        self.outgoing = None;

        let len = bytes[0] as usize;
        if len == 0 || bytes.len() < len + 1 {
            return;
        }
        let frame = bytes[..=len].to_vec();
        debug!("sim radio: host sent {:02X?}", frame);

        match frame[1] {
            command::SEND_DATA if self.auto_credit => self.push_credit(1),
            command::DISCONNECT if self.auto_disconnect => self.push_disconnected(),
            command::CONNECT => {
                if let Some(pipes) = self.auto_connect.clone() {
                    self.push_connected();
                    self.push_pipe_status(&pipes);
                }
            }
            _ => {}
        }
        self.sent.push(frame);
    }
}

impl AciPort for SimulatedRadio {
    fn exchange(&mut self, byte: u8) -> Result<u8, PortError> {
        if self.bus_fault {
            return Err(PortError::Bus);
        }

        let idx = self.clocked.len();
        if idx == 0 {
            self.outgoing = self.inbound.pop_front();
        }
        self.clocked.push(byte);

        // Byte 0 answers with the status byte, byte k with event byte k-1.
        let reply = match idx {
            0 => 0x00,
            k => self
                .outgoing
                .as_ref()
                .and_then(|o| o.get(k - 1).copied())
                .unwrap_or(0),
        };
        Ok(reply)
    }

    fn is_ready(&mut self) -> bool {
        !self.busy && (self.request || !self.inbound.is_empty())
    }

    fn set_request(&mut self, asserted: bool) {
        if asserted && !self.request {
            self.request_edges += 1;
        }
        if !asserted && !self.clocked.is_empty() {
            self.finish_transfer();
        }
        self.request = asserted;
    }

    fn pulse_reset(&mut self) {
        self.resets += 1;
        self.inbound.clear();
        self.clocked.clear();
        self.outgoing = None;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.delays.push(ms);
    }
}
