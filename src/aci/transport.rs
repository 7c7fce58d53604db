//! Half-duplex, ready-gated SPI transport.
//!
//! ```text
//!   send() ──▶ tx queue ──┐                 ┌──▶ rx queue ──▶ try_receive()
//!                         ▼                 │
//!                ┌──────────────────────────┴──┐
//!                │  poll(): one SPI transfer   │◀── RDYN (peer ready)
//!                │  REQN ▔▔╲____________╱▔▔▔   │──▶ REQN (host request)
//!                └─────────────────────────────┘
//! ```
//!
//! The host may only clock a transfer while the peer asserts ready.
//! Otherwise it raises its request line to announce outbound work and
//! waits.  A transfer always happens once ready is seen, even with an
//! empty tx queue: a zero-length frame is clocked out so the peer can
//! drain its pending event.

use log::{debug, warn};

use super::frame::{Frame, MAX_PAYLOAD};
use super::queue::{FixedCapacityQueue, QUEUE_SLOTS};
use crate::app::ports::{AciPort, PortError};

/// Time the nRF8001 needs after a reset pulse before it talks again.
pub const PEER_BOOT_DELAY_MS: u32 = 30;

/// Owns both queues and the physical port for the process lifetime.
pub struct TransportLink<P: AciPort> {
    port: P,
    tx: FixedCapacityQueue<QUEUE_SLOTS>,
    rx: FixedCapacityQueue<QUEUE_SLOTS>,
}

impl<P: AciPort> TransportLink<P> {
    pub fn new(port: P) -> Self {
        Self {
            port,
            tx: FixedCapacityQueue::new(),
            rx: FixedCapacityQueue::new(),
        }
    }

    /// Hardware-reset the peer and drop anything queued in either direction.
    pub fn pin_reset(&mut self) {
        self.port.pulse_reset();
        self.port.set_request(false);
        self.port.delay_ms(PEER_BOOT_DELAY_MS);
        self.flush();
    }

    /// Empty both queues.
    pub fn flush(&mut self) {
        self.tx.init();
        self.rx.init();
    }

    /// Queue `frame` for transmission.
    ///
    /// Rejects frames declaring more than [`MAX_PAYLOAD`] bytes before they
    /// reach the queue.  Returns `false` if rejected or the tx queue is full.
    #[must_use]
    pub fn send(&mut self, frame: &Frame) -> bool {
        if frame.len() > MAX_PAYLOAD {
            warn!(
                "ACI: refusing frame of {} bytes (max {})",
                frame.len(),
                MAX_PAYLOAD
            );
            return false;
        }

        let queued = self.tx.enqueue(frame);
        if queued && !self.rx.is_full() {
            self.port.set_request(true);
        }
        queued
    }

    /// Fetch the next received frame, servicing the link first if there is
    /// room for what the peer might send.
    pub fn try_receive(&mut self) -> Option<Frame> {
        if !self.rx.is_full() {
            self.poll();
        }

        let frame = self.rx.dequeue();

        if !self.rx.is_full() && !self.tx.is_empty() {
            self.port.set_request(true);
        }
        frame
    }

    /// Run at most one physical transfer.  Returns `true` if one happened.
    pub fn poll(&mut self) -> bool {
        if self.rx.is_full() {
            return false;
        }

        if !self.port.is_ready() {
            if !self.tx.is_empty() {
                self.port.set_request(true);
            }
            return false;
        }

        let tx = self.tx.dequeue().unwrap_or(Frame::EMPTY);
        let mut rx = Frame::EMPTY;

        if let Err(e) = self.transfer(&tx, &mut rx) {
            warn!("ACI: transfer aborted ({}), dropped {:?}", e, tx.opcode());
            return false;
        }

        if !self.rx.is_full() && !self.tx.is_empty() {
            self.port.set_request(true);
        }

        // A zero-length reply is "nothing new", not an empty message.
        if !rx.is_empty() && !self.rx.enqueue(&rx) {
            warn!("ACI: rx queue full, dropped event {:?}", rx.opcode());
        }
        true
    }

    pub fn is_tx_empty(&self) -> bool {
        self.tx.is_empty()
    }

    pub fn is_rx_empty(&self) -> bool {
        self.rx.is_empty()
    }

    pub fn is_rx_full(&self) -> bool {
        self.rx.is_full()
    }

    /// Whether the peer currently signals ready.
    pub fn is_ready(&mut self) -> bool {
        self.port.is_ready()
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    // ── Internal ──────────────────────────────────────────────

    fn transfer(&mut self, tx: &Frame, rx: &mut Frame) -> Result<(), PortError> {
        self.port.set_request(true);
        let result = self.clock_frame(tx, rx);
        self.port.set_request(false);
        result
    }

    /// Byte 0 out / status in, byte 1 out / peer length in, then enough
    /// bytes to cover whichever side has more left to say.
    fn clock_frame(&mut self, tx: &Frame, rx: &mut Frame) -> Result<(), PortError> {
        rx.status = self.port.exchange(tx.buffer[0])?;
        let announced = self.port.exchange(tx.buffer[1])?;

        let rx_len = announced as usize;
        let tx_len = tx.len();
        let remaining = if tx_len == 0 {
            rx_len
        } else {
            rx_len.max(tx_len - 1)
        };
        let remaining = remaining.min(MAX_PAYLOAD);

        if rx_len > MAX_PAYLOAD {
            warn!("ACI: peer announced {} bytes, truncating", rx_len);
        }
        rx.buffer[0] = rx_len.min(MAX_PAYLOAD) as u8;

        for i in 0..remaining {
            let out = tx.buffer.get(i + 2).copied().unwrap_or(0);
            rx.buffer[i + 1] = self.port.exchange(out)?;
        }

        debug!(
            "ACI: transfer tx={} rx={} clocked={}",
            tx_len,
            rx_len,
            remaining + 2
        );
        Ok(())
    }
}
