//! Fixed-capacity circular frame queue.
//!
//! ```text
//!   head                tail
//!    │                   │
//!  ┌─▼─┬───┬───┬───┐   ┌─▼─┐
//!  │ A │ B │ C │   │ … │ - │   one slot always stays free:
//!  └───┴───┴───┴───┘   └───┘   N slots hold at most N-1 frames
//! ```
//!
//! `is_empty ⇔ head == tail`, `is_full ⇔ (tail + 1) % N == head`.
//! Enqueue copies only the declared `len + 1` bytes of a frame into the
//! slot, so stale bytes past the declared length are never acted on.

use super::frame::{Frame, MAX_PAYLOAD};

/// Default slot count for the transport queues.
pub const QUEUE_SLOTS: usize = 4;

pub struct FixedCapacityQueue<const N: usize = QUEUE_SLOTS> {
    slots: [Frame; N],
    head: usize,
    tail: usize,
}

impl<const N: usize> FixedCapacityQueue<N> {
    pub const fn new() -> Self {
        const { assert!(N >= 2, "queue needs at least two slots") };
        Self {
            slots: [Frame::EMPTY; N],
            head: 0,
            tail: 0,
        }
    }

    /// Reset to empty.  Slot contents are left in place.
    pub fn init(&mut self) {
        self.head = 0;
        self.tail = 0;
    }

    /// Copy `frame` into the tail slot.  Returns `false` (no mutation) if full.
    #[must_use]
    pub fn enqueue(&mut self, frame: &Frame) -> bool {
        if self.is_full() {
            return false;
        }
        let len = frame.len().min(MAX_PAYLOAD);
        let slot = &mut self.slots[self.tail];
        slot.status = 0;
        slot.buffer[..=len].copy_from_slice(&frame.buffer[..=len]);
        self.tail = (self.tail + 1) % N;
        true
    }

    /// Copy the head frame out.  Returns `None` if empty.
    #[must_use]
    pub fn dequeue(&mut self) -> Option<Frame> {
        if self.is_empty() {
            return None;
        }
        let frame = self.slots[self.head];
        self.head = (self.head + 1) % N;
        Some(frame)
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.tail
    }

    pub fn is_full(&self) -> bool {
        (self.tail + 1) % N == self.head
    }

    /// Number of frames currently queued.
    pub fn len(&self) -> usize {
        (self.tail + N - self.head) % N
    }

    /// Usable capacity (`N - 1`).
    pub const fn capacity(&self) -> usize {
        N - 1
    }
}

impl<const N: usize> Default for FixedCapacityQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}
