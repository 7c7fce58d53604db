//! ACI link frame.
//!
//! ```text
//!  status   buffer[0]  buffer[1]  buffer[2 ..= len]
//! ┌──────┬──────────┬──────────┬──────────────────┐
//! │ u8   │   len    │  opcode  │      params      │
//! └──────┴──────────┴──────────┴──────────────────┘
//! ```
//!
//! `len` counts the opcode plus params and is the only authority on how
//! many buffer bytes are meaningful.  A frame with `len == 0` carries no
//! data.  The status byte is only filled on received frames.

use core::fmt;

/// Largest `len` value a frame may declare.
pub const MAX_PAYLOAD: usize = 31;

/// Size of the length-prefixed buffer (length byte + payload).
pub const FRAME_BUFFER_LEN: usize = MAX_PAYLOAD + 1;

/// One message unit exchanged over the SPI transport.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    /// Status byte clocked in during the first exchange of a transfer.
    pub status: u8,
    /// Length-prefixed message buffer.
    pub buffer: [u8; FRAME_BUFFER_LEN],
}

impl Frame {
    /// The "no data" placeholder.
    pub const EMPTY: Self = Self {
        status: 0,
        buffer: [0; FRAME_BUFFER_LEN],
    };

    pub const fn new() -> Self {
        Self::EMPTY
    }

    /// Build a frame from `opcode` and its parameters.
    /// Returns `None` if the result would not fit in one frame.
    pub fn with_opcode(opcode: u8, params: &[u8]) -> Option<Self> {
        let len = params.len() + 1;
        if len > MAX_PAYLOAD {
            return None;
        }
        let mut frame = Self::EMPTY;
        frame.buffer[0] = len as u8;
        frame.buffer[1] = opcode;
        frame.buffer[2..=len].copy_from_slice(params);
        Some(frame)
    }

    /// Build a frame from raw wire bytes `[len, opcode, params..]`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&len, rest) = bytes.split_first()?;
        let len = len as usize;
        if len > MAX_PAYLOAD || rest.len() < len {
            return None;
        }
        let mut frame = Self::EMPTY;
        frame.buffer[..=len].copy_from_slice(&bytes[..=len]);
        Some(frame)
    }

    /// Declared length, exactly as it sits in `buffer[0]`.
    pub fn len(&self) -> usize {
        self.buffer[0] as usize
    }

    pub fn is_empty(&self) -> bool {
        self.buffer[0] == 0
    }

    /// Declared length clamped to what the buffer can physically hold.
    fn valid_len(&self) -> usize {
        self.len().min(MAX_PAYLOAD)
    }

    /// Command or event opcode, if the frame carries one.
    pub fn opcode(&self) -> Option<u8> {
        (!self.is_empty()).then_some(self.buffer[1])
    }

    /// Parameter bytes following the opcode.
    pub fn params(&self) -> &[u8] {
        match self.valid_len() {
            0 => &[],
            len => &self.buffer[2..=len],
        }
    }

    /// Wire bytes `[len, opcode, params..]`.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer[..=self.valid_len()]
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl fmt::Debug for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("status", &self.status)
            .field("len", &self.len())
            .field("opcode", &self.opcode())
            .field("params", &self.params())
            .finish()
    }
}
