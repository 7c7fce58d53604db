//! DFU control-point wire format.
//!
//! Requests arrive as writes on the control pipe, `[opcode, args..]`.
//! Everything the bootloader says back goes out as a notification on the
//! control-tx pipe: either a response `[16, procedure, result, extra..]`
//! or a packet receipt `[17, bytes_received (u32 LE)]`.

use core::fmt;

use heapless::Vec;

// ---------------------------------------------------------------------------
// Opcodes
// ---------------------------------------------------------------------------

pub const OP_START: u8 = 1;
pub const OP_RECEIVE_INIT: u8 = 2;
pub const OP_RECEIVE_FW: u8 = 3;
pub const OP_VALIDATE: u8 = 4;
pub const OP_ACTIVATE_N_RESET: u8 = 5;
pub const OP_SYS_RESET: u8 = 6;
pub const OP_IMAGE_SIZE_REQ: u8 = 7;
pub const OP_PKT_RCPT_NOTIF_REQ: u8 = 8;
pub const OP_RESPONSE: u8 = 16;
pub const OP_PKT_RCPT_NOTIF: u8 = 17;

/// Procedure ids echoed in byte 1 of a response.
pub mod procedure {
    pub const START: u8 = 1;
    pub const INIT: u8 = 2;
    pub const RECEIVE_APP: u8 = 3;
    pub const VALIDATE: u8 = 4;
    pub const IMAGE_SIZE: u8 = 7;
    pub const PKT_RCPT_REQ: u8 = 8;
}

/// Longest message the bootloader ever sends.
pub const MAX_MESSAGE_LEN: usize = 7;

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A recognised control-point request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ControlOp {
    Start = OP_START,
    ReceiveInit = OP_RECEIVE_INIT,
    ReceiveFirmware = OP_RECEIVE_FW,
    Validate = OP_VALIDATE,
    ActivateAndReset = OP_ACTIVATE_N_RESET,
    SystemReset = OP_SYS_RESET,
    ImageSizeRequest = OP_IMAGE_SIZE_REQ,
    PacketReceiptRequest = OP_PKT_RCPT_NOTIF_REQ,
}

impl ControlOp {
    pub fn from_u8(op: u8) -> Option<Self> {
        match op {
            OP_START => Some(Self::Start),
            OP_RECEIVE_INIT => Some(Self::ReceiveInit),
            OP_RECEIVE_FW => Some(Self::ReceiveFirmware),
            OP_VALIDATE => Some(Self::Validate),
            OP_ACTIVATE_N_RESET => Some(Self::ActivateAndReset),
            OP_SYS_RESET => Some(Self::SystemReset),
            OP_IMAGE_SIZE_REQ => Some(Self::ImageSizeRequest),
            OP_PKT_RCPT_NOTIF_REQ => Some(Self::PacketReceiptRequest),
            _ => None,
        }
    }

    pub fn opcode(self) -> u8 {
        self as u8
    }
}

// ---------------------------------------------------------------------------
// Result codes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ResultCode {
    Success = 1,
    InvalidState = 2,
    NotSupported = 3,
    DataSize = 4,
    CrcError = 5,
    OperationFailed = 6,
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Success => "success",
            Self::InvalidState => "invalid state",
            Self::NotSupported => "not supported",
            Self::DataSize => "data size",
            Self::CrcError => "CRC error",
            Self::OperationFailed => "operation failed",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// Outbound messages
// ---------------------------------------------------------------------------

/// A notification queued for the control-tx pipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlMessage {
    Response { procedure: u8, result: ResultCode },
    /// Answer to an image-size request.
    ImageSize { received: u32 },
    ReceiptNotification { received: u32 },
}

impl ControlMessage {
    pub fn response(procedure: u8, result: ResultCode) -> Self {
        Self::Response { procedure, result }
    }

    pub fn encode(&self) -> Vec<u8, MAX_MESSAGE_LEN> {
        let mut out = Vec::new();
        // Capacity covers the longest variant, pushes cannot fail.
        match *self {
            Self::Response { procedure, result } => {
                let _ = out.extend_from_slice(&[OP_RESPONSE, procedure, result as u8]);
            }
            Self::ImageSize { received } => {
                let _ = out.extend_from_slice(&[
                    OP_RESPONSE,
                    procedure::IMAGE_SIZE,
                    ResultCode::Success as u8,
                ]);
                let _ = out.extend_from_slice(&received.to_le_bytes());
            }
            Self::ReceiptNotification { received } => {
                let _ = out.push(OP_PKT_RCPT_NOTIF);
                let _ = out.extend_from_slice(&received.to_le_bytes());
            }
        }
        out
    }
}
