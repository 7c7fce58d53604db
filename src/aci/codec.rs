//! ACI command encoders and event decoder.
//!
//! Commands are encoded into fully-populated [`Frame`] values; nothing is
//! written in place into a shared send buffer.  Events are decoded into a
//! typed [`AciEvent`] that owns its data, so it can outlive the frame.

use core::fmt;

use heapless::Vec;

use super::frame::{Frame, MAX_PAYLOAD};

// ── Opcodes ───────────────────────────────────────────────────

/// Command opcodes (host → nRF8001).
pub mod command {
    pub const RADIO_RESET: u8 = 0x0E;
    pub const CONNECT: u8 = 0x0F;
    pub const DISCONNECT: u8 = 0x10;
    pub const SEND_DATA: u8 = 0x15;
}

/// Event opcodes (nRF8001 → host).
pub mod event {
    pub const DEVICE_STARTED: u8 = 0x81;
    pub const CMD_RSP: u8 = 0x84;
    pub const CONNECTED: u8 = 0x85;
    pub const DISCONNECTED: u8 = 0x86;
    pub const BOND_STATUS: u8 = 0x87;
    pub const PIPE_STATUS: u8 = 0x88;
    pub const TIMING: u8 = 0x89;
    pub const DATA_CREDIT: u8 = 0x8A;
    pub const DATA_ACK: u8 = 0x8B;
    pub const DATA_RECEIVED: u8 = 0x8C;
    pub const PIPE_ERROR: u8 = 0x8D;
}

/// ACI status codes the bootloader reacts to.
pub mod status {
    pub const SUCCESS: u8 = 0x00;
    pub const ERROR_PEER_ATT_ERROR: u8 = 0x92;
}

/// Disconnect reason: remote user terminated connection.
pub const REASON_TERMINATE: u8 = 0x01;

/// Length byte of a connect command (opcode + 4 parameter bytes).
pub const MSG_CONNECT_LEN: u8 = 5;
/// Length byte of a disconnect command (opcode + reason).
pub const MSG_DISCONNECT_LEN: u8 = 2;
/// Length byte of a send-data command before any payload (opcode + pipe).
pub const MSG_SEND_DATA_BASE_LEN: u8 = 2;

/// Largest pipe payload that fits in one frame.
pub const MAX_PIPE_DATA: usize = MAX_PAYLOAD - MSG_SEND_DATA_BASE_LEN as usize;

/// Size of the pipe bitmaps carried by the pipe-status event.
pub const PIPES_ARRAY_SIZE: usize = 8;

/// Payload bytes carried by a received data or pipe-error event.
pub type PipeData = Vec<u8, MAX_PIPE_DATA>;

// ── Errors ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    /// The encoded frame would exceed the link's maximum frame size.
    PayloadTooLarge { len: usize, max: usize },
    /// The frame is shorter than its opcode requires.
    Truncated { opcode: u8, len: usize },
    /// The frame carries no opcode.
    Empty,
    /// The frame does not carry a known command.
    UnknownCommand(u8),
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PayloadTooLarge { len, max } => {
                write!(f, "payload of {} bytes exceeds {} byte limit", len, max)
            }
            Self::Truncated { opcode, len } => {
                write!(f, "opcode 0x{:02X} truncated at {} bytes", opcode, len)
            }
            Self::Empty => write!(f, "empty frame"),
            Self::UnknownCommand(op) => write!(f, "unknown command 0x{:02X}", op),
        }
    }
}

// ── Commands ──────────────────────────────────────────────────

/// Outbound requests the bootloader issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AciCommand<'a> {
    RadioReset,
    /// Advertise and wait for a central.  `timeout` in seconds,
    /// `adv_interval` in 0.625 ms units.
    Connect { timeout: u16, adv_interval: u16 },
    Disconnect { reason: u8 },
    SendData { pipe: u8, data: &'a [u8] },
}

impl<'a> AciCommand<'a> {
    /// Encode into a wire frame.
    pub fn encode(&self) -> Result<Frame, CodecError> {
        let frame = match *self {
            Self::RadioReset => Frame::with_opcode(command::RADIO_RESET, &[]),
            Self::Connect {
                timeout,
                adv_interval,
            } => {
                let [t_msb, t_lsb] = timeout.to_be_bytes();
                let [i_msb, i_lsb] = adv_interval.to_be_bytes();
                Frame::with_opcode(command::CONNECT, &[t_msb, t_lsb, i_msb, i_lsb])
            }
            Self::Disconnect { reason } => Frame::with_opcode(command::DISCONNECT, &[reason]),
            Self::SendData { pipe, data } => {
                if data.len() > MAX_PIPE_DATA {
                    return Err(CodecError::PayloadTooLarge {
                        len: data.len(),
                        max: MAX_PIPE_DATA,
                    });
                }
                let mut params = [0u8; MAX_PAYLOAD];
                params[0] = pipe;
                params[1..=data.len()].copy_from_slice(data);
                Frame::with_opcode(command::SEND_DATA, &params[..=data.len()])
            }
        };
        // Every arm above is bounded; this only trips if a constant is wrong.
        frame.ok_or(CodecError::PayloadTooLarge {
            len: MAX_PAYLOAD + 1,
            max: MAX_PAYLOAD,
        })
    }

    /// Decode a command frame, borrowing send-data payload from `frame`.
    pub fn decode(frame: &'a Frame) -> Result<Self, CodecError> {
        let opcode = frame.opcode().ok_or(CodecError::Empty)?;
        let params = frame.params();
        match opcode {
            command::RADIO_RESET => Ok(Self::RadioReset),
            command::CONNECT => {
                let p = require(opcode, params, 4)?;
                Ok(Self::Connect {
                    timeout: u16::from_be_bytes([p[0], p[1]]),
                    adv_interval: u16::from_be_bytes([p[2], p[3]]),
                })
            }
            command::DISCONNECT => {
                let p = require(opcode, params, 1)?;
                Ok(Self::Disconnect { reason: p[0] })
            }
            command::SEND_DATA => {
                let p = require(opcode, params, 1)?;
                Ok(Self::SendData {
                    pipe: p[0],
                    data: &p[1..],
                })
            }
            other => Err(CodecError::UnknownCommand(other)),
        }
    }
}

// ── Events ────────────────────────────────────────────────────

/// Operating mode reported by the device-started event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    Test,
    Setup,
    Standby,
    Sleep,
    Invalid(u8),
}

impl DeviceMode {
    pub fn from_u8(raw: u8) -> Self {
        match raw {
            0x01 => Self::Test,
            0x02 => Self::Setup,
            0x03 => Self::Standby,
            0x04 => Self::Sleep,
            other => Self::Invalid(other),
        }
    }
}

/// Connection timing in controller units (1.25 ms interval, slave
/// latency in events, 10 ms supervision timeout).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionTiming {
    pub interval: u16,
    pub latency: u16,
    pub timeout: u16,
}

impl ConnectionTiming {
    fn from_le(p: &[u8]) -> Self {
        Self {
            interval: u16::from_le_bytes([p[0], p[1]]),
            latency: u16::from_le_bytes([p[2], p[3]]),
            timeout: u16::from_le_bytes([p[4], p[5]]),
        }
    }
}

/// Events surfaced by the nRF8001.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AciEvent {
    DeviceStarted {
        mode: DeviceMode,
        hw_error: bool,
        credit_available: u8,
    },
    CommandResponse {
        command: u8,
        status: u8,
    },
    Connected {
        address_type: u8,
        address: [u8; 6],
        timing: ConnectionTiming,
        clock_accuracy: u8,
    },
    Disconnected {
        aci_status: u8,
        btle_status: u8,
    },
    BondStatus {
        status: u8,
    },
    PipeStatus {
        open: [u8; PIPES_ARRAY_SIZE],
        closed: [u8; PIPES_ARRAY_SIZE],
    },
    Timing(ConnectionTiming),
    DataCredit {
        credit: u8,
    },
    DataAck {
        pipe: u8,
    },
    DataReceived {
        pipe: u8,
        data: PipeData,
    },
    PipeError {
        pipe: u8,
        error_code: u8,
        data: PipeData,
    },
    Unknown {
        opcode: u8,
    },
}

impl AciEvent {
    /// Decode a received frame.
    pub fn decode(frame: &Frame) -> Result<Self, CodecError> {
        let opcode = frame.opcode().ok_or(CodecError::Empty)?;
        let params = frame.params();

        let evt = match opcode {
            event::DEVICE_STARTED => {
                let p = require(opcode, params, 3)?;
                Self::DeviceStarted {
                    mode: DeviceMode::from_u8(p[0]),
                    hw_error: p[1] != 0,
                    credit_available: p[2],
                }
            }
            event::CMD_RSP => {
                let p = require(opcode, params, 2)?;
                Self::CommandResponse {
                    command: p[0],
                    status: p[1],
                }
            }
            event::CONNECTED => {
                let p = require(opcode, params, 14)?;
                let mut address = [0u8; 6];
                address.copy_from_slice(&p[1..7]);
                Self::Connected {
                    address_type: p[0],
                    address,
                    timing: ConnectionTiming::from_le(&p[7..13]),
                    clock_accuracy: p[13],
                }
            }
            event::DISCONNECTED => {
                let p = require(opcode, params, 2)?;
                Self::Disconnected {
                    aci_status: p[0],
                    btle_status: p[1],
                }
            }
            event::BOND_STATUS => {
                let p = require(opcode, params, 1)?;
                Self::BondStatus { status: p[0] }
            }
            event::PIPE_STATUS => {
                let p = require(opcode, params, 2 * PIPES_ARRAY_SIZE)?;
                let mut open = [0u8; PIPES_ARRAY_SIZE];
                let mut closed = [0u8; PIPES_ARRAY_SIZE];
                open.copy_from_slice(&p[..PIPES_ARRAY_SIZE]);
                closed.copy_from_slice(&p[PIPES_ARRAY_SIZE..2 * PIPES_ARRAY_SIZE]);
                Self::PipeStatus { open, closed }
            }
            event::TIMING => {
                let p = require(opcode, params, 6)?;
                Self::Timing(ConnectionTiming::from_le(p))
            }
            event::DATA_CREDIT => {
                let p = require(opcode, params, 1)?;
                Self::DataCredit { credit: p[0] }
            }
            event::DATA_ACK => {
                let p = require(opcode, params, 1)?;
                Self::DataAck { pipe: p[0] }
            }
            event::DATA_RECEIVED => {
                let p = require(opcode, params, 1)?;
                Self::DataReceived {
                    pipe: p[0],
                    data: pipe_data(&p[1..]),
                }
            }
            event::PIPE_ERROR => {
                let p = require(opcode, params, 2)?;
                Self::PipeError {
                    pipe: p[0],
                    error_code: p[1],
                    data: pipe_data(&p[2..]),
                }
            }
            other => Self::Unknown { opcode: other },
        };
        Ok(evt)
    }
}

fn require(opcode: u8, params: &[u8], n: usize) -> Result<&[u8], CodecError> {
    if params.len() < n {
        return Err(CodecError::Truncated {
            opcode,
            len: params.len(),
        });
    }
    Ok(params)
}

fn pipe_data(bytes: &[u8]) -> PipeData {
    // params() is bounded by the frame, so this never truncates.
    let n = bytes.len().min(MAX_PIPE_DATA);
    Vec::from_slice(&bytes[..n]).unwrap_or_default()
}
