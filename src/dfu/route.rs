//! State × event routing.
//!
//! One match, read top to bottom: the first arm that fits wins, and the
//! wildcard-state arms only apply when no state-specific arm matched.
//! Terminal states swallow everything.

use super::control::{ControlOp, ResultCode, procedure};
use super::{DfuEvent, DfuState, Validity};

/// What the engine does with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    /// Image length arrives on the packet pipe.
    ImageSizeSet,
    BeginInit,
    /// Init packet bytes are acknowledged and discarded.
    InitPacket,
    BeginTransfer,
    DataPacket,
    Validate,
    /// Disconnect, wait for the link to drop, restart.
    Reset,
    NotificationSet,
    ReportImageSize,
    /// Answer with `result` for `procedure` and leave the state alone.
    Reject { procedure: u8, result: ResultCode },
}

/// Pick the handler for `event` in `state`, or `None` to ignore it.
pub fn route(state: DfuState, event: &DfuEvent<'_>) -> Option<Handler> {
    use ControlOp as Op;
    use DfuState as S;

    let op = match *event {
        DfuEvent::Packet(_) => None,
        DfuEvent::Control { opcode, .. } => match ControlOp::from_u8(opcode) {
            Some(op) => Some(op),
            None => {
                return (!state.is_terminal()).then_some(Handler::Reject {
                    procedure: opcode,
                    result: ResultCode::NotSupported,
                });
            }
        },
    };

    match (state, op) {
        (S::AwaitingReset | S::Terminated, _) => None,

        (S::Ready, Some(Op::ReceiveInit)) => Some(Handler::BeginInit),
        (S::Idle, None) => Some(Handler::ImageSizeSet),
        (S::ReceivingInit, None) => Some(Handler::InitPacket),
        (S::Ready | S::ReceivingInit, Some(Op::ReceiveFirmware)) => Some(Handler::BeginTransfer),
        (S::ReceivingData, None) => Some(Handler::DataPacket),
        (S::ReceivingData, Some(Op::Validate)) => Some(Handler::Validate),
        (S::Validated(Validity::Valid), Some(Op::ActivateAndReset)) => Some(Handler::Reset),

        (_, Some(Op::SystemReset)) => Some(Handler::Reset),
        (_, Some(Op::PacketReceiptRequest)) => Some(Handler::NotificationSet),

        // Everything below answers requests the table above leaves unrouted.
        (S::Failed, None) => Some(Handler::Reject {
            procedure: procedure::RECEIVE_APP,
            result: ResultCode::OperationFailed,
        }),
        (S::Idle, Some(Op::ImageSizeRequest)) => Some(Handler::Reject {
            procedure: procedure::IMAGE_SIZE,
            result: ResultCode::InvalidState,
        }),
        (_, Some(Op::ImageSizeRequest)) => Some(Handler::ReportImageSize),
        (_, Some(Op::Start)) => None,
        (_, Some(op)) => Some(Handler::Reject {
            procedure: op.opcode(),
            result: ResultCode::InvalidState,
        }),
        (_, None) => None,
    }
}
