//! Collaborators a DFU handler may touch.
//!
//! The engine owns only DFU progress.  The link, the session bookkeeping
//! and the hardware ports are lent to it for the duration of one event so
//! that the service (or a test) stays their sole owner.

use crate::aci::{SessionState, TransportLink};
use crate::app::ports::{AciPort, FlashPort, ResetPort};

pub struct DfuContext<'a, P: AciPort, F: FlashPort, R: ResetPort> {
    pub link: &'a mut TransportLink<P>,
    pub session: &'a mut SessionState,
    pub flash: &'a mut F,
    pub reset: &'a mut R,
}

impl<'a, P: AciPort, F: FlashPort, R: ResetPort> DfuContext<'a, P, F, R> {
    pub fn new(
        link: &'a mut TransportLink<P>,
        session: &'a mut SessionState,
        flash: &'a mut F,
        reset: &'a mut R,
    ) -> Self {
        Self {
            link,
            session,
            flash,
            reset,
        }
    }
}
