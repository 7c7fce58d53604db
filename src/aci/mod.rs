//! nRF8001 Application Controller Interface (ACI) link.
//!
//! ```text
//!  ┌──────────────┐   ┌──────────────┐   ┌──────────────────────────┐
//!  │ codec        │──▶│ transport    │──▶│ AciPort (SPI, REQN, RDYN)│
//!  │ AciCommand   │   │ tx/rx queues │◀──│                          │
//!  │ AciEvent     │◀──│              │   └──────────────────────────┘
//!  └──────┬───────┘   └──────────────┘
//!         ▼
//!  ┌──────────────┐
//!  │ session      │  pipes · credit · timing
//!  └──────────────┘
//! ```

pub mod codec;
pub mod frame;
pub mod queue;
pub mod session;
pub mod transport;

pub use codec::{AciCommand, AciEvent, CodecError, DeviceMode};
pub use frame::{Frame, MAX_PAYLOAD};
pub use queue::FixedCapacityQueue;
pub use session::SessionState;
pub use transport::TransportLink;
