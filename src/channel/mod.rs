//! Per-job event channels.
//!
//! A meeting job streams its events over a dedicated channel. This module
//! covers the whole inbound path:
//! - `transport`: raw byte streams per job (NATS in production, in-memory
//!   for tests)
//! - `messages`: the typed wire events and the raw-to-typed `classify` step
//! - `adapter`: channel lifecycle, one live channel per caller, malformed
//!   message handling

pub mod adapter;
pub mod messages;
pub mod nats;
pub mod transport;

pub use adapter::{ChannelAdapter, ChannelState, JobChannel};
pub use messages::{classify, ChannelEvent, EventAction};
pub use nats::NatsTransport;
pub use transport::{ChannelHandle, EventTransport, LocalTransport};
