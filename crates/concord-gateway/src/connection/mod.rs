//! Connections
//!
//! The per-socket protocol state machine, its outbound queue and its
//! heartbeat timer.

mod connection;
mod heartbeat;
mod outbound;

pub use connection::{Connection, ConnectionPhase};
pub use heartbeat::{pick_interval, HeartbeatMonitor};
pub use outbound::{ConnectionId, ConnectionSink, DeliveryError, OutboundQueue};
