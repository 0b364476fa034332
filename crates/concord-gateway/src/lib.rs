//! # concord-gateway
//!
//! Discord-compatible websocket gateway: the connection state machine,
//! session persistence and resumption, heartbeats, sharding and event
//! fan-out.

pub mod connection;
pub mod dispatch;
pub mod events;
pub mod handlers;
pub mod presence;
pub mod protocol;
pub mod ratelimit;
pub mod server;
pub mod session;

pub use server::run;
