//! Integration test utilities for the gateway
//!
//! This crate provides helpers for running end-to-end tests against
//! the HTTP routes and the websocket gateway.

pub mod helpers;

pub use helpers::*;
