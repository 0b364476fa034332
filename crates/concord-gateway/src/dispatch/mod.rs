//! Dispatch and fan-out
//!
//! Decides which sessions receive an event and pushes it through each
//! session's dispatch lock.

mod fanout;
mod watchers;

pub use fanout::{DispatchReport, DispatchScope, Dispatcher};
pub use watchers::WatcherSet;
