//! Inbound rate limiting
//!
//! Fixed-window buckets per connection: one for every inbound message and
//! finer ones for IDENTIFY and STATUS_UPDATE.

mod bucket;
mod limiter;

pub use bucket::FixedWindow;
pub use limiter::{ConnectionLimiter, Verdict};
