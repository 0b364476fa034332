//! Per-connection limiter

use concord_common::RateLimitConfig;

use super::FixedWindow;
use crate::protocol::OpCode;

/// What to do with an inbound message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    /// Ignore this operation, keep the connection
    Drop,
    /// Close with a rate-limit code
    Close,
}

#[derive(Debug, Clone)]
pub struct ConnectionLimiter {
    messages: FixedWindow,
    identify: FixedWindow,
    presence: FixedWindow,
}

impl ConnectionLimiter {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            messages: FixedWindow::from_config(config.messages),
            identify: FixedWindow::from_config(config.identify),
            presence: FixedWindow::from_config(config.presence),
        }
    }

    /// Charge one inbound message with the given op
    pub fn admit(&mut self, op: OpCode) -> Verdict {
        if !self.messages.try_acquire() {
            return Verdict::Close;
        }
        let bucket = match op {
            OpCode::Identify => &mut self.identify,
            OpCode::StatusUpdate => &mut self.presence,
            _ => return Verdict::Allow,
        };
        if bucket.try_acquire() {
            Verdict::Allow
        } else {
            Verdict::Drop
        }
    }
}
