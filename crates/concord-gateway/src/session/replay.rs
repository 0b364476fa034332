//! Replay buffer

use std::collections::VecDeque;

use crate::protocol::GatewayMessage;

/// Bounded ring of the most recent dispatched envelopes, oldest first
#[derive(Debug, Clone)]
pub struct ReplayBuffer {
    capacity: usize,
    entries: VecDeque<(u64, GatewayMessage)>,
}

impl ReplayBuffer {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append an envelope, evicting the oldest on overflow
    pub fn push(&mut self, seq: u64, message: GatewayMessage) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back((seq, message));
    }

    /// Envelopes with `after < seq <= upto`, in order
    pub fn range(&self, after: u64, upto: u64) -> impl Iterator<Item = &GatewayMessage> {
        self.entries
            .iter()
            .filter(move |(seq, _)| *seq > after && *seq <= upto)
            .map(|(_, message)| message)
    }

    /// Sequence numbers currently held
    pub fn sequences(&self) -> impl Iterator<Item = u64> + '_ {
        self.entries.iter().map(|(seq, _)| *seq)
    }
}
