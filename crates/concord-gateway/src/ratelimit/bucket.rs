//! Fixed-window bucket

use std::time::Duration;

use concord_common::BucketConfig;
use tokio::time::Instant;

/// Counts hits per window; the window resets on a fixed cadence from the
/// bucket's creation rather than sliding with each hit
#[derive(Debug, Clone)]
pub struct FixedWindow {
    limit: u32,
    window: Duration,
    started: Instant,
    used: u32,
}

impl FixedWindow {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window: window.max(Duration::from_millis(1)),
            started: Instant::now(),
            used: 0,
        }
    }

    pub fn from_config(config: BucketConfig) -> Self {
        Self::new(config.limit, config.window())
    }

    /// Take one token; `false` when the current window is spent
    pub fn try_acquire(&mut self) -> bool {
        self.roll();
        if self.used < self.limit {
            self.used += 1;
            true
        } else {
            false
        }
    }

    fn roll(&mut self) {
        let elapsed = self.started.elapsed();
        if elapsed >= self.window {
            // keep `started` on the window grid
            let offset = elapsed.as_nanos() % self.window.as_nanos();
            let offset = Duration::from_nanos(u64::try_from(offset).unwrap_or(0));
            self.started += elapsed - offset;
            self.used = 0;
        }
    }
}
