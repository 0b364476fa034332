//! Heartbeat monitor
//!
//! One timer task per connection. Every heartbeat pushes the deadline out
//! by `interval + grace`; reaching the deadline kicks the connection with
//! a heartbeat-expired close. Stopping (or dropping) the monitor cancels
//! the task, and the task re-checks cancellation before it fires.

use std::time::Duration;

use concord_common::HeartbeatConfig;
use rand::Rng;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::ConnectionSink;
use crate::protocol::CloseReason;

/// Pick a per-connection heartbeat interval inside the configured band
pub fn pick_interval(config: &HeartbeatConfig) -> Duration {
    let low = config.min_interval_ms.min(config.max_interval_ms);
    let high = config.min_interval_ms.max(config.max_interval_ms);
    Duration::from_millis(rand::thread_rng().gen_range(low..=high))
}

/// Liveness timer for one connection
pub struct HeartbeatMonitor {
    interval: Duration,
    grace: Duration,
    deadline: watch::Sender<Instant>,
    cancel: CancellationToken,
}

impl HeartbeatMonitor {
    /// Arm the timer and spawn its task
    pub fn start(sink: ConnectionSink, interval: Duration, grace: Duration) -> Self {
        let (deadline, rx) = watch::channel(Instant::now() + interval + grace);
        let cancel = CancellationToken::new();

        tokio::spawn(expire_when_silent(sink, rx, cancel.clone()));

        Self {
            interval,
            grace,
            deadline,
            cancel,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Silence tolerated before the connection is closed
    pub fn timeout(&self) -> Duration {
        self.interval + self.grace
    }

    /// Record a heartbeat and re-arm the timer
    pub fn beat(&self) {
        self.deadline.send_replace(Instant::now() + self.timeout());
    }

    /// Disarm the timer
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for HeartbeatMonitor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn expire_when_silent(
    sink: ConnectionSink,
    mut deadline: watch::Receiver<Instant>,
    cancel: CancellationToken,
) {
    loop {
        let at = *deadline.borrow_and_update();
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            () = sink.closed() => return,
            changed = deadline.changed() => {
                if changed.is_err() {
                    return;
                }
            }
            () = tokio::time::sleep_until(at) => {
                if cancel.is_cancelled() {
                    return;
                }
                tracing::info!(connection_id = sink.id(), "Heartbeat expired");
                sink.kick(CloseReason::heartbeat_expired());
                return;
            }
        }
    }
}
