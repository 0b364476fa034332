//! Outbound side of a connection
//!
//! Every envelope bound for a socket goes through a bounded queue drained
//! by the connection's writer task. Closing is requested by cancelling the
//! sink's shutdown token; the first recorded reason wins.
//!
//! The connection's own bursts (READY, guild streaming, member chunks) may
//! only fill the queue up to a headroom reserved for fan-out, so a large
//! burst never makes live events overflow the queue.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

use crate::protocol::{CloseReason, GatewayMessage};

/// Process-unique connection identifier
pub type ConnectionId = u64;

/// Why an envelope could not be handed to a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("connection is closed")]
    Closed,

    #[error("outbound queue is full")]
    Full,

    #[error("session is owned by another connection")]
    Superseded,
}

/// Cloneable handle for writing to one connection
#[derive(Debug, Clone)]
pub struct ConnectionSink {
    id: ConnectionId,
    tx: mpsc::Sender<GatewayMessage>,
    headroom: usize,
    drained: Arc<Notify>,
    shutdown: CancellationToken,
    kick_reason: Arc<Mutex<Option<CloseReason>>>,
}

impl ConnectionSink {
    /// Create a sink and the queue its writer task drains
    pub fn new(id: ConnectionId, capacity: usize) -> (Self, OutboundQueue) {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let drained = Arc::new(Notify::new());
        let queue = OutboundQueue {
            rx,
            drained: Arc::clone(&drained),
        };
        let sink = Self {
            id,
            tx,
            headroom: capacity / 2,
            drained,
            shutdown: CancellationToken::new(),
            kick_reason: Arc::new(Mutex::new(None)),
        };
        (sink, queue)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Whether a close has been requested
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Resolves once a close has been requested
    pub async fn closed(&self) {
        self.shutdown.cancelled().await;
    }

    /// Request a close; only the first reason is kept
    pub fn kick(&self, reason: CloseReason) {
        {
            let mut slot = self.kick_reason.lock();
            if slot.is_none() {
                tracing::debug!(
                    connection_id = self.id,
                    code = reason.code.as_u16(),
                    reason = %reason.reason,
                    "Closing connection"
                );
                *slot = Some(reason);
            }
        }
        self.shutdown.cancel();
    }

    /// Stop the connection without recording a reason
    pub fn close(&self) {
        self.shutdown.cancel();
    }

    /// Reason recorded by the first `kick`, if any
    pub fn kick_reason(&self) -> Option<CloseReason> {
        self.kick_reason.lock().clone()
    }

    /// Queue without waiting; a full queue closes the connection
    pub fn try_deliver(&self, message: GatewayMessage) -> Result<(), DeliveryError> {
        if self.is_closed() {
            return Err(DeliveryError::Closed);
        }
        match self.tx.try_send(message) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.kick(CloseReason::slow_consumer());
                Err(DeliveryError::Full)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }

    /// Wait for queue capacity, giving up if the connection closes first
    pub async fn reserve(&self) -> Result<mpsc::Permit<'_, GatewayMessage>, DeliveryError> {
        tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(DeliveryError::Closed),
            permit = self.tx.reserve() => permit.map_err(|_| DeliveryError::Closed),
        }
    }

    /// Wait until an own event fits while `headroom` slots stay free
    ///
    /// Only the owning connection sends its own events, so at most one
    /// caller waits here at a time.
    pub async fn reserve_owned(&self) -> Result<mpsc::Permit<'_, GatewayMessage>, DeliveryError> {
        loop {
            let drained = self.drained.notified();
            tokio::pin!(drained);
            drained.as_mut().enable();

            if self.tx.capacity() > self.headroom {
                break;
            }
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => return Err(DeliveryError::Closed),
                () = drained => {}
            }
        }
        self.reserve().await
    }

    /// Queue a non-dispatch envelope, waiting for capacity
    pub async fn send(&self, message: GatewayMessage) -> Result<(), DeliveryError> {
        let permit = self.reserve().await?;
        permit.send(message);
        Ok(())
    }
}

/// Receiving end of a connection's queue
#[derive(Debug)]
pub struct OutboundQueue {
    rx: mpsc::Receiver<GatewayMessage>,
    drained: Arc<Notify>,
}

impl OutboundQueue {
    pub async fn recv(&mut self) -> Option<GatewayMessage> {
        let message = self.rx.recv().await;
        self.drained.notify_waiters();
        message
    }

    pub fn try_recv(&mut self) -> Result<GatewayMessage, mpsc::error::TryRecvError> {
        let message = self.rx.try_recv();
        if message.is_ok() {
            self.drained.notify_waiters();
        }
        message
    }
}
