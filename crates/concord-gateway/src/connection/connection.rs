//! Individual gateway connection
//!
//! Drives one client socket through HELLO, IDENTIFY or RESUME and the
//! steady state. Handler failures come back as `HandlerError`s and are
//! turned into a close in one place; cleanup runs once however the
//! connection ends.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};

use super::{pick_interval, ConnectionId, ConnectionSink, DeliveryError, HeartbeatMonitor};
use crate::handlers::{HandlerError, HandlerResult, OpRouter};
use crate::protocol::{CloseReason, Frame, GatewayCodec, GatewayMessage, HelloPayload};
use crate::ratelimit::{ConnectionLimiter, Verdict};
use crate::server::GatewayState;
use crate::session::Session;

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// Socket open, HELLO not sent yet
    Connected,
    /// HELLO sent
    AwaitingIdentify,
    /// Holds a session and receives dispatch
    Identified,
    /// Terminal
    Closed,
}

/// A single gateway connection
pub struct Connection {
    id: ConnectionId,
    state: GatewayState,
    sink: ConnectionSink,
    codec: GatewayCodec,
    limiter: ConnectionLimiter,
    heartbeat: Option<HeartbeatMonitor>,
    phase: ConnectionPhase,
    session: Option<Arc<Session>>,
    cleaned_up: bool,
}

impl Connection {
    pub fn new(state: GatewayState, sink: ConnectionSink, codec: GatewayCodec) -> Self {
        let limiter = ConnectionLimiter::new(&state.config().rate_limit);
        Self {
            id: sink.id(),
            state,
            sink,
            codec,
            limiter,
            heartbeat: None,
            phase: ConnectionPhase::Connected,
            session: None,
            cleaned_up: false,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn phase(&self) -> ConnectionPhase {
        self.phase
    }

    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    pub fn sink(&self) -> &ConnectionSink {
        &self.sink
    }

    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    pub fn is_identified(&self) -> bool {
        self.phase == ConnectionPhase::Identified
    }

    /// The session, or a not-authenticated error
    pub fn require_session(&self) -> HandlerResult<Arc<Session>> {
        self.session.clone().ok_or(HandlerError::NotAuthenticated)
    }

    /// Bind the connection to a session after IDENTIFY or RESUME
    pub fn attach_session(&mut self, session: Arc<Session>) {
        tracing::debug!(
            connection_id = self.id,
            session_id = %session.id(),
            user_id = %session.user_id(),
            "Session attached"
        );
        self.session = Some(session);
        self.phase = ConnectionPhase::Identified;
    }

    /// Re-arm the heartbeat timer
    pub fn beat(&self) {
        if let Some(heartbeat) = &self.heartbeat {
            heartbeat.beat();
        }
    }

    /// Diagnostic identifier sent in `_trace`
    pub fn trace(&self, kind: &str) -> String {
        format!("{}-{kind}-{}", self.state.config().app.name, self.id)
    }

    /// Drive the connection until the client leaves or a close is requested
    ///
    /// Returns the close to send, if any.
    pub async fn run<S>(mut self, mut frames: S) -> Option<CloseReason>
    where
        S: Stream<Item = Frame> + Unpin,
    {
        if let Err(e) = self.start().await {
            tracing::debug!(connection_id = self.id, error = %e, "Could not send HELLO");
        } else {
            loop {
                let frame = tokio::select! {
                    biased;
                    () = self.sink.closed() => break,
                    frame = frames.next() => frame,
                };
                let Some(frame) = frame else {
                    tracing::debug!(connection_id = self.id, "Client went away");
                    break;
                };
                if !self.process(frame).await {
                    break;
                }
            }
        }

        self.cleanup().await;
        self.sink.kick_reason()
    }

    /// Send HELLO and arm the heartbeat timer
    pub async fn start(&mut self) -> Result<(), DeliveryError> {
        let config = &self.state.config().heartbeat;
        let interval = pick_interval(config);
        let grace = Duration::from_millis(config.grace_ms);

        let hello = HelloPayload::new(interval.as_millis() as u64, self.trace("hello"));
        self.sink.send(GatewayMessage::hello(&hello)).await?;

        self.heartbeat = Some(HeartbeatMonitor::start(self.sink.clone(), interval, grace));
        self.phase = ConnectionPhase::AwaitingIdentify;

        tracing::debug!(
            connection_id = self.id,
            interval_ms = hello.heartbeat_interval,
            encoding = self.codec.encoding().as_str(),
            "HELLO sent"
        );
        Ok(())
    }

    /// Handle one inbound frame; `false` once the connection must close
    pub async fn process(&mut self, frame: Frame) -> bool {
        match self.handle_frame(frame).await {
            Ok(()) => !self.sink.is_closed(),
            Err(err) => {
                self.fail(err);
                false
            }
        }
    }

    async fn handle_frame(&mut self, frame: Frame) -> HandlerResult<()> {
        let message = self.codec.decode(&frame)?;

        match self.limiter.admit(message.op) {
            Verdict::Allow => {}
            Verdict::Drop => {
                tracing::debug!(connection_id = self.id, op = %message.op, "Rate limited, dropped");
                return Ok(());
            }
            Verdict::Close => return Err(HandlerError::RateLimited),
        }

        tracing::trace!(connection_id = self.id, op = %message.op, "Received");
        OpRouter::route(self, message).await
    }

    fn fail(&self, err: HandlerError) {
        let reason = err.close_reason();
        tracing::info!(
            connection_id = self.id,
            code = reason.code.as_u16(),
            error = %err,
            "Closing connection"
        );

        if let HandlerError::SessionInvalidated { resumable, .. } = &err {
            if let Err(e) = self.sink.try_deliver(GatewayMessage::invalid_session(*resumable)) {
                tracing::debug!(connection_id = self.id, error = %e, "INVALID_SESSION not sent");
            }
        }
        self.sink.kick(reason);
    }

    /// Release everything the connection holds
    ///
    /// The session is detached, not destroyed, so it stays resumable.
    /// Calling this again has no effect.
    pub async fn cleanup(&mut self) {
        if self.cleaned_up {
            return;
        }
        self.cleaned_up = true;
        self.phase = ConnectionPhase::Closed;

        if let Some(heartbeat) = self.heartbeat.take() {
            heartbeat.stop();
        }
        self.sink.close();

        if let Some(session) = &self.session {
            session.detach(&self.sink).await;
            self.state.registry().detach(session.id(), self.id);
            self.state.settle_presence(session.user_id()).await;

            tracing::info!(
                connection_id = self.id,
                session_id = %session.id(),
                user_id = %session.user_id(),
                "Connection cleaned up"
            );
        }
    }
}
