//! Resumable session state
//!
//! A `Session` outlives the socket that created it. Sequence counters, the
//! replay buffer and the current sink live behind one async mutex, the
//! session's dispatch lock: every sequence assignment and every resume
//! hand-off happens while holding it.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use concord_core::{Snowflake, User};
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use super::{ReplayBuffer, SessionRegistry, ShardInfo};
use crate::connection::{ConnectionSink, DeliveryError};
use crate::events::{event_data, GatewayEventType, ResumedEvent};
use crate::protocol::{CloseReason, GatewayMessage};

/// What happened to a fan-out push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Queued on the live connection
    Delivered(u64),
    /// No connection attached; kept for a future resume
    Buffered(u64),
}

impl DeliveryOutcome {
    pub fn seq(self) -> u64 {
        match self {
            Self::Delivered(seq) | Self::Buffered(seq) => seq,
        }
    }
}

/// Why a resume was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ResumeRejection {
    #[error("sequence {requested} is ahead of {sent}")]
    SequenceAhead { requested: u64, sent: u64 },

    #[error("sequence {requested} is more than {capacity} behind {sent}")]
    TooFarBehind {
        requested: u64,
        sent: u64,
        capacity: usize,
    },

    #[error("session is no longer registered")]
    Unregistered,

    #[error("replay could not be delivered: {0}")]
    Delivery(#[from] DeliveryError),
}

/// Summary of a completed resume
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumeSummary {
    pub replayed: usize,
    pub presences: usize,
    pub sent_seq: u64,
}

/// Everything guarded by the dispatch lock
#[derive(Debug)]
pub struct SessionStream {
    recv_seq: u64,
    sent_seq: u64,
    replay: ReplayBuffer,
    sink: Option<ConnectionSink>,
}

impl SessionStream {
    fn next_envelope(&mut self, event: GatewayEventType, data: Value) -> GatewayMessage {
        self.sent_seq += 1;
        let message = GatewayMessage::dispatch(event, self.sent_seq, data);
        self.retain(event, self.sent_seq, &message);
        message
    }

    fn retain(&mut self, event: GatewayEventType, seq: u64, message: &GatewayMessage) {
        if event.is_replayable() {
            self.replay.push(seq, message.clone());
        }
    }

    /// Queue `(seq, sent_seq]`, the trailing PRESENCES_REPLACE and RESUMED
    ///
    /// The new sequences are committed only once everything is queued, so a
    /// failed hand-off leaves the counters and the buffer as they were.
    fn replay_onto(
        &mut self,
        sink: &ConnectionSink,
        seq: u64,
        trace: &str,
    ) -> Result<ResumeSummary, DeliveryError> {
        let sent = self.sent_seq;

        let mut replayed = 0;
        let mut presences = Vec::new();
        for message in self.replay.range(seq, sent) {
            if message.is_event(GatewayEventType::PresenceUpdate.as_str()) {
                presences.push(message.d.clone());
                continue;
            }
            sink.try_deliver(message.clone())?;
            replayed += 1;
        }

        let presence_count = presences.len();
        let mut next = sent;
        let replace = if presences.is_empty() {
            None
        } else {
            next += 1;
            Some(GatewayMessage::dispatch(
                GatewayEventType::PresencesReplace,
                next,
                Value::Array(presences),
            ))
        };
        next += 1;
        let resumed = GatewayMessage::dispatch(
            GatewayEventType::Resumed,
            next,
            event_data(&ResumedEvent {
                trace: vec![trace.to_string()],
            }),
        );

        if let Some(message) = &replace {
            sink.try_deliver(message.clone())?;
        }
        sink.try_deliver(resumed)?;

        if let Some(message) = replace {
            self.retain(GatewayEventType::PresencesReplace, sent + 1, &message);
        }
        self.sent_seq = next;

        Ok(ResumeSummary {
            replayed,
            presences: presence_count,
            sent_seq: next,
        })
    }
}

/// One identified session
#[derive(Debug)]
pub struct Session {
    id: String,
    token: String,
    user: User,
    shard: ShardInfo,
    large_threshold: u32,
    properties: Map<String, Value>,
    watched: parking_lot::Mutex<HashSet<Snowflake>>,
    ready: AtomicBool,
    stream: Mutex<SessionStream>,
}

/// Parameters fixed at IDENTIFY
#[derive(Debug, Clone)]
pub struct SessionSeed {
    pub token: String,
    pub user: User,
    pub shard: ShardInfo,
    pub large_threshold: u32,
    pub properties: Map<String, Value>,
    pub replay_capacity: usize,
}

impl Session {
    pub fn new(id: String, seed: SessionSeed, sink: ConnectionSink) -> Self {
        Self {
            id,
            token: seed.token,
            user: seed.user,
            shard: seed.shard,
            large_threshold: seed.large_threshold,
            properties: seed.properties,
            watched: parking_lot::Mutex::new(HashSet::new()),
            ready: AtomicBool::new(false),
            stream: Mutex::new(SessionStream {
                recv_seq: 0,
                sent_seq: 0,
                replay: ReplayBuffer::new(seed.replay_capacity),
                sink: Some(sink),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn user_id(&self) -> Snowflake {
        self.user.id
    }

    pub fn shard(&self) -> ShardInfo {
        self.shard
    }

    pub fn large_threshold(&self) -> u32 {
        self.large_threshold
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    /// READY has gone out; fan-out may target this session
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    pub fn mark_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }

    // === Watched guilds ===

    pub fn watch(&self, guild_id: Snowflake) {
        self.watched.lock().insert(guild_id);
    }

    pub fn unwatch(&self, guild_id: Snowflake) {
        self.watched.lock().remove(&guild_id);
    }

    pub fn watched_guilds(&self) -> Vec<Snowflake> {
        let mut guilds: Vec<Snowflake> = self.watched.lock().iter().copied().collect();
        guilds.sort_unstable();
        guilds
    }

    // === Sequencing ===

    pub async fn sent_seq(&self) -> u64 {
        self.stream.lock().await.sent_seq
    }

    pub async fn recv_seq(&self) -> u64 {
        self.stream.lock().await.recv_seq
    }

    /// Record the sequence a client acknowledged in a heartbeat
    pub async fn acknowledge(&self, seq: u64) {
        let mut stream = self.stream.lock().await;
        stream.recv_seq = stream.recv_seq.max(seq.min(stream.sent_seq));
    }

    /// Sequences currently held for replay
    pub async fn buffered_sequences(&self) -> Vec<u64> {
        self.stream.lock().await.replay.sequences().collect()
    }

    pub async fn is_attached(&self) -> bool {
        self.stream.lock().await.sink.is_some()
    }

    /// Fan-out delivery; never waits for queue capacity
    pub async fn push(
        &self,
        event: GatewayEventType,
        data: Value,
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let mut stream = self.stream.lock().await;
        let message = stream.next_envelope(event, data);
        let seq = stream.sent_seq;

        match &stream.sink {
            Some(sink) => sink.try_deliver(message).map(|()| DeliveryOutcome::Delivered(seq)),
            None => Ok(DeliveryOutcome::Buffered(seq)),
        }
    }

    /// Delivery of the owning connection's own events
    ///
    /// Queue capacity is reserved before the dispatch lock is taken, so a
    /// slow client never holds the lock while waiting. The reservation
    /// leaves the sink's fan-out headroom untouched.
    pub async fn push_owned(
        &self,
        sink: &ConnectionSink,
        event: GatewayEventType,
        data: Value,
    ) -> Result<u64, DeliveryError> {
        let permit = sink.reserve_owned().await?;

        let mut stream = self.stream.lock().await;
        if stream.sink.as_ref().map(ConnectionSink::id) != Some(sink.id()) {
            return Err(DeliveryError::Superseded);
        }
        let message = stream.next_envelope(event, data);
        permit.send(message);
        Ok(stream.sent_seq)
    }

    /// Drop the sink if it still belongs to the given connection
    pub async fn detach(&self, sink: &ConnectionSink) -> bool {
        let mut stream = self.stream.lock().await;
        if stream.sink.as_ref().map(ConnectionSink::id) == Some(sink.id()) {
            stream.sink = None;
            true
        } else {
            false
        }
    }

    /// Close whichever connection currently holds the session
    pub async fn kick_attached(&self, reason: CloseReason) {
        if let Some(sink) = self.stream.lock().await.sink.take() {
            sink.kick(reason);
        }
    }

    /// Hand the session to a new connection and replay what it missed
    ///
    /// Runs as one critical section under the dispatch lock: registry
    /// claim, sequence check, replay of `(seq, sent_seq]`, the trailing
    /// PRESENCES_REPLACE, RESUMED, then the sink swap. Live fan-out to this
    /// session waits until all of it is done. A failed delivery leaves the
    /// session with its previous owner.
    pub async fn resume_onto(
        &self,
        sink: &ConnectionSink,
        seq: u64,
        registry: &SessionRegistry,
        trace: &str,
    ) -> Result<ResumeSummary, ResumeRejection> {
        let mut stream = self.stream.lock().await;
        let sent = stream.sent_seq;
        let capacity = stream.replay.capacity();

        if seq > sent {
            return Err(ResumeRejection::SequenceAhead {
                requested: seq,
                sent,
            });
        }
        if sent - seq > capacity as u64 {
            return Err(ResumeRejection::TooFarBehind {
                requested: seq,
                sent,
                capacity,
            });
        }

        // expiry and invalidation only unlink; they never take this lock
        let claim = registry
            .claim(&self.id, sink.id())
            .ok_or(ResumeRejection::Unregistered)?;

        let summary = match stream.replay_onto(sink, seq, trace) {
            Ok(summary) => summary,
            Err(e) => {
                registry.release_claim(&self.id, sink.id(), claim);
                return Err(e.into());
            }
        };

        // everything is queued; only now does the new connection take over
        if let Some(previous) = stream.sink.replace(sink.clone()) {
            if previous.id() != sink.id() {
                previous.kick(CloseReason::superseded());
            }
        }
        self.mark_ready();

        Ok(summary)
    }
}
