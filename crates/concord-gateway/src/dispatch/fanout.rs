//! Fan-out engine

use std::sync::Arc;

use concord_core::Snowflake;
use serde_json::Value;

use super::WatcherSet;
use crate::connection::DeliveryError;
use crate::events::GatewayEventType;
use crate::session::{DeliveryOutcome, Session, SessionRegistry};

/// Who an event is for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchScope {
    /// One session
    Session(String),
    /// Every session of a user; with a guild, only the shard owning it
    User {
        user_id: Snowflake,
        guild_id: Option<Snowflake>,
    },
    /// Every current watcher of a guild
    Guild(Snowflake),
    /// Every session
    Global,
}

/// Outcome of one dispatch, summed over its targets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub targeted: usize,
    pub delivered: usize,
    pub buffered: usize,
    pub failed: usize,
}

impl DispatchReport {
    fn record(&mut self, result: Result<DeliveryOutcome, DeliveryError>) {
        self.targeted += 1;
        match result {
            Ok(DeliveryOutcome::Delivered(_)) => self.delivered += 1,
            Ok(DeliveryOutcome::Buffered(_)) => self.buffered += 1,
            Err(_) => self.failed += 1,
        }
    }

    fn merge(&mut self, other: Self) {
        self.targeted += other.targeted;
        self.delivered += other.delivered;
        self.buffered += other.buffered;
        self.failed += other.failed;
    }
}

/// Routes events to sessions
pub struct Dispatcher {
    registry: Arc<SessionRegistry>,
    watchers: Arc<WatcherSet>,
}

impl Dispatcher {
    pub fn new(registry: Arc<SessionRegistry>, watchers: Arc<WatcherSet>) -> Self {
        Self { registry, watchers }
    }

    pub fn watchers(&self) -> &WatcherSet {
        &self.watchers
    }

    /// Deliver an event to every session in scope
    ///
    /// Delivery failures are logged and counted, never returned. In guild
    /// scope a watcher that could not be reached on any session is
    /// unmarked; a later resume or sync marks them again.
    pub async fn dispatch(
        &self,
        scope: DispatchScope,
        event: GatewayEventType,
        data: Value,
    ) -> DispatchReport {
        let report = match &scope {
            DispatchScope::Session(session_id) => {
                let targets = self.registry.get(session_id).into_iter().collect();
                self.deliver_all(targets, event, &data).await.0
            }
            DispatchScope::User { user_id, guild_id } => {
                let targets = self.user_targets(*user_id, *guild_id);
                self.deliver_all(targets, event, &data).await.0
            }
            DispatchScope::Guild(guild_id) => self.dispatch_guild(*guild_id, event, &data).await,
            DispatchScope::Global => {
                self.deliver_all(self.registry.all(), event, &data).await.0
            }
        };

        if report.failed > 0 {
            tracing::warn!(
                event = %event,
                scope = ?scope,
                targeted = report.targeted,
                failed = report.failed,
                "Dispatch partially failed"
            );
        } else {
            tracing::trace!(
                event = %event,
                scope = ?scope,
                delivered = report.delivered,
                buffered = report.buffered,
                "Dispatched"
            );
        }

        report
    }

    async fn dispatch_guild(
        &self,
        guild_id: Snowflake,
        event: GatewayEventType,
        data: &Value,
    ) -> DispatchReport {
        let mut report = DispatchReport::default();

        for user_id in self.watchers.watchers(guild_id) {
            let (user_report, pending) = self
                .deliver_all(self.user_targets(user_id, Some(guild_id)), event, data)
                .await;
            let reached = user_report.delivered + user_report.buffered > 0;

            if !reached && !pending {
                self.watchers.unmark(guild_id, user_id);
                tracing::debug!(
                    guild_id = %guild_id,
                    user_id = %user_id,
                    "Watcher unreachable, unmarked"
                );
            }
            report.merge(user_report);
        }

        report
    }

    /// Sessions of a user responsible for a guild
    fn user_targets(&self, user_id: Snowflake, guild_id: Option<Snowflake>) -> Vec<Arc<Session>> {
        let mut sessions = self.registry.sessions_for_user(user_id);
        if let Some(guild_id) = guild_id {
            sessions.retain(|session| session.shard().owns(guild_id));
        }
        sessions
    }

    /// Push to each ready session in turn; the flag reports whether any
    /// target was skipped because its READY had not gone out yet
    async fn deliver_all(
        &self,
        targets: Vec<Arc<Session>>,
        event: GatewayEventType,
        data: &Value,
    ) -> (DispatchReport, bool) {
        let mut report = DispatchReport::default();
        let mut pending = false;

        for session in targets {
            if !session.is_ready() {
                pending = true;
                continue;
            }
            let result = session.push(event, data.clone()).await;
            if let Err(err) = &result {
                tracing::debug!(
                    session_id = %session.id(),
                    event = %event,
                    error = %err,
                    "Delivery failed"
                );
            }
            report.record(result);
        }

        (report, pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{ConnectionId, ConnectionSink, OutboundQueue};
    use crate::protocol::GatewayMessage;
    use crate::session::{SessionSeed, ShardInfo};
    use concord_core::User;
    use serde_json::{json, Map};

    struct Harness {
        registry: Arc<SessionRegistry>,
        watchers: Arc<WatcherSet>,
        dispatcher: Dispatcher,
    }

    impl Harness {
        fn new() -> Self {
            let registry = Arc::new(SessionRegistry::new(4));
            let watchers = Arc::new(WatcherSet::new());
            let dispatcher = Dispatcher::new(Arc::clone(&registry), Arc::clone(&watchers));
            Self {
                registry,
                watchers,
                dispatcher,
            }
        }

        fn connect(
            &self,
            conn: ConnectionId,
            user_id: i64,
            shard: ShardInfo,
            capacity: usize,
        ) -> (Arc<Session>, ConnectionSink, OutboundQueue) {
            let (sink, rx) = ConnectionSink::new(conn, capacity);
            let seed = SessionSeed {
                token: format!("token-{user_id}"),
                user: User::new(Snowflake::new(user_id), "user", "0001"),
                shard,
                large_threshold: 50,
                properties: Map::new(),
                replay_capacity: 60,
            };
            let session_sink = sink.clone();
            let session = self
                .registry
                .register(conn, move |id| Session::new(id, seed, session_sink))
                .unwrap();
            session.mark_ready();
            (session, sink, rx)
        }
    }

    fn received(rx: &mut OutboundQueue) -> usize {
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    #[tokio::test]
    async fn test_guild_reaches_watchers_only() {
        let h = Harness::new();
        let guild = Snowflake::new(10);
        let (_a, _, mut rx_a) = h.connect(1, 1, ShardInfo::UNSHARDED, 8);
        let (_b, _, mut rx_b) = h.connect(2, 2, ShardInfo::UNSHARDED, 8);
        h.watchers.mark(guild, Snowflake::new(1));

        let report = h
            .dispatcher
            .dispatch(DispatchScope::Guild(guild), GatewayEventType::TypingStart, json!({}))
            .await;

        assert_eq!(report.delivered, 1);
        assert_eq!(received(&mut rx_a), 1);
        assert_eq!(received(&mut rx_b), 0);

        // marking takes effect on the next dispatch
        h.watchers.mark(guild, Snowflake::new(2));
        h.dispatcher
            .dispatch(DispatchScope::Guild(guild), GatewayEventType::TypingStart, json!({}))
            .await;
        assert_eq!(received(&mut rx_b), 1);
    }

    #[tokio::test]
    async fn test_guild_respects_shards() {
        let h = Harness::new();
        let guild = Snowflake::new(11);
        let shard0 = ShardInfo {
            shard_id: 0,
            shard_count: 2,
        };
        let shard1 = ShardInfo {
            shard_id: 1,
            shard_count: 2,
        };
        let (_s0, _, mut rx0) = h.connect(1, 5, shard0, 8);
        let (_s1, _, mut rx1) = h.connect(2, 5, shard1, 8);
        h.watchers.mark(guild, Snowflake::new(5));

        h.dispatcher
            .dispatch(DispatchScope::Guild(guild), GatewayEventType::MessageCreate, json!({}))
            .await;

        assert_eq!(received(&mut rx0), 0);
        assert_eq!(received(&mut rx1), 1);
    }

    #[tokio::test]
    async fn test_dead_watcher_is_unmarked() {
        let h = Harness::new();
        let guild = Snowflake::new(10);
        let (_a, sink, rx) = h.connect(1, 1, ShardInfo::UNSHARDED, 8);
        h.watchers.mark(guild, Snowflake::new(1));
        drop(rx);
        sink.kick(crate::protocol::CloseReason::heartbeat_expired());

        let report = h
            .dispatcher
            .dispatch(DispatchScope::Guild(guild), GatewayEventType::TypingStart, json!({}))
            .await;

        assert_eq!(report.failed, 1);
        assert!(!h.watchers.is_watching(guild, Snowflake::new(1)));
    }

    #[tokio::test]
    async fn test_watcher_without_sessions_is_unmarked() {
        let h = Harness::new();
        let guild = Snowflake::new(10);
        h.watchers.mark(guild, Snowflake::new(42));

        let report = h
            .dispatcher
            .dispatch(DispatchScope::Guild(guild), GatewayEventType::TypingStart, json!({}))
            .await;
        assert_eq!(report.targeted, 0);
        assert!(!h.watchers.is_watching(guild, Snowflake::new(42)));
    }

    #[tokio::test]
    async fn test_detached_session_counts_as_buffered() {
        let h = Harness::new();
        let guild = Snowflake::new(10);
        let (session, sink, _rx) = h.connect(1, 1, ShardInfo::UNSHARDED, 8);
        h.watchers.mark(guild, Snowflake::new(1));
        session.detach(&sink).await;

        let report = h
            .dispatcher
            .dispatch(DispatchScope::Guild(guild), GatewayEventType::TypingStart, json!({}))
            .await;
        assert_eq!(report.buffered, 1);
        assert!(h.watchers.is_watching(guild, Snowflake::new(1)));
    }

    #[tokio::test]
    async fn test_user_and_global_scopes() {
        let h = Harness::new();
        let (_a1, _, mut rx_a1) = h.connect(1, 1, ShardInfo::UNSHARDED, 8);
        let (_a2, _, mut rx_a2) = h.connect(2, 1, ShardInfo::UNSHARDED, 8);
        let (b, _, mut rx_b) = h.connect(3, 2, ShardInfo::UNSHARDED, 8);

        let report = h
            .dispatcher
            .dispatch(
                DispatchScope::User {
                    user_id: Snowflake::new(1),
                    guild_id: None,
                },
                GatewayEventType::UserUpdate,
                json!({}),
            )
            .await;
        assert_eq!(report.delivered, 2);
        assert_eq!(received(&mut rx_a1), 1);
        assert_eq!(received(&mut rx_a2), 1);
        assert_eq!(received(&mut rx_b), 0);

        h.dispatcher
            .dispatch(
                DispatchScope::Session(b.id().to_string()),
                GatewayEventType::UserUpdate,
                json!({}),
            )
            .await;
        assert_eq!(received(&mut rx_b), 1);

        let report = h
            .dispatcher
            .dispatch(DispatchScope::Global, GatewayEventType::UserUpdate, json!({}))
            .await;
        assert_eq!(report.delivered, 3);
    }

    #[tokio::test]
    async fn test_unready_sessions_are_skipped() {
        let h = Harness::new();
        let guild = Snowflake::new(10);
        let (sink, mut rx) = ConnectionSink::new(9, 8);
        let seed = SessionSeed {
            token: "t".to_string(),
            user: User::new(Snowflake::new(3), "user", "0001"),
            shard: ShardInfo::UNSHARDED,
            large_threshold: 50,
            properties: Map::new(),
            replay_capacity: 60,
        };
        h.registry
            .register(9, move |id| Session::new(id, seed, sink))
            .unwrap();
        h.watchers.mark(guild, Snowflake::new(3));

        let report = h
            .dispatcher
            .dispatch(DispatchScope::Guild(guild), GatewayEventType::PresenceUpdate, json!({}))
            .await;
        assert_eq!(report.targeted, 0);
        assert_eq!(received(&mut rx), 0);
        // still a watcher, its READY is on the way
        assert!(h.watchers.is_watching(guild, Snowflake::new(3)));
    }
}
