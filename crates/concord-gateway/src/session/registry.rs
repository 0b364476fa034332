//! Session registry
//!
//! Process-wide index of live sessions: by session id, by token and by
//! user. One `RwLock` guards all three maps so every insert, hand-off and
//! removal is atomic with respect to dispatch lookups.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use concord_core::Snowflake;
use parking_lot::RwLock;
use tokio::time::Instant;

use super::Session;
use crate::connection::ConnectionId;

/// Registry failures
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("could not allocate a unique session id after {attempts} attempts")]
    IdExhausted { attempts: u32 },
}

type IdSource = Box<dyn Fn() -> String + Send + Sync>;

/// Random 32-hex-digit session id
pub fn random_session_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Registry state displaced by [`SessionRegistry::claim`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Claim {
    owner: Option<ConnectionId>,
    detached_at: Option<Instant>,
}

struct Entry {
    session: Arc<Session>,
    owner: Option<ConnectionId>,
    detached_at: Option<Instant>,
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, Entry>,
    tokens: HashMap<String, HashSet<String>>,
    by_user: HashMap<Snowflake, HashSet<String>>,
}

impl Inner {
    fn unlink(&mut self, session_id: &str) -> Option<Arc<Session>> {
        let entry = self.sessions.remove(session_id)?;
        let session = entry.session;

        if let Some(ids) = self.tokens.get_mut(session.token()) {
            ids.remove(session_id);
            if ids.is_empty() {
                self.tokens.remove(session.token());
            }
        }
        if let Some(ids) = self.by_user.get_mut(&session.user_id()) {
            ids.remove(session_id);
            if ids.is_empty() {
                self.by_user.remove(&session.user_id());
            }
        }
        Some(session)
    }

    fn user_has_attached(&self, user_id: Snowflake) -> bool {
        self.by_user.get(&user_id).is_some_and(|ids| {
            ids.iter()
                .filter_map(|id| self.sessions.get(id))
                .any(|entry| entry.owner.is_some())
        })
    }
}

/// Shared session index
pub struct SessionRegistry {
    inner: RwLock<Inner>,
    id_attempts: u32,
    id_source: IdSource,
}

impl SessionRegistry {
    pub fn new(id_attempts: u32) -> Self {
        Self::with_id_source(id_attempts, random_session_id)
    }

    /// Registry with a custom session id generator
    pub fn with_id_source(
        id_attempts: u32,
        source: impl Fn() -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            id_attempts: id_attempts.max(1),
            id_source: Box::new(source),
        }
    }

    /// Allocate an id, build the session and index it, atomically
    pub fn register(
        &self,
        owner: ConnectionId,
        build: impl FnOnce(String) -> Session,
    ) -> Result<Arc<Session>, RegistryError> {
        let mut inner = self.inner.write();

        let id = (0..self.id_attempts)
            .map(|_| (self.id_source)())
            .find(|candidate| !inner.sessions.contains_key(candidate))
            .ok_or(RegistryError::IdExhausted {
                attempts: self.id_attempts,
            })?;

        let session = Arc::new(build(id.clone()));
        inner
            .tokens
            .entry(session.token().to_string())
            .or_default()
            .insert(id.clone());
        inner
            .by_user
            .entry(session.user_id())
            .or_default()
            .insert(id.clone());
        inner.sessions.insert(
            id,
            Entry {
                session: Arc::clone(&session),
                owner: Some(owner),
                detached_at: None,
            },
        );

        Ok(session)
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<Session>> {
        self.inner
            .read()
            .sessions
            .get(session_id)
            .map(|entry| Arc::clone(&entry.session))
    }

    /// Whether the token index maps `token` to this session
    pub fn token_matches(&self, token: &str, session_id: &str) -> bool {
        self.inner
            .read()
            .tokens
            .get(token)
            .is_some_and(|ids| ids.contains(session_id))
    }

    /// Connection currently holding a session
    pub fn owner(&self, session_id: &str) -> Option<ConnectionId> {
        self.inner
            .read()
            .sessions
            .get(session_id)
            .and_then(|entry| entry.owner)
    }

    /// Every session of a user, attached or awaiting resume
    pub fn sessions_for_user(&self, user_id: Snowflake) -> Vec<Arc<Session>> {
        let inner = self.inner.read();
        inner
            .by_user
            .get(&user_id)
            .into_iter()
            .flatten()
            .filter_map(|id| inner.sessions.get(id))
            .map(|entry| Arc::clone(&entry.session))
            .collect()
    }

    /// A user is online while any of their sessions has a connection
    pub fn is_online(&self, user_id: Snowflake) -> bool {
        self.inner.read().user_has_attached(user_id)
    }

    pub fn all(&self) -> Vec<Arc<Session>> {
        self.inner
            .read()
            .sessions
            .values()
            .map(|entry| Arc::clone(&entry.session))
            .collect()
    }

    /// Hand a session to a connection
    ///
    /// `None` when the session is no longer registered. The entry stops
    /// aging as soon as it is claimed, so expiry cannot race the hand-off.
    pub fn claim(&self, session_id: &str, owner: ConnectionId) -> Option<Claim> {
        let mut inner = self.inner.write();
        let entry = inner.sessions.get_mut(session_id)?;
        let previous = Claim {
            owner: entry.owner,
            detached_at: entry.detached_at,
        };
        entry.owner = Some(owner);
        entry.detached_at = None;
        Some(previous)
    }

    /// Undo a claim whose hand-off failed, unless someone else took over
    pub fn release_claim(&self, session_id: &str, owner: ConnectionId, claim: Claim) {
        let mut inner = self.inner.write();
        if let Some(entry) = inner.sessions.get_mut(session_id) {
            if entry.owner == Some(owner) {
                entry.owner = claim.owner;
                entry.detached_at = claim.detached_at;
            }
        }
    }

    /// Release a session from the connection that owns it
    ///
    /// Has no effect if another connection took the session over. Returns
    /// `true` when this left the user with no attached session.
    pub fn detach(&self, session_id: &str, owner: ConnectionId) -> bool {
        let mut inner = self.inner.write();
        let user_id = match inner.sessions.get_mut(session_id) {
            Some(entry) if entry.owner == Some(owner) => {
                entry.owner = None;
                entry.detached_at = Some(Instant::now());
                entry.session.user_id()
            }
            _ => return false,
        };
        !inner.user_has_attached(user_id)
    }

    /// Remove a session for good
    pub fn invalidate(&self, session_id: &str) -> Option<Arc<Session>> {
        self.inner.write().unlink(session_id)
    }

    /// Remove sessions detached for longer than `window`
    pub fn expire_detached(&self, window: Duration) -> Vec<Arc<Session>> {
        let mut inner = self.inner.write();
        let now = Instant::now();
        let stale: Vec<String> = inner
            .sessions
            .iter()
            .filter(|(_, entry)| {
                entry
                    .detached_at
                    .is_some_and(|at| now.duration_since(at) >= window)
            })
            .map(|(id, _)| id.clone())
            .collect();

        stale.iter().filter_map(|id| inner.unlink(id)).collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::ConnectionSink;
    use crate::session::{SessionSeed, ShardInfo};
    use concord_core::User;
    use serde_json::Map;

    fn build(user_id: i64, owner: ConnectionId) -> impl FnOnce(String) -> Session {
        move |id| {
            let (sink, _rx) = ConnectionSink::new(owner, 8);
            let seed = SessionSeed {
                token: format!("token-{user_id}"),
                user: User::new(Snowflake::new(user_id), "user", "0001"),
                shard: ShardInfo::UNSHARDED,
                large_threshold: 50,
                properties: Map::new(),
                replay_capacity: 60,
            };
            Session::new(id, seed, sink)
        }
    }

    #[test]
    fn test_random_ids_are_hex() {
        let id = random_session_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_register_indexes_everything() {
        let registry = SessionRegistry::new(4);
        let session = registry.register(1, build(7, 1)).unwrap();

        assert!(Arc::ptr_eq(&registry.get(session.id()).unwrap(), &session));
        assert!(registry.token_matches("token-7", session.id()));
        assert!(!registry.token_matches("token-8", session.id()));
        assert_eq!(registry.sessions_for_user(Snowflake::new(7)).len(), 1);
        assert!(registry.is_online(Snowflake::new(7)));
        assert_eq!(registry.owner(session.id()), Some(1));
    }

    #[tokio::test]
    async fn test_id_exhaustion() {
        let registry = SessionRegistry::with_id_source(3, || "same".to_string());
        registry.register(1, build(1, 1)).unwrap();
        assert_eq!(
            registry.register(2, build(2, 2)).unwrap_err(),
            RegistryError::IdExhausted { attempts: 3 }
        );
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_detach_is_owner_checked() {
        let registry = SessionRegistry::new(4);
        let first = registry.register(1, build(7, 1)).unwrap();
        let second = registry.register(2, build(7, 2)).unwrap();

        // another connection does not own it
        assert!(!registry.detach(first.id(), 99));
        assert!(!registry.detach(first.id(), 1));
        assert!(registry.is_online(Snowflake::new(7)));

        assert!(registry.detach(second.id(), 2));
        assert!(!registry.is_online(Snowflake::new(7)));
        // a second detach changes nothing
        assert!(!registry.detach(second.id(), 2));

        assert_eq!(registry.sessions_for_user(Snowflake::new(7)).len(), 2);
    }

    #[tokio::test]
    async fn test_claim_after_takeover_ignores_old_owner() {
        let registry = SessionRegistry::new(4);
        let session = registry.register(1, build(7, 1)).unwrap();
        assert!(registry.claim(session.id(), 2).is_some());
        assert!(!registry.detach(session.id(), 1));
        assert_eq!(registry.owner(session.id()), Some(2));

        assert!(registry.claim("missing", 3).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_released_claim_restores_detached_state() {
        let registry = SessionRegistry::new(4);
        let session = registry.register(1, build(7, 1)).unwrap();
        registry.detach(session.id(), 1);

        let claim = registry.claim(session.id(), 2).unwrap();
        tokio::time::advance(Duration::from_secs(121)).await;
        // a claimed session does not expire
        assert!(registry.expire_detached(Duration::from_secs(120)).is_empty());

        registry.release_claim(session.id(), 2, claim);
        assert_eq!(registry.owner(session.id()), None);
        // the original detach time is kept
        assert_eq!(registry.expire_detached(Duration::from_secs(120)).len(), 1);
    }

    #[tokio::test]
    async fn test_release_claim_after_takeover_is_ignored() {
        let registry = SessionRegistry::new(4);
        let session = registry.register(1, build(7, 1)).unwrap();
        let claim = registry.claim(session.id(), 2).unwrap();
        registry.claim(session.id(), 3);

        registry.release_claim(session.id(), 2, claim);
        assert_eq!(registry.owner(session.id()), Some(3));
    }

    #[tokio::test]
    async fn test_invalidate_unlinks_indexes() {
        let registry = SessionRegistry::new(4);
        let session = registry.register(1, build(7, 1)).unwrap();

        assert!(registry.invalidate(session.id()).is_some());
        assert!(registry.invalidate(session.id()).is_none());
        assert!(registry.get(session.id()).is_none());
        assert!(!registry.token_matches("token-7", session.id()));
        assert!(registry.sessions_for_user(Snowflake::new(7)).is_empty());
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expire_detached() {
        let registry = SessionRegistry::new(4);
        let kept = registry.register(1, build(1, 1)).unwrap();
        let dropped = registry.register(2, build(2, 2)).unwrap();
        registry.detach(dropped.id(), 2);

        tokio::time::advance(Duration::from_secs(60)).await;
        assert!(registry.expire_detached(Duration::from_secs(120)).is_empty());

        tokio::time::advance(Duration::from_secs(61)).await;
        let expired = registry.expire_detached(Duration::from_secs(120));
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id(), dropped.id());
        assert!(registry.get(kept.id()).is_some());
    }
}
