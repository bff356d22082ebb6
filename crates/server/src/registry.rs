//! Concurrency-safe store of live sessions.
//!
//! The accept loop and the console are the only two tasks touching shared
//! state, and everything they share goes through this registry: one lock
//! around the id counter and the session map. Sessions themselves sit behind
//! their own mutexes so the registry lock is never held across command
//! execution.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::channel::SecureChannel;
use crate::session::Session;

/// Registry-assigned session identifier.
pub type SessionId = u64;

/// Shared handle to one session. The console locks it for the duration of a
/// command.
pub type SessionHandle<C = SecureChannel> = Arc<Mutex<Session<C>>>;

/// Mapping from session id to session, with monotonically increasing id
/// assignment. Ids start at 1 and are never reused, even after removal.
pub struct Registry<C = SecureChannel> {
    inner: Mutex<Inner<C>>,
}

struct Inner<C> {
    sessions: BTreeMap<SessionId, SessionHandle<C>>,
    next_id: SessionId,
}

impl<C> Registry<C> {
    /// Creates an empty registry. The first session gets id 1.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                sessions: BTreeMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Allocates the next id and inserts the session built from it, all
    /// under one lock acquisition, so concurrent accepts can never observe
    /// the same id.
    pub async fn insert_with<F>(&self, build: F) -> (SessionId, SessionHandle<C>)
    where
        F: FnOnce(SessionId) -> Session<C>,
    {
        let mut inner = self.inner.lock().await;
        let id = inner.next_id;
        inner.next_id += 1;

        let handle = Arc::new(Mutex::new(build(id)));
        inner.sessions.insert(id, Arc::clone(&handle));
        (id, handle)
    }

    /// Looks up a session by the operator's raw input. Malformed input and
    /// unknown ids are the same observable outcome: not found.
    pub async fn select(&self, raw_id: &str) -> Option<(SessionId, SessionHandle<C>)> {
        let id: SessionId = raw_id.trim().parse().ok()?;
        let inner = self.inner.lock().await;
        inner.sessions.get(&id).map(|handle| (id, Arc::clone(handle)))
    }

    /// Sessions still alive, ascending by id.
    pub async fn list_alive(&self) -> Vec<(SessionId, SocketAddr)> {
        let inner = self.inner.lock().await;
        let mut alive = Vec::with_capacity(inner.sessions.len());
        for (&id, handle) in &inner.sessions {
            let session = handle.lock().await;
            if session.is_alive() {
                alive.push((id, session.addr()));
            }
        }
        alive
    }

    /// Deletes and returns the entry if present. Removing an id twice is
    /// safe; the second call reports not-found.
    pub async fn remove(&self, id: SessionId) -> Option<SessionHandle<C>> {
        self.inner.lock().await.sessions.remove(&id)
    }

    /// Number of registered sessions, dead or alive.
    pub async fn len(&self) -> usize {
        self.inner.lock().await.sessions.len()
    }

    /// True when no sessions are registered.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl<C> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MockChannel;

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::from(([198, 51, 100, 1], port))
    }

    async fn connect(registry: &Registry<MockChannel>, port: u16) -> SessionId {
        let (id, _) = registry
            .insert_with(|id| Session::new(id, addr(port), MockChannel::default()))
            .await;
        id
    }

    #[tokio::test]
    async fn ids_start_at_one_and_increase() {
        let registry = Registry::new();
        assert_eq!(connect(&registry, 1000).await, 1);
        assert_eq!(connect(&registry, 1001).await, 2);
        assert_eq!(connect(&registry, 1002).await, 3);
    }

    #[tokio::test]
    async fn ids_are_never_reused_after_removal() {
        let registry = Registry::new();
        let first = connect(&registry, 1000).await;
        let second = connect(&registry, 1001).await;

        registry.remove(first).await.unwrap();
        registry.remove(second).await.unwrap();
        assert!(registry.is_empty().await);

        assert_eq!(connect(&registry, 1002).await, 3);
    }

    #[tokio::test]
    async fn select_parses_and_looks_up() {
        let registry = Registry::new();
        let id = connect(&registry, 1000).await;

        let (found, _) = registry.select(&id.to_string()).await.unwrap();
        assert_eq!(found, id);

        // Leading/trailing whitespace in operator input is tolerated.
        assert!(registry.select(" 1 ").await.is_some());
    }

    #[tokio::test]
    async fn select_not_found_for_malformed_unknown_and_removed() {
        let registry = Registry::new();
        let id = connect(&registry, 1000).await;

        assert!(registry.select("bogus").await.is_none());
        assert!(registry.select("").await.is_none());
        assert!(registry.select("42").await.is_none());

        registry.remove(id).await.unwrap();
        assert!(registry.select(&id.to_string()).await.is_none());
    }

    #[tokio::test]
    async fn remove_is_idempotent() {
        let registry = Registry::new();
        let id = connect(&registry, 1000).await;

        assert!(registry.remove(id).await.is_some());
        assert!(registry.remove(id).await.is_none());
    }

    #[tokio::test]
    async fn list_alive_is_ascending_and_filters_dead() {
        let registry = Registry::new();
        for port in [1000, 1001, 1002] {
            connect(&registry, port).await;
        }

        // Kill session 2 without removing it.
        let (_, handle) = registry.select("2").await.unwrap();
        handle.lock().await.send("kill").await.unwrap();

        let alive = registry.list_alive().await;
        let ids: Vec<_> = alive.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![1, 3]);
        assert_eq!(alive[0].1, addr(1000));
        assert_eq!(alive[1].1, addr(1002));
    }
}
