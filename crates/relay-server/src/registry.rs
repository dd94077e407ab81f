use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use relay_core::SessionId;

/// Tracks one in-flight stream.
struct ActiveSession {
    cancel: CancellationToken,
    last_activity: DateTime<Utc>,
}

/// Registry of sessions with an active stream.
///
/// A session exists here from just before its stream's first await point
/// until teardown; every termination path (done, error, interrupt, client
/// disconnect, idle eviction) routes through [`SessionRegistry::end`], which
/// is idempotent.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, ActiveSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session and hand back its cancellation token. Re-registering
    /// an id replaces the previous entry, cancelling its token first.
    pub fn register(&self, id: SessionId) -> CancellationToken {
        let cancel = CancellationToken::new();
        if let Some(previous) = self.sessions.insert(
            id,
            ActiveSession {
                cancel: cancel.clone(),
                last_activity: Utc::now(),
            },
        ) {
            previous.cancel.cancel();
        }
        cancel
    }

    /// Record activity on a session, deferring idle eviction.
    pub fn touch(&self, id: &SessionId) {
        if let Some(mut session) = self.sessions.get_mut(id) {
            session.last_activity = Utc::now();
        }
    }

    /// Signal cancellation for an active session. Returns false when the id
    /// is unknown or already torn down.
    pub fn interrupt(&self, id: &SessionId) -> bool {
        match self.sessions.get(id) {
            Some(session) => {
                session.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Idempotent teardown. Returns whether the session was still present.
    pub fn end(&self, id: &SessionId) -> bool {
        match self.sessions.remove(id) {
            Some((_, session)) => {
                session.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn list(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.sessions.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }

    /// Cancel and remove sessions idle longer than `max_idle`. Returns the
    /// number evicted.
    pub fn evict_idle(&self, max_idle: Duration) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(max_idle).unwrap_or_else(|_| chrono::Duration::hours(1));
        let stale: Vec<SessionId> = self
            .sessions
            .iter()
            .filter(|e| e.value().last_activity < cutoff)
            .map(|e| e.key().clone())
            .collect();
        for id in &stale {
            tracing::info!(session_id = %id, "Evicting idle session");
            self.end(id);
        }
        stale.len()
    }
}

/// Periodically evict idle sessions.
pub fn start_eviction_task(
    registry: Arc<SessionRegistry>,
    interval: Duration,
    max_idle: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let evicted = registry.evict_idle(max_idle);
            if evicted > 0 {
                tracing::info!(evicted, "Idle session sweep");
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_and_list() {
        let registry = SessionRegistry::new();
        let a = SessionId::new();
        let b = SessionId::new();
        registry.register(a.clone());
        registry.register(b.clone());

        assert_eq!(registry.count(), 2);
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(registry.list(), expected);
    }

    #[test]
    fn interrupt_fires_cancellation() {
        let registry = SessionRegistry::new();
        let id = SessionId::new();
        let cancel = registry.register(id.clone());

        assert!(!cancel.is_cancelled());
        assert!(registry.interrupt(&id));
        assert!(cancel.is_cancelled());
        // Interrupted sessions stay registered until teardown runs.
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn interrupt_unknown_session_is_false() {
        let registry = SessionRegistry::new();
        assert!(!registry.interrupt(&SessionId::new()));
    }

    #[test]
    fn end_is_idempotent() {
        let registry = SessionRegistry::new();
        let id = SessionId::new();
        let cancel = registry.register(id.clone());

        assert!(registry.end(&id));
        assert!(cancel.is_cancelled());
        assert!(!registry.end(&id));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn reregister_cancels_previous() {
        let registry = SessionRegistry::new();
        let id = SessionId::new();
        let first = registry.register(id.clone());
        let second = registry.register(id.clone());

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn evict_idle_only_removes_stale() {
        let registry = SessionRegistry::new();
        let fresh = SessionId::new();
        registry.register(fresh.clone());

        // Nothing is older than an hour.
        assert_eq!(registry.evict_idle(Duration::from_secs(3600)), 0);
        assert_eq!(registry.count(), 1);

        // Zero tolerance evicts everything.
        assert_eq!(registry.evict_idle(Duration::ZERO), 1);
        assert_eq!(registry.count(), 0);
    }
}
