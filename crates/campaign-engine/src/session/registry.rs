use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::engine::Session;

pub type SharedSession = Arc<tokio::sync::Mutex<Session>>;

struct RegistryEntry {
    session: SharedSession,
    created_at: DateTime<Utc>,
    last_active_at: DateTime<Utc>,
}

/// In-memory session table for the HTTP shell. Nothing is persisted; a
/// process restart ends every session.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<Uuid, RegistryEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: Session) -> Uuid {
        let session_id = session.id();
        let now = Utc::now();
        self.lock().insert(
            session_id,
            RegistryEntry {
                session: Arc::new(tokio::sync::Mutex::new(session)),
                created_at: now,
                last_active_at: now,
            },
        );
        session_id
    }

    /// Returns the session handle and marks it active.
    pub fn checkout(&self, session_id: Uuid) -> Option<SharedSession> {
        let mut sessions = self.lock();
        let entry = sessions.get_mut(&session_id)?;
        entry.last_active_at = Utc::now();
        Some(entry.session.clone())
    }

    /// Marks the session active again, typically once a long operation finishes.
    pub fn touch(&self, session_id: Uuid) -> bool {
        match self.lock().get_mut(&session_id) {
            Some(entry) => {
                entry.last_active_at = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, session_id: Uuid) -> bool {
        self.lock().remove(&session_id).is_some()
    }

    /// Drops sessions idle for at least `idle_ttl`. Sessions with a checked-out
    /// handle are in use and always kept. Returns the number removed.
    pub fn purge_idle(&self, now: DateTime<Utc>, idle_ttl: Duration) -> usize {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|session_id, entry| {
            let in_use = Arc::strong_count(&entry.session) > 1;
            let keep = in_use || now - entry.last_active_at < idle_ttl;
            if !keep {
                debug!(
                    session_id = %session_id,
                    created_at = %entry.created_at,
                    last_active_at = %entry.last_active_at,
                    "purging idle campaign session"
                );
            }
            keep
        });
        let purged = before - sessions.len();
        if purged > 0 {
            info!(purged, remaining = sessions.len(), "idle session purge tick");
        }
        purged
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, RegistryEntry>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
