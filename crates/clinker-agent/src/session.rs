//! In-memory conversation sessions.
//!
//! The store owns every active [`ChatSession`], caps each session's history,
//! and evicts sessions idle beyond the configured TTL. Eviction runs from a
//! single background sweeper started with [`SessionStore::start`] and
//! stopped with [`SessionStore::stop`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use clinker_core::config::SessionConfig;

use crate::error::ChatError;
use crate::types::{ChatSession, Message, MessageRole, Metadata, SessionStats, SessionSummary};

/// Handle on the running sweep task.
struct Sweeper {
    handle: JoinHandle<()>,
    shutdown: Arc<Notify>,
}

/// Thread-safe session table with bounded history and TTL eviction.
pub struct SessionStore {
    sessions: Mutex<HashMap<Uuid, ChatSession>>,
    config: SessionConfig,
    sweeper: Mutex<Option<Sweeper>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl SessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            config,
            sweeper: Mutex::new(None),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<Uuid, ChatSession>>, ChatError> {
        self.sessions
            .lock()
            .map_err(|e| ChatError::StorageError(format!("Lock poisoned: {}", e)))
    }

    fn touch(session: &mut ChatSession, now: DateTime<Utc>) {
        if now > session.last_activity_at {
            session.last_activity_at = now;
        }
    }

    // =========================================================================
    // CRUD
    // =========================================================================

    /// Open a new empty session.
    pub fn create(
        &self,
        user_id: Option<String>,
        facility_id: Option<String>,
        organization_id: Option<String>,
    ) -> Result<Uuid, ChatError> {
        let now = Utc::now();
        let session = ChatSession {
            id: Uuid::new_v4(),
            user_id,
            facility_id,
            organization_id,
            created_at: now,
            last_activity_at: now,
            messages: Vec::new(),
            metadata: Metadata::new(),
        };
        let id = session.id;
        self.lock()?.insert(id, session);
        info!(session_id = %id, "Session created");
        Ok(id)
    }

    /// Fetch a session, marking it active.
    pub fn get(&self, id: Uuid) -> Result<ChatSession, ChatError> {
        let mut sessions = self.lock()?;
        let session = sessions.get_mut(&id).ok_or(ChatError::SessionNotFound(id))?;
        Self::touch(session, Utc::now());
        Ok(session.clone())
    }

    /// Append a message, dropping the oldest beyond the history cap.
    pub fn add_message(
        &self,
        id: Uuid,
        role: MessageRole,
        content: impl Into<String>,
        metadata: Option<Metadata>,
    ) -> Result<Message, ChatError> {
        let now = Utc::now();
        let message = Message {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
            timestamp: now,
            metadata: metadata.unwrap_or_default(),
        };

        let mut sessions = self.lock()?;
        let session = sessions.get_mut(&id).ok_or(ChatError::SessionNotFound(id))?;
        session.messages.push(message.clone());
        let excess = session.messages.len().saturating_sub(self.config.max_messages);
        if excess > 0 {
            session.messages.drain(..excess);
        }
        Self::touch(session, now);

        debug!(
            session_id = %id,
            role = role.as_str(),
            message_count = session.messages.len(),
            "Message added"
        );
        Ok(message)
    }

    /// Messages of a session, oldest first; only the trailing `count` when given.
    pub fn history(&self, id: Uuid, count: Option<usize>) -> Result<Vec<Message>, ChatError> {
        let mut messages = self.get(id)?.messages;
        if let Some(n) = count {
            let skip = messages.len().saturating_sub(n);
            messages.drain(..skip);
        }
        Ok(messages)
    }

    /// Sessions matching every given filter, most recently active first.
    pub fn list(
        &self,
        user_id: Option<&str>,
        facility_id: Option<&str>,
        organization_id: Option<&str>,
    ) -> Vec<SessionSummary> {
        let sessions = match self.sessions.lock() {
            Ok(s) => s,
            Err(_) => return vec![],
        };

        let matches = |wanted: Option<&str>, actual: &Option<String>| match wanted {
            Some(w) => actual.as_deref() == Some(w),
            None => true,
        };

        let mut result: Vec<SessionSummary> = sessions
            .values()
            .filter(|s| {
                matches(user_id, &s.user_id)
                    && matches(facility_id, &s.facility_id)
                    && matches(organization_id, &s.organization_id)
            })
            .map(SessionSummary::from)
            .collect();

        result.sort_by(|a, b| b.last_activity_at.cmp(&a.last_activity_at));
        result
    }

    /// Remove a session. Returns whether it existed.
    pub fn delete(&self, id: Uuid) -> bool {
        let removed = match self.sessions.lock() {
            Ok(mut s) => s.remove(&id).is_some(),
            Err(_) => false,
        };
        if removed {
            info!(session_id = %id, "Session deleted");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> SessionStats {
        let now = Utc::now();
        let window = chrono::Duration::minutes(i64::from(self.config.active_window_minutes));

        let (total_sessions, active_sessions, total_messages) = match self.sessions.lock() {
            Ok(sessions) => (
                sessions.len(),
                sessions
                    .values()
                    .filter(|s| now - s.last_activity_at < window)
                    .count(),
                sessions.values().map(|s| s.messages.len()).sum(),
            ),
            Err(_) => (0, 0, 0),
        };

        SessionStats {
            total_sessions,
            active_sessions,
            total_messages,
            timestamp: now,
        }
    }

    // =========================================================================
    // Expiry
    // =========================================================================

    /// Remove sessions idle longer than the TTL.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    /// Remove sessions idle longer than the TTL as of `now`.
    pub fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let ttl = chrono::Duration::hours(i64::from(self.config.ttl_hours));
        let mut sessions = match self.sessions.lock() {
            Ok(s) => s,
            Err(_) => return 0,
        };
        let before = sessions.len();
        sessions.retain(|_, s| now - s.last_activity_at <= ttl);
        let purged = before - sessions.len();
        drop(sessions);

        if purged > 0 {
            info!(purged, "Expired sessions purged");
        }
        purged
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Spawn the periodic sweep. Returns `false` if it is already running.
    pub fn start(self: &Arc<Self>) -> bool {
        let mut slot = match self.sweeper.lock() {
            Ok(s) => s,
            Err(_) => return false,
        };
        if slot.is_some() {
            debug!("Session sweeper already running");
            return false;
        }

        let shutdown = Arc::new(Notify::new());
        let interval = Duration::from_secs(self.config.sweep_interval_secs.max(1));
        let store = Arc::clone(self);
        let signal = Arc::clone(&shutdown);

        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        store.purge_expired();
                    }
                    _ = signal.notified() => break,
                }
            }
            debug!("Session sweeper stopped");
        });

        *slot = Some(Sweeper { handle, shutdown });
        info!(interval_secs = interval.as_secs(), "Session sweeper started");
        true
    }

    pub fn is_running(&self) -> bool {
        self.sweeper.lock().map(|s| s.is_some()).unwrap_or(false)
    }

    /// Stop the sweep and wait for it to exit. No-op when not running.
    pub async fn stop(&self) {
        let sweeper = match self.sweeper.lock() {
            Ok(mut s) => s.take(),
            Err(_) => None,
        };
        if let Some(Sweeper { handle, shutdown }) = sweeper {
            shutdown.notify_one();
            match handle.await {
                Ok(()) => info!("Session store stopped"),
                Err(e) => warn!(error = %e, "Session sweeper exited abnormally"),
            }
        }
    }
}
