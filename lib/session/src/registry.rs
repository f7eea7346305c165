//! The session registry.
//!
//! The registry owns every live bot connection in the process. The session
//! table is only reachable through check-and-insert and mark-then-remove
//! operations under one lock, and the lock is never held across an await.
//!
//! `start` performs the handshake before touching the table, so concurrent
//! starts for the same bot may all connect; only the first to insert wins and
//! the others disconnect their handles. `stop` marks the entry as stopping,
//! disconnects outside the lock, then removes the entry whatever the
//! disconnect outcome. A stopping entry still occupies its id for `start` but
//! is hidden from `list` and `get`.

use crate::client::{BotClient, BotConnector, BotIdentity};
use crate::error::SessionError;
use botdeck_core::{BotId, BotToken};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Running,
    Stopping,
}

struct Session {
    client: Arc<dyn BotClient>,
    state: SessionState,
}

type SessionTable = Mutex<HashMap<BotId, Session>>;

/// Removes a stopping entry when dropped, so a cancelled `stop` cannot leave
/// it behind.
struct Removal<'a> {
    sessions: &'a SessionTable,
    id: BotId,
}

impl Drop for Removal<'_> {
    fn drop(&mut self) {
        self.sessions.lock().remove(&self.id);
    }
}

/// Owner of the live bot sessions in this process.
pub struct SessionRegistry {
    connector: Arc<dyn BotConnector>,
    sessions: SessionTable,
}

impl SessionRegistry {
    /// Creates an empty registry that connects through `connector`.
    #[must_use]
    pub fn new(connector: Arc<dyn BotConnector>) -> Self {
        Self {
            connector,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Connects with `token` and registers the session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ConnectFailed`] if the handshake fails and
    /// [`SessionError::AlreadyRunning`] if a session for the same bot was
    /// registered first. In both cases nothing is left registered by this
    /// call.
    pub async fn start(&self, token: &BotToken) -> Result<BotIdentity, SessionError> {
        let client = self.connector.connect(token).await.map_err(|source| {
            tracing::warn!(error = %source, "bot handshake failed");
            SessionError::ConnectFailed { source }
        })?;
        let identity = client.identity().clone();

        let inserted = match self.sessions.lock().entry(identity.id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Session {
                    client: Arc::clone(&client),
                    state: SessionState::Running,
                });
                true
            }
        };

        if !inserted {
            tracing::info!(bot_id = %identity.id, "bot already running, releasing duplicate");
            if let Err(e) = client.disconnect().await {
                tracing::warn!(bot_id = %identity.id, error = %e, "duplicate disconnect failed");
            }
            return Err(SessionError::AlreadyRunning { id: identity.id });
        }

        tracing::info!(bot_id = %identity.id, name = %identity.display_name, "bot session started");
        Ok(identity)
    }

    /// Disconnects and removes the session for `id`.
    ///
    /// Returns `false` if no running session exists. The entry is removed even
    /// when the disconnect fails.
    pub async fn stop(&self, id: BotId) -> bool {
        let client = {
            let mut sessions = self.sessions.lock();
            match sessions.get_mut(&id) {
                Some(session) if session.state == SessionState::Running => {
                    session.state = SessionState::Stopping;
                    Arc::clone(&session.client)
                }
                _ => return false,
            }
        };
        let _removal = Removal {
            sessions: &self.sessions,
            id,
        };

        if let Err(e) = client.disconnect().await {
            tracing::warn!(bot_id = %id, error = %e, "bot disconnect failed, removing anyway");
        }
        tracing::info!(bot_id = %id, "bot session stopped");
        true
    }

    /// Snapshot of running sessions, ordered by id.
    #[must_use]
    pub fn list(&self) -> Vec<BotIdentity> {
        let mut running: Vec<BotIdentity> = self
            .sessions
            .lock()
            .values()
            .filter(|session| session.state == SessionState::Running)
            .map(|session| session.client.identity().clone())
            .collect();
        running.sort_by_key(|identity| identity.id);
        running
    }

    /// Returns the live client for `id`, if it is running.
    #[must_use]
    pub fn get(&self, id: BotId) -> Option<Arc<dyn BotClient>> {
        self.sessions
            .lock()
            .get(&id)
            .filter(|session| session.state == SessionState::Running)
            .map(|session| Arc::clone(&session.client))
    }

    /// Stops every running session. Returns how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let ids: Vec<BotId> = self.list().into_iter().map(|identity| identity.id).collect();
        let stopped = futures::future::join_all(ids.into_iter().map(|id| self.stop(id))).await;
        stopped.into_iter().filter(|stopped| *stopped).count()
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("sessions", &self.sessions.lock().len())
            .finish_non_exhaustive()
    }
}
