// Client session: one authenticated platform connection and its workload.

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use super::stats::{StatsCollector, StatsSnapshot};
use crate::error::{Error, Result};
use crate::source::traits::ChunkSource;

/// Fixed id of the primary session.
pub const PRIMARY_SESSION_ID: &str = "primary";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionRole {
    /// Also owns catalog ingestion. At most one per pool.
    Primary,
    Worker,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Created,
    Starting,
    Running,
    Stopping,
    Stopped,
    Failed,
}

/// Derive the stable session id for a credential.
///
/// Workers get `worker_` followed by the first 8 hex digits of the credential's
/// SHA-256, so the same credential always maps to the same id.
pub fn session_id_for(credential: &str, role: SessionRole) -> String {
    match role {
        SessionRole::Primary => PRIMARY_SESSION_ID.to_string(),
        SessionRole::Worker => {
            let digest = Sha256::digest(credential.as_bytes());
            format!("worker_{}", &hex::encode(digest)[..8])
        }
    }
}

/// Observable view of a session, as served by `GET /sessions`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStatus {
    pub id: String,
    pub role: SessionRole,
    pub state: SessionState,
    pub workload: u32,
    pub capacity: u32,
    pub available: bool,
    pub last_error: Option<String>,
    pub stats: StatsSnapshot,
}

pub struct Session {
    id: String,
    role: SessionRole,
    capacity: u32,
    source: Arc<dyn ChunkSource>,
    state: Mutex<SessionState>,
    workload: AtomicU32,
    last_error: Mutex<Option<String>>,
    stats: Arc<StatsCollector>,
}

impl Session {
    /// Create a session for `credential`, deriving its id from the credential and role.
    pub fn new(
        credential: &str,
        role: SessionRole,
        source: Arc<dyn ChunkSource>,
        capacity: u32,
    ) -> Result<Self> {
        if credential.trim().is_empty() {
            return Err(Error::Configuration(format!(
                "empty credential for {:?} session",
                role
            )));
        }
        Ok(Self::with_id(
            session_id_for(credential, role),
            role,
            source,
            capacity,
        ))
    }

    /// Create a session under a caller-chosen id.
    pub fn with_id(
        id: impl Into<String>,
        role: SessionRole,
        source: Arc<dyn ChunkSource>,
        capacity: u32,
    ) -> Self {
        Self {
            id: id.into(),
            role,
            capacity,
            source,
            state: Mutex::new(SessionState::Created),
            workload: AtomicU32::new(0),
            last_error: Mutex::new(None),
            stats: Arc::new(StatsCollector::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> SessionRole {
        self.role
    }

    pub fn is_primary(&self) -> bool {
        self.role == SessionRole::Primary
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn workload(&self) -> u32 {
        self.workload.load(Ordering::Acquire)
    }

    pub fn source(&self) -> &Arc<dyn ChunkSource> {
        &self.source
    }

    pub fn stats(&self) -> &Arc<StatsCollector> {
        &self.stats
    }

    /// Message of the most recent failed start, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn is_running(&self) -> bool {
        self.state() == SessionState::Running
    }

    /// Running and below its capacity ceiling.
    pub fn is_available(&self) -> bool {
        self.is_running() && self.workload() < self.capacity
    }

    pub fn increment_workload(&self) {
        self.workload.fetch_add(1, Ordering::AcqRel);
    }

    /// Take one unit of workload if the session is running and below capacity.
    ///
    /// The capacity check and the increment are one atomic step, so concurrent
    /// callers cannot push the workload past the ceiling.
    pub fn try_reserve(&self) -> bool {
        self.is_running()
            && self
                .workload
                .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
                    (w < self.capacity).then_some(w + 1)
                })
                .is_ok()
    }

    /// Floors at zero so a stray double release cannot wrap the counter.
    pub fn decrement_workload(&self) {
        let _ = self
            .workload
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
                Some(w.saturating_sub(1))
            });
    }

    /// Connect the underlying client. On failure the session is left `Failed`.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            match *state {
                SessionState::Running | SessionState::Starting => return Ok(()),
                _ => *state = SessionState::Starting,
            }
        }

        match self.source.connect().await {
            Ok(()) => {
                *self.state.lock() = SessionState::Running;
                *self.last_error.lock() = None;
                info!("session {} started", self.id);
                Ok(())
            }
            Err(e) => {
                error!("session {} failed to start: {}", self.id, e);
                *self.state.lock() = SessionState::Failed;
                *self.last_error.lock() = Some(e.to_string());
                Err(Error::SessionStart {
                    id: self.id.clone(),
                    source: e,
                })
            }
        }
    }

    /// Ensure the client is disconnected. Safe to call repeatedly.
    ///
    /// A `Failed` session stays `Failed` so the failure remains visible.
    pub async fn stop(&self) {
        let prior = {
            let mut state = self.state.lock();
            match *state {
                SessionState::Stopped => return,
                SessionState::Created => {
                    *state = SessionState::Stopped;
                    return;
                }
                SessionState::Failed => SessionState::Failed,
                other => {
                    *state = SessionState::Stopping;
                    other
                }
            }
        };

        if let Err(e) = self.source.disconnect().await {
            warn!("session {} disconnect failed: {}", self.id, e);
        }

        if prior != SessionState::Failed {
            *self.state.lock() = SessionState::Stopped;
            info!("session {} stopped", self.id);
        } else {
            debug!("session {} disconnected, staying failed", self.id);
        }
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            id: self.id.clone(),
            role: self.role,
            state: self.state(),
            workload: self.workload(),
            capacity: self.capacity,
            available: self.is_available(),
            last_error: self.last_error(),
            stats: self.stats.snapshot(),
        }
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("state", &self.state())
            .field("workload", &self.workload())
            .finish()
    }
}

/// Holds one unit of workload on a session, released on drop.
pub struct WorkloadGuard {
    session: Arc<Session>,
}

impl WorkloadGuard {
    pub fn new(session: Arc<Session>) -> Self {
        session.increment_workload();
        Self { session }
    }

    /// Reserve a unit on `session`, or `None` if it is stopped or full.
    pub fn try_new(session: Arc<Session>) -> Option<Self> {
        session.try_reserve().then(|| Self { session })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }
}

impl Drop for WorkloadGuard {
    fn drop(&mut self) {
        self.session.decrement_workload();
    }
}
