// Session pool: registry of client sessions with load-aware selection.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;
use rand::seq::IndexedRandom;
use tracing::{debug, info, warn};

use super::session::{Session, SessionRole, SessionState, WorkloadGuard};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::source::traits::ChunkSource;

/// Builds the platform client for one credential.
pub trait Connector: Send + Sync {
    fn client_for(&self, credential: &str, role: SessionRole) -> anyhow::Result<Arc<dyn ChunkSource>>;
}

impl<F> Connector for F
where
    F: Fn(&str, SessionRole) -> anyhow::Result<Arc<dyn ChunkSource>> + Send + Sync,
{
    fn client_for(&self, credential: &str, role: SessionRole) -> anyhow::Result<Arc<dyn ChunkSource>> {
        self(credential, role)
    }
}

/// Outcome of [`SessionPool::start_all`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartReport {
    pub started: usize,
    pub failed: usize,
}

impl StartReport {
    pub fn total(&self) -> usize {
        self.started + self.failed
    }
}

/// Process-scoped registry of sessions.
///
/// Selection works on a snapshot of the map, so registration may run alongside
/// steady-state `select` calls.
#[derive(Default)]
pub struct SessionPool {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    primary: RwLock<Option<Arc<Session>>>,
    config_rejections: AtomicUsize,
}

impl SessionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a pool from the configured credentials.
    ///
    /// A bad primary credential is fatal. Bad worker credentials are logged and
    /// counted in [`config_rejections`](Self::config_rejections).
    pub fn from_config(config: &EngineConfig, connector: &dyn Connector) -> Result<Self> {
        let pool = Self::new();
        let capacity = config.session_capacity;

        let primary_client = connector
            .client_for(&config.primary_credential, SessionRole::Primary)
            .map_err(|e| Error::Configuration(format!("primary client: {}", e)))?;
        let primary = Session::new(
            &config.primary_credential,
            SessionRole::Primary,
            primary_client,
            capacity,
        )?;
        pool.register(primary)?;

        for credential in &config.worker_credentials {
            let registered = connector
                .client_for(credential, SessionRole::Worker)
                .map_err(|e| Error::Configuration(format!("worker client: {}", e)))
                .and_then(|client| Session::new(credential, SessionRole::Worker, client, capacity))
                .and_then(|session| pool.register(session));
            if let Err(e) = registered {
                warn!("worker credential rejected: {}", e);
                pool.config_rejections.fetch_add(1, Ordering::Relaxed);
            }
        }

        info!(
            "session pool configured with {} sessions ({} rejected)",
            pool.len(),
            pool.config_rejections()
        );
        Ok(pool)
    }

    /// Add a session, enforcing unique ids and a single primary.
    pub fn register(&self, session: Session) -> Result<Arc<Session>> {
        let mut sessions = self.sessions.write();
        if sessions.contains_key(session.id()) {
            return Err(Error::DuplicateSession(session.id().to_string()));
        }

        let session = Arc::new(session);
        if session.is_primary() {
            let mut primary = self.primary.write();
            if let Some(existing) = primary.as_ref() {
                return Err(Error::MultiplePrimary {
                    existing: existing.id().to_string(),
                    rejected: session.id().to_string(),
                });
            }
            *primary = Some(session.clone());
        }

        sessions.insert(session.id().to_string(), session.clone());
        debug!("session {} registered ({:?})", session.id(), session.role());
        Ok(session)
    }

    /// Stop and remove a session. Returns `false` if the id is unknown.
    pub async fn unregister(&self, id: &str) -> bool {
        let removed = self.sessions.write().remove(id);
        let Some(session) = removed else {
            return false;
        };

        if session.is_primary() {
            *self.primary.write() = None;
        }
        session.stop().await;
        debug!("session {} unregistered", id);
        true
    }

    /// Start every session concurrently. A failed start marks only that session `Failed`.
    pub async fn start_all(&self) -> StartReport {
        let sessions = self.all();
        let results = join_all(sessions.iter().map(|s| s.start())).await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        let report = StartReport {
            started: results.len() - failed,
            failed,
        };
        info!(
            "session pool started with {}/{} sessions",
            report.started,
            report.total()
        );
        report
    }

    /// Stop every session that is up. Best effort; returns how many were stopped.
    pub async fn stop_all(&self) -> usize {
        let active: Vec<Arc<Session>> = self
            .all()
            .into_iter()
            .filter(|s| {
                matches!(
                    s.state(),
                    SessionState::Running | SessionState::Starting | SessionState::Stopping
                )
            })
            .collect();

        if active.is_empty() {
            return 0;
        }

        join_all(active.iter().map(|s| s.stop())).await;
        info!("stopped {} sessions", active.len());
        active.len()
    }

    /// Available workers, or the primary alone when no worker is available.
    ///
    /// The primary also carries catalog ingestion, so it only takes streams as a fallback.
    fn available(&self) -> Vec<Arc<Session>> {
        let (workers, primary): (Vec<_>, Vec<_>) = self
            .sessions
            .read()
            .values()
            .filter(|s| s.is_available())
            .cloned()
            .partition(|s| !s.is_primary());
        if workers.is_empty() {
            primary
        } else {
            workers
        }
    }

    /// The candidate with the lowest workload, ties broken by smallest id.
    pub fn select(&self) -> Option<Arc<Session>> {
        self.available().into_iter().min_by(|a, b| {
            a.workload()
                .cmp(&b.workload())
                .then_with(|| a.id().cmp(b.id()))
        })
    }

    /// A uniformly random candidate, drawn from the same set as [`select`](Self::select).
    pub fn select_random(&self) -> Option<Arc<Session>> {
        self.available().choose(&mut rand::rng()).cloned()
    }

    /// Select a session and take one unit of workload on it.
    ///
    /// Candidates are tried in `select` order. A session that filled up since the
    /// snapshot refuses the reservation and the next one is tried.
    pub fn acquire(&self) -> Result<WorkloadGuard> {
        let mut candidates = self.available();
        candidates.sort_by_cached_key(|s| (s.workload(), s.id().to_string()));

        for session in candidates {
            if let Some(guard) = WorkloadGuard::try_new(session) {
                return Ok(guard);
            }
        }
        warn!("no session available ({} registered)", self.len());
        Err(Error::CapacityExhausted)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn primary(&self) -> Option<Arc<Session>> {
        self.primary.read().clone()
    }

    /// Snapshot of every registered session, ordered by id.
    pub fn all(&self) -> Vec<Arc<Session>> {
        let mut sessions: Vec<Arc<Session>> = self.sessions.read().values().cloned().collect();
        sessions.sort_by(|a, b| a.id().cmp(b.id()));
        sessions
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Number of sessions currently in the `Failed` state.
    pub fn failed_count(&self) -> usize {
        self.sessions
            .read()
            .values()
            .filter(|s| s.state() == SessionState::Failed)
            .count()
    }

    /// Worker credentials rejected while building the pool from configuration.
    pub fn config_rejections(&self) -> usize {
        self.config_rejections.load(Ordering::Relaxed)
    }
}
