use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use crate::{
    db::FeatureStore,
    error::{AppError, AppResult},
    models::FeatureGroup,
    services::{SessionConnector, SessionContext},
};

/// How long an issued login waits for its OAuth callback
pub const LOGIN_TTL: Duration = Duration::from_secs(10 * 60);

/// Sessions untouched for this long are dropped
pub const SESSION_IDLE_TTL: Duration = Duration::from_secs(12 * 60 * 60);

/// Upper bound on outstanding logins; the oldest is evicted beyond it
pub const MAX_PENDING_LOGINS: usize = 1024;

pub type SharedSession = Arc<Mutex<SessionContext>>;

pub struct SessionEntry {
    pub session: SharedSession,
    pub last_seen: Instant,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<RwLock<AppStateInner>>,
    pub store: Arc<dyn FeatureStore>,
    pub group: FeatureGroup,
    pub connector: Arc<dyn SessionConnector>,
}

/// Inner state that can be modified
#[derive(Default)]
pub struct AppStateInner {
    pub sessions: HashMap<Uuid, SessionEntry>,
    /// Login attempts whose OAuth callback has not arrived yet, with their issue time
    pub pending_logins: HashMap<Uuid, Instant>,
}

fn expired(since: Instant, now: Instant, ttl: Duration) -> bool {
    now.saturating_duration_since(since) >= ttl
}

impl AppStateInner {
    /// Drops stale logins and idle sessions as of `now`
    pub fn prune(&mut self, now: Instant) {
        let logins = self.pending_logins.len();
        let sessions = self.sessions.len();

        self.pending_logins
            .retain(|_, issued| !expired(*issued, now, LOGIN_TTL));
        self.sessions
            .retain(|_, entry| !expired(entry.last_seen, now, SESSION_IDLE_TTL));

        let dropped_logins = logins - self.pending_logins.len();
        let dropped_sessions = sessions - self.sessions.len();
        if dropped_logins + dropped_sessions > 0 {
            tracing::debug!(dropped_logins, dropped_sessions, "Pruned expired state");
        }
    }

    pub fn issue_login(&mut self, id: Uuid, now: Instant) {
        self.prune(now);

        if self.pending_logins.len() >= MAX_PENDING_LOGINS {
            let oldest = self
                .pending_logins
                .iter()
                .min_by_key(|(_, issued)| **issued)
                .map(|(id, _)| *id);
            if let Some(oldest) = oldest {
                self.pending_logins.remove(&oldest);
            }
        }

        self.pending_logins.insert(id, now);
    }

    pub fn redeem_login(&mut self, id: Uuid, now: Instant) -> bool {
        self.prune(now);
        self.pending_logins.remove(&id).is_some()
    }

    /// Live session for `id`, marking it as used
    pub fn touch_session(&mut self, id: Uuid, now: Instant) -> Option<SharedSession> {
        if self
            .sessions
            .get(&id)
            .is_some_and(|entry| expired(entry.last_seen, now, SESSION_IDLE_TTL))
        {
            self.sessions.remove(&id);
            return None;
        }

        let entry = self.sessions.get_mut(&id)?;
        entry.last_seen = now;
        Some(entry.session.clone())
    }
}

impl AppState {
    pub fn new(
        store: Arc<dyn FeatureStore>,
        group: FeatureGroup,
        connector: Arc<dyn SessionConnector>,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(AppStateInner::default())),
            store,
            group,
            connector,
        }
    }

    pub async fn begin_login(&self) -> Uuid {
        let id = Uuid::new_v4();
        self.inner.write().await.issue_login(id, Instant::now());
        id
    }

    /// Consumes a pending login; false when `id` was never issued, already used or expired
    pub async fn finish_login(&self, id: Uuid) -> bool {
        self.inner.write().await.redeem_login(id, Instant::now())
    }

    pub async fn insert_session(&self, session: SessionContext) -> Uuid {
        let id = session.id;
        let now = Instant::now();

        let mut inner = self.inner.write().await;
        inner.prune(now);
        inner.sessions.insert(
            id,
            SessionEntry {
                session: Arc::new(Mutex::new(session)),
                last_seen: now,
            },
        );
        id
    }

    pub async fn session(&self, id: Uuid) -> AppResult<SharedSession> {
        self.inner
            .write()
            .await
            .touch_session(id, Instant::now())
            .ok_or_else(|| AppError::NotFound(format!("Session {} not found", id)))
    }

    /// Exclusive access for running an action; a session already in use is busy
    pub async fn lock_session(&self, id: Uuid) -> AppResult<OwnedMutexGuard<SessionContext>> {
        self.session(id).await?.try_lock_owned().map_err(|_| {
            AppError::Busy("An action is already running for this session".to_string())
        })
    }
}
