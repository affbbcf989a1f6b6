use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::TransportError;
use crate::http::{HttpTransport, SessionFactory};
use crate::retry::{RetryPolicy, RetryingTransport};

/// Per-job cache of HTTP sessions, one per concurrently running worker.
///
/// A worker checks a session out for one chunk and hands it back when the
/// lease drops, so the next chunk it (or any later worker) runs reuses the
/// warm connection. A session is never held by two workers at once; the pool
/// only grows when every existing session is leased.
pub struct SessionPool {
    factory: Arc<dyn SessionFactory>,
    policy: RetryPolicy,
    idle: Mutex<Vec<Arc<dyn HttpTransport>>>,
    created: AtomicUsize,
}

impl SessionPool {
    pub fn new(factory: Arc<dyn SessionFactory>, policy: RetryPolicy) -> Self {
        Self {
            factory,
            policy,
            idle: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
        }
    }

    /// Take an idle session, creating one lazily when none is free.
    pub fn checkout(self: &Arc<Self>) -> Result<SessionLease, TransportError> {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop();

        let session = match reused {
            Some(session) => session,
            None => {
                let raw = self.factory.create()?;
                let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
                tracing::debug!("created transfer session #{n}");
                Arc::new(RetryingTransport::new(raw, self.policy.clone()))
            }
        };

        Ok(SessionLease {
            session: Some(session),
            pool: Arc::clone(self),
        })
    }

    /// Number of sessions created over the pool's lifetime.
    pub fn sessions_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn idle_sessions(&self) -> usize {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    fn give_back(&self, session: Arc<dyn HttpTransport>) {
        self.idle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(session);
    }
}

/// Exclusive use of one session; returned to the pool on drop.
pub struct SessionLease {
    session: Option<Arc<dyn HttpTransport>>,
    pool: Arc<SessionPool>,
}

impl Deref for SessionLease {
    type Target = dyn HttpTransport;

    fn deref(&self) -> &Self::Target {
        match &self.session {
            Some(session) => session.as_ref(),
            None => unreachable!("session is only taken in drop"),
        }
    }
}

impl Drop for SessionLease {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.pool.give_back(session);
        }
    }
}
