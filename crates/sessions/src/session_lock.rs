//! Per-session concurrency control.
//!
//! Only one exchange runs per session at a time. A second message for the
//! same session waits for the first to finish ([`SessionLockMap::acquire`])
//! or is turned away immediately ([`SessionLockMap::try_acquire`]).

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Manages per-session run locks.
///
/// Each session id maps to a `Semaphore(1)`. Holding the permit gives
/// exclusive access to that session's transcript; it releases on drop, and
/// the entry is forgotten once nobody holds or waits on it.
#[derive(Default)]
pub struct SessionLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl SessionLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn semaphore(&self, session_id: &str) -> Arc<Semaphore> {
        self.locks
            .lock()
            .entry(session_id.to_owned())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }

    /// Wait until the session is free, then hold it.
    pub async fn acquire(&self, session_id: &str) -> Result<SessionPermit<'_>, SessionBusy> {
        let acquired = self.semaphore(session_id).acquire_owned().await;
        match acquired {
            Ok(permit) => Ok(self.wrap(session_id, permit)),
            Err(_) => {
                self.release(session_id);
                Err(SessionBusy)
            }
        }
    }

    /// Take the session only if nobody else holds it.
    pub fn try_acquire(&self, session_id: &str) -> Result<SessionPermit<'_>, SessionBusy> {
        let attempt = self.semaphore(session_id).try_acquire_owned();
        match attempt {
            Ok(permit) => Ok(self.wrap(session_id, permit)),
            Err(_) => {
                self.release(session_id);
                Err(SessionBusy)
            }
        }
    }

    fn wrap(&self, session_id: &str, permit: OwnedSemaphorePermit) -> SessionPermit<'_> {
        SessionPermit {
            map: self,
            session_id: session_id.to_owned(),
            permit: Some(permit),
        }
    }

    /// Drop the entry for `session_id` if only the map still references it.
    ///
    /// Holders and waiters each keep a clone of the semaphore, and clones
    /// are only taken under the map lock, so the count is stable here.
    fn release(&self, session_id: &str) {
        let mut locks = self.locks.lock();
        if locks
            .get(session_id)
            .is_some_and(|sem| Arc::strong_count(sem) == 1)
        {
            locks.remove(session_id);
        }
    }

    /// Number of tracked sessions (for monitoring).
    pub fn session_count(&self) -> usize {
        self.locks.lock().len()
    }

    /// Forget sessions nobody holds or waits on. Entries normally go away
    /// on their own; this sweeps the ones left by abandoned waits.
    pub fn prune_idle(&self) {
        self.locks
            .lock()
            .retain(|_, sem| Arc::strong_count(sem) > 1);
    }
}

/// Exclusive hold on one session. Releasing it also forgets the session
/// when nobody else is waiting.
pub struct SessionPermit<'a> {
    map: &'a SessionLockMap,
    session_id: String,
    permit: Option<OwnedSemaphorePermit>,
}

impl Drop for SessionPermit<'_> {
    fn drop(&mut self) {
        drop(self.permit.take());
        self.map.release(&self.session_id);
    }
}

/// Returned when a session already has an exchange in flight.
#[derive(Debug, thiserror::Error)]
#[error("session is busy: an exchange is already in progress")]
pub struct SessionBusy;
