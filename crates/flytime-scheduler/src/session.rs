use std::sync::Mutex as StdMutex;

use chrono::{DateTime, Utc};
use flytime_core::EntityId;
use tokio::{sync::Mutex, task::JoinHandle, time::Instant};

use crate::types::SessionSnapshot;

/// Accounting fields of a session. Only the session's own tick and the
/// deactivation path touch them, and both hold the lock for their whole run.
pub(crate) struct Accounting {
    /// Instant up to which flight time has been charged to the store.
    pub last_accounted_at: Instant,
    /// Set once by whichever path ends the session; a closed session is never
    /// charged again.
    pub closed: bool,
}

/// One entity currently receiving flight.
pub(crate) struct ActiveSession {
    pub entity: EntityId,
    pub started_at: DateTime<Utc>,
    pub accounting: Mutex<Accounting>,
    timer: StdMutex<Option<JoinHandle<()>>>,
}

impl ActiveSession {
    pub fn new(entity: EntityId) -> Self {
        Self {
            entity,
            started_at: Utc::now(),
            accounting: Mutex::new(Accounting {
                last_accounted_at: Instant::now(),
                closed: false,
            }),
            timer: StdMutex::new(None),
        }
    }

    pub fn attach_timer(&self, handle: JoinHandle<()>) {
        if let Ok(mut slot) = self.timer.lock() {
            *slot = Some(handle);
        }
    }

    /// Abort the timer task. The handle is taken, so this happens at most once.
    pub fn cancel_timer(&self) {
        let handle = self.timer.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    pub fn snapshot(&self, accounting: &Accounting) -> SessionSnapshot {
        let uncharged = Instant::now().saturating_duration_since(accounting.last_accounted_at);
        let last_accounted_at = Utc::now()
            - chrono::Duration::from_std(uncharged).unwrap_or_else(|_| chrono::Duration::zero());
        SessionSnapshot {
            entity: self.entity,
            started_at: self.started_at,
            last_accounted_at,
            uncharged_secs: uncharged.as_secs(),
        }
    }
}
