use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use dashmap::{mapref::entry::Entry, DashMap};
use flytime_core::{Balance, EntityId};
use flytime_store::DurationStore;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::{
    error::Result,
    grant,
    host::EntityHost,
    session::ActiveSession,
    types::{Activation, DeactivateOptions, Deactivation, SessionSnapshot},
};

/// Message sent to an entity whose time ran out mid-flight.
pub const EXPIRED_MESSAGE: &str = "Your flight time has expired.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TickOutcome {
    Continue,
    Stop,
}

/// Per-entity timed flight scheduler.
///
/// Owns the registry of active sessions (the sole source of truth for "is this
/// entity flying") and one repeating timer task per session. Cloning the
/// scheduler is cheap and every clone shares the same registry.
#[derive(Clone)]
pub struct FlightScheduler {
    shared: Arc<Shared>,
}

struct Shared {
    store: Arc<dyn DurationStore>,
    host: Arc<dyn EntityHost>,
    interval: Duration,
    sessions: DashMap<EntityId, Arc<ActiveSession>>,
    shutting_down: AtomicBool,
}

impl FlightScheduler {
    /// Create a scheduler charging `interval` worth of flight time per tick.
    ///
    /// The store's schema must already exist; every backend constructor sees
    /// to that.
    pub fn new(store: Arc<dyn DurationStore>, host: Arc<dyn EntityHost>, interval: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                host,
                interval: interval.max(Duration::from_secs(1)),
                sessions: DashMap::new(),
                shutting_down: AtomicBool::new(false),
            }),
        }
    }

    pub fn store(&self) -> &Arc<dyn DurationStore> {
        &self.shared.store
    }

    pub fn interval(&self) -> Duration {
        self.shared.interval
    }

    /// Start flight for `id`.
    ///
    /// Refused when the entity holds no time. On success the flight effect is
    /// switched on immediately and the first charge happens one full interval
    /// later. Must be called from within a Tokio runtime.
    pub async fn activate(&self, id: &EntityId) -> Activation {
        let shared = &self.shared;
        if shared.shutting_down.load(Ordering::SeqCst) {
            return Activation::ShuttingDown;
        }
        if shared.sessions.contains_key(id) {
            return Activation::AlreadyActive;
        }

        if let Err(e) = shared.store.ensure_record(id).await {
            warn!(entity = %id, "ensure record failed: {e}");
        }
        let balance = shared.store.remaining_or_zero(id).await;
        if balance.is_exhausted() {
            info!(entity = %id, "activation refused: no flight time remaining");
            return Activation::NoTimeRemaining;
        }

        let session = Arc::new(ActiveSession::new(*id));
        // Held until the flight effect is on. Anything that finds the session
        // in the registry queues behind the enable before it can revoke.
        let mut accounting = session.accounting.lock().await;
        let inserted = match shared.sessions.entry(*id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Arc::clone(&session));
                true
            }
        };
        if !inserted {
            return Activation::AlreadyActive;
        }
        // Pairs with the flag store in `shutdown`: either this check sees the
        // flag or the shutdown sweep sees the session.
        if shared.shutting_down.load(Ordering::SeqCst) {
            accounting.closed = true;
            shared.unregister(&session);
            return Activation::ShuttingDown;
        }

        let first_tick = Instant::now() + shared.interval;
        let handle = tokio::spawn(run_timer(Arc::clone(shared), Arc::clone(&session), first_tick));
        session.attach_timer(handle);

        if let Err(e) = shared.host.set_capability(id, true) {
            warn!(entity = %id, "enable flight failed: {e}");
        }
        drop(accounting);
        info!(entity = %id, remaining = %balance, "flight activated");
        Activation::Activated { balance }
    }

    /// Stop flight for `id`.
    ///
    /// The timer is cancelled before any accounting happens, so a tick can
    /// never charge the same window as the partial charge.
    pub async fn deactivate(&self, id: &EntityId, options: DeactivateOptions) -> Deactivation {
        let Some(session) = self.shared.sessions.get(id).map(|e| Arc::clone(e.value())) else {
            return Deactivation::NotActive;
        };
        self.shared.close(&session, options).await
    }

    pub fn is_active(&self, id: &EntityId) -> bool {
        self.shared.sessions.contains_key(id)
    }

    pub fn active_count(&self) -> usize {
        self.shared.sessions.len()
    }

    /// Ids of every entity currently flying, sorted.
    pub fn active_entities(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.shared.sessions.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    /// Snapshots of all active sessions, ordered by start time.
    pub async fn sessions(&self) -> Vec<SessionSnapshot> {
        let sessions: Vec<Arc<ActiveSession>> = self
            .shared
            .sessions
            .iter()
            .map(|e| Arc::clone(e.value()))
            .collect();

        let mut snapshots = Vec::with_capacity(sessions.len());
        for session in sessions {
            let accounting = session.accounting.lock().await;
            if !accounting.closed {
                snapshots.push(session.snapshot(&accounting));
            }
        }
        snapshots.sort_by_key(|s| s.started_at);
        snapshots
    }

    /// Add `seconds` of flight time to `id` (admin grants).
    pub async fn grant(&self, id: &EntityId, seconds: u64) -> Result<Balance> {
        grant::grant(self.shared.store.as_ref(), id, seconds).await
    }

    /// Close every session (revoking flight and charging partial intervals)
    /// and refuse further activations. Returns the number of sessions closed.
    pub async fn shutdown(&self) -> usize {
        self.shared.shutting_down.store(true, Ordering::SeqCst);

        let mut stopped = 0usize;
        for id in self.active_entities() {
            if let Deactivation::Stopped { .. } = self.deactivate(&id, DeactivateOptions::default()).await {
                stopped += 1;
            }
        }
        info!(stopped, "flight scheduler shut down");
        stopped
    }
}

impl Shared {
    /// Drop `session` from the registry unless a newer session replaced it.
    fn unregister(&self, session: &Arc<ActiveSession>) {
        self.sessions
            .remove_if(&session.entity, |_, current| Arc::ptr_eq(current, session));
    }

    fn revoke(&self, id: &EntityId) {
        if let Err(e) = self.host.set_capability(id, false) {
            warn!(entity = %id, "disable flight failed: {e}");
        }
    }

    /// One firing of a session's timer.
    async fn tick(&self, session: &Arc<ActiveSession>) -> TickOutcome {
        let mut accounting = session.accounting.lock().await;
        if accounting.closed {
            return TickOutcome::Stop;
        }
        let id = session.entity;

        // Offline time is never charged.
        if !self.host.is_reachable(&id) {
            accounting.closed = true;
            self.unregister(session);
            info!(entity = %id, "entity unreachable; flight session closed without charge");
            return TickOutcome::Stop;
        }

        let due = Instant::now()
            .saturating_duration_since(accounting.last_accounted_at)
            .as_secs();
        if due == 0 {
            return TickOutcome::Continue;
        }

        let balance = match self.store.decrement(&id, due).await {
            Ok(balance) => balance,
            Err(e) => {
                error!(entity = %id, "flight tick skipped: {e}");
                return TickOutcome::Continue;
            }
        };
        accounting.last_accounted_at += Duration::from_secs(due);
        debug!(entity = %id, charged = due, remaining = %balance, "flight tick");

        if balance.is_exhausted() {
            accounting.closed = true;
            self.revoke(&id);
            self.unregister(session);
            self.host.notify(&id, EXPIRED_MESSAGE);
            info!(entity = %id, "flight time expired");
            return TickOutcome::Stop;
        }
        TickOutcome::Continue
    }

    /// End `session`. The session leaves the registry only after its flight
    /// effect is revoked, so a newer session for the same entity can never
    /// have its enable overwritten by this revoke.
    async fn close(&self, session: &Arc<ActiveSession>, options: DeactivateOptions) -> Deactivation {
        let mut accounting = session.accounting.lock().await;
        if std::mem::replace(&mut accounting.closed, true) {
            // A tick or a concurrent deactivate got here first.
            return Deactivation::NotActive;
        }
        session.cancel_timer();
        let id = session.entity;

        let mut charged_secs = 0;
        let mut balance = None;
        if options.charge_partial {
            let elapsed = Instant::now()
                .saturating_duration_since(accounting.last_accounted_at)
                .as_secs();
            if elapsed > 0 {
                match self.store.decrement(&id, elapsed).await {
                    Ok(after) => {
                        accounting.last_accounted_at += Duration::from_secs(elapsed);
                        if !after.is_unlimited() {
                            charged_secs = elapsed;
                        }
                        balance = Some(after);
                    }
                    Err(e) => warn!(entity = %id, elapsed, "partial charge failed: {e}"),
                }
            }
        }
        let balance = match balance {
            Some(balance) => balance,
            None => self.store.remaining_or_zero(&id).await,
        };

        if options.revoke_capability {
            self.revoke(&id);
        }
        self.unregister(session);
        info!(entity = %id, charged = charged_secs, remaining = %balance, "flight deactivated");
        Deactivation::Stopped {
            balance,
            charged_secs,
        }
    }
}

/// Timer task driving one session until it closes or is aborted.
async fn run_timer(shared: Arc<Shared>, session: Arc<ActiveSession>, first_tick: Instant) {
    let mut ticker = tokio::time::interval_at(first_tick, shared.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        if shared.tick(&session).await == TickOutcome::Stop {
            break;
        }
    }
    debug!(entity = %session.entity, "flight timer stopped");
}
