use chrono::{DateTime, Utc};
use flytime_core::{Balance, EntityId};
use serde::Serialize;

/// Outcome of [`FlightScheduler::activate`](crate::FlightScheduler::activate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// Flight granted; `balance` is what the entity held at activation.
    Activated { balance: Balance },
    /// A session is already running for this entity.
    AlreadyActive,
    /// The entity holds `Limited(0)`; nothing was changed.
    NoTimeRemaining,
    /// The scheduler is shutting down and accepts no new sessions.
    ShuttingDown,
}

/// Outcome of [`FlightScheduler::deactivate`](crate::FlightScheduler::deactivate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deactivation {
    /// The session was closed.
    Stopped {
        /// Balance after the partial charge (or the stored balance if none applied).
        balance: Balance,
        /// Seconds charged for the unfinished interval.
        charged_secs: u64,
    },
    /// No session was running for this entity.
    NotActive,
}

/// What to do to the entity while closing its session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeactivateOptions {
    /// Switch the flight effect off on the entity.
    pub revoke_capability: bool,
    /// Charge the seconds elapsed since the last accounted tick.
    pub charge_partial: bool,
}

impl Default for DeactivateOptions {
    fn default() -> Self {
        Self {
            revoke_capability: true,
            charge_partial: true,
        }
    }
}

/// Point-in-time view of one active session, for status surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub entity: EntityId,
    pub started_at: DateTime<Utc>,
    /// Last instant the session's flight time was reconciled with the store.
    pub last_accounted_at: DateTime<Utc>,
    /// Seconds flown since `last_accounted_at`, not yet charged.
    pub uncharged_secs: u64,
}
