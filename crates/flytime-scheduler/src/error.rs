use flytime_core::EntityId;
use flytime_store::StoreError;
use thiserror::Error;

/// Failures of the grant path (admin commands and voucher redemption).
#[derive(Debug, Error)]
pub enum GrantError {
    /// Grants must add at least one second.
    #[error("Grant must be at least one second")]
    ZeroSeconds,

    /// The backing store rejected the update; the caller may retry later.
    #[error("Store unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Failures reported by the host while applying an effect to an entity.
///
/// Always logged by the scheduler, never propagated.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Entity {0} is not reachable")]
    Unreachable(EntityId),

    #[error("Host rejected capability change: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, GrantError>;
