//! Collaborators the scheduler drives but does not own: the game server that
//! knows which entities are online, applies the flight effect, and delivers
//! chat messages.

use flytime_core::EntityId;

use crate::error::HostError;

/// The host environment an entity lives in.
///
/// Calls are made from timer tasks and must not block for long; message
/// delivery is best effort.
pub trait EntityHost: Send + Sync {
    /// Whether the entity is currently online and can be acted upon.
    fn is_reachable(&self, id: &EntityId) -> bool;

    /// Turn the flight effect on or off for the entity.
    fn set_capability(&self, id: &EntityId, enabled: bool) -> Result<(), HostError>;

    /// Deliver a short status line to the entity.
    fn notify(&self, id: &EntityId, message: &str);
}
