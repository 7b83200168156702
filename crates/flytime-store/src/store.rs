use async_trait::async_trait;
use flytime_core::{Balance, EntityId};
use tracing::warn;

use crate::error::Result;

/// Persistent entity → remaining-seconds counter.
///
/// Every backend offers the same semantics:
/// - records are created lazily with `0` seconds and are never deleted;
/// - `decrement` and `add` are single atomic store-side updates, so a grant
///   racing a scheduler tick can never lose either side's write;
/// - unlimited records are never decremented.
///
/// Implementations must be safe to share across tasks (`Arc<dyn DurationStore>`).
#[async_trait]
pub trait DurationStore: Send + Sync {
    /// Short backend label for logs (`"sqlite"`, `"postgres"`, `"memory"`).
    fn backend(&self) -> &'static str;

    /// Create the backing structure if absent. Idempotent.
    async fn init_schema(&self) -> Result<()>;

    /// Create a record holding `0` seconds unless one already exists.
    async fn ensure_record(&self, id: &EntityId) -> Result<()>;

    /// Current balance. A missing record reads as `Limited(0)`.
    async fn get_remaining(&self, id: &EntityId) -> Result<Balance>;

    /// Unconditional upsert of the absolute counter value.
    async fn set_remaining(&self, id: &EntityId, secs: u64) -> Result<()>;

    /// Atomically subtract `delta` with a floor of zero and return the new
    /// balance. Unlimited records are left untouched and report `Unlimited`;
    /// a missing record reports `Limited(0)`.
    async fn decrement(&self, id: &EntityId, delta: u64) -> Result<Balance>;

    /// Atomically add `delta` to the counter (upserting the record) and
    /// return the new balance.
    async fn add(&self, id: &EntityId, delta: u64) -> Result<Balance>;

    /// Toggle the unlimited flag without touching the counter (upserts).
    async fn set_unlimited(&self, id: &EntityId, unlimited: bool) -> Result<()>;

    /// `init_schema`, with failures logged instead of returned.
    ///
    /// A store whose schema could not be created behaves as if no record
    /// exists yet; reads then degrade to `Limited(0)`.
    async fn ensure_schema(&self) {
        if let Err(e) = self.init_schema().await {
            warn!(backend = self.backend(), "ensure schema failed: {e}");
        }
    }

    /// `get_remaining`, with failures logged and mapped to `Limited(0)`.
    async fn remaining_or_zero(&self, id: &EntityId) -> Balance {
        match self.get_remaining(id).await {
            Ok(balance) => balance,
            Err(e) => {
                warn!(backend = self.backend(), entity = %id, "read remaining failed: {e}");
                Balance::Limited(0)
            }
        }
    }
}
