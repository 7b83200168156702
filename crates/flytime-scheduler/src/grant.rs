use flytime_core::{Balance, EntityId};
use flytime_store::DurationStore;
use tracing::info;

use crate::error::{GrantError, Result};

/// Add `seconds` of flight time to `id`, creating its record if needed.
///
/// The addition is a single atomic store update, so a grant interleaving with
/// a scheduler tick for the same entity loses neither write.
pub async fn grant(store: &dyn DurationStore, id: &EntityId, seconds: u64) -> Result<Balance> {
    if seconds == 0 {
        return Err(GrantError::ZeroSeconds);
    }
    store.ensure_record(id).await?;
    let balance = store.add(id, seconds).await?;
    info!(entity = %id, added = seconds, remaining = %balance, "flight time granted");
    Ok(balance)
}
