use async_trait::async_trait;
use dashmap::DashMap;
use flytime_core::{Balance, EntityId};
use tracing::info;

use crate::{error::Result, store::DurationStore};

#[derive(Debug, Clone, Copy, Default)]
struct Record {
    remaining_secs: u64,
    unlimited: bool,
}

impl Record {
    fn balance(&self) -> Balance {
        if self.unlimited {
            Balance::Unlimited
        } else {
            Balance::Limited(self.remaining_secs)
        }
    }
}

/// Process-local [`DurationStore`].
///
/// Each update runs under the map's shard lock for that key, which gives the
/// same per-entity atomicity as the SQLite backend's single statements.
#[derive(Default)]
pub struct MemoryStore {
    records: DashMap<EntityId, Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records ever created.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl DurationStore for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn ensure_record(&self, id: &EntityId) -> Result<()> {
        self.records.entry(*id).or_default();
        Ok(())
    }

    async fn get_remaining(&self, id: &EntityId) -> Result<Balance> {
        Ok(self
            .records
            .get(id)
            .map(|r| r.balance())
            .unwrap_or_default())
    }

    async fn set_remaining(&self, id: &EntityId, secs: u64) -> Result<()> {
        self.records.entry(*id).or_default().remaining_secs = secs;
        Ok(())
    }

    async fn decrement(&self, id: &EntityId, delta: u64) -> Result<Balance> {
        let Some(mut record) = self.records.get_mut(id) else {
            return Ok(Balance::Limited(0));
        };
        if !record.unlimited {
            record.remaining_secs = record.remaining_secs.saturating_sub(delta);
        }
        Ok(record.balance())
    }

    async fn add(&self, id: &EntityId, delta: u64) -> Result<Balance> {
        let mut record = self.records.entry(*id).or_default();
        record.remaining_secs = record.remaining_secs.saturating_add(delta);
        Ok(record.balance())
    }

    async fn set_unlimited(&self, id: &EntityId, unlimited: bool) -> Result<()> {
        self.records.entry(*id).or_default().unlimited = unlimited;
        info!(entity = %id, unlimited, "unlimited flag updated");
        Ok(())
    }
}
