use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use flytime_core::{Balance, EntityId};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::{
    db::init_db,
    error::{Result, StoreError},
    store::DurationStore,
};

/// SQLite-backed [`DurationStore`].
///
/// Wraps a single connection in a `Mutex`; every operation is one statement,
/// so the lock doubles as the per-key serialisation the grant path needs.
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Wrap an open connection and make sure the schema exists.
    ///
    /// A schema failure is logged; the store then reads as empty.
    pub fn new(conn: Connection) -> Self {
        if let Err(e) = init_db(&conn) {
            warn!(backend = "sqlite", "ensure schema failed: {e}");
        }
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Open (or create) the database file at `path`, creating its parent
    /// directory if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        info!(path = %path.display(), "opening SQLite database");
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self::new(conn))
    }

    /// Private in-memory database, used by tests and the demo host.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Connection::open_in_memory()?))
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

/// SQLite integers are signed; reject counters that would not round-trip.
fn to_sql_secs(secs: u64) -> Result<i64> {
    i64::try_from(secs).map_err(|_| StoreError::OutOfRange(secs))
}

/// Map a `(remaining_secs, unlimited)` row to a [`Balance`].
fn row_to_balance(row: &rusqlite::Row<'_>) -> rusqlite::Result<Balance> {
    let secs: i64 = row.get(0)?;
    let unlimited: i64 = row.get(1)?;
    Ok(if unlimited != 0 {
        Balance::Unlimited
    } else {
        Balance::Limited(secs.max(0) as u64)
    })
}

#[async_trait]
impl DurationStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn init_schema(&self) -> Result<()> {
        init_db(&*self.conn()?)
    }

    async fn ensure_record(&self, id: &EntityId) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        let inserted = self.conn()?.execute(
            "INSERT INTO flight_time (entity_id, remaining_secs, unlimited, created_at, updated_at)
             VALUES (?1, 0, 0, ?2, ?2)
             ON CONFLICT(entity_id) DO NOTHING",
            rusqlite::params![id.to_string(), now],
        )?;
        if inserted > 0 {
            debug!(entity = %id, "flight record created");
        }
        Ok(())
    }

    async fn get_remaining(&self, id: &EntityId) -> Result<Balance> {
        let balance = self
            .conn()?
            .query_row(
                "SELECT remaining_secs, unlimited FROM flight_time WHERE entity_id = ?1",
                [id.to_string()],
                row_to_balance,
            )
            .optional()?;
        Ok(balance.unwrap_or_default())
    }

    async fn set_remaining(&self, id: &EntityId, secs: u64) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn()?.execute(
            "INSERT INTO flight_time (entity_id, remaining_secs, unlimited, created_at, updated_at)
             VALUES (?1, ?2, 0, ?3, ?3)
             ON CONFLICT(entity_id) DO UPDATE
                SET remaining_secs = excluded.remaining_secs,
                    updated_at     = excluded.updated_at",
            rusqlite::params![id.to_string(), to_sql_secs(secs)?, now],
        )?;
        Ok(())
    }

    async fn decrement(&self, id: &EntityId, delta: u64) -> Result<Balance> {
        let now = Utc::now().to_rfc3339();
        let balance = self
            .conn()?
            .query_row(
                "UPDATE flight_time
                 SET remaining_secs = CASE
                        WHEN unlimited <> 0         THEN remaining_secs
                        WHEN remaining_secs <= ?2   THEN 0
                        ELSE remaining_secs - ?2
                     END,
                     updated_at = ?3
                 WHERE entity_id = ?1
                 RETURNING remaining_secs, unlimited",
                rusqlite::params![id.to_string(), to_sql_secs(delta)?, now],
                row_to_balance,
            )
            .optional()?;
        Ok(balance.unwrap_or_default())
    }

    async fn add(&self, id: &EntityId, delta: u64) -> Result<Balance> {
        let now = Utc::now().to_rfc3339();
        let balance = self.conn()?.query_row(
            "INSERT INTO flight_time (entity_id, remaining_secs, unlimited, created_at, updated_at)
             VALUES (?1, ?2, 0, ?3, ?3)
             ON CONFLICT(entity_id) DO UPDATE
                SET remaining_secs = remaining_secs + excluded.remaining_secs,
                    updated_at     = excluded.updated_at
             RETURNING remaining_secs, unlimited",
            rusqlite::params![id.to_string(), to_sql_secs(delta)?, now],
            row_to_balance,
        )?;
        Ok(balance)
    }

    async fn set_unlimited(&self, id: &EntityId, unlimited: bool) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn()?.execute(
            "INSERT INTO flight_time (entity_id, remaining_secs, unlimited, created_at, updated_at)
             VALUES (?1, 0, ?2, ?3, ?3)
             ON CONFLICT(entity_id) DO UPDATE
                SET unlimited  = excluded.unlimited,
                    updated_at = excluded.updated_at",
            rusqlite::params![id.to_string(), i64::from(unlimited), now],
        )?;
        info!(entity = %id, unlimited, "unlimited flag updated");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("open failed")
    }

    #[tokio::test]
    async fn missing_record_reads_as_zero() {
        let store = store();
        assert_eq!(
            store.get_remaining(&EntityId::new()).await.unwrap(),
            Balance::Limited(0)
        );
    }

    #[tokio::test]
    async fn ensure_record_is_idempotent() {
        let store = store();
        let id = EntityId::new();
        store.ensure_record(&id).await.unwrap();
        store.set_remaining(&id, 40).await.unwrap();
        store.ensure_record(&id).await.unwrap();
        assert_eq!(store.get_remaining(&id).await.unwrap(), Balance::Limited(40));
    }

    #[tokio::test]
    async fn ensure_schema_twice_is_harmless() {
        let store = store();
        store.init_schema().await.unwrap();
        store.ensure_schema().await;
    }

    #[tokio::test]
    async fn decrement_floors_at_zero() {
        let store = store();
        let id = EntityId::new();
        store.set_remaining(&id, 100).await.unwrap();
        assert_eq!(store.decrement(&id, 30).await.unwrap(), Balance::Limited(70));
        assert_eq!(store.decrement(&id, 500).await.unwrap(), Balance::Limited(0));
        assert_eq!(store.decrement(&id, 30).await.unwrap(), Balance::Limited(0));
        assert_eq!(store.get_remaining(&id).await.unwrap(), Balance::Limited(0));
    }

    #[tokio::test]
    async fn decrement_of_missing_record_reports_zero_without_creating_it() {
        let store = store();
        let id = EntityId::new();
        assert_eq!(store.decrement(&id, 30).await.unwrap(), Balance::Limited(0));
        let rows: i64 = store
            .conn()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM flight_time", [], |r| r.get(0))
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn unlimited_record_is_never_decremented() {
        let store = store();
        let id = EntityId::new();
        store.set_remaining(&id, 50).await.unwrap();
        store.set_unlimited(&id, true).await.unwrap();
        assert_eq!(store.decrement(&id, 30).await.unwrap(), Balance::Unlimited);

        store.set_unlimited(&id, false).await.unwrap();
        assert_eq!(store.get_remaining(&id).await.unwrap(), Balance::Limited(50));
    }

    #[tokio::test]
    async fn add_upserts_and_accumulates() {
        let store = store();
        let id = EntityId::new();
        assert_eq!(store.add(&id, 10).await.unwrap(), Balance::Limited(10));
        assert_eq!(store.add(&id, 50).await.unwrap(), Balance::Limited(60));
    }

    #[tokio::test]
    async fn repeated_reads_are_stable() {
        let store = store();
        let id = EntityId::new();
        store.set_remaining(&id, 7).await.unwrap();
        let first = store.get_remaining(&id).await.unwrap();
        let second = store.get_remaining(&id).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn counter_beyond_i64_is_rejected() {
        let store = store();
        let err = store
            .set_remaining(&EntityId::new(), u64::MAX)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::OutOfRange(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_adds_lose_no_update() {
        let store = Arc::new(store());
        let id = EntityId::new();
        store.set_remaining(&id, 10).await.unwrap();

        let handles: Vec<_> = (0..10)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store.add(&id, 5).await.unwrap();
                })
            })
            .collect();
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(store.get_remaining(&id).await.unwrap(), Balance::Limited(60));
    }

    #[tokio::test]
    async fn open_creates_parent_directory() {
        let dir = std::env::temp_dir().join(format!("flytime-test-{}", EntityId::new()));
        let path = dir.join("nested").join("flytime.db");
        let store = SqliteStore::open(&path).expect("open failed");
        let id = EntityId::new();
        store.set_remaining(&id, 3).await.unwrap();
        assert_eq!(store.get_remaining(&id).await.unwrap(), Balance::Limited(3));
        drop(store);
        let _ = std::fs::remove_dir_all(&dir);
    }
}
