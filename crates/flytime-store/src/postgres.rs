use async_trait::async_trait;
use flytime_core::{Balance, EntityId};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};

use crate::{
    error::{Result, StoreError},
    store::DurationStore,
};

/// PostgreSQL-backed [`DurationStore`] over a sqlx connection pool.
///
/// Decrement and add are single `RETURNING` statements, so the row lock
/// taken by the update serialises concurrent writers on the same entity.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect to `url` and make sure the schema exists.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        info!(max_connections, "connected to PostgreSQL");
        let store = Self::from_pool(pool);
        store.ensure_schema().await;
        Ok(store)
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Postgres `BIGINT` is signed; reject counters that would not round-trip.
fn to_sql_secs(secs: u64) -> Result<i64> {
    i64::try_from(secs).map_err(|_| StoreError::OutOfRange(secs))
}

fn to_balance((secs, unlimited): (i64, bool)) -> Balance {
    if unlimited {
        Balance::Unlimited
    } else {
        Balance::Limited(u64::try_from(secs).unwrap_or(0))
    }
}

#[async_trait]
impl DurationStore for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS flight_time (
                entity_id       UUID        PRIMARY KEY,
                remaining_secs  BIGINT      NOT NULL DEFAULT 0 CHECK (remaining_secs >= 0),
                unlimited       BOOLEAN     NOT NULL DEFAULT FALSE,
                created_at      TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at      TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn ensure_record(&self, id: &EntityId) -> Result<()> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO flight_time (entity_id)
            VALUES ($1)
            ON CONFLICT (entity_id) DO NOTHING
            "#,
        )
        .bind(id.0)
        .execute(&self.pool)
        .await?
        .rows_affected();
        if inserted > 0 {
            debug!(entity = %id, "flight record created");
        }
        Ok(())
    }

    async fn get_remaining(&self, id: &EntityId) -> Result<Balance> {
        let row: Option<(i64, bool)> = sqlx::query_as(
            "SELECT remaining_secs, unlimited FROM flight_time WHERE entity_id = $1",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(to_balance).unwrap_or_default())
    }

    async fn set_remaining(&self, id: &EntityId, secs: u64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO flight_time (entity_id, remaining_secs)
            VALUES ($1, $2)
            ON CONFLICT (entity_id)
            DO UPDATE SET remaining_secs = EXCLUDED.remaining_secs,
                          updated_at     = NOW()
            "#,
        )
        .bind(id.0)
        .bind(to_sql_secs(secs)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn decrement(&self, id: &EntityId, delta: u64) -> Result<Balance> {
        let row: Option<(i64, bool)> = sqlx::query_as(
            r#"
            UPDATE flight_time
            SET remaining_secs = CASE
                    WHEN unlimited              THEN remaining_secs
                    WHEN remaining_secs <= $2   THEN 0
                    ELSE remaining_secs - $2
                END,
                updated_at = NOW()
            WHERE entity_id = $1
            RETURNING remaining_secs, unlimited
            "#,
        )
        .bind(id.0)
        .bind(to_sql_secs(delta)?)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(to_balance).unwrap_or_default())
    }

    async fn add(&self, id: &EntityId, delta: u64) -> Result<Balance> {
        let row: (i64, bool) = sqlx::query_as(
            r#"
            INSERT INTO flight_time (entity_id, remaining_secs)
            VALUES ($1, $2)
            ON CONFLICT (entity_id)
            DO UPDATE SET remaining_secs = flight_time.remaining_secs + EXCLUDED.remaining_secs,
                          updated_at     = NOW()
            RETURNING remaining_secs, unlimited
            "#,
        )
        .bind(id.0)
        .bind(to_sql_secs(delta)?)
        .fetch_one(&self.pool)
        .await?;
        Ok(to_balance(row))
    }

    async fn set_unlimited(&self, id: &EntityId, unlimited: bool) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO flight_time (entity_id, unlimited)
            VALUES ($1, $2)
            ON CONFLICT (entity_id)
            DO UPDATE SET unlimited  = EXCLUDED.unlimited,
                          updated_at = NOW()
            "#,
        )
        .bind(id.0)
        .bind(unlimited)
        .execute(&self.pool)
        .await?;
        info!(entity = %id, unlimited, "unlimited flag updated");
        Ok(())
    }
}
