//! `flytime-store` — durable per-entity flight-time counters.
//!
//! # Overview
//!
//! Every backend implements [`DurationStore`]: a key(entity) → remaining
//! seconds counter with an atomic decrement-with-floor, an atomic add, and an
//! explicit unlimited flag.
//!
//! | Backend           | Persistence                          |
//! |-------------------|--------------------------------------|
//! | [`SqliteStore`]   | `flight_time` table via rusqlite     |
//! | [`PostgresStore`] | `flight_time` table via a sqlx pool  |
//! | [`MemoryStore`]   | process-local `DashMap`              |

pub mod db;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod sqlite;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use sqlite::SqliteStore;
pub use store::DurationStore;
