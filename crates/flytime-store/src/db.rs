use rusqlite::Connection;

use crate::error::Result;

/// Initialise the flight-time schema in `conn`.
///
/// One row per entity, unique on `entity_id`. Rows are never deleted, so a
/// player's balance survives any period of absence.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS flight_time (
            entity_id       TEXT    NOT NULL PRIMARY KEY,
            remaining_secs  INTEGER NOT NULL DEFAULT 0 CHECK (remaining_secs >= 0),
            unlimited       INTEGER NOT NULL DEFAULT 0,  -- 1 = never decremented
            created_at      TEXT    NOT NULL,
            updated_at      TEXT    NOT NULL
        ) STRICT;
        ",
    )?;
    Ok(())
}
