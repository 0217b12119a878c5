pub mod queries;

use anyhow::Context;
use rusqlite::Connection;

// The partial unique index is what makes concurrent admission safe: two
// inserts for the same live (date, time, barber) cannot both commit, and
// cancelled rows stop counting against the slot.
const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS appointments (
    id TEXT PRIMARY KEY,
    service TEXT NOT NULL,
    date TEXT NOT NULL,
    time TEXT NOT NULL,
    name TEXT NOT NULL,
    email TEXT NOT NULL,
    phone TEXT NOT NULL,
    barber TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_appointments_slot
    ON appointments(date, time, barber)
    WHERE status != 'cancelled';

CREATE TABLE IF NOT EXISTS failed_bookings (
    id TEXT PRIMARY KEY,
    request_json TEXT NOT NULL,
    error TEXT NOT NULL,
    created_at TEXT NOT NULL,
    resolved INTEGER NOT NULL DEFAULT 0
);
";

pub fn init_db(path: &str) -> anyhow::Result<Connection> {
    let conn = Connection::open(path).context("failed to open database")?;

    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .context("failed to set database pragmas")?;

    conn.execute_batch(SCHEMA)
        .context("failed to create schema")?;

    Ok(conn)
}
