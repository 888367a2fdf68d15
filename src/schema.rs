//! Table bootstrap for a fresh database.

use roster_db::{Connection, Database, DbResult};
use roster_log::info;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS influencers (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT    NOT NULL,
    handle     TEXT    NOT NULL DEFAULT '',
    platform   TEXT    NOT NULL DEFAULT '',
    followers  INTEGER NOT NULL DEFAULT 0,
    email      TEXT,
    status     TEXT    NOT NULL DEFAULT 'active',
    created_at TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TEXT
);

CREATE TABLE IF NOT EXISTS users (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    username   TEXT    NOT NULL UNIQUE,
    email      TEXT,
    role       TEXT    NOT NULL DEFAULT 'member',
    active     INTEGER NOT NULL DEFAULT 1,
    created_at TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS logs (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    kind       TEXT    NOT NULL,
    subject_id INTEGER,
    action     TEXT    NOT NULL,
    message    TEXT    NOT NULL DEFAULT '',
    created_at TEXT    NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE INDEX IF NOT EXISTS idx_logs_kind_subject ON logs (kind, subject_id);
";

/// Create the `influencers`, `users` and `logs` tables if they are missing.
pub fn bootstrap<C: Connection>(db: &mut Database<C>) -> DbResult<()> {
    db.execute_batch(SCHEMA)?;
    info!(target: "roster::db", "Schema ready");
    Ok(())
}
