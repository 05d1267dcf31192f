//! SQL schema for the visitmap SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- The ledger. Strictly append-only; the triggers below reject any UPDATE
-- or DELETE. AUTOINCREMENT guarantees sequences are never reused.
CREATE TABLE IF NOT EXISTS events (
    sequence    INTEGER PRIMARY KEY AUTOINCREMENT,
    recorded_at TEXT NOT NULL,   -- ISO 8601 UTC; admission time
    actor       TEXT NOT NULL,   -- normalised handle
    subject     TEXT NOT NULL,   -- normalised subject identifier
    kind        TEXT NOT NULL    -- 'add' | 'remove'
);

CREATE TRIGGER IF NOT EXISTS events_no_update
BEFORE UPDATE ON events
BEGIN
    SELECT RAISE(ABORT, 'events are append-only');
END;

CREATE TRIGGER IF NOT EXISTS events_no_delete
BEFORE DELETE ON events
BEGIN
    SELECT RAISE(ABORT, 'events are append-only');
END;

-- One row per actor ever admitted. Only the gate writes here.
CREATE TABLE IF NOT EXISTS rate_limits (
    actor            TEXT PRIMARY KEY,
    last_accepted_ms INTEGER NOT NULL   -- Unix epoch milliseconds
);

-- Administrative inputs; the core only reads these.
CREATE TABLE IF NOT EXISTS bans (
    actor     TEXT PRIMARY KEY,
    banned_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    key   TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

PRAGMA user_version = 1;
";

/// `settings` key holding the global lock flag (`'true'` / `'false'`).
pub const LOCK_KEY: &str = "lock";
