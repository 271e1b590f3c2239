//! SQL schema for the suppression store.
//!
//! Executed once per connection. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;

-- One row per (recipient, sender fingerprint) pair.
-- Rows are overwritten in place and never deleted by the responder.
CREATE TABLE IF NOT EXISTS suppressions (
    key           TEXT PRIMARY KEY,
    last_sent_at  INTEGER NOT NULL   -- Unix seconds, UTC
);

PRAGMA user_version = 1;
";
