//! SQL schema for the Cohort SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS users (
    id       INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id  INTEGER NOT NULL UNIQUE      -- external natural key
);

CREATE TABLE IF NOT EXISTS segments (
    id    INTEGER PRIMARY KEY AUTOINCREMENT,
    slug  TEXT NOT NULL UNIQUE
);

-- One row per (user, segment) pair, ever. Removal stamps deleted_at;
-- re-adding clears it and bumps created_at. Rows only disappear when their
-- segment is deleted.
CREATE TABLE IF NOT EXISTS user_segments (
    user_id     INTEGER NOT NULL REFERENCES users(id)    ON DELETE CASCADE,
    segment_id  INTEGER NOT NULL REFERENCES segments(id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL,   -- RFC 3339 UTC, microseconds, fixed width
    deleted_at  TEXT,            -- NULL while active
    UNIQUE (user_id, segment_id)
);

CREATE INDEX IF NOT EXISTS user_segments_segment_idx ON user_segments(segment_id);
CREATE INDEX IF NOT EXISTS user_segments_created_idx ON user_segments(created_at);
CREATE INDEX IF NOT EXISTS user_segments_deleted_idx ON user_segments(deleted_at);

PRAGMA user_version = 1;
";
