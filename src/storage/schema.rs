//! # Database Schema
//!
//! SQL schema definitions for the session key store.
//!
//! ```text
//! ┌──────────────────────────────┐      ┌─────────────────┐
//! │        kem_sessions          │      │ schema_version  │
//! ├──────────────────────────────┤      ├─────────────────┤
//! │ id          INTEGER PK       │      │ version         │
//! │ session_id  TEXT UNIQUE      │      └─────────────────┘
//! │ public_key  BLOB (800)       │
//! │ secret_key  BLOB (1632)      │
//! │ created_at  INTEGER (secs)   │
//! │ expiry      INTEGER (secs)   │
//! └──────────────────────────────┘
//! ```

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// SQL to create all tables. Safe to run repeatedly.
pub const CREATE_TABLES: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY
);

-- One row per session; rows are inserted and deleted, never updated
CREATE TABLE IF NOT EXISTS kem_sessions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL UNIQUE,
    public_key BLOB NOT NULL,
    secret_key BLOB NOT NULL,
    created_at INTEGER NOT NULL,
    expiry INTEGER NOT NULL,
    CONSTRAINT expiry_after_creation CHECK (expiry > created_at)
);

-- Sweeps scan by expiry
CREATE INDEX IF NOT EXISTS idx_kem_sessions_expiry ON kem_sessions(expiry);
"#;
