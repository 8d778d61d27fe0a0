//! # Session Store
//!
//! SQLite persistence for session keypairs.
//!
//! ```text
//! ┌─────────────────┐
//! │ KeyCustody      │
//! │ Service         │
//! └────────┬────────┘
//!          │ SessionKeyRecord
//!          ▼
//! ┌─────────────────┐
//! │  SessionStore   │  insert (IMMEDIATE txn), delete, sweep, list
//! │  (this file)    │  one handle, shared by clone
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │    rusqlite     │  file for production, in-memory for tests
//! └─────────────────┘
//! ```
//!
//! All access goes through one mutex-guarded connection, so operations on
//! the same session id are serialized. Inserts additionally run in an
//! IMMEDIATE transaction so a second process sharing the file cannot slip a
//! row in between the duplicate check and the write.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use zeroize::Zeroizing;

use super::schema;
use crate::config::DuplicatePolicy;
use crate::crypto::{PublicKey, SecretKey};
use crate::error::{Error, Result};

/// A stored session keypair
#[derive(Debug, Clone)]
pub struct SessionKeyRecord {
    /// Caller-supplied session id
    pub session_id: String,
    /// KEM public key
    pub public_key: PublicKey,
    /// KEM secret key
    pub secret_key: SecretKey,
    /// Unix seconds at generation
    pub created_at: i64,
    /// Unix seconds after which the record is stale
    pub expiry: i64,
}

/// Listing projection of a record. Carries no secret key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicSessionRecord {
    /// Session id
    pub session_id: String,
    /// KEM public key
    pub public_key: PublicKey,
    /// Unix seconds at generation
    pub created_at: i64,
    /// Unix seconds after which the record is stale
    pub expiry: i64,
}

/// What an insert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    /// No previous record existed
    Inserted,
    /// A previous record for the session id was removed first
    Replaced,
}

/// Handle to the session database
///
/// Opened once and shared by clone; every clone uses the same connection.
#[derive(Clone)]
pub struct SessionStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}

fn corrupted(session_id: &str, err: Error) -> Error {
    Error::StorageCorrupted(format!("session {}: {}", session_id, err))
}

impl SessionStore {
    /// Open or create a database
    ///
    /// If path is None, creates an in-memory database. The schema is not
    /// touched; call [`SessionStore::init`] before use.
    pub fn open(path: Option<&Path>, busy_timeout: Duration) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p).map_err(|e| {
                Error::Storage(format!("Failed to open database {}: {}", p.display(), e))
            })?,
            None => Connection::open_in_memory()
                .map_err(|e| Error::Storage(format!("Failed to create in-memory database: {}", e)))?,
        };

        conn.busy_timeout(busy_timeout)
            .map_err(|e| Error::Storage(format!("Failed to set busy timeout: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open a fresh in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::open(None, Duration::from_millis(crate::config::DEFAULT_BUSY_TIMEOUT_MS))
    }

    /// Ensure the schema exists. Idempotent.
    pub fn init(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(schema::CREATE_TABLES)
            .map_err(|e| Error::Storage(format!("Failed to create tables: {}", e)))?;

        let version: Option<i32> = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .map_err(|e| Error::Storage(format!("Failed to read schema version: {}", e)))?;

        match version {
            None => {
                conn.execute(
                    "INSERT INTO schema_version (version) VALUES (?)",
                    params![schema::SCHEMA_VERSION],
                )
                .map_err(|e| Error::Storage(format!("Failed to set schema version: {}", e)))?;

                tracing::info!("Session store schema created (version {})", schema::SCHEMA_VERSION);
            }
            Some(v) if v > schema::SCHEMA_VERSION => {
                return Err(Error::Storage(format!(
                    "Database schema version {} is newer than supported version {}",
                    v,
                    schema::SCHEMA_VERSION
                )));
            }
            Some(v) => {
                tracing::debug!("Session store schema version: {}", v);
            }
        }

        Ok(())
    }

    // ========================================================================
    // WRITES
    // ========================================================================

    /// Persist a record
    ///
    /// With [`DuplicatePolicy::Reject`], an existing record whose expiry is
    /// still after `record.created_at` fails with `DuplicateSession`; an
    /// expired one is replaced. With [`DuplicatePolicy::Replace`] any
    /// existing record is replaced. Either way at most one row per session
    /// id is ever committed.
    pub fn insert(&self, record: &SessionKeyRecord, policy: DuplicatePolicy) -> Result<InsertOutcome> {
        if record.expiry <= record.created_at {
            return Err(Error::InvalidValidity);
        }

        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| Error::Storage(format!("Failed to begin transaction: {}", e)))?;

        let existing: Option<i64> = tx
            .query_row(
                "SELECT expiry FROM kem_sessions WHERE session_id = ?",
                params![record.session_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| Error::Storage(format!("Failed to check session: {}", e)))?;

        let outcome = match existing {
            None => InsertOutcome::Inserted,
            Some(expiry) if policy == DuplicatePolicy::Reject && expiry > record.created_at => {
                // Dropping the transaction rolls it back
                return Err(Error::DuplicateSession(record.session_id.clone()));
            }
            Some(_) => {
                tx.execute(
                    "DELETE FROM kem_sessions WHERE session_id = ?",
                    params![record.session_id],
                )
                .map_err(|e| Error::Storage(format!("Failed to replace session: {}", e)))?;
                InsertOutcome::Replaced
            }
        };

        tx.execute(
            "INSERT INTO kem_sessions (session_id, public_key, secret_key, created_at, expiry)
             VALUES (?, ?, ?, ?, ?)",
            params![
                record.session_id,
                record.public_key.as_bytes().as_slice(),
                record.secret_key.as_bytes().as_slice(),
                record.created_at,
                record.expiry,
            ],
        )
        .map_err(|e| Error::Storage(format!("Failed to insert session: {}", e)))?;

        tx.commit()
            .map_err(|e| Error::Storage(format!("Failed to commit session: {}", e)))?;

        Ok(outcome)
    }

    /// Remove the record for a session id. Returns the number removed (0 or 1).
    pub fn delete_by_session(&self, session_id: &str) -> Result<usize> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM kem_sessions WHERE session_id = ?",
            params![session_id],
        )
        .map_err(|e| Error::Storage(format!("Failed to delete session: {}", e)))
    }

    /// Remove every record whose expiry is at or before `now`.
    pub fn delete_expired(&self, now: i64) -> Result<usize> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM kem_sessions WHERE expiry <= ?", params![now])
            .map_err(|e| Error::Storage(format!("Failed to delete expired sessions: {}", e)))
    }

    // ========================================================================
    // READS
    // ========================================================================

    /// Snapshot of all records without their secret keys, ordered by id.
    ///
    /// Either every row is returned or an error is; never a partial list.
    pub fn list_public(&self) -> Result<Vec<PublicSessionRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT session_id, public_key, created_at, expiry
                 FROM kem_sessions ORDER BY session_id",
            )
            .map_err(|e| Error::Storage(format!("Failed to prepare query: {}", e)))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Vec<u8>>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            })
            .map_err(|e| Error::Storage(format!("Failed to list sessions: {}", e)))?;

        let mut records = Vec::new();
        for row in rows {
            let (session_id, public_key, created_at, expiry) =
                row.map_err(|e| Error::Storage(format!("Failed to read session row: {}", e)))?;
            let public_key =
                PublicKey::from_slice(&public_key).map_err(|e| corrupted(&session_id, e))?;
            records.push(PublicSessionRecord {
                session_id,
                public_key,
                created_at,
                expiry,
            });
        }

        Ok(records)
    }

    /// Public key and expiry for a session id
    pub fn public_key(&self, session_id: &str) -> Result<Option<(PublicKey, i64)>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT public_key, expiry FROM kem_sessions WHERE session_id = ?",
                params![session_id],
                |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()
            .map_err(|e| Error::Storage(format!("Failed to get public key: {}", e)))?;

        match row {
            Some((bytes, expiry)) => {
                let key = PublicKey::from_slice(&bytes).map_err(|e| corrupted(session_id, e))?;
                Ok(Some((key, expiry)))
            }
            None => Ok(None),
        }
    }

    /// Secret key and expiry for a session id
    pub fn secret_key(&self, session_id: &str) -> Result<Option<(SecretKey, i64)>> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                "SELECT secret_key, expiry FROM kem_sessions WHERE session_id = ?",
                params![session_id],
                |row| Ok((Zeroizing::new(row.get::<_, Vec<u8>>(0)?), row.get::<_, i64>(1)?)),
            )
            .optional()
            .map_err(|e| Error::Storage(format!("Failed to get secret key: {}", e)))?;

        match row {
            Some((bytes, expiry)) => {
                let key = SecretKey::from_slice(&bytes).map_err(|e| corrupted(session_id, e))?;
                Ok(Some((key, expiry)))
            }
            None => Ok(None),
        }
    }

    /// Expiry of a session id, if a record exists
    pub fn expiry(&self, session_id: &str) -> Result<Option<i64>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT expiry FROM kem_sessions WHERE session_id = ?",
            params![session_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| Error::Storage(format!("Failed to get expiry: {}", e)))
    }

    /// Number of stored records
    pub fn count(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM kem_sessions", [], |row| row.get(0))
            .map_err(|e| Error::Storage(format!("Failed to count sessions: {}", e)))?;
        Ok(count as usize)
    }

    /// Close the database
    ///
    /// If other clones of this handle are alive the connection stays open
    /// until the last one drops.
    pub fn close(self) -> Result<()> {
        match Arc::try_unwrap(self.conn) {
            Ok(mutex) => mutex
                .into_inner()
                .close()
                .map_err(|(_, e)| Error::Storage(format!("Failed to close database: {}", e))),
            Err(_) => Ok(()),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
