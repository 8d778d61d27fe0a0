//! # Storage Module
//!
//! Durable custody of session keypairs.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         STORAGE SYSTEM                                  │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  SQLite Database                                                       │
//! │  ───────────────                                                        │
//! │  • kem_sessions   - one row per session id (UNIQUE)                    │
//! │  • schema_version - schema bookkeeping                                 │
//! │                                                                         │
//! │  Rows are inserted and deleted, never updated in place. Listing        │
//! │  queries select public columns only; secret keys leave the table      │
//! │  solely through a lookup by session id.                                │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod database;
mod schema;

pub use database::{InsertOutcome, PublicSessionRecord, SessionKeyRecord, SessionStore};
pub use schema::SCHEMA_VERSION;
