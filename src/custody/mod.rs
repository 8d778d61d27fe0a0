//! # Key Custody Service
//!
//! Session-scoped lifecycle for KEM keypairs.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        SESSION LIFECYCLE                                │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │   NonExistent ──generate──► Active ──expiry passes──► Expired          │
//! │        ▲                      │                          │              │
//! │        │                      │ revoke                   │ sweep/revoke │
//! │        └──────────────────────┴──────────────────────────┘              │
//! │                                                                         │
//! │   Active and Expired both show up in the masked view. Whether an       │
//! │   Expired session may still encapsulate or decapsulate is set by       │
//! │   DecapsulationPolicy.                                                  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The service holds no background threads. Sweeping is driven by the
//! caller, on a timer or before sensitive operations.

mod masked;

pub use masked::MaskedSession;

use std::sync::Arc;

use crate::config::{CustodyConfig, DecapsulationPolicy};
use crate::crypto::{Ciphertext, KeyEncapsulation, MlKem512, PublicKey, SecretKey, SharedSecret};
use crate::error::{Error, Result};
use crate::storage::{InsertOutcome, SessionKeyRecord, SessionStore};
use crate::time::{Clock, SystemClock};

/// Longest accepted session id, in bytes
pub const MAX_SESSION_ID_LEN: usize = 256;

/// A freshly generated and durably recorded keypair
#[derive(Debug)]
pub struct SessionKeypair {
    /// Public key, safe to hand to peers
    pub public_key: PublicKey,
    /// Secret key, zeroized on drop
    pub secret_key: SecretKey,
    /// Unix seconds at generation
    pub created_at: i64,
    /// Unix seconds at which the session expires
    pub expiry: i64,
    /// Whether an earlier record for the same id was replaced
    pub replaced: bool,
}

/// Where a session id sits in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No record stored
    NonExistent,
    /// Record stored and expiry still ahead
    Active,
    /// Record stored but expiry reached, waiting for a sweep
    Expired,
}

impl SessionState {
    fn at(expiry: i64, now: i64) -> Self {
        if expiry > now {
            SessionState::Active
        } else {
            SessionState::Expired
        }
    }
}

fn validate_session_id(session_id: &str) -> Result<()> {
    if session_id.is_empty() {
        return Err(Error::InvalidSessionId("session id is empty".into()));
    }
    if session_id.len() > MAX_SESSION_ID_LEN {
        return Err(Error::InvalidSessionId(format!(
            "session id is {} bytes, limit is {}",
            session_id.len(),
            MAX_SESSION_ID_LEN
        )));
    }
    Ok(())
}

/// Coordinates key generation, persistence, expiry and masked listing.
///
/// Safe to share across threads by reference; the store serializes access
/// per connection.
pub struct KeyCustodyService<K: KeyEncapsulation = MlKem512> {
    store: SessionStore,
    kem: K,
    clock: Arc<dyn Clock>,
    config: CustodyConfig,
}

impl KeyCustodyService<MlKem512> {
    /// Open the store named by `config`, initialize its schema and pair it
    /// with ML-KEM-512 over system entropy.
    pub fn open(config: CustodyConfig) -> Result<Self> {
        config.validate()?;
        let store = SessionStore::open(config.database_path.as_deref(), config.busy_timeout())?;
        store.init()?;
        Self::new(store, MlKem512::new(), config)
    }
}

impl<K: KeyEncapsulation> KeyCustodyService<K> {
    /// Assemble a service from its collaborators.
    ///
    /// The store must already be initialized (see [`SessionStore::init`]).
    pub fn new(store: SessionStore, kem: K, config: CustodyConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            kem,
            clock: Arc::new(SystemClock),
            config,
        })
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// The underlying store
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// The KEM provider, for session-less operations
    pub fn kem(&self) -> &K {
        &self.kem
    }

    /// Active configuration
    pub fn config(&self) -> &CustodyConfig {
        &self.config
    }

    /// Close the underlying store
    pub fn close(self) -> Result<()> {
        self.store.close()
    }

    /// Current time according to the service clock
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    // ========================================================================
    // GENERATION & REMOVAL
    // ========================================================================

    /// Generate a keypair for `session_id`, valid for `validity_minutes`.
    ///
    /// The keypair is returned only once it is stored. If the store refuses
    /// or fails, the keys are zeroized and the store error is returned.
    pub fn generate_for_session(
        &self,
        session_id: &str,
        validity_minutes: u32,
    ) -> Result<SessionKeypair> {
        validate_session_id(session_id)?;
        if validity_minutes == 0 {
            return Err(Error::InvalidValidity);
        }

        let (public_key, secret_key) = self.kem.generate_keypair()?;

        let created_at = self.clock.now();
        let record = SessionKeyRecord {
            session_id: session_id.to_string(),
            public_key,
            secret_key,
            created_at,
            expiry: created_at + i64::from(validity_minutes) * 60,
        };

        let outcome = match self.store.insert(&record, self.config.duplicate_policy) {
            Ok(outcome) => outcome,
            Err(e) => {
                // `record` drops here and its secret key is zeroized
                tracing::warn!(
                    session_id,
                    error = %e,
                    "Discarding generated keypair, session was not stored"
                );
                return Err(e);
            }
        };

        tracing::info!(
            session_id,
            expiry = record.expiry,
            replaced = outcome == InsertOutcome::Replaced,
            algorithm = self.kem.algorithm(),
            "Session keypair generated"
        );

        let SessionKeyRecord {
            public_key,
            secret_key,
            created_at,
            expiry,
            ..
        } = record;

        Ok(SessionKeypair {
            public_key,
            secret_key,
            created_at,
            expiry,
            replaced: outcome == InsertOutcome::Replaced,
        })
    }

    /// Remove the record for `session_id`. Returns 1 if one was removed,
    /// 0 if none existed.
    pub fn revoke_session(&self, session_id: &str) -> Result<usize> {
        let removed = self.store.delete_by_session(session_id)?;
        if removed > 0 {
            tracing::info!(session_id, removed, "Session revoked");
        } else {
            tracing::debug!(session_id, "Revoke for unknown session");
        }
        Ok(removed)
    }

    /// Remove every session whose expiry is at or before `now`.
    pub fn sweep(&self, now: i64) -> Result<usize> {
        let removed = self.store.delete_expired(now)?;
        if removed > 0 {
            tracing::info!(removed, now, "Expired sessions swept");
        } else {
            tracing::debug!(now, "Sweep found nothing to remove");
        }
        Ok(removed)
    }

    /// [`sweep`](Self::sweep) at the service clock's current time.
    pub fn sweep_expired(&self) -> Result<usize> {
        self.sweep(self.clock.now())
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    /// Masked listing of every stored session, ordered by id.
    ///
    /// On a storage failure the error is returned and no rows are.
    pub fn masked_view(&self) -> Result<Vec<MaskedSession>> {
        let now = self.clock.now();
        let prefix_len = self.config.mask_prefix_len;
        Ok(self
            .store
            .list_public()?
            .iter()
            .map(|record| MaskedSession::from_record(record, prefix_len, now))
            .collect())
    }

    /// Lifecycle state of `session_id` right now
    pub fn session_state(&self, session_id: &str) -> Result<SessionState> {
        Ok(match self.store.expiry(session_id)? {
            Some(expiry) => SessionState::at(expiry, self.clock.now()),
            None => SessionState::NonExistent,
        })
    }

    // ========================================================================
    // KEY USE
    // ========================================================================

    fn check_usable(&self, session_id: &str, expiry: i64) -> Result<()> {
        if self.config.decapsulation_policy == DecapsulationPolicy::ActiveOnly
            && SessionState::at(expiry, self.clock.now()) == SessionState::Expired
        {
            tracing::debug!(session_id, expiry, "Refusing key use on expired session");
            return Err(Error::SessionExpired(session_id.to_string()));
        }
        Ok(())
    }

    /// Encapsulate a fresh shared secret to the session's public key.
    pub fn encapsulate_for_session(&self, session_id: &str) -> Result<(Ciphertext, SharedSecret)> {
        let (public_key, expiry) = self
            .store
            .public_key(session_id)?
            .ok_or_else(|| Error::NotFound(session_id.to_string()))?;
        self.check_usable(session_id, expiry)?;
        self.kem.encapsulate(&public_key)
    }

    /// Recover the shared secret carried by `ciphertext` using the session's
    /// stored secret key.
    pub fn decapsulate_for_session(
        &self,
        session_id: &str,
        ciphertext: &Ciphertext,
    ) -> Result<SharedSecret> {
        let (secret_key, expiry) = self
            .store
            .secret_key(session_id)?
            .ok_or_else(|| Error::NotFound(session_id.to_string()))?;
        self.check_usable(session_id, expiry)?;
        self.kem.decapsulate(ciphertext, &secret_key)
    }
}

// ============================================================================
// TESTS
// ============================================================================
