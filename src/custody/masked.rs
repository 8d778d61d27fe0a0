//! Masked session listing.
//!
//! A [`MaskedSession`] is what an operator may see: the session id, a short
//! hex prefix of the public key and how long the session has left. It is
//! built from [`PublicSessionRecord`], which never carries a secret key.

use serde::Serialize;

use crate::config::MAX_MASK_PREFIX_LEN;
use crate::crypto::PUBLIC_KEY_SIZE;
use crate::storage::PublicSessionRecord;

/// Display record for one stored session
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MaskedSession {
    /// Session id
    pub session_id: String,
    /// Hex of the first few public-key bytes
    pub key_prefix: String,
    /// Number of public-key bytes not shown
    pub masked_bytes: usize,
    /// `expiry - now`. Zero or negative means expired, pending a sweep.
    pub seconds_until_expiry: i64,
}

impl MaskedSession {
    /// Build the masked view of a record at time `now`.
    ///
    /// `prefix_len` is capped at [`MAX_MASK_PREFIX_LEN`].
    pub fn from_record(record: &PublicSessionRecord, prefix_len: usize, now: i64) -> Self {
        let shown = prefix_len.min(MAX_MASK_PREFIX_LEN);
        Self {
            session_id: record.session_id.clone(),
            key_prefix: hex::encode(record.public_key.prefix(shown)),
            masked_bytes: PUBLIC_KEY_SIZE - shown,
            seconds_until_expiry: record.expiry - now,
        }
    }

    /// Whether the session is past its expiry
    pub fn is_expired(&self) -> bool {
        self.seconds_until_expiry <= 0
    }
}

impl std::fmt::Display for MaskedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Session: {} | Key: {}******** ({} bytes masked) | ",
            self.session_id, self.key_prefix, self.masked_bytes
        )?;
        if self.is_expired() {
            write!(f, "Expired {}s ago, pending sweep", -self.seconds_until_expiry)
        } else {
            write!(f, "Expires in {}s", self.seconds_until_expiry)
        }
    }
}
