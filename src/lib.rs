//! # Kyber Custody
//!
//! Session-scoped custody of post-quantum KEM keypairs: generate an
//! ML-KEM-512 keypair per session, persist it with an expiry, sweep expired
//! sessions and show operators a masked listing that never exposes secret
//! key material.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        KYBER CUSTODY MODULES                            │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │                    ┌──────────────────────────┐                         │
//! │                    │         Custody          │                         │
//! │                    │                          │                         │
//! │                    │ - generate_for_session   │                         │
//! │                    │ - revoke / sweep         │                         │
//! │                    │ - masked_view            │                         │
//! │                    │ - encapsulate/decaps     │                         │
//! │                    └────┬───────────────┬─────┘                         │
//! │                         │               │                               │
//! │           ┌─────────────▼───┐     ┌─────▼───────────┐   ┌────────────┐  │
//! │           │     Crypto      │     │     Storage     │   │    Time    │  │
//! │           │                 │     │                 │   │            │  │
//! │           │ - RandomSource  │     │ - SQLite        │   │ - Clock    │  │
//! │           │ - ML-KEM-512    │     │ - kem_sessions  │   │ - Manual   │  │
//! │           │ - Key types     │     │ - Sweeps        │   │   Clock    │  │
//! │           └─────────────────┘     └─────────────────┘   └────────────┘  │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Hierarchy
//!
//! - [`error`] - Error types for the entire library
//! - [`config`] - Policy knobs and config file loading
//! - [`crypto`] - Randomness, key containers and the KEM provider
//! - [`storage`] - SQLite session store
//! - [`custody`] - The custody service and masked listing
//! - [`time`] - Timestamps and injectable clocks
//!
//! ## Example
//!
//! ```no_run
//! use kyber_custody::{CustodyConfig, KeyCustodyService};
//!
//! # fn main() -> kyber_custody::Result<()> {
//! let service = KeyCustodyService::open(CustodyConfig::default())?;
//! let keys = service.generate_for_session("session-42", 5)?;
//! let (ciphertext, sent) = service.encapsulate_for_session("session-42")?;
//! let received = service.decapsulate_for_session("session-42", &ciphertext)?;
//! assert_eq!(sent, received);
//! # drop(keys);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULE DECLARATIONS
// ============================================================================

pub mod config;
pub mod crypto;
pub mod custody;
pub mod error;
pub mod storage;
pub mod time;

// ============================================================================
// RE-EXPORTS
// ============================================================================

pub use config::{CustodyConfig, DecapsulationPolicy, DuplicatePolicy};
pub use crypto::{Ciphertext, KeyEncapsulation, MlKem512, PublicKey, SecretKey, SharedSecret};
pub use custody::{KeyCustodyService, MaskedSession, SessionKeypair, SessionState};
pub use error::{Error, Result};
pub use storage::SessionStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
