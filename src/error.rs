//! # Error Handling
//!
//! Error types for the key custody library.
//!
//! ## Error Hierarchy
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           ERROR HIERARCHY                               │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  Error (top-level)                                                     │
//! │  │                                                                      │
//! │  ├── Config Errors                                                     │
//! │  │   └── InvalidConfig         - Rejected configuration value          │
//! │  │                                                                      │
//! │  ├── Session Errors                                                    │
//! │  │   ├── InvalidSessionId      - Empty or oversized session id         │
//! │  │   ├── InvalidValidity       - Validity duration is zero             │
//! │  │   ├── DuplicateSession      - Live session already exists           │
//! │  │   ├── NotFound              - No record for the session id          │
//! │  │   └── SessionExpired        - Session past expiry, use refused      │
//! │  │                                                                      │
//! │  ├── Crypto Errors                                                     │
//! │  │   ├── RngUnavailable        - No entropy source could be reached    │
//! │  │   ├── CryptoOperationFailed - KEM provider rejected or failed       │
//! │  │   └── InvalidKey            - Wrong key/ciphertext length           │
//! │  │                                                                      │
//! │  └── Storage Errors                                                    │
//! │      ├── Storage               - I/O, schema or connection failure     │
//! │      └── StorageCorrupted      - Stored row fails validation           │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Error messages carry session ids and causes only. Key bytes never
//! appear in an error.

use thiserror::Error;

/// Result type alias for custody operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the custody library
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Config Errors (100-199)
    // ========================================================================

    /// A configuration value was rejected
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ========================================================================
    // Session Errors (200-299)
    // ========================================================================

    /// Session id is empty or too long
    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),

    /// Validity duration must be positive
    #[error("Validity duration must be at least one minute")]
    InvalidValidity,

    /// A live record already exists for this session id
    #[error("Session already exists: {0}")]
    DuplicateSession(String),

    /// No record exists for this session id
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The session exists but its expiry has passed
    #[error("Session expired: {0}")]
    SessionExpired(String),

    // ========================================================================
    // Crypto Errors (300-399)
    // ========================================================================

    /// No secure randomness source could be reached
    #[error("Secure random source unavailable: {0}")]
    RngUnavailable(String),

    /// The KEM provider rejected its inputs or failed internally
    #[error("Crypto operation failed: {0}")]
    CryptoOperationFailed(String),

    /// Key or ciphertext has the wrong length
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    // ========================================================================
    // Storage Errors (400-499)
    // ========================================================================

    /// The store could not complete an operation
    #[error("Storage error: {0}")]
    Storage(String),

    /// A stored row failed validation
    #[error("Data corruption detected: {0}")]
    StorageCorrupted(String),
}

impl Error {
    /// Get the numeric error code
    ///
    /// Error codes are organized by category:
    /// - 100-199: Config
    /// - 200-299: Session
    /// - 300-399: Crypto
    /// - 400-499: Storage
    pub fn code(&self) -> i32 {
        match self {
            // Config (100-199)
            Error::InvalidConfig(_) => 100,

            // Session (200-299)
            Error::InvalidSessionId(_) => 200,
            Error::InvalidValidity => 201,
            Error::DuplicateSession(_) => 202,
            Error::NotFound(_) => 203,
            Error::SessionExpired(_) => 204,

            // Crypto (300-399)
            Error::RngUnavailable(_) => 300,
            Error::CryptoOperationFailed(_) => 301,
            Error::InvalidKey(_) => 302,

            // Storage (400-499)
            Error::Storage(_) => 400,
            Error::StorageCorrupted(_) => 401,
        }
    }

    /// Check if this error is recoverable
    ///
    /// Recoverable errors can be retried by the host: a later attempt may
    /// reach entropy, the store, or a well-formed input.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::RngUnavailable(_) | Error::CryptoOperationFailed(_) | Error::Storage(_)
        )
    }
}

// ============================================================================
// ERROR CONVERSIONS
// ============================================================================

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

// ============================================================================
// TESTS
// ============================================================================
