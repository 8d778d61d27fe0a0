//! # Cryptography Module
//!
//! Secure randomness, fixed-size key containers and the KEM provider.
//!
//! ## Security Considerations
//!
//! 1. **Key Zeroization**: secret keys and shared secrets are zeroized when dropped
//! 2. **Redacted Debug**: secret types never print their bytes
//! 3. **Secure Random**: every key draws from [`RandomSource`], which reports
//!    exhaustion as an error instead of aborting
//! 4. **Fixed Sizes**: buffer sizes are checked against the ML-KEM-512
//!    parameter set at compile time

mod kem;
mod keys;
pub mod random;

pub use kem::{KeyEncapsulation, MlKem512};
pub use keys::{Ciphertext, PublicKey, SecretKey, SharedSecret};
pub use random::{EntropySource, RandomSource, SourceRng, SyscallEntropy};

#[cfg(unix)]
pub use random::DeviceEntropy;

/// Size of a public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 800;

/// Size of a secret key in bytes
pub const SECRET_KEY_SIZE: usize = 1632;

/// Size of a ciphertext in bytes
pub const CIPHERTEXT_SIZE: usize = 768;

/// Size of a shared secret in bytes
pub const SHARED_SECRET_SIZE: usize = 32;
