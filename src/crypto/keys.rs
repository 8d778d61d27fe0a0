//! # Key Material
//!
//! Fixed-size byte containers for the KEM boundary.
//!
//! | Type | Size | Secret | Zeroized on drop |
//! |------|------|--------|------------------|
//! | [`PublicKey`] | 800 | no | no |
//! | [`SecretKey`] | 1632 | yes | yes |
//! | [`Ciphertext`] | 768 | no | no |
//! | [`SharedSecret`] | 32 | yes | yes |
//!
//! Secret types print as `[REDACTED]` so they cannot leak through `Debug`
//! or error messages.

use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{CIPHERTEXT_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE, SHARED_SECRET_SIZE};
use crate::error::{Error, Result};

fn fixed<const N: usize>(bytes: &[u8], what: &str) -> Result<[u8; N]> {
    bytes.try_into().map_err(|_| {
        Error::InvalidKey(format!("{} must be {} bytes, got {}", what, N, bytes.len()))
    })
}

/// KEM public (encapsulation) key
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    /// Wrap raw bytes
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy from a slice, checking the length
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        fixed(bytes, "public key").map(Self)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Leading `len` bytes, clamped to the key size
    pub fn prefix(&self, len: usize) -> &[u8] {
        &self.0[..len.min(PUBLIC_KEY_SIZE)]
    }

    /// Encode as hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from hex string
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes =
            hex::decode(hex_str).map_err(|e| Error::InvalidKey(format!("Invalid hex: {}", e)))?;
        Self::from_slice(&bytes)
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({}..)", hex::encode(self.prefix(8)))
    }
}

/// KEM secret (decapsulation) key
///
/// Only use the bytes for decapsulation or secure storage. Never log or
/// transmit them.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; SECRET_KEY_SIZE]);

impl SecretKey {
    /// Wrap raw bytes
    pub fn from_bytes(bytes: [u8; SECRET_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy from a slice, checking the length
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        fixed(bytes, "secret key").map(Self)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; SECRET_KEY_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

/// KEM ciphertext carrying an encapsulated shared secret
#[derive(Clone, PartialEq, Eq)]
pub struct Ciphertext([u8; CIPHERTEXT_SIZE]);

impl Ciphertext {
    /// Wrap raw bytes
    pub fn from_bytes(bytes: [u8; CIPHERTEXT_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy from a slice, checking the length
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        fixed(bytes, "ciphertext").map(Self)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; CIPHERTEXT_SIZE] {
        &self.0
    }

    /// Encode as hex string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Decode from hex string
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let bytes =
            hex::decode(hex_str).map_err(|e| Error::InvalidKey(format!("Invalid hex: {}", e)))?;
        Self::from_slice(&bytes)
    }
}

impl std::fmt::Debug for Ciphertext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Ciphertext({} bytes)", CIPHERTEXT_SIZE)
    }
}

/// Shared secret agreed through encapsulation
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; SHARED_SECRET_SIZE]);

impl SharedSecret {
    /// Wrap raw bytes
    pub fn from_bytes(bytes: [u8; SHARED_SECRET_SIZE]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; SHARED_SECRET_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SharedSecret([REDACTED])")
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_length_checked() {
        assert!(PublicKey::from_slice(&[0u8; PUBLIC_KEY_SIZE]).is_ok());
        assert!(matches!(
            PublicKey::from_slice(&[0u8; PUBLIC_KEY_SIZE - 1]),
            Err(Error::InvalidKey(_))
        ));
        assert!(SecretKey::from_slice(&[0u8; 800]).is_err());
        assert!(Ciphertext::from_slice(&[0u8; CIPHERTEXT_SIZE + 1]).is_err());
    }

    #[test]
    fn test_secret_debug_is_redacted() {
        let sk = SecretKey::from_bytes([0xAA; SECRET_KEY_SIZE]);
        let ss = SharedSecret::from_bytes([0xBB; SHARED_SECRET_SIZE]);
        let rendered = format!("{:?} {:?}", sk, ss);
        assert!(!rendered.to_lowercase().contains("aa"));
        assert!(!rendered.to_lowercase().contains("bb"));
        assert!(rendered.contains("REDACTED"));
    }

    #[test]
    fn test_public_key_prefix() {
        let mut bytes = [0u8; PUBLIC_KEY_SIZE];
        bytes[..4].copy_from_slice(&[1, 2, 3, 4]);
        let pk = PublicKey::from_bytes(bytes);
        assert_eq!(pk.prefix(4), &[1, 2, 3, 4]);
        assert_eq!(pk.prefix(10_000).len(), PUBLIC_KEY_SIZE);
        assert_eq!(format!("{:?}", pk), "PublicKey(0102030400000000..)");
    }

    #[test]
    fn test_public_key_hex() {
        let pk = PublicKey::from_bytes([0x3C; PUBLIC_KEY_SIZE]);
        let restored = PublicKey::from_hex(&pk.to_hex()).unwrap();
        assert_eq!(pk, restored);
        assert!(PublicKey::from_hex("zz").is_err());
    }
}
