//! # Key Encapsulation
//!
//! The [`KeyEncapsulation`] trait is the boundary to the lattice KEM. The
//! custody layer never looks inside the math; it only moves fixed-size
//! buffers across this trait and treats provider failures as
//! `CryptoOperationFailed`.
//!
//! ```text
//! Device 1 (custodian)                         Device 2 (peer)
//! ────────────────────                         ───────────────
//! generate_keypair() ─► (pk, sk)
//!          pk ───────────────────────────────► encapsulate(pk)
//!                                               └─► (ct, shared_secret)
//!          ct ◄───────────────────────────────
//! decapsulate(ct, sk) ─► shared_secret   (same 32 bytes)
//! ```

use fips203::ml_kem_512;
use fips203::traits::{Decaps, Encaps, KeyGen, SerDes};

use super::keys::{Ciphertext, PublicKey, SecretKey, SharedSecret};
use super::random::RandomSource;
use super::{CIPHERTEXT_SIZE, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE};
use crate::error::{Error, Result};

// The byte contract must match the compiled parameter set.
const _: () = assert!(PUBLIC_KEY_SIZE == ml_kem_512::EK_LEN);
const _: () = assert!(SECRET_KEY_SIZE == ml_kem_512::DK_LEN);
const _: () = assert!(CIPHERTEXT_SIZE == ml_kem_512::CT_LEN);

/// A key encapsulation mechanism over fixed-size buffers.
pub trait KeyEncapsulation: Send + Sync {
    /// Algorithm name for logs and displays.
    fn algorithm(&self) -> &'static str;

    /// Generate a fresh keypair.
    fn generate_keypair(&self) -> Result<(PublicKey, SecretKey)>;

    /// Produce a ciphertext and the shared secret it carries.
    fn encapsulate(&self, public_key: &PublicKey) -> Result<(Ciphertext, SharedSecret)>;

    /// Recover the shared secret from a ciphertext.
    fn decapsulate(&self, ciphertext: &Ciphertext, secret_key: &SecretKey) -> Result<SharedSecret>;
}

/// ML-KEM-512 (FIPS 203) backed by a [`RandomSource`].
#[derive(Debug, Default)]
pub struct MlKem512 {
    random: RandomSource,
}

impl MlKem512 {
    /// Provider drawing from the platform entropy chain.
    pub fn new() -> Self {
        Self::with_random_source(RandomSource::system())
    }

    /// Provider drawing from a specific source chain.
    pub fn with_random_source(random: RandomSource) -> Self {
        Self { random }
    }

    /// The randomness this provider consumes.
    pub fn random_source(&self) -> &RandomSource {
        &self.random
    }
}

fn provider_error(op: &str, reason: &str) -> Error {
    Error::CryptoOperationFailed(format!("{}: {}", op, reason))
}

impl KeyEncapsulation for MlKem512 {
    fn algorithm(&self) -> &'static str {
        "ML-KEM-512"
    }

    fn generate_keypair(&self) -> Result<(PublicKey, SecretKey)> {
        let mut rng = self.random.rng();
        let generated = ml_kem_512::KG::try_keygen_with_rng(&mut rng);

        // Keys built from a failed entropy read are discarded
        if let Some(err) = rng.take_failure() {
            return Err(err);
        }

        let (ek, dk) = generated.map_err(|e| provider_error("keygen", e))?;
        Ok((
            PublicKey::from_bytes(ek.into_bytes()),
            SecretKey::from_bytes(dk.into_bytes()),
        ))
    }

    fn encapsulate(&self, public_key: &PublicKey) -> Result<(Ciphertext, SharedSecret)> {
        let ek = ml_kem_512::EncapsKey::try_from_bytes(*public_key.as_bytes())
            .map_err(|e| provider_error("encapsulate", e))?;

        let mut rng = self.random.rng();
        let encapsulated = ek.try_encaps_with_rng(&mut rng);
        if let Some(err) = rng.take_failure() {
            return Err(err);
        }

        let (ssk, ct) = encapsulated.map_err(|e| provider_error("encapsulate", e))?;
        Ok((
            Ciphertext::from_bytes(ct.into_bytes()),
            SharedSecret::from_bytes(ssk.into_bytes()),
        ))
    }

    fn decapsulate(&self, ciphertext: &Ciphertext, secret_key: &SecretKey) -> Result<SharedSecret> {
        let dk = ml_kem_512::DecapsKey::try_from_bytes(*secret_key.as_bytes())
            .map_err(|e| provider_error("decapsulate", e))?;
        let ct = ml_kem_512::CipherText::try_from_bytes(*ciphertext.as_bytes())
            .map_err(|e| provider_error("decapsulate", e))?;

        let ssk = dk
            .try_decaps(&ct)
            .map_err(|e| provider_error("decapsulate", e))?;
        Ok(SharedSecret::from_bytes(ssk.into_bytes()))
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::random::EntropySource;

    struct Dead;

    impl EntropySource for Dead {
        fn name(&self) -> &'static str {
            "dead"
        }

        fn fill(&self, _buf: &mut [u8]) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "no entropy"))
        }
    }

    #[test]
    fn test_round_trip() {
        let kem = MlKem512::new();
        let (pk, sk) = kem.generate_keypair().unwrap();

        let (ct, sent) = kem.encapsulate(&pk).unwrap();
        let received = kem.decapsulate(&ct, &sk).unwrap();

        assert_eq!(sent.as_bytes(), received.as_bytes());
        assert_eq!(received.as_bytes().len(), 32);
    }

    #[test]
    fn test_keypairs_are_distinct() {
        let kem = MlKem512::new();
        let (pk1, _) = kem.generate_keypair().unwrap();
        let (pk2, _) = kem.generate_keypair().unwrap();
        assert_ne!(pk1, pk2);
    }

    #[test]
    fn test_tampered_ciphertext_yields_different_secret() {
        let kem = MlKem512::new();
        let (pk, sk) = kem.generate_keypair().unwrap();
        let (ct, sent) = kem.encapsulate(&pk).unwrap();

        let mut bytes = *ct.as_bytes();
        bytes[0] ^= 0x01;
        let tampered = Ciphertext::from_bytes(bytes);

        // ML-KEM rejects implicitly: a pseudo-random secret comes back
        let received = kem.decapsulate(&tampered, &sk).unwrap();
        assert_ne!(sent.as_bytes(), received.as_bytes());
    }

    #[test]
    fn test_wrong_secret_key_disagrees() {
        let kem = MlKem512::new();
        let (pk, _) = kem.generate_keypair().unwrap();
        let (_, other_sk) = kem.generate_keypair().unwrap();
        let (ct, sent) = kem.encapsulate(&pk).unwrap();

        let received = kem.decapsulate(&ct, &other_sk).unwrap();
        assert_ne!(sent.as_bytes(), received.as_bytes());
    }

    #[test]
    fn test_keygen_without_entropy_is_rng_unavailable() {
        let kem = MlKem512::with_random_source(RandomSource::from_sources(vec![Box::new(Dead)]));
        let err = kem.generate_keypair().unwrap_err();
        assert!(matches!(err, Error::RngUnavailable(_)));
    }

    #[test]
    fn test_malformed_public_key_rejected() {
        let kem = MlKem512::new();
        let bogus = PublicKey::from_bytes([0xFF; PUBLIC_KEY_SIZE]);
        assert!(matches!(
            kem.encapsulate(&bogus),
            Err(Error::CryptoOperationFailed(_))
        ));
    }
}
