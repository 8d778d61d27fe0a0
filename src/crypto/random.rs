//! # Secure Randomness
//!
//! [`RandomSource`] fills buffers from an ordered chain of entropy sources.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      ENTROPY FALLBACK CHAIN                             │
//! ├─────────────────────────────────────────────────────────────────────────┤
//! │                                                                         │
//! │  fill(buf)                                                             │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  1. SyscallEntropy  (getrandom: kernel call, non-blocking)  ──ok──►    │
//! │     │ error                                                            │
//! │     ▼                                                                   │
//! │  2. DeviceEntropy   (/dev/urandom, loops over short reads)  ──ok──►    │
//! │     │ error                                                            │
//! │     ▼                                                                   │
//! │  Err(RngUnavailable)   buffer zeroized, no partial output              │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each link is tried once per call. Nothing is retried in a loop, and
//! failure is returned to the caller instead of aborting the process.

use std::io::{self, Read};
#[cfg(unix)]
use std::path::{Path, PathBuf};

use rand_core::{CryptoRng, RngCore};
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// Default random device path on unix platforms.
#[cfg(unix)]
pub const DEFAULT_RANDOM_DEVICE: &str = "/dev/urandom";

/// One link in the entropy chain.
pub trait EntropySource: Send + Sync {
    /// Short name used in log events.
    fn name(&self) -> &'static str;

    /// Fill `buf` completely or fail.
    fn fill(&self, buf: &mut [u8]) -> io::Result<()>;
}

/// Kernel entropy via the `getrandom` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyscallEntropy;

impl EntropySource for SyscallEntropy {
    fn name(&self) -> &'static str {
        "getrandom"
    }

    fn fill(&self, buf: &mut [u8]) -> io::Result<()> {
        getrandom::getrandom(buf).map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))
    }
}

/// Reads from an OS random device such as `/dev/urandom`.
#[cfg(unix)]
#[derive(Debug, Clone)]
pub struct DeviceEntropy {
    path: PathBuf,
}

#[cfg(unix)]
impl DeviceEntropy {
    /// Read from `path` instead of the default device.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The device path being read.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
impl Default for DeviceEntropy {
    fn default() -> Self {
        Self::new(DEFAULT_RANDOM_DEVICE)
    }
}

#[cfg(unix)]
impl EntropySource for DeviceEntropy {
    fn name(&self) -> &'static str {
        "random-device"
    }

    fn fill(&self, buf: &mut [u8]) -> io::Result<()> {
        let mut device = std::fs::File::open(&self.path)?;
        fill_from_reader(&mut device, buf)
    }
}

/// Fill `buf` from `reader`, accumulating short reads.
///
/// `Interrupted` is retried; end of stream and any other error fail.
pub(crate) fn fill_from_reader<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("random device exhausted after {} of {} bytes", filled, buf.len()),
                ))
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Cryptographically secure random bytes from an ordered source chain.
///
/// Holds no mutable state; one instance can serve concurrent callers.
pub struct RandomSource {
    chain: Vec<Box<dyn EntropySource>>,
}

impl RandomSource {
    /// The platform chain: kernel call first, then the random device.
    pub fn system() -> Self {
        let mut chain: Vec<Box<dyn EntropySource>> = vec![Box::new(SyscallEntropy)];
        #[cfg(unix)]
        chain.push(Box::new(DeviceEntropy::default()));
        Self { chain }
    }

    /// Build a chain from explicit sources, tried in order.
    pub fn from_sources(chain: Vec<Box<dyn EntropySource>>) -> Self {
        Self { chain }
    }

    /// Names of the configured sources, in priority order.
    pub fn source_names(&self) -> Vec<&'static str> {
        self.chain.iter().map(|s| s.name()).collect()
    }

    /// Fill `buf` with secure random bytes.
    ///
    /// Either the whole buffer is filled or `RngUnavailable` is returned
    /// with the buffer zeroized.
    pub fn fill(&self, buf: &mut [u8]) -> Result<()> {
        if buf.is_empty() {
            return Ok(());
        }

        let mut last_error = String::from("no entropy source configured");
        for source in &self.chain {
            match source.fill(buf) {
                Ok(()) => return Ok(()),
                Err(e) => {
                    buf.zeroize();
                    tracing::warn!(source = source.name(), error = %e, "Entropy source failed");
                    last_error = format!("{}: {}", source.name(), e);
                }
            }
        }

        Err(Error::RngUnavailable(last_error))
    }

    /// A `rand_core` view of this source for consumers that take an RNG.
    pub fn rng(&self) -> SourceRng<'_> {
        SourceRng {
            source: self,
            failure: None,
        }
    }
}

impl Default for RandomSource {
    fn default() -> Self {
        Self::system()
    }
}

impl std::fmt::Debug for RandomSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomSource")
            .field("chain", &self.source_names())
            .finish()
    }
}

/// `RngCore` adapter over a [`RandomSource`].
///
/// `fill_bytes` cannot report errors, so the first failure is recorded and
/// handed back through [`SourceRng::take_failure`].
pub struct SourceRng<'a> {
    source: &'a RandomSource,
    failure: Option<Error>,
}

impl SourceRng<'_> {
    /// The first fill failure seen by this adapter, if any.
    pub fn take_failure(&mut self) -> Option<Error> {
        self.failure.take()
    }
}

impl RngCore for SourceRng<'_> {
    fn next_u32(&mut self) -> u32 {
        rand_core::impls::next_u32_via_fill(self)
    }

    fn next_u64(&mut self) -> u64 {
        rand_core::impls::next_u64_via_fill(self)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        // Failure is recorded in `self.failure`; dest is left zeroized.
        let _ = self.try_fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand_core::Error> {
        self.source.fill(dest).map_err(|e| {
            let message = e.to_string();
            if self.failure.is_none() {
                self.failure = Some(e);
            }
            rand_core::Error::new(message)
        })
    }
}

impl CryptoRng for SourceRng<'_> {}

// ============================================================================
// TESTS
// ============================================================================
