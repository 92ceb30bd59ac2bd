//! Note Commitments
//!
//! Implements Poseidon-based commitments for notes.
//!
//! ```text
//! Commitment = Poseidon(amount, blinding)
//! ```
//!
//! Binding: one commitment cannot be opened to two amounts. Hiding: without
//! the blinding factor the digest is indistinguishable from random.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShieldError};
use crate::keys::{BlindingFactor, array32};
use crate::primitives::{hash_commitment, is_canonical};

/// A note commitment (32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Commitment(pub [u8; 32]);

impl Commitment {
    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether the bytes encode a field element below r
    pub fn is_canonical(&self) -> bool {
        is_canonical(&self.0)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Commitment {
    type Error = crate::error::ShieldError;

    /// Exactly 32 bytes, in canonical field encoding
    fn try_from(bytes: &[u8]) -> Result<Self> {
        let value = Self(array32(bytes)?);
        if !value.is_canonical() {
            return Err(ShieldError::NonCanonicalEncoding("commitment"));
        }
        Ok(value)
    }
}

impl AsRef<[u8]> for Commitment {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Commit to an amount: C = Poseidon(amount, blinding)
pub fn commit(amount: u64, blinding: &BlindingFactor) -> Commitment {
    Commitment(hash_commitment(amount, blinding.as_bytes()))
}

/// [`commit`] for callers holding an untyped buffer.
///
/// A blinding that is not exactly 32 bytes is rejected, never truncated.
pub fn commit_bytes(amount: u64, blinding: &[u8]) -> Result<Commitment> {
    let blinding = BlindingFactor::try_from(blinding)?;
    Ok(commit(amount, &blinding))
}
