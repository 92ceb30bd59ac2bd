//! Nullifiers
//!
//! Implements nullifier derivation for double-spend prevention.
//!
//! ```text
//! Nullifier = Poseidon(spend_secret, note_index)
//! ```
//!
//! Derivation is deterministic: spending the same note twice yields the same
//! tag, which the seen-nullifier set rejects.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ShieldError};
use crate::keys::{Secret, array32};
use crate::primitives::{hash_nullifier, is_canonical};

/// A nullifier (32 bytes) - unique tag for a spent note
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Nullifier(pub [u8; 32]);

impl Nullifier {
    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Whether the bytes encode a field element below r
    pub fn is_canonical(&self) -> bool {
        is_canonical(&self.0)
    }

    /// Create from raw bytes
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl TryFrom<&[u8]> for Nullifier {
    type Error = crate::error::ShieldError;

    /// Exactly 32 bytes, in canonical field encoding
    fn try_from(bytes: &[u8]) -> Result<Self> {
        let value = Self(array32(bytes)?);
        if !value.is_canonical() {
            return Err(ShieldError::NonCanonicalEncoding("nullifier"));
        }
        Ok(value)
    }
}

impl AsRef<[u8]> for Nullifier {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Derive the nullifier for the note at `index`
pub fn nullifier(secret: &Secret, index: u32) -> Nullifier {
    Nullifier(hash_nullifier(secret.as_bytes(), u64::from(index)))
}

/// [`nullifier`] for callers holding an untyped secret buffer
pub fn nullifier_bytes(secret: &[u8], index: u32) -> Result<Nullifier> {
    let secret = Secret::try_from(secret)?;
    Ok(nullifier(&secret, index))
}
