//! Secret material
//!
//! Each identity holds three logically distinct secrets:
//!
//! ```text
//! view secret   -> decrypts note payloads and decoy indices
//! spend secret  -> derives nullifiers, proves ownership
//! scan secret   -> detects stealth payments (X25519 scalar)
//! ```
//!
//! They may be drawn independently or derived from one master secret with
//! domain separation; either way they are never interchangeable.

use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, ShieldError};
use crate::primitives::random_bytes32;

const VIEW_CONTEXT: &str = "shade view secret v1";
const SPEND_CONTEXT: &str = "shade spend secret v1";
const SCAN_CONTEXT: &str = "shade scan secret v1";

pub(crate) fn array32(bytes: &[u8]) -> Result<[u8; 32]> {
    bytes
        .try_into()
        .map_err(|_| ShieldError::InvalidInputLength {
            expected: 32,
            actual: bytes.len(),
        })
}

/// A 32-byte secret. Never serialized, redacted in `Debug`, wiped on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Secret([u8; 32]);

impl Secret {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Draw a fresh secret from the OS CSPRNG
    pub fn random() -> Self {
        Self(random_bytes32())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive a child secret bound to `context`
    pub fn derive(&self, context: &str) -> Self {
        Self(blake3::derive_key(context, &self.0))
    }
}

impl TryFrom<&[u8]> for Secret {
    type Error = ShieldError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        array32(bytes).map(Self)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(..)")
    }
}

/// Single-use randomness bound into a commitment
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct BlindingFactor(pub(crate) [u8; 32]);

impl BlindingFactor {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Fresh blinding for a new note
    pub fn random() -> Self {
        Self(random_bytes32())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl TryFrom<&[u8]> for BlindingFactor {
    type Error = ShieldError;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        array32(bytes).map(Self)
    }
}

impl fmt::Debug for BlindingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BlindingFactor(..)")
    }
}

/// The three per-identity secrets
#[derive(Debug, Clone)]
pub struct IdentityKeys {
    pub view: Secret,
    pub spend: Secret,
    pub scan: Secret,
}

impl IdentityKeys {
    /// Independent random secrets
    pub fn random() -> Self {
        Self {
            view: Secret::random(),
            spend: Secret::random(),
            scan: Secret::random(),
        }
    }

    /// Derive all three from one master secret
    pub fn from_master(master: &Secret) -> Self {
        Self {
            view: master.derive(VIEW_CONTEXT),
            spend: master.derive(SPEND_CONTEXT),
            scan: master.derive(SCAN_CONTEXT),
        }
    }

    /// Public half of the scan secret, published for stealth payments
    pub fn scan_public(&self) -> [u8; 32] {
        crate::stealth::ScanKey::from_secret(&self.scan).public_key()
    }
}
