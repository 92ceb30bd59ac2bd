//! Note Encryption
//!
//! Encrypts a note's opening `(amount, blinding)` under a key derived from
//! the owner's view secret.
//!
//! ```text
//! Flow:
//! 1. Payload key = HKDF(view_secret, "shade-note-v1")
//! 2. Plaintext   = amount (8, LE) || blinding (32)
//! 3. Output      = nonce (12) || ChaCha20-Poly1305(key, nonce, plaintext) || tag (16)
//! ```

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::commitment::{Commitment, commit};
use crate::error::{Result, ShieldError};
use crate::keys::{BlindingFactor, Secret};
use crate::primitives::{NONCE_LEN, TAG_LEN, derive_subkey, open, seal};

const NOTE_KEY_INFO: &[u8] = b"shade-note-v1";
const PLAINTEXT_LEN: usize = 8 + 32;

/// Encrypted note opening, as stored or published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload(pub Vec<u8>);

impl EncryptedPayload {
    /// Size of an encrypted payload
    pub const LEN: usize = NONCE_LEN + PLAINTEXT_LEN + TAG_LEN;

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Text encoding for persistence
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn from_base64(text: &str) -> Result<Self> {
        STANDARD
            .decode(text)
            .map(Self)
            .map_err(|_| ShieldError::MalformedCiphertext("invalid base64"))
    }
}

/// A decrypted note opening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteOpening {
    pub amount: u64,
    pub blinding: BlindingFactor,
}

impl NoteOpening {
    pub fn commitment(&self) -> Commitment {
        commit(self.amount, &self.blinding)
    }
}

fn payload_key(view_key: &Secret) -> [u8; 32] {
    derive_subkey(view_key.as_bytes(), NOTE_KEY_INFO)
}

/// Encrypt a note opening for the holder of `view_key`
pub fn encrypt_payload(
    amount: u64,
    blinding: &BlindingFactor,
    view_key: &Secret,
) -> Result<EncryptedPayload> {
    let mut plaintext = [0u8; PLAINTEXT_LEN];
    plaintext[..8].copy_from_slice(&amount.to_le_bytes());
    plaintext[8..].copy_from_slice(blinding.as_bytes());

    let mut key = payload_key(view_key);
    let sealed = seal(&key, &plaintext, NOTE_KEY_INFO);
    key.zeroize();
    plaintext.zeroize();

    sealed.map(EncryptedPayload)
}

/// Decrypt a note opening. A wrong key fails with `DecryptionFailed`.
pub fn decrypt_payload(payload: &EncryptedPayload, view_key: &Secret) -> Result<NoteOpening> {
    let mut key = payload_key(view_key);
    let opened = open(&key, &payload.0, NOTE_KEY_INFO);
    key.zeroize();
    let mut plaintext = opened?;

    if plaintext.len() != PLAINTEXT_LEN {
        plaintext.zeroize();
        return Err(ShieldError::MalformedCiphertext("unexpected plaintext length"));
    }

    let mut amount = [0u8; 8];
    amount.copy_from_slice(&plaintext[..8]);
    let mut blinding = [0u8; 32];
    blinding.copy_from_slice(&plaintext[8..]);
    plaintext.zeroize();

    Ok(NoteOpening {
        amount: u64::from_le_bytes(amount),
        blinding: BlindingFactor::from_bytes(blinding),
    })
}

/// Try to decrypt a published note (scan mode - for wallet scanning)
///
/// Returns `Ok(None)` when the payload is not addressed to `view_key`, and
/// `CommitmentMismatch` when it decrypts but does not open `commitment`.
pub fn try_decrypt_for(
    commitment: &Commitment,
    payload: &EncryptedPayload,
    view_key: &Secret,
) -> Result<Option<NoteOpening>> {
    let opening = match decrypt_payload(payload, view_key) {
        Ok(opening) => opening,
        Err(ShieldError::DecryptionFailed) => return Ok(None),
        Err(e) => return Err(e),
    };

    if opening.commitment() != *commitment {
        return Err(ShieldError::CommitmentMismatch);
    }
    Ok(Some(opening))
}
