//! Authenticated symmetric encryption
//!
//! ```text
//! sealed = nonce (12) || ciphertext || tag (16)
//! ```
//!
//! The nonce is always drawn inside [`seal`]; callers cannot supply one, so a
//! nonce can never be reused under the same key by mistake.

use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use hkdf::Hkdf;
use sha2::Sha256;

use crate::error::{Result, ShieldError};
use crate::primitives::rng::random_array;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Derive a purpose-bound 32-byte key from input key material.
pub fn derive_subkey(ikm: &[u8], info: &[u8]) -> [u8; KEY_LEN] {
    let hk = Hkdf::<Sha256>::new(None, ikm);
    let mut key = [0u8; KEY_LEN];
    hk.expand(info, &mut key)
        .expect("32-byte HKDF output is always valid");
    key
}

/// Encrypt `plaintext` under `key`, binding `aad`.
pub fn seal(key: &[u8; KEY_LEN], plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    let nonce_bytes: [u8; NONCE_LEN] = random_array();
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    let encrypted = cipher
        .encrypt(
            Nonce::from_slice(&nonce_bytes),
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| ShieldError::EncryptionFailed)?;

    let mut out = Vec::with_capacity(NONCE_LEN + encrypted.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&encrypted);
    Ok(out)
}

/// Decrypt a blob produced by [`seal`]. Fails closed on any tag mismatch.
pub fn open(key: &[u8; KEY_LEN], sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < NONCE_LEN + TAG_LEN {
        return Err(ShieldError::MalformedCiphertext("shorter than nonce + tag"));
    }
    let (nonce, body) = sealed.split_at(NONCE_LEN);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(key));

    cipher
        .decrypt(Nonce::from_slice(nonce), Payload { msg: body, aad })
        .map_err(|_| ShieldError::DecryptionFailed)
}
