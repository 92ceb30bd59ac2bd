//! Stealth Addresses
//!
//! One-time destinations derived by X25519 Diffie-Hellman between a fresh
//! ephemeral key and the recipient's published scan key.
//!
//! ```text
//! Sender:    shared = DH(ephemeral_secret, scan_pub)
//! Recipient: shared = DH(scan_secret, ephemeral_pub)
//! stealth_pubkey    = blake3_derive("shade stealth address v1", shared)
//! encrypted_meta    = ChaCha20-Poly1305(HKDF(shared, "shade-stealth-meta-v1"), memo)
//! output_key        = blake3_derive("shade stealth output key v1", shared)
//! ```
//!
//! The output key stands in for the recipient's view key on everything sent
//! with this address (note payload, decoy index), so a sender never needs
//! the recipient's secrets.

use log::debug;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use x25519_dalek::{EphemeralSecret, PublicKey, SharedSecret, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, ShieldError};
use crate::keys::Secret;
use crate::primitives::{derive_subkey, open, seal};

const STEALTH_CONTEXT: &str = "shade stealth address v1";
const OUTPUT_KEY_CONTEXT: &str = "shade stealth output key v1";
const META_INFO: &[u8] = b"shade-stealth-meta-v1";
/// Largest memo carried in the encrypted meta
pub const MAX_MEMO_LEN: usize = 512;

/// Published alongside a stealth payment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StealthAddress {
    pub ephemeral_pubkey: [u8; 32],
    pub stealth_pubkey: [u8; 32],
    pub encrypted_meta: Vec<u8>,
}

/// One-time key for `shared`
pub fn stealth_pubkey(shared: &[u8; 32]) -> [u8; 32] {
    blake3::derive_key(STEALTH_CONTEXT, shared)
}

/// Per-payment key shared by sender and recipient
pub fn output_key(shared: &[u8; 32]) -> Secret {
    Secret::from_bytes(blake3::derive_key(OUTPUT_KEY_CONTEXT, shared))
}

/// DH between a consumed ephemeral secret and the recipient scan key
pub fn derive(ephemeral: EphemeralSecret, recipient_scan_pub: &[u8; 32]) -> (SharedSecret, [u8; 32]) {
    let shared = ephemeral.diffie_hellman(&PublicKey::from(*recipient_scan_pub));
    let stealth = stealth_pubkey(shared.as_bytes());
    (shared, stealth)
}

/// Build a stealth address for the recipient with an optional memo
pub fn generate(recipient_scan_pub: &[u8; 32], memo: &[u8]) -> Result<StealthAddress> {
    generate_with_output_key(recipient_scan_pub, memo).map(|(address, _)| address)
}

/// [`generate`], also returning the payment's output key
pub fn generate_with_output_key(
    recipient_scan_pub: &[u8; 32],
    memo: &[u8],
) -> Result<(StealthAddress, Secret)> {
    if memo.len() > MAX_MEMO_LEN {
        return Err(ShieldError::InvalidInputLength {
            expected: MAX_MEMO_LEN,
            actual: memo.len(),
        });
    }

    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_pubkey = PublicKey::from(&ephemeral).to_bytes();
    let (shared, stealth_pubkey) = derive(ephemeral, recipient_scan_pub);

    let mut meta_key = derive_subkey(shared.as_bytes(), META_INFO);
    let encrypted_meta = seal(&meta_key, memo, &stealth_pubkey);
    meta_key.zeroize();

    let address = StealthAddress {
        ephemeral_pubkey,
        stealth_pubkey,
        encrypted_meta: encrypted_meta?,
    };
    Ok((address, output_key(shared.as_bytes())))
}

/// A stealth payment addressed to us
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct StealthMatch {
    pub stealth_pubkey: [u8; 32],
    pub shared_secret: [u8; 32],
    pub memo: Vec<u8>,
}

impl StealthMatch {
    pub fn output_key(&self) -> Secret {
        output_key(&self.shared_secret)
    }
}

impl std::fmt::Debug for StealthMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StealthMatch")
            .field("stealth_pubkey", &self.stealth_pubkey)
            .field("memo_len", &self.memo.len())
            .finish_non_exhaustive()
    }
}

/// Recipient-side scanning key
pub struct ScanKey {
    secret: StaticSecret,
}

impl ScanKey {
    pub fn from_secret(scan: &Secret) -> Self {
        Self {
            secret: StaticSecret::from(*scan.as_bytes()),
        }
    }

    pub fn public_key(&self) -> [u8; 32] {
        PublicKey::from(&self.secret).to_bytes()
    }

    /// Check whether `address` was generated for this key
    pub fn scan(&self, address: &StealthAddress) -> Option<StealthMatch> {
        let shared = self
            .secret
            .diffie_hellman(&PublicKey::from(address.ephemeral_pubkey));
        let expected = stealth_pubkey(shared.as_bytes());
        if !bool::from(expected[..].ct_eq(&address.stealth_pubkey[..])) {
            return None;
        }

        let mut meta_key = derive_subkey(shared.as_bytes(), META_INFO);
        let memo = open(&meta_key, &address.encrypted_meta, &address.stealth_pubkey);
        meta_key.zeroize();

        match memo {
            Ok(memo) => Some(StealthMatch {
                stealth_pubkey: expected,
                shared_secret: *shared.as_bytes(),
                memo,
            }),
            Err(e) => {
                debug!("stealth key matched but meta did not open: {e}");
                None
            }
        }
    }
}
