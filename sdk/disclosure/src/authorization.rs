//! View-key authorizations
//!
//! A signed, expiring grant letting `viewer` see part of an account.
//!
//! ```text
//! message   = viewer (32) || scope (1) || expires_at (8, LE)
//! signature = Ed25519(signer_secret, message)
//! ```

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};
use log::debug;
use serde::{Deserialize, Serialize};
use shade_privacy::{Clock, Secret};

pub const MESSAGE_LEN: usize = 32 + 1 + 8;

/// What an authorization discloses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ViewScope {
    Balance = 1,
    Transactions = 2,
    Full = 3,
}

impl ViewScope {
    /// Whether a grant of `self` allows access at `requested`
    pub fn covers(self, requested: ViewScope) -> bool {
        self == ViewScope::Full || self == requested
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewKeyAuthorization {
    pub viewer: [u8; 32],
    pub scope: ViewScope,
    /// Unix seconds, inclusive
    pub expires_at: u64,
    pub signer: [u8; 32],
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

impl ViewKeyAuthorization {
    /// Canonical signed message
    pub fn message(&self) -> [u8; MESSAGE_LEN] {
        canonical_message(&self.viewer, self.scope, self.expires_at)
    }
}

fn canonical_message(viewer: &[u8; 32], scope: ViewScope, expires_at: u64) -> [u8; MESSAGE_LEN] {
    let mut msg = [0u8; MESSAGE_LEN];
    msg[..32].copy_from_slice(viewer);
    msg[32] = scope as u8;
    msg[33..].copy_from_slice(&expires_at.to_le_bytes());
    msg
}

/// Public key that verifies grants signed by `signer_secret`
pub fn signer_public_key(signer_secret: &Secret) -> [u8; 32] {
    SigningKey::from_bytes(signer_secret.as_bytes())
        .verifying_key()
        .to_bytes()
}

/// Sign a grant for `viewer`
pub fn authorize_view(
    viewer: [u8; 32],
    scope: ViewScope,
    expires_at: u64,
    signer_secret: &Secret,
) -> ViewKeyAuthorization {
    let signing_key = SigningKey::from_bytes(signer_secret.as_bytes());
    let signature = signing_key
        .sign(&canonical_message(&viewer, scope, expires_at))
        .to_bytes()
        .to_vec();

    ViewKeyAuthorization {
        viewer,
        scope,
        expires_at,
        signer: signing_key.verifying_key().to_bytes(),
        signature,
    }
}

/// Whether `auth` is unexpired at `now` and signed by `signer_pubkey`.
///
/// Expiry is checked first and never touches the signature.
pub fn check_authorization(auth: &ViewKeyAuthorization, signer_pubkey: &[u8; 32], now: u64) -> bool {
    if now > auth.expires_at {
        debug!("view authorization expired at {}", auth.expires_at);
        return false;
    }
    if auth.signer != *signer_pubkey {
        return false;
    }
    let Ok(signature) = <[u8; 64]>::try_from(auth.signature.as_slice()) else {
        return false;
    };
    let Ok(verifying_key) = VerifyingKey::from_bytes(signer_pubkey) else {
        return false;
    };
    verifying_key
        .verify_strict(&auth.message(), &Signature::from_bytes(&signature))
        .is_ok()
}

/// [`check_authorization`] at the clock's current time
pub fn check_authorization_now<C: Clock>(
    auth: &ViewKeyAuthorization,
    signer_pubkey: &[u8; 32],
    clock: &C,
) -> bool {
    check_authorization(auth, signer_pubkey, clock.now_secs())
}

/// Valid grant that also covers `requested` for `viewer`
pub fn permits(
    auth: &ViewKeyAuthorization,
    signer_pubkey: &[u8; 32],
    viewer: &[u8; 32],
    requested: ViewScope,
    now: u64,
) -> bool {
    auth.viewer == *viewer
        && auth.scope.covers(requested)
        && check_authorization(auth, signer_pubkey, now)
}
