//! Decoy Outputs
//!
//! Hides the real output of a transfer among `k` valueless commitments.
//!
//! ```text
//! assemble(real, k, view):
//!   outputs = shuffle([real, d1, .., dk])
//!   index   = position of real in outputs
//!   encrypted_real_index = nonce (12) || index ^ mask (2, LE)
//!   mask    = blake3_keyed(HKDF(view, "shade-decoy-index-v1"), nonce)[..2]
//! ```
//!
//! Only the holder of the view secret can strip the mask. The unmasked index
//! is reduced modulo the set size, so a wrong key lands on an arbitrary
//! output (usually a decoy) and is never out of bounds.

use log::trace;
use rand::Rng;
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::commitment::{Commitment, commit};
use crate::error::{Result, ShieldError};
use crate::keys::{BlindingFactor, Secret};
use crate::nullifier::Nullifier;
use crate::primitives::{NONCE_LEN, derive_subkey, random_array, random_element};

/// Decoys per transfer unless configured otherwise
pub const DEFAULT_DECOYS: usize = 3;
/// Largest `k` whose positions fit the 16-bit index
pub const MAX_DECOYS: usize = shade_config::MAX_DECOYS;
/// Decoy amounts are drawn from `[0, DECOY_AMOUNT_BOUND)`
pub const DECOY_AMOUNT_BOUND: u64 = 1_000_000_000_000;

const INDEX_INFO: &[u8] = b"shade-decoy-index-v1";
/// Encrypted index length
pub const ENCRYPTED_INDEX_LEN: usize = NONCE_LEN + 2;

/// Real output shuffled among decoys
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoySet {
    pub outputs: Vec<Commitment>,
    pub encrypted_real_index: [u8; ENCRYPTED_INDEX_LEN],
}

impl DecoySet {
    pub fn len(&self) -> usize {
        self.outputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outputs.is_empty()
    }
}

fn check_count(k: usize) -> Result<()> {
    if k == 0 || k > MAX_DECOYS {
        return Err(ShieldError::InvalidDecoyCount {
            count: k,
            max: MAX_DECOYS,
        });
    }
    Ok(())
}

/// `k` fresh commitments to random amounts under random blindings
pub fn generate_decoys(k: usize) -> Result<Vec<Commitment>> {
    check_count(k)?;
    let mut rng = OsRng;
    Ok((0..k)
        .map(|_| {
            let amount = rng.gen_range(0..DECOY_AMOUNT_BOUND);
            commit(amount, &BlindingFactor::random())
        })
        .collect())
}

/// `k` random nullifier-shaped tags, canonical like real ones
pub fn decoy_nullifiers(k: usize) -> Result<Vec<Nullifier>> {
    check_count(k)?;
    Ok((0..k).map(|_| Nullifier(random_element())).collect())
}

fn index_mask(view_key: &Secret, nonce: &[u8; NONCE_LEN]) -> u16 {
    let key = derive_subkey(view_key.as_bytes(), INDEX_INFO);
    let digest = blake3::keyed_hash(&key, nonce);
    let bytes = digest.as_bytes();
    u16::from_le_bytes([bytes[0], bytes[1]])
}

/// Shuffle `real` among `k` decoys and seal its position for `view_key`
pub fn assemble(real: Commitment, k: usize, view_key: &Secret) -> Result<DecoySet> {
    let mut outputs = generate_decoys(k)?;
    outputs.push(real);
    outputs.shuffle(&mut OsRng);

    let position = outputs
        .iter()
        .position(|c| *c == real)
        .ok_or(ShieldError::CorruptDecoySet {
            index: outputs.len(),
            len: outputs.len(),
        })?;
    // k <= MAX_DECOYS keeps the position below u16::MAX
    let position = u16::try_from(position).map_err(|_| ShieldError::InvalidDecoyCount {
        count: k,
        max: MAX_DECOYS,
    })?;

    let nonce: [u8; NONCE_LEN] = random_array();
    let masked = position ^ index_mask(view_key, &nonce);

    let mut encrypted_real_index = [0u8; ENCRYPTED_INDEX_LEN];
    encrypted_real_index[..NONCE_LEN].copy_from_slice(&nonce);
    encrypted_real_index[NONCE_LEN..].copy_from_slice(&masked.to_le_bytes());

    trace!("assembled decoy set of {} outputs", outputs.len());
    Ok(DecoySet {
        outputs,
        encrypted_real_index,
    })
}

/// Recover the real output.
///
/// Only a set with no outputs, or more than the 16-bit index can address,
/// is rejected as corrupt. Any other set yields one of its outputs.
pub fn recover_real(set: &DecoySet, view_key: &Secret) -> Result<Commitment> {
    let len = set.outputs.len();
    if len == 0 || len > MAX_DECOYS + 1 {
        return Err(ShieldError::CorruptDecoySet { index: 0, len });
    }

    let mut nonce = [0u8; NONCE_LEN];
    nonce.copy_from_slice(&set.encrypted_real_index[..NONCE_LEN]);
    let masked = u16::from_le_bytes([
        set.encrypted_real_index[NONCE_LEN],
        set.encrypted_real_index[NONCE_LEN + 1],
    ]);
    let index = usize::from(masked ^ index_mask(view_key, &nonce)) % len;

    Ok(set.outputs[index])
}
