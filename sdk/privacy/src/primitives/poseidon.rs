//! Poseidon 2-to-1 compression
//!
//! ```text
//! H_d(a, b) = Poseidon(a, b) with the capacity element preset to d
//!
//!   d = 1  merkle node     H_1(left, right)
//!   d = 2  commitment      H_2(amount, blinding)
//!   d = 3  nullifier       H_3(secret, index)
//! ```
//!
//! Field: BLS12-381 Fr (255 bits). Rate: 2, Capacity: 1. Security: 128 bits.
//! Public digests (leaves, nodes, nullifiers) are only accepted in their
//! canonical encoding, i.e. as integers below r.

use std::sync::OnceLock;

use ark_bls12_381::Fr;
use ark_crypto_primitives::sponge::{
    CryptographicSponge,
    poseidon::{PoseidonConfig, PoseidonSponge, find_poseidon_ark_and_mds},
};
use ark_ff::{BigInteger, PrimeField};

use super::rng::random_array;

const PRIME_BITS: u64 = 255;
const RATE: usize = 2;
const CAPACITY: usize = 1;
const FULL_ROUNDS: usize = 8;
const PARTIAL_ROUNDS: usize = 57;
const ALPHA: u64 = 5;

/// Capacity tag separating the three uses of the hash
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
pub enum Domain {
    MerkleNode = 1,
    Commitment = 2,
    Nullifier = 3,
}

static CONFIG: OnceLock<PoseidonConfig<Fr>> = OnceLock::new();

/// Round constants and MDS matrix are generated once per process.
fn config() -> &'static PoseidonConfig<Fr> {
    CONFIG.get_or_init(|| {
        let (ark, mds) = find_poseidon_ark_and_mds::<Fr>(
            PRIME_BITS,
            RATE,
            FULL_ROUNDS as u64,
            PARTIAL_ROUNDS as u64,
            0,
        );
        PoseidonConfig::new(FULL_ROUNDS, PARTIAL_ROUNDS, ALPHA, mds, ark, RATE, CAPACITY)
    })
}

/// Interpret 32 little-endian bytes as a field element (reduced mod r)
pub fn bytes_to_field(bytes: &[u8; 32]) -> Fr {
    Fr::from_le_bytes_mod_order(bytes)
}

/// Canonical 32-byte little-endian encoding of a field element
pub fn field_to_bytes(f: Fr) -> [u8; 32] {
    let bytes = f.into_bigint().to_bytes_le();
    let mut arr = [0u8; 32];
    arr[..bytes.len()].copy_from_slice(&bytes);
    arr
}

/// Whether `bytes` is the canonical encoding of some field element.
///
/// Reduction is not injective on 32-byte strings: `x` and `x + r` hash the
/// same, so digests must be checked before they are trusted as identities.
pub fn is_canonical(bytes: &[u8; 32]) -> bool {
    field_to_bytes(bytes_to_field(bytes)) == *bytes
}

/// Uniform field element in canonical encoding
pub fn random_element() -> [u8; 32] {
    // 64 bytes reduced mod r leaves negligible bias
    let wide: [u8; 64] = random_array();
    field_to_bytes(Fr::from_le_bytes_mod_order(&wide))
}

fn compress_fields(domain: Domain, left: Fr, right: Fr) -> [u8; 32] {
    let mut sponge = PoseidonSponge::new(config());
    sponge.state[0] = Fr::from(domain as u64);
    sponge.absorb(&left);
    sponge.absorb(&right);
    let result: Fr = sponge.squeeze_field_elements(1)[0];
    field_to_bytes(result)
}

/// Hash two 32-byte children into their parent node
pub fn compress(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    compress_fields(Domain::MerkleNode, bytes_to_field(left), bytes_to_field(right))
}

/// Commitment hash over an amount and a 32-byte blinding.
///
/// The amount is embedded as a field element directly, not as bytes.
pub fn hash_commitment(amount: u64, blinding: &[u8; 32]) -> [u8; 32] {
    compress_fields(Domain::Commitment, Fr::from(amount), bytes_to_field(blinding))
}

/// Nullifier hash over a 32-byte secret and a leaf index
pub fn hash_nullifier(secret: &[u8; 32], index: u64) -> [u8; 32] {
    compress_fields(Domain::Nullifier, bytes_to_field(secret), Fr::from(index))
}
