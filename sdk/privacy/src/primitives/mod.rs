//! Primitive layer
//!
//! Everything above this module is built on three primitives:
//!
//! ```text
//! ┌──────────────────┐  ┌────────────────────────┐  ┌──────────────┐
//! │ Poseidon (2-ary) │  │ ChaCha20-Poly1305 AEAD │  │ OS CSPRNG    │
//! │ commitments,     │  │ note payloads,         │  │ blindings,   │
//! │ nullifiers, tree │  │ stealth metadata       │  │ nonces, keys │
//! └──────────────────┘  └────────────────────────┘  └──────────────┘
//! ```

pub mod cipher;
pub mod poseidon;
pub mod rng;

pub use cipher::{KEY_LEN, NONCE_LEN, TAG_LEN, derive_subkey, open, seal};
pub use poseidon::{
    Domain, bytes_to_field, compress, field_to_bytes, hash_commitment, hash_nullifier, is_canonical,
    random_element,
};
pub use rng::{random_array, random_bytes32};
