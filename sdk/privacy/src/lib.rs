//! Shade Privacy SDK
//!
//! Note-based privacy primitives for a shielded pool.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Shielded Transfer                         │
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────────┐  │
//! │  │  Nullifier   │  │ Commitments  │  │   Decoys + Stealth    │  │
//! │  │  (spent)     │  │  (new notes) │  │   (recipient privacy) │  │
//! │  └──────────────┘  └──────────────┘  └───────────────────────┘  │
//! │         │                 │                     │                │
//! │         ▼                 ▼                     ▼                │
//! │  ┌──────────────────────────────────────────────────────────┐   │
//! │  │   Poseidon(BLS12-381)  ·  Merkle accumulator  ·  AEAD     │   │
//! │  └──────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod clock;
pub mod commitment;
pub mod decoy;
pub mod encryption;
pub mod error;
pub mod keycache;
pub mod keys;
pub mod merkle;
pub mod note;
pub mod nullifier;
pub mod primitives;
pub mod stealth;

pub use clock::{Clock, ManualClock, SystemClock};
pub use commitment::{Commitment, commit, commit_bytes};
pub use decoy::{DEFAULT_DECOYS, DecoySet, MAX_DECOYS, assemble, decoy_nullifiers, generate_decoys, recover_real};
pub use encryption::{EncryptedPayload, NoteOpening, decrypt_payload, encrypt_payload, try_decrypt_for};
pub use error::{ErrorKind, Result, ShieldError};
pub use keycache::KeyCache;
pub use keys::{BlindingFactor, IdentityKeys, Secret};
pub use merkle::{DEFAULT_TREE_DEPTH, MerkleProof, MerkleRoot, MerkleTree, RootHistory, verify};
pub use note::{Note, NoteDraft};
pub use nullifier::{Nullifier, nullifier, nullifier_bytes};
pub use stealth::{ScanKey, StealthAddress, StealthMatch};
