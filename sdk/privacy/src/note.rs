//! Shielded Notes
//!
//! A Note represents value held privately in the pool.
//!
//! ```text
//! Note = {
//!     commitment: [u8; 32],        // Poseidon(amount, blinding)
//!     encrypted_payload: Vec<u8>,  // (amount, blinding) under the view key
//!     index: u32,                  // leaf position in the commitment tree
//!     spent: bool,                 // false -> true, once
//!     created_at: u64,             // unix seconds
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::commitment::{Commitment, commit};
use crate::encryption::{EncryptedPayload, NoteOpening, decrypt_payload, encrypt_payload};
use crate::error::{Result, ShieldError};
use crate::keys::{BlindingFactor, Secret};
use crate::nullifier::{Nullifier, nullifier};

/// A shielded note
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub commitment: Commitment,
    pub encrypted_payload: EncryptedPayload,
    pub index: u32,
    spent: bool,
    pub created_at: u64,
}

impl Note {
    /// Record a note that was inserted at `index`
    pub fn new(
        commitment: Commitment,
        encrypted_payload: EncryptedPayload,
        index: u32,
        created_at: u64,
    ) -> Self {
        Self {
            commitment,
            encrypted_payload,
            index,
            spent: false,
            created_at,
        }
    }

    pub fn is_spent(&self) -> bool {
        self.spent
    }

    /// Flip the note to spent. One-way: a second call is rejected.
    pub fn mark_spent(&mut self) -> Result<()> {
        if self.spent {
            return Err(ShieldError::NoteAlreadySpent);
        }
        self.spent = true;
        Ok(())
    }

    /// Derive the nullifier for spending this note
    pub fn nullifier(&self, spend_secret: &Secret) -> Nullifier {
        nullifier(spend_secret, self.index)
    }

    /// Decrypt the note's opening and check it against the commitment
    pub fn open(&self, view_key: &Secret) -> Result<NoteOpening> {
        let opening = decrypt_payload(&self.encrypted_payload, view_key)?;
        if opening.commitment() != self.commitment {
            return Err(ShieldError::CommitmentMismatch);
        }
        Ok(opening)
    }
}

/// A freshly created output before it lands in the tree
#[derive(Debug, Clone)]
pub struct NoteDraft {
    pub amount: u64,
    pub blinding: BlindingFactor,
    pub commitment: Commitment,
    pub encrypted_payload: EncryptedPayload,
}

impl NoteDraft {
    /// New output with a fresh blinding, encrypted for `view_key`
    pub fn create(amount: u64, view_key: &Secret) -> Result<Self> {
        let blinding = BlindingFactor::random();
        let encrypted_payload = encrypt_payload(amount, &blinding, view_key)?;
        Ok(Self {
            amount,
            blinding,
            commitment: commit(amount, &blinding),
            encrypted_payload,
        })
    }

    /// Finalize once the tree has assigned an index
    pub fn into_note(self, index: u32, created_at: u64) -> Note {
        Note::new(self.commitment, self.encrypted_payload, index, created_at)
    }
}
