//! Transfer requests and results
//!
//! ```text
//!  input note (C0, index i)                 new leaves (one random order)
//!  ┌────────────────────┐    N = nf(spend, i)   ┌──────────────────────────┐
//!  │ amount = send+chg  │ ───────────────────►  │ C1: send   -> recipient   │
//!  │ proof vs root R    │                       │ D1..Dk: decoys            │
//!  └────────────────────┘                       │ C2: change -> sender      │
//!                                               └──────────────────────────┘
//! statement (public inputs of the transfer circuit) = [R, N, leaves..]
//! ```
//!
//! The published payment never names C1. It carries the decoy set, whose
//! outputs are all tree leaves, and C1's ciphertext; only the recipient's
//! scan key recovers which leaf is theirs.

use serde::{Deserialize, Serialize};
use shade_privacy::{
    Commitment, DecoySet, EncryptedPayload, MerkleProof, MerkleRoot, Note, NoteOpening, Nullifier,
    Result, ScanKey, Secret, ShieldError, StealthAddress, recover_real, try_decrypt_for,
};

use crate::accumulator::SharedAccumulator;

/// A freshly shielded note with its opening
#[derive(Debug, Clone)]
pub struct ShieldedNote {
    pub note: Note,
    pub opening: NoteOpening,
}

/// Spend one note into a recipient output and a change output.
///
/// The input note is marked spent when the transfer succeeds.
#[derive(Debug)]
pub struct TransferRequest<'a> {
    pub note: &'a mut Note,
    /// Opens the input note's payload
    pub note_key: &'a Secret,
    pub spend_key: &'a Secret,
    /// Membership proof against the current root
    pub merkle_proof: MerkleProof,
    pub recipient_scan_pubkey: [u8; 32],
    pub send: u64,
    pub change: u64,
    /// Encrypts the change output
    pub change_key: &'a Secret,
    pub memo: Vec<u8>,
}

/// Withdraw one note to the clear
#[derive(Debug)]
pub struct UnshieldRequest<'a> {
    pub note: &'a mut Note,
    pub note_key: &'a Secret,
    pub spend_key: &'a Secret,
    pub merkle_proof: MerkleProof,
}

/// Public inputs for the external transfer circuit.
///
/// The circuit proves that one of `output_commitments` plus the change
/// output sum to the spent note; which ones is private witness.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferStatement {
    pub old_root: MerkleRoot,
    pub nullifier: Nullifier,
    /// Every leaf the transfer appended, in tree order
    pub output_commitments: Vec<Commitment>,
}

impl TransferStatement {
    pub fn public_signals(&self) -> Vec<[u8; 32]> {
        let mut signals = Vec::with_capacity(2 + self.output_commitments.len());
        signals.push(self.old_root);
        signals.push(self.nullifier.0);
        signals.extend(self.output_commitments.iter().map(|c| c.0));
        signals
    }
}

/// What gets published for the recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingPayment {
    pub stealth: StealthAddress,
    pub decoys: DecoySet,
    /// The real output's payload, under the per-payment output key
    pub encrypted_payload: EncryptedPayload,
    pub created_at: u64,
}

#[derive(Debug, Clone)]
pub struct TransferOutcome {
    pub nullifier: Nullifier,
    pub payment: IncomingPayment,
    pub change_note: Note,
    pub new_root: MerkleRoot,
    pub statement: TransferStatement,
}

#[derive(Debug, Clone)]
pub struct UnshieldOutcome {
    pub nullifier: Nullifier,
    pub amount: u64,
    pub old_root: MerkleRoot,
}

/// A payment recognised by its recipient
#[derive(Debug)]
pub struct ReceivedNote {
    pub note: Note,
    pub opening: NoteOpening,
    /// Opens this note's payload; use as `note_key` when spending it
    pub output_key: Secret,
    pub memo: Vec<u8>,
}

/// Recipient side: check whether `payment` is ours and open it.
///
/// `Ok(None)` when the stealth address belongs to someone else. The note's
/// index is looked up in `accumulator`, which must have seen the transfer.
pub fn receive(
    scan_key: &ScanKey,
    payment: &IncomingPayment,
    accumulator: &SharedAccumulator,
) -> Result<Option<ReceivedNote>> {
    let Some(found) = scan_key.scan(&payment.stealth) else {
        return Ok(None);
    };
    let output_key = found.output_key();

    let real = recover_real(&payment.decoys, &output_key)?;
    let opening = try_decrypt_for(&real, &payment.encrypted_payload, &output_key)?
        .ok_or(ShieldError::DecryptionFailed)?;
    let index = accumulator
        .position_of(&real)
        .ok_or(ShieldError::UnknownCommitment)?;

    Ok(Some(ReceivedNote {
        note: Note::new(
            real,
            payment.encrypted_payload.clone(),
            index,
            payment.created_at,
        ),
        opening,
        output_key,
        memo: found.memo.clone(),
    }))
}
