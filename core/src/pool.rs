//! Shielded Pool
//!
//! Owns the commitment accumulator and the nullifier registry and runs the
//! three state transitions:
//!
//! - shield:   clear value -> new note
//! - transfer: note -> recipient note hidden among decoy leaves + change note
//! - unshield: note -> clear value
//!
//! A spend checks the registry first and registers its nullifier before any
//! output exists, so a replayed or concurrent spend of the same note fails
//! with `DoubleSpend` and never creates outputs. A successful spend marks
//! the caller's note spent.

use log::{debug, info};
use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use shade_config::ShadeConfig;
use shade_privacy::{
    Clock, Commitment, MAX_DECOYS, MerkleProof, Note, NoteDraft, NoteOpening, Nullifier, Result,
    ScanKey, Secret, ShieldError, SystemClock, assemble, nullifier, stealth,
};
use tokio_util::sync::CancellationToken;

use crate::accumulator::SharedAccumulator;
use crate::nullifier_set::NullifierRegistry;
use crate::sync::{LedgerSource, SyncOptions, SyncReport, sync};
use crate::transfer::{
    IncomingPayment, ReceivedNote, ShieldedNote, TransferOutcome, TransferRequest,
    TransferStatement, UnshieldOutcome, UnshieldRequest, receive,
};

/// Shielded pool state
pub struct ShieldedPool<C: Clock = SystemClock> {
    accumulator: SharedAccumulator,
    nullifiers: NullifierRegistry,
    decoy_count: usize,
    clock: C,
}

impl ShieldedPool<SystemClock> {
    /// Pool configured from `config` on wall-clock time
    pub fn new(config: &ShadeConfig) -> Result<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> ShieldedPool<C> {
    pub fn with_clock(config: &ShadeConfig, clock: C) -> Result<Self> {
        let decoy_count = config.decoys.count;
        if decoy_count == 0 || decoy_count > MAX_DECOYS {
            return Err(ShieldError::InvalidDecoyCount {
                count: decoy_count,
                max: MAX_DECOYS,
            });
        }
        let accumulator = SharedAccumulator::from_config(&config.tree)?;

        info!(
            "shielded pool ready: depth {}, {} decoys per transfer",
            config.tree.depth, decoy_count
        );
        Ok(Self {
            accumulator,
            nullifiers: NullifierRegistry::new(),
            decoy_count,
            clock,
        })
    }

    pub fn accumulator(&self) -> &SharedAccumulator {
        &self.accumulator
    }

    pub fn nullifiers(&self) -> &NullifierRegistry {
        &self.nullifiers
    }

    pub fn root(&self) -> [u8; 32] {
        self.accumulator.root()
    }

    pub fn proof(&self, index: u32) -> Result<MerkleProof> {
        self.accumulator.proof(index)
    }

    pub fn decoy_count(&self) -> usize {
        self.decoy_count
    }

    /// Deposit `amount` into a new note readable with `view_key`
    pub fn shield(&self, amount: u64, view_key: &Secret) -> Result<ShieldedNote> {
        let draft = NoteDraft::create(amount, view_key)?;
        let opening = NoteOpening {
            amount: draft.amount,
            blinding: draft.blinding,
        };
        let index = self.accumulator.insert(draft.commitment)?;
        debug!("shielded note at index {index}");

        Ok(ShieldedNote {
            note: draft.into_note(index, self.clock.now_secs()),
            opening,
        })
    }

    /// Nullifier and opening for an input that may be spent.
    ///
    /// A nullifier already in the registry fails with `DoubleSpend` before
    /// anything else is looked at, so a replay never reaches the tree.
    fn authorize_input(
        &self,
        note: &Note,
        note_key: &Secret,
        spend_key: &Secret,
        merkle_proof: &MerkleProof,
    ) -> Result<(Nullifier, NoteOpening)> {
        let nf = nullifier(spend_key, note.index);
        if self.nullifiers.contains(&nf) {
            return Err(ShieldError::DoubleSpend);
        }
        if note.is_spent() {
            return Err(ShieldError::NoteAlreadySpent);
        }

        let checked = if merkle_proof.leaf_index != note.index {
            Err(ShieldError::InvalidMerkleProof)
        } else {
            self.accumulator
                .verify_current(&note.commitment, merkle_proof)
                .and_then(|()| note.open(note_key))
        };
        match checked {
            Ok(opening) => Ok((nf, opening)),
            // A concurrent spend of this note moved the root under us
            Err(_) if self.nullifiers.contains(&nf) => Err(ShieldError::DoubleSpend),
            Err(e) => Err(e),
        }
    }

    /// Spend `request.note` into a stealth recipient output and a change output.
    ///
    /// On success the input note is marked spent.
    pub fn transfer(&self, mut request: TransferRequest<'_>) -> Result<TransferOutcome> {
        let old_root = request.merkle_proof.root;
        let (nf, opening) = self.authorize_input(
            request.note,
            request.note_key,
            request.spend_key,
            &request.merkle_proof,
        )?;

        let outputs = u128::from(request.send) + u128::from(request.change);
        if u128::from(opening.amount) != outputs {
            return Err(ShieldError::ValueMismatch {
                input: opening.amount,
                outputs,
            });
        }

        self.nullifiers.try_insert(nf, self.clock.now_secs())?;

        match self.create_outputs(&request, nf, old_root) {
            Ok(outcome) => {
                request.note.mark_spent()?;
                info!(
                    "transfer spent note {} into {} outputs, change at {}",
                    request.note.index,
                    outcome.statement.output_commitments.len(),
                    outcome.change_note.index
                );
                Ok(outcome)
            }
            Err(e) => {
                // Nothing was inserted; the note stays spendable
                self.nullifiers.release(&nf);
                Err(e)
            }
        }
    }

    fn create_outputs(
        &self,
        request: &TransferRequest<'_>,
        nf: Nullifier,
        old_root: [u8; 32],
    ) -> Result<TransferOutcome> {
        let (address, output_key) =
            stealth::generate_with_output_key(&request.recipient_scan_pubkey, &request.memo)?;

        let recipient = NoteDraft::create(request.send, &output_key)?;
        let change = NoteDraft::create(request.change, request.change_key)?;
        let decoys = assemble(recipient.commitment, self.decoy_count, &output_key)?;

        // Decoys land in the tree too, so the real output is not the odd one out
        let mut leaves: Vec<Commitment> = decoys.outputs.clone();
        leaves.push(change.commitment);
        leaves.shuffle(&mut OsRng);

        let indices = self.accumulator.insert_all(&leaves)?;
        let change_index = leaves
            .iter()
            .position(|leaf| *leaf == change.commitment)
            .map(|at| indices[at])
            .ok_or(ShieldError::UnknownCommitment)?;
        let now = self.clock.now_secs();

        Ok(TransferOutcome {
            nullifier: nf,
            payment: IncomingPayment {
                stealth: address,
                decoys,
                encrypted_payload: recipient.encrypted_payload,
                created_at: now,
            },
            change_note: change.into_note(change_index, now),
            new_root: self.accumulator.root(),
            statement: TransferStatement {
                old_root,
                nullifier: nf,
                output_commitments: leaves,
            },
        })
    }

    /// Spend a note to the clear; returns the amount to pay out.
    ///
    /// On success the input note is marked spent.
    pub fn unshield(&self, mut request: UnshieldRequest<'_>) -> Result<UnshieldOutcome> {
        let (nf, opening) = self.authorize_input(
            request.note,
            request.note_key,
            request.spend_key,
            &request.merkle_proof,
        )?;

        self.nullifiers.try_insert(nf, self.clock.now_secs())?;
        request.note.mark_spent()?;
        info!("unshielded note {} ({} units)", request.note.index, opening.amount);

        Ok(UnshieldOutcome {
            nullifier: nf,
            amount: opening.amount,
            old_root: request.merkle_proof.root,
        })
    }

    /// Recipient side of `transfer`, resolved against this pool's tree
    pub fn receive(
        &self,
        scan_key: &ScanKey,
        payment: &IncomingPayment,
    ) -> Result<Option<ReceivedNote>> {
        receive(scan_key, payment, &self.accumulator)
    }

    /// Replay ledger history into this pool
    pub async fn sync<S: LedgerSource>(
        &self,
        source: &S,
        options: &SyncOptions,
        cancel: &CancellationToken,
    ) -> Result<SyncReport> {
        sync(
            &self.accumulator,
            &self.nullifiers,
            source,
            options,
            cancel,
            &self.clock,
        )
        .await
    }
}
