use std::sync::Arc;
use std::thread;

use shade_config::{ProvingMode, ShadeConfig};
use shade_core::{ShieldedPool, TransferRequest, UnshieldRequest};
use shade_disclosure::{RangeProver, SimulatedBackend};
use shade_privacy::{
    IdentityKeys, ManualClock, ScanKey, ShieldError, nullifier, recover_real, verify,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn small_config() -> ShadeConfig {
    let mut config = ShadeConfig::default();
    config.tree.depth = 12;
    config
}

fn pool() -> ShieldedPool<ManualClock> {
    ShieldedPool::with_clock(&small_config(), ManualClock::new(1_700_000_000_000)).unwrap()
}

#[test]
fn shield_spend_and_replay() {
    init_logger();
    let pool = pool();
    let alice = IdentityKeys::random();
    let bob = IdentityKeys::random();

    // Shield 10 -> C0 at index 0
    let mut shielded = pool.shield(10, &alice.view).unwrap();
    assert_eq!(shielded.note.index, 0);
    assert_eq!(shielded.note.created_at, 1_700_000_000);
    let unspent_copy = shielded.note.clone();
    let r0 = pool.root();

    // Spend 3 to bob, 7 back to alice
    let proof = pool.proof(0).unwrap();
    assert_eq!(proof.root, r0);
    let outcome = pool
        .transfer(TransferRequest {
            note: &mut shielded.note,
            note_key: &alice.view,
            spend_key: &alice.spend,
            merkle_proof: proof.clone(),
            recipient_scan_pubkey: bob.scan_public(),
            send: 3,
            change: 7,
            change_key: &alice.view,
            memo: b"coffee".to_vec(),
        })
        .unwrap();
    assert!(shielded.note.is_spent());

    let n0 = nullifier(&alice.spend, 0);
    assert_eq!(outcome.nullifier, n0);
    assert!(pool.nullifiers().contains(&n0));
    assert_eq!(outcome.payment.decoys.len(), 4);
    assert_ne!(outcome.new_root, r0);
    assert_eq!(outcome.new_root, pool.root());
    assert_eq!(outcome.statement.old_root, r0);

    // Every decoy output and the change land in the tree, in one shuffled run
    assert_eq!(pool.accumulator().leaf_count(), 6);
    let leaves = &outcome.statement.output_commitments;
    assert_eq!(leaves.len(), 5);
    for (offset, leaf) in leaves.iter().enumerate() {
        assert_eq!(pool.accumulator().position_of(leaf), Some(offset as u32 + 1));
    }
    for output in &outcome.payment.decoys.outputs {
        assert!(leaves.contains(output));
    }
    assert!(leaves.contains(&outcome.change_note.commitment));
    assert_eq!(
        pool.accumulator().position_of(&outcome.change_note.commitment),
        Some(outcome.change_note.index)
    );
    assert_eq!(outcome.statement.public_signals().len(), 7);

    // Bob finds the payment; alice's scan key does not
    let received = pool
        .receive(&ScanKey::from_secret(&bob.scan), &outcome.payment)
        .unwrap()
        .expect("bob's payment");
    assert_eq!(received.opening.amount, 3);
    assert_eq!(received.memo, b"coffee");
    assert_eq!(
        recover_real(&outcome.payment.decoys, &received.output_key).unwrap(),
        received.note.commitment
    );
    assert_eq!(
        pool.accumulator().position_of(&received.note.commitment),
        Some(received.note.index)
    );
    assert!(
        pool.receive(&ScanKey::from_secret(&alice.scan), &outcome.payment)
            .unwrap()
            .is_none()
    );

    // Change opens for alice
    assert_eq!(outcome.change_note.open(&alice.view).unwrap().amount, 7);

    // Replaying from a stale copy of the note hits the nullifier gate, with
    // the old proof or a fresh one
    for merkle_proof in [proof, pool.proof(0).unwrap()] {
        let mut copy = unspent_copy.clone();
        let replay = pool.transfer(TransferRequest {
            note: &mut copy,
            note_key: &alice.view,
            spend_key: &alice.spend,
            merkle_proof,
            recipient_scan_pubkey: bob.scan_public(),
            send: 3,
            change: 7,
            change_key: &alice.view,
            memo: Vec::new(),
        });
        assert!(matches!(replay, Err(ShieldError::DoubleSpend)));
        assert!(!copy.is_spent());
    }
    assert_eq!(pool.accumulator().leaf_count(), 6);
}

#[test]
fn payment_does_not_name_its_output() {
    let pool = pool();
    let alice = IdentityKeys::random();
    let bob = IdentityKeys::random();
    let mut shielded = pool.shield(12, &alice.view).unwrap();

    let outcome = pool
        .transfer(TransferRequest {
            note: &mut shielded.note,
            note_key: &alice.view,
            spend_key: &alice.spend,
            merkle_proof: pool.proof(0).unwrap(),
            recipient_scan_pubkey: bob.scan_public(),
            send: 12,
            change: 0,
            change_key: &alice.view,
            memo: Vec::new(),
        })
        .unwrap();

    // The published form holds the decoy set and one ciphertext, nothing else
    let published = serde_json::to_value(&outcome.payment).unwrap();
    let mut fields: Vec<_> = published.as_object().unwrap().keys().cloned().collect();
    fields.sort();
    assert_eq!(
        fields,
        ["created_at", "decoys", "encrypted_payload", "stealth"]
    );

    // Without bob's keys every decoy output is an equally plausible tree leaf
    for output in &outcome.payment.decoys.outputs {
        assert!(pool.accumulator().contains(output));
    }
    let stranger = IdentityKeys::random();
    assert!(
        pool.receive(&ScanKey::from_secret(&stranger.scan), &outcome.payment)
            .unwrap()
            .is_none()
    );
}

#[test]
fn stale_proof_rejected() {
    let pool = pool();
    let alice = IdentityKeys::random();
    let mut shielded = pool.shield(5, &alice.view).unwrap();
    let proof = pool.proof(0).unwrap();
    pool.shield(1, &alice.view).unwrap();

    let err = pool
        .unshield(UnshieldRequest {
            note: &mut shielded.note,
            note_key: &alice.view,
            spend_key: &alice.spend,
            merkle_proof: proof.clone(),
        })
        .unwrap_err();
    assert!(matches!(err, ShieldError::StaleProof));
    assert!(!shielded.note.is_spent());
    // The old proof is still a valid membership proof for its own root
    assert!(verify(&shielded.note.commitment, &proof));
    assert!(pool.accumulator().is_known_root(&proof.root));
    assert!(pool.nullifiers().is_empty());
}

#[test]
fn value_mismatch_registers_nothing() {
    let pool = pool();
    let alice = IdentityKeys::random();
    let bob = IdentityKeys::random();
    let mut shielded = pool.shield(10, &alice.view).unwrap();

    let err = pool
        .transfer(TransferRequest {
            note: &mut shielded.note,
            note_key: &alice.view,
            spend_key: &alice.spend,
            merkle_proof: pool.proof(0).unwrap(),
            recipient_scan_pubkey: bob.scan_public(),
            send: 8,
            change: 8,
            change_key: &alice.view,
            memo: Vec::new(),
        })
        .unwrap_err();
    assert!(matches!(
        err,
        ShieldError::ValueMismatch {
            input: 10,
            outputs: 16
        }
    ));
    assert!(pool.nullifiers().is_empty());
    assert!(!shielded.note.is_spent());
    assert_eq!(pool.accumulator().leaf_count(), 1);
}

#[test]
fn full_tree_releases_nullifier() {
    let mut config = ShadeConfig::default();
    config.tree.depth = 1;
    let pool = ShieldedPool::with_clock(&config, ManualClock::new(0)).unwrap();
    let alice = IdentityKeys::random();
    let mut shielded = pool.shield(4, &alice.view).unwrap();

    let request = TransferRequest {
        note: &mut shielded.note,
        note_key: &alice.view,
        spend_key: &alice.spend,
        merkle_proof: pool.proof(0).unwrap(),
        recipient_scan_pubkey: alice.scan_public(),
        send: 2,
        change: 2,
        change_key: &alice.view,
        memo: Vec::new(),
    };
    assert!(matches!(
        pool.transfer(request),
        Err(ShieldError::TreeFull { capacity: 2 })
    ));
    assert!(!pool.nullifiers().contains(&nullifier(&alice.spend, 0)));
    assert!(!shielded.note.is_spent());
    assert_eq!(pool.accumulator().leaf_count(), 1);
}

#[test]
fn concurrent_spends_single_winner() {
    let pool = Arc::new(pool());
    let alice = Arc::new(IdentityKeys::random());
    let bob = IdentityKeys::random();
    let shielded = pool.shield(9, &alice.view).unwrap();
    let proof = pool.proof(0).unwrap();
    let bob_scan = bob.scan_public();

    // Each thread holds its own unspent copy of the same note
    let handles: Vec<_> = (0..6)
        .map(|_| {
            let (pool, alice, mut note, proof) = (
                Arc::clone(&pool),
                Arc::clone(&alice),
                shielded.note.clone(),
                proof.clone(),
            );
            thread::spawn(move || {
                pool.transfer(TransferRequest {
                    note: &mut note,
                    note_key: &alice.view,
                    spend_key: &alice.spend,
                    merkle_proof: proof,
                    recipient_scan_pubkey: bob_scan,
                    send: 9,
                    change: 0,
                    change_key: &alice.view,
                    memo: Vec::new(),
                })
                .map(|_| ())
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.into_iter().filter_map(|r| r.err()) {
        assert!(matches!(err, ShieldError::DoubleSpend));
    }
    assert_eq!(pool.accumulator().leaf_count(), 6);
}

#[test]
fn unshield_and_spent_note() {
    let pool = pool();
    let alice = IdentityKeys::random();
    let mut shielded = pool.shield(250, &alice.view).unwrap();
    let unspent_copy = shielded.note.clone();

    let outcome = pool
        .unshield(UnshieldRequest {
            note: &mut shielded.note,
            note_key: &alice.view,
            spend_key: &alice.spend,
            merkle_proof: pool.proof(0).unwrap(),
        })
        .unwrap();
    assert_eq!(outcome.amount, 250);
    assert!(shielded.note.is_spent());

    // Registered nullifier wins over the local flag
    for mut note in [shielded.note.clone(), unspent_copy] {
        let err = pool
            .unshield(UnshieldRequest {
                note: &mut note,
                note_key: &alice.view,
                spend_key: &alice.spend,
                merkle_proof: pool.proof(0).unwrap(),
            })
            .unwrap_err();
        assert!(matches!(err, ShieldError::DoubleSpend));
    }

    // A note flagged spent locally but unknown to this pool
    let fresh = ShieldedPool::with_clock(&small_config(), ManualClock::new(0)).unwrap();
    let mut other = fresh.shield(5, &alice.view).unwrap();
    other.note.mark_spent().unwrap();
    let err = fresh
        .unshield(UnshieldRequest {
            note: &mut other.note,
            note_key: &alice.view,
            spend_key: &alice.spend,
            merkle_proof: fresh.proof(0).unwrap(),
        })
        .unwrap_err();
    assert!(matches!(err, ShieldError::NoteAlreadySpent));
    assert!(fresh.nullifiers().is_empty());
}

#[test]
fn received_note_is_spendable_and_provable() {
    let pool = pool();
    let alice = IdentityKeys::random();
    let bob = IdentityKeys::random();
    let mut shielded = pool.shield(100, &alice.view).unwrap();

    let outcome = pool
        .transfer(TransferRequest {
            note: &mut shielded.note,
            note_key: &alice.view,
            spend_key: &alice.spend,
            merkle_proof: pool.proof(0).unwrap(),
            recipient_scan_pubkey: bob.scan_public(),
            send: 60,
            change: 40,
            change_key: &alice.view,
            memo: Vec::new(),
        })
        .unwrap();
    let mut received = pool
        .receive(&ScanKey::from_secret(&bob.scan), &outcome.payment)
        .unwrap()
        .unwrap();

    // Bob shows an auditor the note holds at least 50
    let mut proving = small_config().proving;
    proving.mode = ProvingMode::Simulated;
    proving.allow_simulated = true;
    let prover = RangeProver::new(Arc::new(SimulatedBackend::new()), &proving).unwrap();
    let range = prover
        .generate_range_proof(received.opening.amount, &received.opening.blinding, 50, u64::MAX)
        .unwrap();
    assert!(
        prover
            .verify_claim(&range, &received.note.commitment, 50, u64::MAX)
            .unwrap()
    );

    // And spends it onward
    let merkle_proof = pool.proof(received.note.index).unwrap();
    let back = pool
        .unshield(UnshieldRequest {
            note: &mut received.note,
            note_key: &received.output_key,
            spend_key: &bob.spend,
            merkle_proof,
        })
        .unwrap();
    assert_eq!(back.amount, 60);
    assert!(received.note.is_spent());
}
