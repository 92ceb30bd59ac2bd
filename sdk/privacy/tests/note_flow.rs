use shade_privacy::{
    IdentityKeys, MerkleTree, NoteDraft, ScanKey, ShieldError, assemble, decrypt_payload,
    recover_real, stealth, try_decrypt_for, verify,
};

#[test]
fn recipient_finds_and_proves_note() {
    let alice = IdentityKeys::random();
    let bob = IdentityKeys::random();
    let mut tree = MerkleTree::with_depth(12, 8).unwrap();

    // Someone else's note first, so ours does not sit at index 0
    let other = NoteDraft::create(5, &alice.view).unwrap();
    tree.insert(other.commitment).unwrap();

    let draft = NoteDraft::create(300, &bob.view).unwrap();
    let index = tree.insert(draft.commitment).unwrap();
    let note = draft.clone().into_note(index, 0);

    // Bob scans both published payloads
    assert!(
        try_decrypt_for(&other.commitment, &other.encrypted_payload, &bob.view)
            .unwrap()
            .is_none()
    );
    let opening = try_decrypt_for(&note.commitment, &note.encrypted_payload, &bob.view)
        .unwrap()
        .expect("bob's note");
    assert_eq!(opening.amount, 300);

    let proof = tree.proof(note.index).unwrap();
    assert!(verify(&note.commitment, &proof));
    assert_eq!(note.nullifier(&bob.spend), note.nullifier(&bob.spend));
}

#[test]
fn wrong_view_key_fails_closed() {
    let owner = IdentityKeys::random();
    let stranger = IdentityKeys::random();
    let draft = NoteDraft::create(1, &owner.view).unwrap();

    assert!(matches!(
        decrypt_payload(&draft.encrypted_payload, &stranger.view),
        Err(ShieldError::DecryptionFailed)
    ));
}

#[test]
fn tampered_payload_fails_closed() {
    let owner = IdentityKeys::random();
    let mut draft = NoteDraft::create(77, &owner.view).unwrap();
    draft.encrypted_payload.0[20] ^= 0x01;

    assert!(matches!(
        decrypt_payload(&draft.encrypted_payload, &owner.view),
        Err(ShieldError::DecryptionFailed)
    ));
}

#[test]
fn stealth_and_decoys_for_one_output() {
    let bob = IdentityKeys::from_master(&shade_privacy::Secret::random());
    let draft = NoteDraft::create(40, &bob.view).unwrap();

    let address = stealth::generate(&bob.scan_public(), b"rent").unwrap();
    let set = assemble(draft.commitment, 3, &bob.view).unwrap();

    let scan = ScanKey::from_secret(&bob.scan);
    assert_eq!(scan.scan(&address).unwrap().memo, b"rent");
    assert_eq!(recover_real(&set, &bob.view).unwrap(), draft.commitment);
}
