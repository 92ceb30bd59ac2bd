use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use shade_config::ShadeConfig;
use shade_core::{
    LedgerEvent, LedgerPage, LedgerSource, NullifierRegistry, SharedAccumulator, ShieldedPool,
    SyncOptions, sync,
};
use shade_privacy::{
    BlindingFactor, Commitment, ManualClock, Nullifier, Result, ShieldError, commit,
};
use tokio_util::sync::CancellationToken;

/// In-memory ledger served in fixed-size pages
struct MemoryLedger {
    events: Vec<LedgerEvent>,
    fetches: AtomicUsize,
    cancel_after_first: Mutex<Option<CancellationToken>>,
}

impl MemoryLedger {
    fn new(events: Vec<LedgerEvent>) -> Self {
        Self {
            events,
            fetches: AtomicUsize::new(0),
            cancel_after_first: Mutex::new(None),
        }
    }
}

impl LedgerSource for MemoryLedger {
    async fn fetch(&self, cursor: u64, limit: usize) -> Result<LedgerPage> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(token) = self.cancel_after_first.lock().unwrap().take() {
            token.cancel();
        }
        let start = cursor as usize;
        let end = (start + limit).min(self.events.len());
        Ok(LedgerPage {
            events: self.events[start..end].to_vec(),
            next_cursor: (end < self.events.len()).then_some(end as u64),
        })
    }
}

/// Never answers in time
struct StalledLedger;

impl LedgerSource for StalledLedger {
    async fn fetch(&self, _cursor: u64, _limit: usize) -> Result<LedgerPage> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(LedgerPage::default())
    }
}

fn history(n: u64) -> (Vec<LedgerEvent>, Vec<Commitment>) {
    let commitments: Vec<Commitment> = (0..n)
        .map(|i| commit(i, &BlindingFactor::random()))
        .collect();
    let mut events: Vec<LedgerEvent> = commitments
        .iter()
        .copied()
        .map(LedgerEvent::Commitment)
        .collect();
    events.push(LedgerEvent::Nullifier(Nullifier([1u8; 32])));
    // Ledger replay can duplicate events
    events.push(LedgerEvent::Commitment(commitments[0]));
    (events, commitments)
}

fn options(page_size: usize) -> SyncOptions {
    SyncOptions {
        start_cursor: 0,
        page_size,
        page_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn sync_rebuilds_tree_and_is_idempotent() {
    let (events, commitments) = history(7);
    let ledger = MemoryLedger::new(events);
    let acc = SharedAccumulator::new(10, 8).unwrap();
    let registry = NullifierRegistry::new();
    let clock = ManualClock::new(5_000);
    let cancel = CancellationToken::new();

    let report = sync(&acc, &registry, &ledger, &options(3), &cancel, &clock)
        .await
        .unwrap();
    assert_eq!(report.inserted, 7);
    assert_eq!(report.nullifiers, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.pages, 3);
    assert_eq!(acc.position_of(&commitments[4]), Some(4));
    assert_eq!(registry.spent_at(&Nullifier([1u8; 32])), Some(5));

    // Same tree as inserting directly
    let direct = SharedAccumulator::new(10, 8).unwrap();
    direct.insert_all(&commitments).unwrap();
    assert_eq!(acc.root(), direct.root());

    // Second replay changes nothing
    let root = acc.root();
    let again = sync(&acc, &registry, &ledger, &options(3), &cancel, &clock)
        .await
        .unwrap();
    assert_eq!(again.inserted, 0);
    assert_eq!(again.duplicates, 9);
    assert_eq!(acc.root(), root);
    assert_eq!(acc.leaf_count(), 7);
}

#[tokio::test]
async fn sync_cancelled_keeps_applied_pages() {
    let (events, _) = history(6);
    let ledger = MemoryLedger::new(events);
    let cancel = CancellationToken::new();
    *ledger.cancel_after_first.lock().unwrap() = Some(cancel.clone());

    let acc = SharedAccumulator::new(8, 4).unwrap();
    let registry = NullifierRegistry::new();
    let err = sync(&acc, &registry, &ledger, &options(2), &cancel, &ManualClock::new(0))
        .await
        .unwrap_err();

    assert!(matches!(err, ShieldError::SyncCancelled { processed: 2 }));
    assert_eq!(acc.leaf_count(), 2);
    assert_eq!(ledger.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn sync_times_out_stalled_ledger() {
    let acc = SharedAccumulator::new(8, 4).unwrap();
    let registry = NullifierRegistry::new();
    let opts = SyncOptions {
        page_timeout: Duration::from_millis(20),
        ..options(10)
    };

    let err = sync(
        &acc,
        &registry,
        &StalledLedger,
        &opts,
        &CancellationToken::new(),
        &ManualClock::new(0),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ShieldError::LedgerTimeout(20)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn pool_sync_then_shield_continues_indices() {
    let (events, _) = history(4);
    let ledger = MemoryLedger::new(events);
    let mut config = ShadeConfig::default();
    config.tree.depth = 8;
    let pool = ShieldedPool::with_clock(&config, ManualClock::new(0)).unwrap();

    let report = pool
        .sync(&ledger, &SyncOptions::from_config(&config.sync), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(report.pages, 1);

    let view = shade_privacy::Secret::random();
    let shielded = pool.shield(1, &view).unwrap();
    assert_eq!(shielded.note.index, 4);
}

#[tokio::test]
async fn sync_rejects_non_canonical_leaf() {
    let (mut events, commitments) = history(2);
    events.insert(1, LedgerEvent::Commitment(Commitment([0xff; 32])));
    let ledger = MemoryLedger::new(events);
    let acc = SharedAccumulator::new(8, 4).unwrap();
    let registry = NullifierRegistry::new();

    let err = sync(
        &acc,
        &registry,
        &ledger,
        &options(10),
        &CancellationToken::new(),
        &ManualClock::new(0),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ShieldError::NonCanonicalEncoding(_)));
    assert_eq!(acc.leaf_count(), 1);
    assert!(acc.contains(&commitments[0]));
    assert!(!acc.contains(&Commitment([0xff; 32])));
}
