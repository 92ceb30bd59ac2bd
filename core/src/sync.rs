//! Ledger sync
//!
//! Rebuilds local state after a restart by replaying ledger history page by
//! page. Replay is idempotent: commitments already in the tree and
//! nullifiers already registered are counted and skipped.
//!
//! ```text
//! cursor ──fetch(cursor, page_size)──► LedgerPage { events, next_cursor }
//!   │                                       │
//!   │   Commitment(c) ─► insert_if_absent   │
//!   │   Nullifier(n)  ─► registry           │
//!   └──────────── next_cursor ◄─────────────┘   (None = caught up)
//! ```

use std::future::Future;
use std::time::Duration;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use shade_config::SyncConfig;
use shade_privacy::{Clock, Commitment, Nullifier, Result, ShieldError};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::accumulator::SharedAccumulator;
use crate::nullifier_set::NullifierRegistry;

/// One replayed ledger event, in ledger order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    Commitment(Commitment),
    Nullifier(Nullifier),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPage {
    pub events: Vec<LedgerEvent>,
    /// Cursor of the next page; `None` once caught up
    pub next_cursor: Option<u64>,
}

/// Source of ledger history
pub trait LedgerSource: Send + Sync {
    fn fetch(&self, cursor: u64, limit: usize) -> impl Future<Output = Result<LedgerPage>> + Send;
}

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub start_cursor: u64,
    pub page_size: usize,
    pub page_timeout: Duration,
}

impl SyncOptions {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self {
            start_cursor: 0,
            page_size: config.page_size,
            page_timeout: config.page_timeout(),
        }
    }

    pub fn starting_at(mut self, cursor: u64) -> Self {
        self.start_cursor = cursor;
        self
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

/// What a sync run applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// New commitments appended to the tree
    pub inserted: u64,
    /// Commitments or nullifiers that were already known
    pub duplicates: u64,
    /// New nullifiers registered
    pub nullifiers: u64,
    pub pages: u64,
    /// Cursor to resume from
    pub cursor: u64,
}

impl SyncReport {
    fn processed(&self) -> u64 {
        self.inserted + self.duplicates + self.nullifiers
    }
}

/// Replay ledger history into `accumulator` and `registry`.
///
/// Cancellation and timeouts stop the run between pages; whatever was
/// already applied stays applied and a rerun picks it up as duplicates.
pub async fn sync<S, C>(
    accumulator: &SharedAccumulator,
    registry: &NullifierRegistry,
    source: &S,
    options: &SyncOptions,
    cancel: &CancellationToken,
    clock: &C,
) -> Result<SyncReport>
where
    S: LedgerSource,
    C: Clock,
{
    let mut report = SyncReport {
        cursor: options.start_cursor,
        ..SyncReport::default()
    };
    let timeout_ms = u64::try_from(options.page_timeout.as_millis()).unwrap_or(u64::MAX);

    loop {
        if cancel.is_cancelled() {
            info!("ledger sync cancelled at cursor {}", report.cursor);
            return Err(ShieldError::SyncCancelled {
                processed: report.processed(),
            });
        }

        let page = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ShieldError::SyncCancelled {
                    processed: report.processed(),
                });
            }
            fetched = timeout(options.page_timeout, source.fetch(report.cursor, options.page_size)) => {
                fetched.map_err(|_| ShieldError::LedgerTimeout(timeout_ms))??
            }
        };
        report.pages += 1;

        let now = clock.now_secs();
        for event in &page.events {
            match event {
                LedgerEvent::Commitment(c) => {
                    let (_, inserted) = accumulator.insert_if_absent(*c)?;
                    if inserted {
                        report.inserted += 1;
                    } else {
                        report.duplicates += 1;
                    }
                }
                LedgerEvent::Nullifier(n) => {
                    if !n.is_canonical() {
                        return Err(ShieldError::NonCanonicalEncoding("nullifier"));
                    }
                    if registry.insert_if_absent(*n, now) {
                        report.nullifiers += 1;
                    } else {
                        report.duplicates += 1;
                    }
                }
            }
        }
        debug!(
            "synced page at cursor {} ({} events)",
            report.cursor,
            page.events.len()
        );

        match page.next_cursor {
            None => break,
            Some(next) if next > report.cursor => report.cursor = next,
            Some(next) => {
                return Err(ShieldError::Ledger(format!(
                    "cursor did not advance: {} -> {next}",
                    report.cursor
                )));
            }
        }
    }

    info!(
        "ledger sync complete: {} inserted, {} duplicates, {} nullifiers over {} pages",
        report.inserted, report.duplicates, report.nullifiers, report.pages
    );
    Ok(report)
}
