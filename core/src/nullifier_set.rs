//! Seen-nullifier registry
//!
//! The double-spend gate. Registration is a single check-and-insert on a
//! sharded map, so two concurrent spends of one note cannot both succeed.

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use log::warn;
use shade_privacy::{Nullifier, Result, ShieldError};

/// Spent nullifiers with the unix-seconds time they were first seen
#[derive(Debug, Default)]
pub struct NullifierRegistry {
    spent: DashMap<Nullifier, u64>,
}

impl NullifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a spend; `DoubleSpend` if the nullifier was already seen
    pub fn try_insert(&self, nullifier: Nullifier, spent_at: u64) -> Result<()> {
        match self.spent.entry(nullifier) {
            Entry::Occupied(_) => {
                warn!("rejected double-spend of nullifier {:02x?}", &nullifier.0[..4]);
                Err(ShieldError::DoubleSpend)
            }
            Entry::Vacant(slot) => {
                slot.insert(spent_at);
                Ok(())
            }
        }
    }

    /// Ledger replay variant: returns whether the nullifier was new
    pub fn insert_if_absent(&self, nullifier: Nullifier, spent_at: u64) -> bool {
        match self.spent.entry(nullifier) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(spent_at);
                true
            }
        }
    }

    /// Undo a registration whose spend never completed
    pub(crate) fn release(&self, nullifier: &Nullifier) {
        self.spent.remove(nullifier);
    }

    pub fn contains(&self, nullifier: &Nullifier) -> bool {
        self.spent.contains_key(nullifier)
    }

    pub fn spent_at(&self, nullifier: &Nullifier) -> Option<u64> {
        self.spent.get(nullifier).map(|entry| *entry.value())
    }

    pub fn len(&self) -> usize {
        self.spent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spent.is_empty()
    }
}
