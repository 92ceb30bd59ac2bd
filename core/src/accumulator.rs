//! Shared commitment accumulator
//!
//! Wraps the single-writer [`MerkleTree`] for concurrent use. Writers take
//! the lock for a whole insert; readers either read under the lock or take
//! a copy-on-write [`AccumulatorSnapshot`] and keep working without it.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;
use shade_config::TreeConfig;
use shade_privacy::{Commitment, MerkleProof, MerkleTree, Result, ShieldError};

/// Thread-safe accumulator handle
#[derive(Debug)]
pub struct SharedAccumulator {
    tree: RwLock<Arc<MerkleTree>>,
}

/// Frozen view of the tree at one root
#[derive(Debug, Clone)]
pub struct AccumulatorSnapshot {
    tree: Arc<MerkleTree>,
}

impl AccumulatorSnapshot {
    pub fn root(&self) -> [u8; 32] {
        self.tree.root()
    }

    pub fn leaf_count(&self) -> u64 {
        self.tree.leaf_count()
    }

    pub fn proof(&self, index: u32) -> Result<MerkleProof> {
        self.tree.proof(index)
    }

    pub fn contains(&self, leaf: &Commitment) -> bool {
        self.tree.contains(leaf)
    }
}

impl SharedAccumulator {
    pub fn new(depth: usize, root_history: usize) -> Result<Self> {
        Ok(Self::from_tree(MerkleTree::with_depth(depth, root_history)?))
    }

    pub fn from_config(config: &TreeConfig) -> Result<Self> {
        Self::new(config.depth, config.root_history)
    }

    pub fn from_tree(tree: MerkleTree) -> Self {
        Self {
            tree: RwLock::new(Arc::new(tree)),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Arc<MerkleTree>> {
        self.tree.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Arc<MerkleTree>> {
        self.tree.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert(&self, leaf: Commitment) -> Result<u32> {
        let mut tree = self.write();
        Arc::make_mut(&mut tree).insert(leaf)
    }

    /// Idempotent insert used by ledger replay
    pub fn insert_if_absent(&self, leaf: Commitment) -> Result<(u32, bool)> {
        let mut tree = self.write();
        Arc::make_mut(&mut tree).insert_if_absent(leaf)
    }

    /// Insert leaves at consecutive indices, all or none
    pub fn insert_all(&self, leaves: &[Commitment]) -> Result<Vec<u32>> {
        let mut guard = self.write();
        let needed = leaves.len() as u64;
        if guard.leaf_count() + needed > guard.capacity() {
            return Err(ShieldError::TreeFull {
                capacity: guard.capacity(),
            });
        }
        if !leaves.iter().all(Commitment::is_canonical) {
            return Err(ShieldError::NonCanonicalEncoding("merkle leaf"));
        }

        let tree = Arc::make_mut(&mut guard);
        let indices = leaves
            .iter()
            .map(|leaf| tree.insert(*leaf))
            .collect::<Result<Vec<_>>>()?;
        debug!("inserted {} leaves, root now {:02x?}", indices.len(), &tree.root()[..4]);
        Ok(indices)
    }

    pub fn proof(&self, index: u32) -> Result<MerkleProof> {
        self.read().proof(index)
    }

    /// Proof must be against the current root and verify
    pub fn verify_current(&self, leaf: &Commitment, proof: &MerkleProof) -> Result<()> {
        self.read().verify_current(leaf, proof)
    }

    pub fn snapshot(&self) -> AccumulatorSnapshot {
        AccumulatorSnapshot {
            tree: Arc::clone(&self.read()),
        }
    }

    pub fn root(&self) -> [u8; 32] {
        self.read().root()
    }

    pub fn leaf_count(&self) -> u64 {
        self.read().leaf_count()
    }

    pub fn depth(&self) -> usize {
        self.read().depth()
    }

    pub fn contains(&self, leaf: &Commitment) -> bool {
        self.read().contains(leaf)
    }

    pub fn position_of(&self, leaf: &Commitment) -> Option<u32> {
        self.read().position_of(leaf)
    }

    pub fn is_known_root(&self, root: &[u8; 32]) -> bool {
        self.read().is_known_root(root)
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use shade_privacy::verify;

    #[test]
    fn test_snapshot_is_frozen() {
        let acc = SharedAccumulator::new(8, 4).unwrap();
        acc.insert(Commitment([1u8; 32])).unwrap();
        let snapshot = acc.snapshot();
        let root = snapshot.root();

        acc.insert(Commitment([2u8; 32])).unwrap();
        assert_eq!(snapshot.root(), root);
        assert_eq!(snapshot.leaf_count(), 1);
        assert_ne!(acc.root(), root);

        let proof = snapshot.proof(0).unwrap();
        assert!(verify(&Commitment([1u8; 32]), &proof));
        assert!(acc.is_known_root(&root));
    }

    #[test]
    fn test_insert_all_is_atomic() {
        let acc = SharedAccumulator::new(2, 4).unwrap();
        acc.insert_all(&[Commitment([1u8; 32]), Commitment([2u8; 32])])
            .unwrap();
        acc.insert(Commitment([3u8; 32])).unwrap();
        let root = acc.root();

        assert!(matches!(
            acc.insert_all(&[Commitment([4u8; 32]), Commitment([5u8; 32])]),
            Err(ShieldError::TreeFull { capacity: 4 })
        ));
        assert_eq!(acc.leaf_count(), 3);
        assert_eq!(acc.root(), root);
    }

    #[test]
    fn test_concurrent_inserts_get_distinct_indices() {
        let acc = Arc::new(SharedAccumulator::new(10, 4).unwrap());
        let handles: Vec<_> = (0..4u8)
            .map(|t| {
                let acc = Arc::clone(&acc);
                thread::spawn(move || {
                    (0..16u8)
                        .map(|i| acc.insert(Commitment([t * 16 + i + 1; 32])).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut indices: Vec<u32> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        indices.sort_unstable();
        assert_eq!(indices, (0..64).collect::<Vec<_>>());

        for index in [0, 31, 63] {
            let proof = acc.snapshot().proof(index).unwrap();
            assert_eq!(proof.root, acc.root());
        }
    }

    #[test]
    fn test_insert_all_rejects_non_canonical_batch() {
        let acc = SharedAccumulator::new(4, 4).unwrap();
        let root = acc.root();
        assert!(matches!(
            acc.insert_all(&[Commitment([1u8; 32]), Commitment([0xff; 32])]),
            Err(ShieldError::NonCanonicalEncoding(_))
        ));
        assert_eq!(acc.leaf_count(), 0);
        assert_eq!(acc.root(), root);
    }
}
