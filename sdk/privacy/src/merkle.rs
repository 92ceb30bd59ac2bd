//! Merkle Tree for Note Commitments
//!
//! Append-only incremental tree over commitments. Absent subtrees hash to
//! precomputed zero nodes, so only the filled prefix of each level is stored.
//!
//! ```text
//!                    Root
//!                   /    \
//!                 H01    Z1         Z0 = [0; 32]
//!                /  \               Z(i) = H(Z(i-1), Z(i-1))
//!               C0  C1   Z0  Z0
//! ```

use std::collections::{HashMap, VecDeque};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::commitment::Commitment;
use crate::error::{Result, ShieldError};
use crate::primitives::{compress, is_canonical};

/// Reference depth (2^20 = 1,048,576 leaves)
pub const DEFAULT_TREE_DEPTH: usize = 20;
pub const MAX_TREE_DEPTH: usize = 32;
/// Recent roots kept for race tolerance
pub const DEFAULT_ROOT_HISTORY: usize = 30;

/// Tree root digest
pub type MerkleRoot = [u8; 32];

/// A Merkle membership proof
///
/// Only valid against the root it was generated under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerkleProof {
    /// Sibling hashes from leaf to root
    pub siblings: Vec<[u8; 32]>,
    /// Position bits (false = left, true = right)
    pub path_indices: Vec<bool>,
    /// Root the proof was generated under
    pub root: MerkleRoot,
    /// The leaf position
    pub leaf_index: u32,
}

impl MerkleProof {
    pub fn depth(&self) -> usize {
        self.siblings.len()
    }

    /// Wire layout:
    /// `depth (1) || leaf_index (4, LE) || root (32) || siblings (32 * depth) || bits`
    /// with path bits packed LSB-first into `ceil(depth / 8)` bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let depth = self.siblings.len();
        let mut out = Vec::with_capacity(1 + 4 + 32 + 32 * depth + depth.div_ceil(8));
        // depth <= MAX_TREE_DEPTH for every proof the tree produces
        out.push(u8::try_from(depth).unwrap_or(u8::MAX));
        out.extend_from_slice(&self.leaf_index.to_le_bytes());
        out.extend_from_slice(&self.root);
        for sibling in &self.siblings {
            out.extend_from_slice(sibling);
        }
        let mut bits = vec![0u8; depth.div_ceil(8)];
        for (i, bit) in self.path_indices.iter().enumerate() {
            if *bit {
                bits[i / 8] |= 1 << (i % 8);
            }
        }
        out.extend_from_slice(&bits);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (&depth, rest) = bytes
            .split_first()
            .ok_or(ShieldError::MalformedProof("empty merkle proof"))?;
        let depth = usize::from(depth);
        if depth == 0 || depth > MAX_TREE_DEPTH {
            return Err(ShieldError::MalformedProof("merkle proof depth out of range"));
        }
        let expected = 4 + 32 + 32 * depth + depth.div_ceil(8);
        if rest.len() != expected {
            return Err(ShieldError::MalformedProof("merkle proof length mismatch"));
        }

        let (index, rest) = rest.split_at(4);
        let (root, rest) = rest.split_at(32);
        let (siblings, bits) = rest.split_at(32 * depth);

        let mut leaf_index = [0u8; 4];
        leaf_index.copy_from_slice(index);
        let mut root_arr = [0u8; 32];
        root_arr.copy_from_slice(root);

        let siblings: Vec<[u8; 32]> = siblings
            .chunks_exact(32)
            .map(|c| {
                let mut s = [0u8; 32];
                s.copy_from_slice(c);
                s
            })
            .collect();
        if !is_canonical(&root_arr) || !siblings.iter().all(is_canonical) {
            return Err(ShieldError::MalformedProof("non-canonical merkle node"));
        }
        let path_indices = (0..depth).map(|i| bits[i / 8] & (1 << (i % 8)) != 0).collect();

        Ok(Self {
            siblings,
            path_indices,
            root: root_arr,
            leaf_index: u32::from_le_bytes(leaf_index),
        })
    }
}

/// Recompute the root from `leaf` and the proof path
pub fn compute_root(leaf: &[u8; 32], siblings: &[[u8; 32]], path_indices: &[bool]) -> [u8; 32] {
    let mut current = *leaf;

    for (sibling, is_right) in siblings.iter().zip(path_indices.iter()) {
        current = if *is_right {
            // Current node is on the right
            compress(sibling, &current)
        } else {
            // Current node is on the left
            compress(&current, sibling)
        };
    }

    current
}

/// Verify that `proof` proves inclusion of `leaf` under `proof.root`.
///
/// Needs no tree state. Malformed proofs and non-canonical leaves or nodes
/// verify as `false`: the hash reduces mod r, so `c + r` would otherwise
/// pass under the proof for `c`.
pub fn verify(leaf: &Commitment, proof: &MerkleProof) -> bool {
    let depth = proof.siblings.len();
    if depth == 0 || depth > MAX_TREE_DEPTH || proof.path_indices.len() != depth {
        return false;
    }
    if !leaf.is_canonical() || !proof.siblings.iter().all(is_canonical) {
        return false;
    }
    // Path bits must spell out the claimed position
    let position_matches = proof
        .path_indices
        .iter()
        .enumerate()
        .all(|(level, bit)| ((u64::from(proof.leaf_index) >> level) & 1 == 1) == *bit);
    if !position_matches || (depth < 32 && u64::from(proof.leaf_index) >> depth != 0) {
        return false;
    }

    compute_root(&leaf.0, &proof.siblings, &proof.path_indices) == proof.root
}

/// Zero hashes for each level: `zeros[0]` is the empty leaf
pub fn zero_hashes(depth: usize) -> Vec<[u8; 32]> {
    let mut zeros = Vec::with_capacity(depth + 1);
    let mut current = [0u8; 32];
    zeros.push(current);
    for _ in 0..depth {
        current = compress(&current, &current);
        zeros.push(current);
    }
    zeros
}

/// Root history for Merkle tree
///
/// Stores recent roots to allow transactions to reference
/// slightly stale roots (handles race conditions).
#[derive(Debug, Clone, Default)]
pub struct RootHistory {
    /// Recent roots (most recent first)
    roots: VecDeque<MerkleRoot>,
    /// Maximum history size
    max_size: usize,
}

impl RootHistory {
    pub fn new(max_size: usize) -> Self {
        Self {
            roots: VecDeque::with_capacity(max_size),
            max_size,
        }
    }

    /// Add a new root
    pub fn push(&mut self, root: MerkleRoot) {
        self.roots.push_front(root);
        self.roots.truncate(self.max_size.max(1));
    }

    /// Check if a root is valid (current or recent)
    pub fn is_valid(&self, root: &MerkleRoot) -> bool {
        self.roots.contains(root)
    }

    /// Get the most recent root
    pub fn current(&self) -> Option<&MerkleRoot> {
        self.roots.front()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}

/// Incremental Merkle tree of note commitments
///
/// Single-writer: callers that share a tree must serialize `insert`.
#[derive(Debug, Clone)]
pub struct MerkleTree {
    depth: usize,
    /// `levels[0]` are the leaves, `levels[depth]` holds the root
    levels: Vec<Vec<[u8; 32]>>,
    zeros: Vec<[u8; 32]>,
    positions: HashMap<Commitment, u32>,
    root: [u8; 32],
    history: RootHistory,
}

impl MerkleTree {
    /// Create a new empty tree of the reference depth
    pub fn new() -> Self {
        Self::with_depth(DEFAULT_TREE_DEPTH, DEFAULT_ROOT_HISTORY)
            .expect("default depth is within bounds")
    }

    /// Create an empty tree with a custom depth and root history size
    pub fn with_depth(depth: usize, root_history: usize) -> Result<Self> {
        if depth == 0 || depth > MAX_TREE_DEPTH {
            return Err(ShieldError::InvalidTreeDepth(depth));
        }
        let zeros = zero_hashes(depth);
        let root = zeros[depth];
        let mut history = RootHistory::new(root_history);
        history.push(root);

        Ok(Self {
            depth,
            levels: vec![Vec::new(); depth + 1],
            zeros,
            positions: HashMap::new(),
            root,
            history,
        })
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Get current root
    pub fn root(&self) -> MerkleRoot {
        self.root
    }

    /// Number of leaves inserted so far
    pub fn leaf_count(&self) -> u64 {
        self.levels[0].len() as u64
    }

    /// Maximum number of leaves
    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    pub fn zero_hash(&self, level: usize) -> Option<&[u8; 32]> {
        self.zeros.get(level)
    }

    /// Insert a commitment at the next free index and return that index
    pub fn insert(&mut self, leaf: Commitment) -> Result<u32> {
        if !leaf.is_canonical() {
            return Err(ShieldError::NonCanonicalEncoding("merkle leaf"));
        }
        let count = self.leaf_count();
        if count >= self.capacity() {
            return Err(ShieldError::TreeFull {
                capacity: self.capacity(),
            });
        }
        let index = u32::try_from(count).map_err(|_| ShieldError::TreeFull {
            capacity: self.capacity(),
        })?;

        self.levels[0].push(leaf.0);

        // Update path to root
        let mut current_index = count as usize;
        let mut current_hash = leaf.0;

        for level in 0..self.depth {
            let is_right = current_index & 1 == 1;
            let sibling = self.node_or_zero(level, current_index ^ 1);

            current_hash = if is_right {
                compress(&sibling, &current_hash)
            } else {
                compress(&current_hash, &sibling)
            };
            current_index /= 2;

            let parent_level = &mut self.levels[level + 1];
            if current_index < parent_level.len() {
                parent_level[current_index] = current_hash;
            } else {
                parent_level.push(current_hash);
            }
        }

        self.root = current_hash;
        self.history.push(current_hash);
        self.positions.entry(leaf).or_insert(index);

        debug!("inserted leaf {} at index {}", hex_prefix(&leaf.0), index);
        Ok(index)
    }

    /// Insert unless the commitment is already a leaf.
    ///
    /// Returns the index and whether a new leaf was appended.
    pub fn insert_if_absent(&mut self, leaf: Commitment) -> Result<(u32, bool)> {
        if let Some(index) = self.positions.get(&leaf) {
            return Ok((*index, false));
        }
        self.insert(leaf).map(|index| (index, true))
    }

    /// Membership proof for the leaf at `index`
    pub fn proof(&self, index: u32) -> Result<MerkleProof> {
        if u64::from(index) >= self.leaf_count() {
            return Err(ShieldError::LeafIndexOutOfBounds {
                index: u64::from(index),
                leaf_count: self.leaf_count(),
            });
        }

        let mut siblings = Vec::with_capacity(self.depth);
        let mut path_indices = Vec::with_capacity(self.depth);
        let mut current_index = index as usize;

        for level in 0..self.depth {
            path_indices.push(current_index & 1 == 1);
            siblings.push(self.node_or_zero(level, current_index ^ 1));
            current_index /= 2;
        }

        Ok(MerkleProof {
            siblings,
            path_indices,
            root: self.root,
            leaf_index: index,
        })
    }

    /// Whether `proof` was generated under the current root and verifies
    pub fn verify_current(&self, leaf: &Commitment, proof: &MerkleProof) -> Result<()> {
        if proof.root != self.root {
            return Err(ShieldError::StaleProof);
        }
        if !verify(leaf, proof) {
            return Err(ShieldError::InvalidMerkleProof);
        }
        Ok(())
    }

    /// Check if a root is valid (current or recent)
    pub fn is_known_root(&self, root: &MerkleRoot) -> bool {
        self.history.is_valid(root)
    }

    pub fn contains(&self, leaf: &Commitment) -> bool {
        self.positions.contains_key(leaf)
    }

    pub fn position_of(&self, leaf: &Commitment) -> Option<u32> {
        self.positions.get(leaf).copied()
    }

    /// Get commitment at index
    pub fn leaf(&self, index: u32) -> Option<Commitment> {
        self.levels[0].get(index as usize).map(|h| Commitment(*h))
    }

    fn node_or_zero(&self, level: usize, index: usize) -> [u8; 32] {
        self.levels[level]
            .get(index)
            .copied()
            .unwrap_or(self.zeros[level])
    }
}

impl Default for MerkleTree {
    fn default() -> Self {
        Self::new()
    }
}

fn hex_prefix(bytes: &[u8; 32]) -> String {
    bytes[..4].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::commit;
    use crate::keys::BlindingFactor;

    fn leaf(n: u8) -> Commitment {
        Commitment([n; 32])
    }

    #[test]
    fn test_empty_tree() {
        let tree = MerkleTree::with_depth(8, 4).unwrap();
        assert_eq!(tree.leaf_count(), 0);
        // Root should be the empty root
        assert_eq!(tree.root(), zero_hashes(8)[8]);
    }

    #[test]
    fn test_zero_hashes_chain() {
        let zeros = zero_hashes(3);
        assert_eq!(zeros[0], [0u8; 32]);
        assert_eq!(zeros[1], compress(&zeros[0], &zeros[0]));
        assert_eq!(zeros[3], compress(&zeros[2], &zeros[2]));
    }

    #[test]
    fn test_insert_and_proof() {
        let mut tree = MerkleTree::new();

        let c1 = leaf(1);
        let c2 = leaf(2);

        assert_eq!(tree.insert(c1).unwrap(), 0);
        assert_eq!(tree.insert(c2).unwrap(), 1);

        let proof1 = tree.proof(0).unwrap();
        assert!(verify(&c1, &proof1));
        assert_eq!(proof1.depth(), DEFAULT_TREE_DEPTH);

        let proof2 = tree.proof(1).unwrap();
        assert!(verify(&c2, &proof2));
        assert_eq!(proof2.root, tree.root());
    }

    #[test]
    fn test_random_leaves_all_verify() {
        let mut tree = MerkleTree::with_depth(10, 8).unwrap();
        let leaves: Vec<Commitment> = (0..37)
            .map(|i| commit(i, &BlindingFactor::random()))
            .collect();
        for l in &leaves {
            tree.insert(*l).unwrap();
        }
        for (i, l) in leaves.iter().enumerate() {
            let proof = tree.proof(i as u32).unwrap();
            assert!(verify(l, &proof), "leaf {i} should verify");
        }
    }

    #[test]
    fn test_mutated_sibling_fails() {
        let mut tree = MerkleTree::with_depth(6, 4).unwrap();
        for i in 0..5 {
            tree.insert(leaf(i + 1)).unwrap();
        }
        let mut proof = tree.proof(3).unwrap();
        assert!(verify(&leaf(4), &proof));
        proof.siblings[2][0] ^= 0x01;
        assert!(!verify(&leaf(4), &proof));
    }

    #[test]
    fn test_proof_invalid_commitment() {
        let mut tree = MerkleTree::new();
        tree.insert(leaf(1)).unwrap();

        let proof = tree.proof(0).unwrap();
        assert!(!verify(&leaf(99), &proof));
    }

    #[test]
    fn test_path_must_match_leaf_index() {
        let mut tree = MerkleTree::with_depth(4, 4).unwrap();
        tree.insert(leaf(1)).unwrap();
        tree.insert(leaf(2)).unwrap();
        let mut proof = tree.proof(1).unwrap();
        proof.leaf_index = 0;
        assert!(!verify(&leaf(2), &proof));
    }

    #[test]
    fn test_truncated_proof_rejected() {
        let mut tree = MerkleTree::with_depth(4, 4).unwrap();
        tree.insert(leaf(1)).unwrap();
        let mut proof = tree.proof(0).unwrap();
        proof.path_indices.pop();
        assert!(!verify(&leaf(1), &proof));
    }

    #[test]
    fn test_root_changes() {
        let mut tree = MerkleTree::new();
        let root0 = tree.root();

        tree.insert(leaf(1)).unwrap();
        let root1 = tree.root();
        assert_ne!(root0, root1, "root should change after insert");

        tree.insert(leaf(2)).unwrap();
        assert_ne!(root1, tree.root(), "root should change after each insert");
        assert!(tree.is_known_root(&root1));
    }

    #[test]
    fn test_stale_proof_detected() {
        let mut tree = MerkleTree::with_depth(5, 4).unwrap();
        tree.insert(leaf(1)).unwrap();
        let proof = tree.proof(0).unwrap();
        tree.verify_current(&leaf(1), &proof).unwrap();

        tree.insert(leaf(2)).unwrap();
        assert!(matches!(
            tree.verify_current(&leaf(1), &proof),
            Err(ShieldError::StaleProof)
        ));
        // Still verifies against the root it was built under
        assert!(verify(&leaf(1), &proof));
        assert!(verify(&leaf(1), &tree.proof(0).unwrap()));
    }

    #[test]
    fn test_tree_full() {
        let mut tree = MerkleTree::with_depth(2, 4).unwrap();
        for i in 0..4 {
            tree.insert(leaf(i + 1)).unwrap();
        }
        assert!(matches!(
            tree.insert(leaf(9)),
            Err(ShieldError::TreeFull { capacity: 4 })
        ));
        assert_eq!(tree.leaf_count(), 4);
    }

    #[test]
    fn test_proof_out_of_bounds() {
        let mut tree = MerkleTree::with_depth(4, 4).unwrap();
        assert!(matches!(
            tree.proof(0),
            Err(ShieldError::LeafIndexOutOfBounds { index: 0, leaf_count: 0 })
        ));
        tree.insert(leaf(1)).unwrap();
        assert!(tree.proof(1).is_err());
    }

    #[test]
    fn test_insert_if_absent_is_idempotent() {
        let mut tree = MerkleTree::with_depth(4, 4).unwrap();
        assert_eq!(tree.insert_if_absent(leaf(1)).unwrap(), (0, true));
        let root = tree.root();
        assert_eq!(tree.insert_if_absent(leaf(1)).unwrap(), (0, false));
        assert_eq!(tree.root(), root);
        assert_eq!(tree.leaf_count(), 1);
        assert_eq!(tree.position_of(&leaf(1)), Some(0));
    }

    #[test]
    fn test_proof_bytes_roundtrip() {
        let mut tree = MerkleTree::with_depth(11, 4).unwrap();
        for i in 0..6 {
            tree.insert(leaf(i + 1)).unwrap();
        }
        let proof = tree.proof(5).unwrap();
        let bytes = proof.to_bytes();
        let back = MerkleProof::from_bytes(&bytes).unwrap();
        assert_eq!(back, proof);
        assert!(verify(&leaf(6), &back));

        assert!(MerkleProof::from_bytes(&bytes[..bytes.len() - 1]).is_err());
        assert!(MerkleProof::from_bytes(&[]).is_err());
    }

    /// `c + r` as 32 little-endian bytes, if it fits
    fn alias_of(c: &Commitment) -> Option<Commitment> {
        use ark_bls12_381::Fr;
        use ark_ff::{BigInteger, PrimeField};

        let modulus = Fr::MODULUS.to_bytes_le();
        let mut out = [0u8; 32];
        let mut carry = 0u16;
        for i in 0..32 {
            let sum = u16::from(c.0[i]) + u16::from(modulus[i]) + carry;
            out[i] = sum as u8;
            carry = sum >> 8;
        }
        (carry == 0).then_some(Commitment(out))
    }

    #[test]
    fn test_aliased_leaf_does_not_verify() {
        let mut tree = MerkleTree::with_depth(4, 4).unwrap();
        let real = leaf(3);
        tree.insert(real).unwrap();
        let proof = tree.proof(0).unwrap();

        let alias = alias_of(&real).unwrap();
        assert_ne!(alias, real);
        assert!(verify(&real, &proof));
        assert!(!verify(&alias, &proof));
        assert!(!tree.contains(&alias));
        assert!(matches!(
            tree.insert(alias),
            Err(ShieldError::NonCanonicalEncoding(_))
        ));
        assert_eq!(tree.leaf_count(), 1);
    }

    #[test]
    fn test_non_canonical_sibling_rejected() {
        let mut tree = MerkleTree::with_depth(3, 4).unwrap();
        tree.insert(leaf(1)).unwrap();
        tree.insert(leaf(2)).unwrap();
        let mut proof = tree.proof(1).unwrap();
        // Sibling at level 0 is leaf(1); its alias hashes identically
        proof.siblings[0] = alias_of(&leaf(1)).unwrap().0;
        assert!(!verify(&leaf(2), &proof));
        assert!(matches!(
            MerkleProof::from_bytes(&proof.to_bytes()),
            Err(ShieldError::MalformedProof(_))
        ));
    }

    #[test]
    fn test_root_history() {
        let mut history = RootHistory::new(2);

        let r1 = [1u8; 32];
        let r2 = [2u8; 32];
        let r3 = [3u8; 32];

        history.push(r1);
        history.push(r2);
        history.push(r3);

        assert!(!history.is_valid(&r1), "oldest root should be evicted");
        assert!(history.is_valid(&r2));
        assert!(history.is_valid(&r3));
        assert_eq!(history.current(), Some(&r3));
    }

    #[test]
    fn test_invalid_depth() {
        assert!(MerkleTree::with_depth(0, 1).is_err());
        assert!(MerkleTree::with_depth(33, 1).is_err());
    }
}
