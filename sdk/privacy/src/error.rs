//! Error taxonomy shared by every Shade crate.
//!
//! Variants fall into four families (see [`ErrorKind`]) so callers can map
//! them onto distinct user-facing messages: "already spent" is a state
//! rejection, "corrupted proof" is a cryptographic one.

use thiserror::Error;

/// Broad classification of a [`ShieldError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad caller input, rejected before any cryptographic work.
    InputValidation,
    /// Authentication or proof verification failed.
    Cryptographic,
    /// Business-logic rejection against current engine state.
    StateConsistency,
    /// Proving backend, artifacts or ledger misbehaved.
    ExternalDependency,
}

/// Engine errors
#[derive(Debug, Error)]
pub enum ShieldError {
    // ---- input validation ----
    #[error("invalid input length: expected {expected} bytes, got {actual}")]
    InvalidInputLength { expected: usize, actual: usize },

    #[error("value out of range: {value} not in [{min}, {max}]")]
    ValueOutOfRange { value: u64, min: u64, max: u64 },

    #[error("invalid range: min {min} exceeds max {max}")]
    InvalidRange { min: u64, max: u64 },

    #[error("malformed proof: {0}")]
    MalformedProof(&'static str),

    #[error("malformed ciphertext: {0}")]
    MalformedCiphertext(&'static str),

    #[error("non-canonical field encoding for {0}")]
    NonCanonicalEncoding(&'static str),

    #[error("invalid decoy count {count} (allowed 1..={max})")]
    InvalidDecoyCount { count: usize, max: usize },

    #[error("invalid tree depth {0} (allowed 1..=32)")]
    InvalidTreeDepth(usize),

    #[error("value mismatch: input {input} != outputs {outputs}")]
    ValueMismatch { input: u64, outputs: u128 },

    // ---- cryptographic ----
    #[error("decryption failed")]
    DecryptionFailed,

    #[error("encryption failed")]
    EncryptionFailed,

    #[error("decrypted note does not open the expected commitment")]
    CommitmentMismatch,

    #[error("corrupt decoy set: index {index} outside {len} outputs")]
    CorruptDecoySet { index: usize, len: usize },

    #[error("merkle proof does not verify")]
    InvalidMerkleProof,

    #[error("proof mode mismatch: expected {expected}, got {actual}")]
    ProofModeMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("invalid signature")]
    InvalidSignature,

    // ---- state consistency ----
    #[error("nullifier already seen (double-spend attempt)")]
    DoubleSpend,

    #[error("note already spent")]
    NoteAlreadySpent,

    #[error("merkle tree full: capacity {capacity}")]
    TreeFull { capacity: u64 },

    #[error("leaf index {index} out of bounds (leaf count {leaf_count})")]
    LeafIndexOutOfBounds { index: u64, leaf_count: u64 },

    #[error("commitment is not in the tree")]
    UnknownCommitment,

    #[error("proof root is not the current root")]
    StaleProof,

    // ---- external dependency ----
    #[error("proving backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("proving backend failed: {0}")]
    BackendFailure(String),

    #[error("simulated proving mode requires an explicit allow flag")]
    SimulatedModeDisallowed,

    #[error("unknown circuit artifact: {0}")]
    UnknownArtifact(String),

    #[error("circuit artifact {name} failed integrity check (expected {expected}, got {actual})")]
    ArtifactIntegrity {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("artifact io: {0}")]
    ArtifactIo(#[from] std::io::Error),

    #[error("ledger error: {0}")]
    Ledger(String),

    #[error("ledger request timed out after {0} ms")]
    LedgerTimeout(u64),

    #[error("sync cancelled after {processed} events")]
    SyncCancelled { processed: u64 },
}

impl ShieldError {
    /// Classify the error.
    pub fn kind(&self) -> ErrorKind {
        use ShieldError::*;
        match self {
            InvalidInputLength { .. }
            | ValueOutOfRange { .. }
            | InvalidRange { .. }
            | MalformedProof(_)
            | MalformedCiphertext(_)
            | NonCanonicalEncoding(_)
            | InvalidDecoyCount { .. }
            | InvalidTreeDepth(_)
            | ValueMismatch { .. } => ErrorKind::InputValidation,

            DecryptionFailed
            | EncryptionFailed
            | CommitmentMismatch
            | CorruptDecoySet { .. }
            | InvalidMerkleProof
            | ProofModeMismatch { .. }
            | InvalidSignature => ErrorKind::Cryptographic,

            DoubleSpend
            | NoteAlreadySpent
            | TreeFull { .. }
            | LeafIndexOutOfBounds { .. }
            | UnknownCommitment
            | StaleProof => ErrorKind::StateConsistency,

            BackendUnavailable(_)
            | BackendFailure(_)
            | SimulatedModeDisallowed
            | UnknownArtifact(_)
            | ArtifactIntegrity { .. }
            | ArtifactIo(_)
            | Ledger(_)
            | LedgerTimeout(_)
            | SyncCancelled { .. } => ErrorKind::ExternalDependency,
        }
    }

    /// Whether a caller may retry the same request unchanged.
    ///
    /// Only transient unavailability qualifies; integrity failures and every
    /// cryptographic rejection are final.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ShieldError::BackendUnavailable(_) | ShieldError::LedgerTimeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ShieldError>;
