//! Proving Backends
//!
//! Zero-knowledge proving is delegated to a backend keyed by circuit. This
//! crate only assembles public signals and wraps the backend's bytes.
//!
//! ```text
//! ┌───────────────┐  public, witness   ┌──────────────────────┐
//! │  RangeProver  │ ─────────────────► │  dyn ProvingBackend  │
//! │               │ ◄───────────────── │  (Production | Sim)  │
//! └───────────────┘     proof bytes    └──────────────────────┘
//! ```

use shade_config::ProvingMode;
use shade_privacy::{BlindingFactor, Commitment, Result, ShieldError, commit};
use subtle::ConstantTimeEq;

/// A field-sized signal
pub type Signal = [u8; 32];

/// Circuits the engine knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CircuitId {
    /// `min <= value <= max` for the value committed in `commitment`
    Range = 1,
}

impl CircuitId {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Artifact base name (`<name>.wasm`, `<name>.zkey`, `<name>_vk.json`)
    pub fn name(self) -> &'static str {
        match self {
            CircuitId::Range => "range",
        }
    }
}

impl TryFrom<u8> for CircuitId {
    type Error = ShieldError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(CircuitId::Range),
            _ => Err(ShieldError::MalformedProof("unknown circuit id")),
        }
    }
}

/// Encode a `u64` as a little-endian field signal
pub fn u64_signal(value: u64) -> Signal {
    let mut out = [0u8; 32];
    out[..8].copy_from_slice(&value.to_le_bytes());
    out
}

/// Inverse of [`u64_signal`]; `None` if the signal exceeds 64 bits
pub fn signal_u64(signal: &Signal) -> Option<u64> {
    if signal[8..].iter().any(|b| *b != 0) {
        return None;
    }
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&signal[..8]);
    Some(u64::from_le_bytes(bytes))
}

/// Trait for ZK proof generation
pub trait ProvingBackend: Send + Sync {
    /// Generate a proof for `circuit` over public and private signals
    fn prove(&self, circuit: CircuitId, public: &[Signal], witness: &[Signal]) -> Result<Vec<u8>>;

    /// Check a proof against the public signals
    fn verify(&self, circuit: CircuitId, public: &[Signal], proof: &[u8]) -> Result<bool>;

    /// Whether proofs from this backend carry zero-knowledge guarantees
    fn mode(&self) -> ProvingMode;
}

/// Development backend: proofs are keyed digests of the public signals
///
/// It checks the witness against the circuit relation so unsatisfiable
/// statements still fail, but the output is not a zero-knowledge proof and
/// anyone holding the key can forge it.
pub struct SimulatedBackend {
    key: [u8; 32],
}

impl SimulatedBackend {
    pub fn new() -> Self {
        Self::with_key(blake3::derive_key("shade simulated prover v1", &[]))
    }

    pub fn with_key(key: [u8; 32]) -> Self {
        Self { key }
    }

    fn digest(&self, circuit: CircuitId, public: &[Signal]) -> [u8; 32] {
        let mut hasher = blake3::Hasher::new_keyed(&self.key);
        hasher.update(&[circuit.as_u8()]);
        for signal in public {
            hasher.update(signal);
        }
        *hasher.finalize().as_bytes()
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn range_relation_holds(public: &[Signal], witness: &[Signal]) -> bool {
    let ([commitment, min, max], [value, blinding]) = (public, witness) else {
        return false;
    };
    let (Some(value), Some(min), Some(max)) = (signal_u64(value), signal_u64(min), signal_u64(max))
    else {
        return false;
    };
    min <= value
        && value <= max
        && commit(value, &BlindingFactor::from_bytes(*blinding)) == Commitment(*commitment)
}

impl ProvingBackend for SimulatedBackend {
    fn prove(&self, circuit: CircuitId, public: &[Signal], witness: &[Signal]) -> Result<Vec<u8>> {
        let satisfied = match circuit {
            CircuitId::Range => range_relation_holds(public, witness),
        };
        if !satisfied {
            return Err(ShieldError::BackendFailure(format!(
                "witness does not satisfy the {} circuit",
                circuit.name()
            )));
        }
        Ok(self.digest(circuit, public).to_vec())
    }

    fn verify(&self, circuit: CircuitId, public: &[Signal], proof: &[u8]) -> Result<bool> {
        let expected = self.digest(circuit, public);
        Ok(bool::from(expected[..].ct_eq(proof)))
    }

    fn mode(&self) -> ProvingMode {
        ProvingMode::Simulated
    }
}
