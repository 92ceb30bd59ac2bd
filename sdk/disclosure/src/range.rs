//! Range Proofs
//!
//! Proves `min <= value <= max` for the value inside a commitment without
//! revealing it.
//!
//! ```text
//! public  = [commitment, min (LE32), max (LE32)]
//! witness = [value (LE32), blinding]
//! proof   = envelope(mode, Range, backend.prove(public, witness))
//! ```

use std::sync::Arc;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use shade_config::{ProvingConfig, ProvingMode};
use shade_privacy::{BlindingFactor, Commitment, Result, ShieldError, commit};

use crate::artifacts::{CircuitArtifacts, TrustedArtifacts};
use crate::backend::{CircuitId, ProvingBackend, SimulatedBackend, Signal, u64_signal};
use crate::envelope::ProofEnvelope;

/// A range proof over a committed value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeProof {
    pub commitment: Commitment,
    pub min: u64,
    pub max: u64,
    /// Encoded [`ProofEnvelope`]
    #[serde(with = "hex::serde")]
    pub envelope: Vec<u8>,
}

impl RangeProof {
    pub fn public_signals(&self) -> [Signal; 3] {
        range_signals(&self.commitment, self.min, self.max)
    }
}

fn range_signals(commitment: &Commitment, min: u64, max: u64) -> [Signal; 3] {
    [commitment.0, u64_signal(min), u64_signal(max)]
}

/// Range proof generation and verification over a backend
#[derive(Clone)]
pub struct RangeProver {
    backend: Arc<dyn ProvingBackend>,
    mode: ProvingMode,
}

impl RangeProver {
    /// Bind a backend under the configured proving mode.
    ///
    /// The backend's mode must match the configuration, and simulated mode
    /// must be allowed explicitly.
    pub fn new(backend: Arc<dyn ProvingBackend>, config: &ProvingConfig) -> Result<Self> {
        let mode = backend.mode();
        if mode != config.mode {
            return Err(ShieldError::ProofModeMismatch {
                expected: config.mode.as_str(),
                actual: mode.as_str(),
            });
        }

        match mode {
            ProvingMode::Simulated if !config.allow_simulated => {
                return Err(ShieldError::SimulatedModeDisallowed);
            }
            ProvingMode::Simulated => {
                warn!("==============================================================");
                warn!("  SIMULATED PROVING ENABLED: range proofs are NOT zero-knowledge");
                warn!("  and can be forged. Never use this mode with real funds.");
                warn!("==============================================================");
            }
            ProvingMode::Production => info!("range prover using production backend"),
        }

        Ok(Self { backend, mode })
    }

    /// Prover for `config`.
    ///
    /// Production mode reads the manifest in `artifacts_dir`, loads the range
    /// circuit's artifacts only if every digest matches, and hands them to
    /// `build`. Simulated mode needs no artifacts and never calls `build`.
    pub fn from_config<F>(config: &ProvingConfig, build: F) -> Result<Self>
    where
        F: FnOnce(CircuitArtifacts) -> Result<Arc<dyn ProvingBackend>>,
    {
        let backend: Arc<dyn ProvingBackend> = match config.mode {
            ProvingMode::Simulated => Arc::new(SimulatedBackend::new()),
            ProvingMode::Production => {
                let dir = config.artifacts_dir.as_deref().ok_or_else(|| {
                    ShieldError::BackendUnavailable("proving.artifacts_dir is not set".into())
                })?;
                let trusted = TrustedArtifacts::load_manifest(dir)?;
                let artifacts = trusted.load_circuit(dir, CircuitId::Range)?;
                info!("loaded verified range circuit artifacts from {}", dir.display());
                build(artifacts)?
            }
        };
        Self::new(backend, config)
    }

    pub fn mode(&self) -> ProvingMode {
        self.mode
    }

    /// Prove that the value committed under `blinding` lies in `[min, max]`
    pub fn generate_range_proof(
        &self,
        value: u64,
        blinding: &BlindingFactor,
        min: u64,
        max: u64,
    ) -> Result<RangeProof> {
        if min > max {
            return Err(ShieldError::InvalidRange { min, max });
        }
        // Fail fast instead of paying for a proof a verifier would reject
        if value < min || value > max {
            return Err(ShieldError::ValueOutOfRange { value, min, max });
        }

        let commitment = commit(value, blinding);
        let public = range_signals(&commitment, min, max);
        let witness = [u64_signal(value), *blinding.as_bytes()];

        let proof = self.backend.prove(CircuitId::Range, &public, &witness)?;
        let envelope = ProofEnvelope {
            mode: self.mode,
            circuit: CircuitId::Range,
            proof,
        }
        .encode()?;

        debug!("generated range proof for [{min}, {max}]");
        Ok(RangeProof {
            commitment,
            min,
            max,
            envelope,
        })
    }

    /// [`Self::generate_range_proof`] on the blocking worker pool
    pub async fn prove_async(
        &self,
        value: u64,
        blinding: BlindingFactor,
        min: u64,
        max: u64,
    ) -> Result<RangeProof> {
        let prover = self.clone();
        tokio::task::spawn_blocking(move || prover.generate_range_proof(value, &blinding, min, max))
            .await
            .map_err(|e| ShieldError::BackendFailure(format!("proving task failed: {e}")))?
    }

    /// Verify a proof against the signals it carries.
    ///
    /// Structural problems are errors and never reach the backend; a proof
    /// that is well formed but does not verify is `Ok(false)`.
    pub fn verify_range_proof(&self, proof: &RangeProof) -> Result<bool> {
        let envelope = ProofEnvelope::decode(&proof.envelope)?;
        if envelope.mode != self.mode {
            return Err(ShieldError::ProofModeMismatch {
                expected: self.mode.as_str(),
                actual: envelope.mode.as_str(),
            });
        }
        if envelope.circuit != CircuitId::Range {
            return Err(ShieldError::MalformedProof("not a range proof"));
        }
        if proof.min > proof.max {
            return Ok(false);
        }

        self.backend
            .verify(CircuitId::Range, &proof.public_signals(), &envelope.proof)
    }

    /// Verify that `proof` shows the value in `commitment` lies in `[min, max]`
    pub fn verify_claim(
        &self,
        proof: &RangeProof,
        commitment: &Commitment,
        min: u64,
        max: u64,
    ) -> Result<bool> {
        if proof.commitment != *commitment || proof.min != min || proof.max != max {
            return Ok(false);
        }
        self.verify_range_proof(proof)
    }
}
