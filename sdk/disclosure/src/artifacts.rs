//! Circuit artifact integrity
//!
//! Proving keys and witness generators are loaded only after their SHA-256
//! digest matches a trusted manifest.
//!
//! ```text
//! <artifacts_dir>/
//!   manifest.json      { "range.wasm": "<sha256 hex>", ... }
//!   range.wasm
//!   range.zkey
//!   range_vk.json
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use log::{debug, warn};
use sha2::{Digest, Sha256};
use shade_privacy::{Result, ShieldError};

use crate::backend::CircuitId;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Artifacts needed to prove and verify one circuit
#[derive(Debug, Clone)]
pub struct CircuitArtifacts {
    pub circuit: CircuitId,
    pub wasm: Vec<u8>,
    pub proving_key: Vec<u8>,
    pub verification_key: Vec<u8>,
}

/// Name -> expected SHA-256 digest
#[derive(Debug, Clone, Default)]
pub struct TrustedArtifacts {
    digests: HashMap<String, [u8; 32]>,
}

fn sha256(bytes: &[u8]) -> [u8; 32] {
    Sha256::digest(bytes).into()
}

impl TrustedArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `name` with the given hex digest
    pub fn insert(&mut self, name: impl Into<String>, sha256_hex: &str) -> Result<()> {
        let name = name.into();
        let mut digest = [0u8; 32];
        hex::decode_to_slice(sha256_hex, &mut digest)
            .map_err(|_| ShieldError::UnknownArtifact(format!("{name}: digest is not sha256 hex")))?;
        self.digests.insert(name, digest);
        Ok(())
    }

    /// Parse a JSON manifest of `{ name: sha256_hex }`
    pub fn from_manifest(json: &str) -> Result<Self> {
        let entries: HashMap<String, String> = serde_json::from_str(json)
            .map_err(|e| ShieldError::UnknownArtifact(format!("unreadable manifest: {e}")))?;
        let mut trusted = Self::new();
        for (name, digest) in entries {
            trusted.insert(name, &digest)?;
        }
        Ok(trusted)
    }

    /// Read `<dir>/manifest.json`
    pub fn load_manifest(dir: &Path) -> Result<Self> {
        let json = fs::read_to_string(dir.join(MANIFEST_FILE))?;
        Self::from_manifest(&json)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.digests.contains_key(name)
    }

    /// Check bytes claimed to be artifact `name`
    pub fn verify_bytes(&self, name: &str, bytes: &[u8]) -> Result<()> {
        let expected = self
            .digests
            .get(name)
            .ok_or_else(|| ShieldError::UnknownArtifact(name.to_string()))?;
        let actual = sha256(bytes);
        if actual != *expected {
            warn!("circuit artifact {name} failed integrity check");
            return Err(ShieldError::ArtifactIntegrity {
                name: name.to_string(),
                expected: hex::encode(expected),
                actual: hex::encode(actual),
            });
        }
        Ok(())
    }

    /// Read `<dir>/<name>` and return it only if the digest matches
    pub fn load_verified(&self, dir: &Path, name: &str) -> Result<Vec<u8>> {
        if !self.contains(name) {
            return Err(ShieldError::UnknownArtifact(name.to_string()));
        }
        let bytes = fs::read(dir.join(name))?;
        self.verify_bytes(name, &bytes)?;
        debug!("loaded verified artifact {name} ({} bytes)", bytes.len());
        Ok(bytes)
    }

    /// Load every artifact of `circuit`
    pub fn load_circuit(&self, dir: &Path, circuit: CircuitId) -> Result<CircuitArtifacts> {
        let base = circuit.name();
        Ok(CircuitArtifacts {
            circuit,
            wasm: self.load_verified(dir, &format!("{base}.wasm"))?,
            proving_key: self.load_verified(dir, &format!("{base}.zkey"))?,
            verification_key: self.load_verified(dir, &format!("{base}_vk.json"))?,
        })
    }
}
