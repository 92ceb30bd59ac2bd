//! Self-describing proof wrapper
//!
//! ```text
//! "SRP1" (4) || mode (1) || circuit (1) || len (4, LE) || backend proof (len)
//! ```

use shade_config::ProvingMode;
use shade_privacy::{Result, ShieldError};

use crate::backend::CircuitId;

pub const MAGIC: &[u8; 4] = b"SRP1";
pub const HEADER_LEN: usize = 4 + 1 + 1 + 4;

const MODE_PRODUCTION: u8 = 0;
const MODE_SIMULATED: u8 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProofEnvelope {
    pub mode: ProvingMode,
    pub circuit: CircuitId,
    pub proof: Vec<u8>,
}

impl ProofEnvelope {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let len = u32::try_from(self.proof.len())
            .map_err(|_| ShieldError::MalformedProof("backend proof too large"))?;
        let mut out = Vec::with_capacity(HEADER_LEN + self.proof.len());
        out.extend_from_slice(MAGIC);
        out.push(match self.mode {
            ProvingMode::Production => MODE_PRODUCTION,
            ProvingMode::Simulated => MODE_SIMULATED,
        });
        out.push(self.circuit.as_u8());
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(&self.proof);
        Ok(out)
    }

    /// Parse and check structure. Never consults a backend.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(ShieldError::MalformedProof("shorter than envelope header"));
        }
        let (header, body) = bytes.split_at(HEADER_LEN);
        if &header[..4] != MAGIC {
            return Err(ShieldError::MalformedProof("bad envelope magic"));
        }
        let mode = match header[4] {
            MODE_PRODUCTION => ProvingMode::Production,
            MODE_SIMULATED => ProvingMode::Simulated,
            _ => return Err(ShieldError::MalformedProof("unknown proving mode")),
        };
        let circuit = CircuitId::try_from(header[5])?;

        let len = u32::from_le_bytes([header[6], header[7], header[8], header[9]]) as usize;
        if len == 0 || body.len() != len {
            return Err(ShieldError::MalformedProof("envelope length mismatch"));
        }

        Ok(Self {
            mode,
            circuit,
            proof: body.to_vec(),
        })
    }
}
