//! Shade Disclosure
//!
//! Selective disclosure over shielded notes:
//!
//! - range proofs showing a committed value lies in `[min, max]`, delegated
//!   to a [`ProvingBackend`] and wrapped in a self-describing envelope
//! - SHA-256 pinned circuit artifacts
//! - Ed25519-signed, expiring view-key authorizations

pub mod artifacts;
pub mod authorization;
pub mod backend;
pub mod envelope;
pub mod range;

pub use artifacts::{CircuitArtifacts, TrustedArtifacts};
pub use authorization::{
    ViewKeyAuthorization, ViewScope, authorize_view, check_authorization, check_authorization_now,
    permits, signer_public_key,
};
pub use backend::{CircuitId, ProvingBackend, SimulatedBackend};
pub use envelope::ProofEnvelope;
pub use range::{RangeProof, RangeProver};
pub use shade_config::ProvingMode;
