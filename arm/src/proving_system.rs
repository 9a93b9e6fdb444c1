//! The proving backend seam: what a proof is, how a prover is fed, and the
//! development prover used when no zkVM is available.

use crate::{
    config::ProverConfig,
    error::ArmError,
    hash::hash_many,
    program::{GuestEnv, Program},
    utils::to_words,
};
use lazy_static::lazy_static;
use risc0_zkvm::Digest;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Proof representations, mirroring the receipt kinds of the zkVM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProofType {
    /// One proof per segment, linear size, recursion friendly.
    Composite,
    /// Constant size, recursion friendly.
    Succinct,
    /// Constant size and cheap to verify on chain. Final: it cannot be
    /// recursively verified, hence cannot be aggregated.
    Groth16,
}

impl ProofType {
    pub fn is_recursive(&self) -> bool {
        !matches!(self, ProofType::Groth16)
    }

    pub fn parse(value: &str) -> Result<Self, ArmError> {
        match value.trim().to_ascii_lowercase().as_str() {
            "composite" => Ok(ProofType::Composite),
            "succinct" => Ok(ProofType::Succinct),
            "groth16" => Ok(ProofType::Groth16),
            other => Err(ArmError::InvalidConfig(format!("unknown proof type `{}`", other))),
        }
    }

    fn tag(&self) -> u8 {
        match self {
            ProofType::Composite => 0,
            ProofType::Succinct => 1,
            ProofType::Groth16 => 2,
        }
    }
}

impl Default for ProofType {
    fn default() -> Self {
        if cfg!(feature = "composite_prover") {
            ProofType::Composite
        } else if cfg!(feature = "groth16_prover") {
            ProofType::Groth16
        } else {
            ProofType::Succinct
        }
    }
}

/// An opaque proof together with its representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub proof_type: ProofType,
    #[serde(with = "serde_bytes")]
    pub seal: Vec<u8>,
}

/// A proof the program being proved depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assumption {
    pub image_id: Digest,
    pub journal: Vec<u8>,
    pub proof: Proof,
}

/// Witness and assumptions handed to a backend, like the zkVM executor env.
#[derive(Debug, Clone, Default)]
pub struct ProverEnv {
    pub(crate) input: Vec<Vec<u32>>,
    pub(crate) assumptions: Vec<Assumption>,
}

impl ProverEnv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write<T: Serialize>(&mut self, value: &T) -> Result<&mut Self, ArmError> {
        let words = to_words(value).map_err(|_| ArmError::WriteWitnessFailed)?;
        self.input.push(words);
        Ok(self)
    }

    pub fn add_assumption(&mut self, assumption: Assumption) -> &mut Self {
        self.assumptions.push(assumption);
        self
    }

    pub fn assumptions(&self) -> &[Assumption] {
        &self.assumptions
    }
}

/// Proves programs and verifies their proofs.
pub trait ProvingBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Proves `program` on `env`, returning the proof and the journal.
    fn prove(
        &self,
        program: &dyn Program,
        env: ProverEnv,
        proof_type: ProofType,
    ) -> Result<(Proof, Vec<u8>), ArmError>;

    /// Fails with [ArmError::InvalidProof] when the proof does not attest to
    /// `journal` under `image_id`.
    fn verify(&self, image_id: &Digest, journal: &[u8], proof: &Proof) -> Result<(), ArmError>;
}

const DEV_SEAL_DOMAIN: &[u8] = b"ARM_DevProverSeal";

/// Executes programs natively and seals the journal with a keyed hash.
///
/// Seals can only be forged by someone who knows the key, so this backend is
/// meant for development and tests, where it stands in for the zkVM's dev mode.
#[derive(Clone)]
pub struct DevProver {
    key: [u8; 32],
}

impl DevProver {
    pub fn new(key: [u8; 32]) -> Self {
        DevProver { key }
    }

    fn seal(&self, image_id: &Digest, proof_type: ProofType, journal: &[u8]) -> Vec<u8> {
        hash_many(&[
            DEV_SEAL_DOMAIN,
            &self.key,
            image_id.as_bytes(),
            &[proof_type.tag()],
            journal,
        ])
        .as_bytes()
        .to_vec()
    }
}

impl Default for DevProver {
    fn default() -> Self {
        DevProver::new(ProverConfig::default().dev_key)
    }
}

impl ProvingBackend for DevProver {
    fn name(&self) -> &'static str {
        "dev"
    }

    fn prove(
        &self,
        program: &dyn Program,
        env: ProverEnv,
        proof_type: ProofType,
    ) -> Result<(Proof, Vec<u8>), ArmError> {
        let image_id = program.image_id();
        debug!(program = program.name(), %image_id, ?proof_type, "proving");

        let mut claims = Vec::with_capacity(env.assumptions.len());
        for assumption in env.assumptions {
            if !assumption.proof.proof_type.is_recursive() {
                return Err(ArmError::IncompatibleProofType(
                    assumption.proof.proof_type,
                ));
            }
            self.verify(&assumption.image_id, &assumption.journal, &assumption.proof)
                .map_err(|err| ArmError::ProveFailed(format!("invalid assumption: {}", err)))?;
            claims.push((assumption.image_id, assumption.journal));
        }

        let mut guest = GuestEnv::new(env.input, claims);
        program.execute(&mut guest).map_err(|err| match err {
            ArmError::ProveFailed(_) => err,
            other => ArmError::ProveFailed(format!("{}: {}", program.name(), other)),
        })?;

        let journal = guest.journal().to_vec();
        let seal = self.seal(&image_id, proof_type, &journal);
        Ok((Proof { proof_type, seal }, journal))
    }

    fn verify(&self, image_id: &Digest, journal: &[u8], proof: &Proof) -> Result<(), ArmError> {
        debug!(%image_id, proof_type = ?proof.proof_type, "verifying");
        if self.seal(image_id, proof.proof_type, journal) == proof.seal {
            Ok(())
        } else {
            Err(ArmError::InvalidProof(format!(
                "seal does not match program {}",
                image_id
            )))
        }
    }
}

lazy_static! {
    static ref DEFAULT_CONFIG: ProverConfig = ProverConfig::from_env().unwrap_or_else(|err| {
        warn!(%err, "invalid prover configuration, falling back to defaults");
        ProverConfig::default()
    });
    static ref DEFAULT_BACKEND: Box<dyn ProvingBackend> = DEFAULT_CONFIG.backend();
}

/// The process-wide backend, built from the environment on first use.
pub fn default_backend() -> &'static dyn ProvingBackend {
    DEFAULT_BACKEND.as_ref()
}

/// The proof type requested by the environment or the build features.
pub fn default_proof_type() -> ProofType {
    DEFAULT_CONFIG.proof_type
}
