use crate::{
    compliance::{ComplianceInstance, ComplianceProgram, ComplianceWitness},
    constants::COMPLIANCE_VK,
    error::{ArmError, VerificationStage},
    proving_system::{
        default_backend, default_proof_type, Proof, ProofType, ProverEnv, ProvingBackend,
    },
    utils::journal_to_instance,
};
use k256::ProjectivePoint;
use risc0_zkvm::Digest;
use serde::{Deserialize, Serialize};

/// A proof that one consumed resource is validly paired with one created
/// resource, with its public instance (the journal of the compliance program).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ComplianceUnit {
    /// `None` once the proof has been folded into an aggregation.
    pub proof: Option<Proof>,
    pub instance: Vec<u8>,
}

impl ComplianceUnit {
    pub fn create(witness: &ComplianceWitness) -> Result<Self, ArmError> {
        Self::create_with(default_backend(), witness, default_proof_type())
    }

    /// Proves the witness with `backend`. The constraints are checked before
    /// the backend is invoked.
    pub fn create_with(
        backend: &dyn ProvingBackend,
        witness: &ComplianceWitness,
        proof_type: ProofType,
    ) -> Result<Self, ArmError> {
        witness.constrain().map_err(|err| {
            ArmError::ProveFailed(format!("inconsistent compliance witness: {}", err))
        })?;

        let mut env = ProverEnv::new();
        env.write(witness)?;
        let (proof, instance) = backend.prove(&ComplianceProgram, env, proof_type)?;
        Ok(ComplianceUnit {
            proof: Some(proof),
            instance,
        })
    }

    pub fn verifying_key() -> Digest {
        *COMPLIANCE_VK
    }

    pub fn verify(&self) -> Result<(), ArmError> {
        self.verify_with(default_backend())
    }

    pub fn verify_with(&self, backend: &dyn ProvingBackend) -> Result<(), ArmError> {
        let proof = self
            .proof
            .as_ref()
            .ok_or(ArmError::MissingField("compliance proof"))
            .map_err(ArmError::at_stage(VerificationStage::ComplianceProofs))?;
        backend
            .verify(&Self::verifying_key(), &self.instance, proof)
            .map_err(ArmError::at_stage(VerificationStage::ComplianceProofs))
    }

    pub fn get_instance(&self) -> Result<ComplianceInstance, ArmError> {
        journal_to_instance(&self.instance)
    }

    pub fn delta(&self) -> Result<ProjectivePoint, ArmError> {
        self.get_instance()?.delta_projective()
    }

    pub(crate) fn unset_proof(&mut self) {
        self.proof = None;
    }
}
