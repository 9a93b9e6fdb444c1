//! Aggregation of base proofs into batch proofs.

use risc0_zkvm::Digest;

use crate::aggregation::constants::BATCH_AGGREGATION_VK;
use crate::aggregation::pcd::StepInstance;
use crate::error::ArmError;
use crate::program::{GuestEnv, Program};
use crate::utils::to_journal;

#[cfg(feature = "aggregation")]
use crate::{
    aggregation::pcd::StepProof,
    proving_system::{Proof, ProofType, ProverEnv, ProvingBackend},
};

/// Verifies every step instance of a transcript in a single run and commits
/// the transcript.
pub struct BatchAggregationProgram;

impl Program for BatchAggregationProgram {
    fn name(&self) -> &str {
        "batch-aggregation"
    }

    fn image_id(&self) -> Digest {
        *BATCH_AGGREGATION_VK
    }

    fn execute(&self, env: &mut GuestEnv) -> Result<(), ArmError> {
        let instances: Vec<StepInstance> = env.read()?;
        if instances.is_empty() {
            return Err(ArmError::EmptyAggregationSet);
        }
        for instance in &instances {
            env.verify(&instance.program, instance.journal())?;
        }
        env.commit(&instances)
    }
}

/// The journal of a batch proof over `instances`.
pub fn batch_instance(instances: &[StepInstance]) -> Result<Vec<u8>, ArmError> {
    if instances.is_empty() {
        return Err(ArmError::EmptyAggregationSet);
    }
    to_journal(&instances)
}

/// Proves the aggregation of a transcript's base proofs into a batch proof.
#[cfg(feature = "aggregation")]
pub fn prove_transcript_aggregation(
    backend: &dyn ProvingBackend,
    steps: &[StepProof],
    proof_type: ProofType,
) -> Result<Proof, ArmError> {
    let mut env = ProverEnv::new();
    for step in steps {
        env.add_assumption(step.assumption());
    }
    let instances: Vec<StepInstance> = steps.iter().map(|step| step.instance.clone()).collect();
    env.write(&instances)?;

    let (proof, _) = backend.prove(&BatchAggregationProgram, env, proof_type)?;
    Ok(proof)
}

#[cfg(all(test, feature = "aggregation"))]
mod tests {
    use super::*;
    use crate::{
        hash::hash_bytes,
        proving_system::{DevProver, ProofType},
    };

    #[test]
    fn test_batch_rejects_unproved_instance() {
        let backend = DevProver::default();
        let instance = StepInstance {
            program: hash_bytes(b"program"),
            output: vec![1, 2],
        };
        let forged = StepProof {
            instance,
            proof: Proof {
                proof_type: ProofType::Succinct,
                seal: vec![0u8; 32],
            },
        };
        let err = prove_transcript_aggregation(&backend, &[forged], ProofType::Succinct);
        assert!(matches!(err, Err(ArmError::ProveFailed(_))));
    }
}
