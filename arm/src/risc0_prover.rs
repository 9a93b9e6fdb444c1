//! The zkVM backend: programs are proved from their ELF with the local
//! (or Bonsai/CUDA, through features) RISC Zero prover.

use crate::{
    error::ArmError,
    program::Program,
    proving_system::{Proof, ProofType, ProverEnv, ProvingBackend},
};
use risc0_zkvm::{
    default_prover, Digest, ExecutorEnv, InnerReceipt, ProverOpts, Receipt, VerifierContext,
};
use tracing::debug;

pub struct Risc0Prover;

impl Risc0Prover {
    fn prover_opts(proof_type: ProofType) -> ProverOpts {
        match proof_type {
            ProofType::Composite => ProverOpts::composite(),
            ProofType::Succinct => ProverOpts::succinct(),
            ProofType::Groth16 => ProverOpts::groth16(),
        }
    }

    fn receipt(journal: &[u8], proof: &Proof) -> Result<Receipt, ArmError> {
        let inner: InnerReceipt = bincode::deserialize(&proof.seal)
            .map_err(|_| ArmError::InnerReceiptDeserializationError)?;
        Ok(Receipt::new(inner, journal.to_vec()))
    }
}

impl ProvingBackend for Risc0Prover {
    fn name(&self) -> &'static str {
        "risc0"
    }

    fn prove(
        &self,
        program: &dyn Program,
        env: ProverEnv,
        proof_type: ProofType,
    ) -> Result<(Proof, Vec<u8>), ArmError> {
        let elf = program
            .elf()
            .ok_or_else(|| ArmError::MissingProvingKey(program.image_id()))?;
        debug!(program = program.name(), ?proof_type, "proving with the zkVM");

        let mut builder = ExecutorEnv::builder();
        for assumption in env.assumptions {
            if !assumption.proof.proof_type.is_recursive() {
                return Err(ArmError::IncompatibleProofType(assumption.proof.proof_type));
            }
            builder.add_assumption(Self::receipt(&assumption.journal, &assumption.proof)?);
        }
        for frame in env.input.iter() {
            builder.write_slice(frame.as_slice());
        }
        let executor_env = builder.build().map_err(|_| ArmError::BuildProverEnvFailed)?;

        let receipt = default_prover()
            .prove_with_ctx(
                executor_env,
                &VerifierContext::default(),
                elf,
                &Self::prover_opts(proof_type),
            )
            .map_err(|err| ArmError::ProveFailed(err.to_string()))?
            .receipt;

        let seal = bincode::serialize(&receipt.inner).map_err(|_| ArmError::SerializationError)?;
        Ok((Proof { proof_type, seal }, receipt.journal.bytes))
    }

    fn verify(&self, image_id: &Digest, journal: &[u8], proof: &Proof) -> Result<(), ArmError> {
        Self::receipt(journal, proof)?
            .verify(*image_id)
            .map_err(|err| ArmError::InvalidProof(err.to_string()))
    }
}
