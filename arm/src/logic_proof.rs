use crate::{
    constants::PADDING_LOGIC_VK,
    error::{ArmError, VerificationStage},
    logic_instance::LogicInstance,
    nullifier_key::{NullifierKey, NullifierKeyCommitment},
    program::{CircuitProgram, Program, ProgramRegistry},
    proving_system::{
        default_backend, default_proof_type, Proof, ProofType, ProverEnv, ProvingBackend,
    },
    resource::Resource,
    resource_logic::{LogicCircuit, TrivialLogicWitness},
    test_logic::TestLogic,
    utils::journal_to_instance,
};
use rand::Rng;
use risc0_zkvm::Digest;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Proves a resource logic whose circuit is known at compile time.
pub trait LogicProver {
    type Witness: LogicCircuit;

    fn name() -> &'static str {
        "logic"
    }

    fn verifying_key() -> Digest;

    fn witness(&self) -> &Self::Witness;

    fn program() -> CircuitProgram<Self::Witness> {
        CircuitProgram::new(Self::name(), Self::verifying_key())
    }

    fn prove(&self) -> Result<LogicProof, ArmError> {
        self.prove_with(default_backend(), default_proof_type())
    }

    fn prove_with(
        &self,
        backend: &dyn ProvingBackend,
        proof_type: ProofType,
    ) -> Result<LogicProof, ArmError> {
        self.witness()
            .constrain()
            .map_err(|err| ArmError::ProveFailed(format!("{}: {}", Self::name(), err)))?;
        LogicProof::prove_program(backend, &Self::program(), self.witness(), proof_type)
    }
}

/// A resource logic proof and its public instance.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct LogicProof {
    /// `None` once the proof has been folded into an aggregation.
    pub proof: Option<Proof>,
    pub instance: Vec<u8>,
    pub verifying_key: Digest,
}

impl LogicProof {
    /// Proves `witness` against an arbitrary program.
    pub fn prove_program<W: Serialize>(
        backend: &dyn ProvingBackend,
        program: &dyn Program,
        witness: &W,
        proof_type: ProofType,
    ) -> Result<Self, ArmError> {
        let mut env = ProverEnv::new();
        env.write(witness)?;
        let (proof, instance) = backend.prove(program, env, proof_type)?;
        Ok(LogicProof {
            proof: Some(proof),
            instance,
            verifying_key: program.image_id(),
        })
    }

    /// Proves `witness` with the program registered under `logic_ref`.
    pub fn prove_registered<W: Serialize>(
        registry: &ProgramRegistry,
        backend: &dyn ProvingBackend,
        logic_ref: &Digest,
        witness: &W,
        proof_type: ProofType,
    ) -> Result<Self, ArmError> {
        let program = registry.get(logic_ref)?;
        Self::prove_program(backend, program.as_ref(), witness, proof_type)
    }

    pub fn verify(&self) -> Result<(), ArmError> {
        self.verify_with(default_backend())
    }

    pub fn verify_with(&self, backend: &dyn ProvingBackend) -> Result<(), ArmError> {
        let proof = self
            .proof
            .as_ref()
            .ok_or(ArmError::MissingField("logic proof"))
            .map_err(ArmError::at_stage(VerificationStage::LogicProofs))?;
        backend
            .verify(&self.verifying_key, &self.instance, proof)
            .map_err(ArmError::at_stage(VerificationStage::LogicProofs))
    }

    pub fn get_instance(&self) -> Result<LogicInstance, ArmError> {
        journal_to_instance(&self.instance)
    }

    pub(crate) fn unset_proof(&mut self) {
        self.proof = None;
    }
}

/// Registry holding the logics shipped with this crate.
pub fn builtin_registry() -> ProgramRegistry {
    let mut registry = ProgramRegistry::new();
    registry
        .register(Arc::new(PaddingResourceLogic::program()))
        .register(Arc::new(TestLogic::program()));
    registry
}

#[derive(Clone, Default, Deserialize, Serialize)]
pub struct PaddingResourceLogic {
    witness: TrivialLogicWitness,
}

impl LogicProver for PaddingResourceLogic {
    type Witness = TrivialLogicWitness;

    fn name() -> &'static str {
        "padding-logic"
    }

    fn verifying_key() -> Digest {
        *PADDING_LOGIC_VK
    }

    fn witness(&self) -> &Self::Witness {
        &self.witness
    }
}

impl PaddingResourceLogic {
    pub fn new(resource: Resource, root: Digest, nf_key: NullifierKey, is_consumed: bool) -> Self {
        PaddingResourceLogic {
            witness: TrivialLogicWitness::new(resource, root, nf_key, is_consumed),
        }
    }

    pub fn create_padding_resource(nk_commitment: NullifierKeyCommitment) -> Resource {
        let mut rng = rand::thread_rng();
        Resource {
            logic_ref: Self::verifying_key(),
            label_ref: Digest::default(),
            quantity: 0,
            value_ref: Digest::default(),
            is_ephemeral: true,
            nonce: rng.gen(),
            nk_commitment,
            rand_seed: rng.gen(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proving_system::DevProver;

    #[test]
    fn test_padding_logic_prover() {
        let backend = DevProver::default();
        let (nf_key, nk_commitment) = NullifierKey::random_pair();
        let resource = PaddingResourceLogic::create_padding_resource(nk_commitment);
        let logic = PaddingResourceLogic::new(resource, Digest::default(), nf_key, false);

        let proof = logic.prove_with(&backend, ProofType::Succinct).unwrap();
        proof.verify_with(&backend).unwrap();
        assert_eq!(proof.get_instance().unwrap().tag, resource.commitment());
    }

    #[test]
    fn test_wrong_verifying_key_fails() {
        let backend = DevProver::default();
        let logic = PaddingResourceLogic::new(
            PaddingResourceLogic::create_padding_resource(NullifierKey::default().commit()),
            Digest::default(),
            NullifierKey::default(),
            true,
        );
        let mut proof = logic.prove_with(&backend, ProofType::Succinct).unwrap();
        proof.verifying_key = Digest::from_bytes([66u8; 32]);

        let err = proof.verify_with(&backend).unwrap_err();
        assert_eq!(err.stage(), Some(VerificationStage::LogicProofs));
    }

    #[test]
    fn test_registered_logic() {
        let backend = DevProver::default();
        let registry = builtin_registry();
        let (nf_key, nk_commitment) = NullifierKey::random_pair();
        let resource = PaddingResourceLogic::create_padding_resource(nk_commitment);
        let witness = TrivialLogicWitness::new(resource, Digest::default(), nf_key, false);

        let proof = LogicProof::prove_registered(
            &registry,
            &backend,
            &resource.logic_ref,
            &witness,
            ProofType::Succinct,
        )
        .unwrap();
        proof.verify_with(&backend).unwrap();

        let unknown = Digest::from_bytes([1u8; 32]);
        let err = LogicProof::prove_registered(
            &registry,
            &backend,
            &unknown,
            &witness,
            ProofType::Succinct,
        )
        .unwrap_err();
        assert_eq!(err, ArmError::UnknownProgram(unknown));
    }
}
