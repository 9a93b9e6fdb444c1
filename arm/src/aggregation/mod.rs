use risc0_zkvm::Digest;
use serde::{Deserialize, Serialize};

use crate::{
    aggregation::{
        btree::BtreeAggregation,
        pcd::{transaction_transcript, PcdAggregation, PcdMessage, StepInstance},
        sequential::SequentialAggregation,
    },
    error::{ArmError, VerificationStage},
    proving_system::{default_backend, Proof, ProvingBackend},
    transaction::Transaction,
};

#[cfg(feature = "aggregation")]
use crate::{
    aggregation::pcd::transaction_steps,
    proving_system::{default_proof_type, ProofType},
    transaction::ProofState,
};
#[cfg(feature = "aggregation")]
use tracing::info;

pub mod batch;
pub mod btree;
pub mod constants;
pub mod pcd;
pub mod sequential;

/// Supported strategies to aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationStrategy {
    /// Every proof is verified in a single proving run.
    Batch,
    /// Proofs are folded one at a time into a running hash.
    Sequential,
    /// Proofs are folded pairwise along a balanced tree.
    BTree,
}

/// The single proof replacing the compliance and logic proofs of an
/// aggregated transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationProof {
    pub strategy: AggregationStrategy,
    pub proof: Proof,
}

impl AggregationProof {
    pub fn to_bytes(&self) -> Result<Vec<u8>, ArmError> {
        bincode::serialize(self).map_err(|_| ArmError::SerializationError)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArmError> {
        bincode::deserialize(bytes).map_err(|_| ArmError::DeserializationError)
    }
}

/// The public instance an aggregation proof attests to, recomputed from the
/// instances the transaction still carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregationInstance {
    Batch(Vec<StepInstance>),
    Sequential(PcdMessage),
    BTree(PcdMessage),
}

impl AggregationInstance {
    pub fn from_transcript(
        strategy: AggregationStrategy,
        transcript: Vec<StepInstance>,
    ) -> Result<Self, ArmError> {
        if transcript.is_empty() {
            return Err(ArmError::EmptyAggregationSet);
        }
        Ok(match strategy {
            AggregationStrategy::Batch => AggregationInstance::Batch(transcript),
            AggregationStrategy::Sequential => AggregationInstance::Sequential(
                SequentialAggregation::aggregate_transcript(&transcript)?,
            ),
            AggregationStrategy::BTree => {
                AggregationInstance::BTree(BtreeAggregation::aggregate_transcript(&transcript)?)
            }
        })
    }

    /// The image id of the program whose proof attests to the instance.
    pub fn verifying_key(&self) -> Digest {
        match self {
            AggregationInstance::Batch(_) => *constants::BATCH_AGGREGATION_VK,
            AggregationInstance::Sequential(_) => SequentialAggregation::verifying_key(),
            AggregationInstance::BTree(message) => message.key,
        }
    }

    pub fn journal(&self) -> Result<Vec<u8>, ArmError> {
        match self {
            AggregationInstance::Batch(instances) => batch::batch_instance(instances),
            AggregationInstance::Sequential(message) | AggregationInstance::BTree(message) => {
                message.journal()
            }
        }
    }
}

impl Transaction {
    /// Recomputes the instance of an aggregation with `strategy` from the
    /// public data of the transaction.
    pub fn aggregation_instance(
        &self,
        strategy: AggregationStrategy,
    ) -> Result<AggregationInstance, ArmError> {
        AggregationInstance::from_transcript(strategy, transaction_transcript(self)?)
    }

    pub fn verify_aggregation(&self) -> Result<(), ArmError> {
        self.verify_aggregation_with(default_backend())
    }

    /// Verifies the aggregation proof against the instance recomputed from
    /// the transaction.
    pub fn verify_aggregation_with(&self, backend: &dyn ProvingBackend) -> Result<(), ArmError> {
        let aggregation = self
            .get_aggregation_proof()
            .ok_or(ArmError::MissingAggregationProof)?;
        let instance = self
            .aggregation_instance(aggregation.strategy)
            .map_err(ArmError::at_stage(VerificationStage::AggregationProof))?;
        let journal = instance.journal()?;
        backend
            .verify(&instance.verifying_key(), &journal, &aggregation.proof)
            .map_err(ArmError::at_stage(VerificationStage::AggregationProof))
    }

    #[cfg(feature = "aggregation")]
    pub fn aggregate(&mut self, strategy: AggregationStrategy) -> Result<(), ArmError> {
        self.aggregate_with(default_backend(), strategy, default_proof_type())
    }

    /// Replaces every compliance and logic proof of the transaction with a
    /// single proof of `proof_type`. The transaction is left untouched on
    /// failure.
    #[cfg(feature = "aggregation")]
    pub fn aggregate_with(
        &mut self,
        backend: &dyn ProvingBackend,
        strategy: AggregationStrategy,
        proof_type: ProofType,
    ) -> Result<(), ArmError> {
        if self.is_aggregated() {
            return Err(ArmError::AlreadyAggregated);
        }

        let steps = transaction_steps(self)?;
        if steps.is_empty() {
            return Err(ArmError::EmptyAggregationSet);
        }
        if let Some(step) = steps.iter().find(|step| !step.proof.proof_type.is_recursive()) {
            return Err(ArmError::IncompatibleProofType(step.proof.proof_type));
        }

        let proof = match strategy {
            AggregationStrategy::Batch => {
                batch::prove_transcript_aggregation(backend, &steps, proof_type)?
            }
            AggregationStrategy::Sequential => {
                SequentialAggregation::prove_transcript_aggregation(backend, &steps, proof_type)?
            }
            AggregationStrategy::BTree => {
                BtreeAggregation::prove_transcript_aggregation(backend, &steps, proof_type)?
            }
        };

        self.unset_proofs();
        self.proof_state = ProofState::Aggregated(AggregationProof { strategy, proof });
        info!(?strategy, steps = steps.len(), ?proof_type, "aggregated transaction proofs");
        Ok(())
    }
}
