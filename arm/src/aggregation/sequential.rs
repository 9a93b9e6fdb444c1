//! Incremental aggregation: step instances are folded one at a time into a
//! running hash, each fold proving the previous one.

use risc0_zkvm::Digest;

use super::{
    constants::SEQUENTIAL_AGGREGATION_VK,
    pcd::{PcdAggregation, PcdMessage, StepInstance},
};
use crate::error::ArmError;

#[cfg(feature = "aggregation")]
use super::pcd::{prove_step, StepProof};
#[cfg(feature = "aggregation")]
use crate::proving_system::{Proof, ProofType, ProvingBackend};

pub struct SequentialAggregation;

impl PcdAggregation for SequentialAggregation {
    const INPUT_ARITY: usize = 1;

    const NAME: &'static str = "sequential-aggregation";

    fn verifying_key() -> Digest {
        *SEQUENTIAL_AGGREGATION_VK
    }

    fn aggregate_step(
        input_aggregations: &[PcdMessage],
        step_instance: Option<&StepInstance>,
    ) -> Result<PcdMessage, ArmError> {
        let step = step_instance.ok_or_else(|| {
            ArmError::ProveFailed("sequential aggregation step without instance".into())
        })?;
        match input_aggregations {
            [] => Ok(PcdMessage::base(Self::verifying_key(), step)),
            [prev] => Ok(prev.chain(Self::verifying_key(), step)),
            _ => Err(ArmError::ProveFailed(
                "sequential aggregation folds a single input".into(),
            )),
        }
    }
}

impl SequentialAggregation {
    /// Aggregate instances in a transcript.
    pub fn aggregate_transcript(instances: &[StepInstance]) -> Result<PcdMessage, ArmError> {
        let (first, rest) = instances
            .split_first()
            .ok_or(ArmError::EmptyAggregationSet)?;
        let mut aggregation = Self::aggregate_step(&[], Some(first))?;
        for instance in rest {
            aggregation = Self::aggregate_step(&[aggregation], Some(instance))?;
        }
        Ok(aggregation)
    }

    /// Proves correctness of an aggregation transcript. Intermediate steps are
    /// succinct, the last one is of `proof_type`.
    #[cfg(feature = "aggregation")]
    pub fn prove_transcript_aggregation(
        backend: &dyn ProvingBackend,
        steps: &[StepProof],
        proof_type: ProofType,
    ) -> Result<Proof, ArmError> {
        let last = steps.len().checked_sub(1).ok_or(ArmError::EmptyAggregationSet)?;

        let mut aggregation: Option<(PcdMessage, Proof)> = None;
        for (index, step) in steps.iter().enumerate() {
            let step_type = if index == last {
                proof_type
            } else {
                ProofType::Succinct
            };
            let inputs: Vec<(PcdMessage, Proof)> = aggregation.take().into_iter().collect();
            aggregation = Some(prove_step::<Self>(backend, &inputs, Some(step), step_type)?);
        }

        aggregation
            .map(|(_, proof)| proof)
            .ok_or(ArmError::EmptyAggregationSet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{chain_step, commit_step, hash_bytes};

    #[test]
    fn test_transcript_aggregation() {
        let steps: Vec<StepInstance> = (0u32..3)
            .map(|i| StepInstance {
                program: hash_bytes(&i.to_le_bytes()),
                output: vec![i; 4],
            })
            .collect();

        let message = SequentialAggregation::aggregate_transcript(&steps).unwrap();
        let mut expected = commit_step(&steps[0].program, &steps[0].output);
        for step in &steps[1..] {
            expected = chain_step(&expected, &step.program, &step.output);
        }
        assert_eq!(message.running_hash, expected);
        assert_eq!(message.step_count, 3);
        assert_eq!(message.key, *SEQUENTIAL_AGGREGATION_VK);

        assert_eq!(
            SequentialAggregation::aggregate_transcript(&[]),
            Err(ArmError::EmptyAggregationSet)
        );
    }
}
