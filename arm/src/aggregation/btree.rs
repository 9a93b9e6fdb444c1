//! Tree-shaped aggregation. Leaves are sequential base steps, internal nodes
//! fold two child aggregations. Levels pair nodes left to right and carry an
//! odd node up unchanged.

use risc0_zkvm::Digest;

use super::{
    constants::{BTREE_AGGREGATION_VK, SEQUENTIAL_AGGREGATION_VK},
    pcd::{PcdAggregation, PcdMessage, StepInstance},
    sequential::SequentialAggregation,
};
use crate::error::ArmError;

#[cfg(feature = "aggregation")]
use super::pcd::{prove_step, StepProof};
#[cfg(feature = "aggregation")]
use crate::proving_system::{Proof, ProofType, ProvingBackend};
#[cfg(feature = "aggregation")]
use rayon::prelude::*;

pub struct BtreeAggregation;

impl PcdAggregation for BtreeAggregation {
    const INPUT_ARITY: usize = 2;

    const NAME: &'static str = "btree-aggregation";

    fn verifying_key() -> Digest {
        *BTREE_AGGREGATION_VK
    }

    // Children are either leaves or internal nodes.
    fn accepts_input_key(key: &Digest) -> bool {
        *key == *SEQUENTIAL_AGGREGATION_VK || *key == *BTREE_AGGREGATION_VK
    }

    fn aggregate_step(
        input_aggregations: &[PcdMessage],
        step_instance: Option<&StepInstance>,
    ) -> Result<PcdMessage, ArmError> {
        match (input_aggregations, step_instance) {
            ([left, right], None) => Ok(PcdMessage::merge(Self::verifying_key(), left, right)),
            _ => Err(ArmError::ProveFailed(
                "tree aggregation nodes fold exactly two children".into(),
            )),
        }
    }
}

/// Reduces one level of the tree.
fn reduce_level<T, F>(level: Vec<T>, mut merge: F) -> Result<Vec<T>, ArmError>
where
    F: FnMut(&T, &T) -> Result<T, ArmError>,
{
    let mut next = Vec::with_capacity(level.len().div_ceil(2));
    let mut nodes = level.into_iter();
    while let Some(left) = nodes.next() {
        match nodes.next() {
            Some(right) => next.push(merge(&left, &right)?),
            None => next.push(left),
        }
    }
    Ok(next)
}

impl BtreeAggregation {
    /// The message at the root of the tree over `instances`.
    pub fn aggregate_transcript(instances: &[StepInstance]) -> Result<PcdMessage, ArmError> {
        let mut level = instances
            .iter()
            .map(|instance| SequentialAggregation::aggregate_step(&[], Some(instance)))
            .collect::<Result<Vec<_>, _>>()?;
        while level.len() > 1 {
            level = reduce_level(level, |left, right| {
                Self::aggregate_step(&[left.clone(), right.clone()], None)
            })?;
        }
        level.pop().ok_or(ArmError::EmptyAggregationSet)
    }

    /// Proves the tree over `steps`. Sibling subtrees are proved in parallel;
    /// only the root proof is of `proof_type`.
    #[cfg(feature = "aggregation")]
    pub fn prove_transcript_aggregation(
        backend: &dyn ProvingBackend,
        steps: &[StepProof],
        proof_type: ProofType,
    ) -> Result<Proof, ArmError> {
        if steps.is_empty() {
            return Err(ArmError::EmptyAggregationSet);
        }
        let leaf_type = if steps.len() == 1 {
            proof_type
        } else {
            ProofType::Succinct
        };

        let mut level: Vec<(PcdMessage, Proof)> = steps
            .par_iter()
            .map(|step| prove_step::<SequentialAggregation>(backend, &[], Some(step), leaf_type))
            .collect::<Result<_, _>>()?;

        while level.len() > 1 {
            let node_type = if level.len() == 2 {
                proof_type
            } else {
                ProofType::Succinct
            };
            level = level
                .par_chunks(2)
                .map(|pair| match pair {
                    [left, right] => prove_step::<Self>(
                        backend,
                        &[left.clone(), right.clone()],
                        None,
                        node_type,
                    ),
                    _ => Ok(pair[0].clone()),
                })
                .collect::<Result<_, _>>()?;
        }

        level
            .pop()
            .map(|(_, proof)| proof)
            .ok_or(ArmError::EmptyAggregationSet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{commit_step, hash_bytes, merge_running_hashes};

    fn steps(n: u32) -> Vec<StepInstance> {
        (0..n)
            .map(|i| StepInstance {
                program: hash_bytes(&i.to_le_bytes()),
                output: vec![i],
            })
            .collect()
    }

    #[test]
    fn test_odd_node_is_carried_up() {
        let steps = steps(3);
        let leaves: Vec<Digest> = steps
            .iter()
            .map(|step| commit_step(&step.program, &step.output))
            .collect();

        let root = BtreeAggregation::aggregate_transcript(&steps).unwrap();
        let left = merge_running_hashes(&leaves[0], &leaves[1]);
        let expected = merge_running_hashes(&left, &leaves[2]);
        assert_eq!(root.running_hash, expected);
        assert_eq!(root.step_count, 3);
        assert_eq!(root.key, *BTREE_AGGREGATION_VK);
    }

    #[test]
    fn test_single_leaf_is_the_root() {
        let root = BtreeAggregation::aggregate_transcript(&steps(1)).unwrap();
        assert_eq!(root.key, *SEQUENTIAL_AGGREGATION_VK);
        assert_eq!(root.step_count, 1);
    }
}
