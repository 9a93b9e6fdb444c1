use crate::{
    compliance_unit::ComplianceUnit,
    constants::COMPLIANCE_VK,
    error::ArmError,
    hash::{chain_step, commit_step, merge_running_hashes},
    logic_proof::LogicProof,
    program::{GuestEnv, Program},
    proving_system::{Assumption, Proof, ProofType, ProverEnv, ProvingBackend},
    transaction::Transaction,
    utils::{bytes_to_words, journal_to_instance, to_journal, words_to_bytes},
};
use risc0_zkvm::Digest;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

/// A trait to aggregate proofs across nodes.
///
/// In PCD terminology the [StepInstance] is the local data of a node. The
/// local data and the input [PcdMessage]s form the witness of the
/// aggregation program.
pub trait PcdAggregation: Send + Sync + 'static {
    /// Number of input aggregations (and proofs to verify) of a non-base step.
    const INPUT_ARITY: usize;

    const NAME: &'static str;

    /// The image id of the aggregation program.
    fn verifying_key() -> Digest;

    /// Whether an input message committed under `key` may be folded in.
    fn accepts_input_key(key: &Digest) -> bool {
        *key == Self::verifying_key()
    }

    /// Computes the output message from the input messages and the local data.
    fn aggregate_step(
        input_aggregations: &[PcdMessage],
        step_instance: Option<&StepInstance>,
    ) -> Result<PcdMessage, ArmError>;
}

/// The input and output of an aggregation node (step).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PcdMessage {
    /// The aggregation program that produced the message.
    pub key: Digest,
    /// A binding commitment to every step instance the message attests to.
    pub running_hash: Digest,
    pub step_count: u32,
}

impl PcdMessage {
    /// Starts a chain from a single step instance.
    pub fn base(key: Digest, step: &StepInstance) -> Self {
        PcdMessage {
            key,
            running_hash: commit_step(&step.program, &step.output),
            step_count: 1,
        }
    }

    /// Folds one more step instance into the chain.
    pub fn chain(&self, key: Digest, step: &StepInstance) -> Self {
        PcdMessage {
            key,
            running_hash: chain_step(&self.running_hash, &step.program, &step.output),
            step_count: self.step_count + 1,
        }
    }

    pub fn merge(key: Digest, left: &PcdMessage, right: &PcdMessage) -> Self {
        PcdMessage {
            key,
            running_hash: merge_running_hashes(&left.running_hash, &right.running_hash),
            step_count: left.step_count + right.step_count,
        }
    }

    pub fn journal(&self) -> Result<Vec<u8>, ArmError> {
        to_journal(self)
    }
}

/// The output and program to verify at each aggregation node (step).
/// Thus, an instance of the 'universal relation' that a zkVM realize.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepInstance {
    /// The image id (aka verifying key) of the program to verify.
    pub program: Digest,
    /// The words of the program's journal.
    pub output: Vec<u32>,
}

impl StepInstance {
    pub fn new(program: Digest, journal: &[u8]) -> Result<Self, ArmError> {
        if journal.len() % 4 != 0 {
            return Err(ArmError::JournalDecodingError);
        }
        Ok(StepInstance {
            program,
            output: bytes_to_words(journal),
        })
    }

    pub fn journal(&self) -> &[u8] {
        words_to_bytes(&self.output)
    }
}

impl TryFrom<&ComplianceUnit> for StepInstance {
    type Error = ArmError;

    fn try_from(unit: &ComplianceUnit) -> Result<Self, Self::Error> {
        StepInstance::new(*COMPLIANCE_VK, &unit.instance)
    }
}

impl TryFrom<&LogicProof> for StepInstance {
    type Error = ArmError;

    fn try_from(proof: &LogicProof) -> Result<Self, Self::Error> {
        StepInstance::new(proof.verifying_key, &proof.instance)
    }
}

/// A step instance and the proof attesting to it.
#[derive(Clone, Debug)]
pub struct StepProof {
    pub instance: StepInstance,
    pub proof: Proof,
}

impl StepProof {
    #[cfg(feature = "aggregation")]
    pub(crate) fn assumption(&self) -> Assumption {
        Assumption {
            image_id: self.instance.program,
            journal: self.instance.journal().to_vec(),
            proof: self.proof.clone(),
        }
    }
}

/// Derives the transcript induced by the transaction: for every action, its
/// compliance units followed by its logic proofs.
pub fn transaction_transcript(tx: &Transaction) -> Result<Vec<StepInstance>, ArmError> {
    let mut instances = Vec::new();
    for action in &tx.actions {
        for unit in action.get_compliance_units() {
            instances.push(unit.try_into()?);
        }
        for logic_proof in action.get_logic_proofs() {
            instances.push(logic_proof.try_into()?);
        }
    }
    Ok(instances)
}

/// The transcript together with its proofs. Fails if any proof is missing.
#[cfg(feature = "aggregation")]
pub(crate) fn transaction_steps(tx: &Transaction) -> Result<Vec<StepProof>, ArmError> {
    let missing = || ArmError::ProveFailed("cannot aggregate: missing individual proof".into());

    let mut steps = Vec::new();
    for action in &tx.actions {
        for unit in action.get_compliance_units() {
            steps.push(StepProof {
                instance: unit.try_into()?,
                proof: unit.proof.clone().ok_or_else(missing)?,
            });
        }
        for logic_proof in action.get_logic_proofs() {
            steps.push(StepProof {
                instance: logic_proof.try_into()?,
                proof: logic_proof.proof.clone().ok_or_else(missing)?,
            });
        }
    }
    Ok(steps)
}

/// The aggregation program of a [PcdAggregation]: verifies the input
/// messages and the step instance, then commits the folded message.
pub struct PcdProgram<A>(PhantomData<fn() -> A>);

impl<A> PcdProgram<A> {
    pub fn new() -> Self {
        PcdProgram(PhantomData)
    }
}

impl<A> Default for PcdProgram<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: PcdAggregation> Program for PcdProgram<A> {
    fn name(&self) -> &str {
        A::NAME
    }

    fn image_id(&self) -> Digest {
        A::verifying_key()
    }

    fn execute(&self, env: &mut GuestEnv) -> Result<(), ArmError> {
        let input_aggregations: Vec<PcdMessage> = env.read()?;
        let step_instance: Option<StepInstance> = env.read()?;

        if !input_aggregations.is_empty() && input_aggregations.len() != A::INPUT_ARITY {
            return Err(ArmError::ProveFailed(format!(
                "{} expects {} input aggregations, got {}",
                A::NAME,
                A::INPUT_ARITY,
                input_aggregations.len()
            )));
        }

        for aggregation in &input_aggregations {
            if !A::accepts_input_key(&aggregation.key) {
                return Err(ArmError::ProveFailed(format!(
                    "{} cannot fold messages of program {}",
                    A::NAME,
                    aggregation.key
                )));
            }
            env.verify(&aggregation.key, &aggregation.journal()?)?;
        }
        if let Some(step) = &step_instance {
            env.verify(&step.program, step.journal())?;
        }

        let output = A::aggregate_step(&input_aggregations, step_instance.as_ref())?;
        env.commit(&output)
    }
}

/// Proves one aggregation step: `inputs` are the messages to fold with the
/// proofs attesting to them.
#[cfg(feature = "aggregation")]
pub(crate) fn prove_step<A: PcdAggregation>(
    backend: &dyn ProvingBackend,
    inputs: &[(PcdMessage, Proof)],
    step: Option<&StepProof>,
    proof_type: ProofType,
) -> Result<(PcdMessage, Proof), ArmError> {
    let mut env = ProverEnv::new();
    for (message, proof) in inputs {
        env.add_assumption(Assumption {
            image_id: message.key,
            journal: message.journal()?,
            proof: proof.clone(),
        });
    }
    if let Some(step) = step {
        env.add_assumption(step.assumption());
    }

    // The guest reads in this order.
    let messages: Vec<PcdMessage> = inputs.iter().map(|(message, _)| message.clone()).collect();
    env.write(&messages)?
        .write(&step.map(|step| step.instance.clone()))?;

    let (proof, journal) = backend.prove(&PcdProgram::<A>::new(), env, proof_type)?;
    Ok((journal_to_instance(&journal)?, proof))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::hash_bytes;

    fn step(tag: &[u8]) -> StepInstance {
        StepInstance {
            program: hash_bytes(tag),
            output: vec![1, 2, 3],
        }
    }

    #[test]
    fn test_chain_is_order_sensitive() {
        let key = hash_bytes(b"key");
        let (a, b) = (step(b"a"), step(b"b"));
        let ab = PcdMessage::base(key, &a).chain(key, &b);
        let ba = PcdMessage::base(key, &b).chain(key, &a);
        assert_ne!(ab.running_hash, ba.running_hash);
        assert_eq!(ab.step_count, 2);
    }

    #[test]
    fn test_message_journal_decodes() {
        let message = PcdMessage::base(hash_bytes(b"key"), &step(b"a"));
        let decoded: PcdMessage = journal_to_instance(&message.journal().unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_step_instance_rejects_unaligned_journal() {
        assert_eq!(
            StepInstance::new(Digest::default(), &[1, 2, 3]),
            Err(ArmError::JournalDecodingError)
        );
    }
}
