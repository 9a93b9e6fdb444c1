use crate::{
    action::Action,
    aggregation::AggregationProof,
    commitment_tree::CommitmentTreeView,
    delta_proof::{DeltaInstance, DeltaProof, DeltaWitness, ExpectedBalance},
    error::ArmError,
    proving_system::{default_backend, ProvingBackend},
};
use k256::ProjectivePoint;
use risc0_zkvm::Digest;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct Transaction {
    pub actions: Vec<Action>,
    // delta verification is a deterministic process, so we don't need a
    // separate delta_vk here.
    pub delta_proof: Delta,
    /// Declared imbalances, for transactions minting or burning resources.
    pub expected_balance: Option<Vec<ExpectedBalance>>,
    pub proof_state: ProofState,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub enum Delta {
    Witness(DeltaWitness),
    Proof(DeltaProof),
}

/// Whether the compliance and logic proofs are carried one by one, or have
/// been replaced by a single aggregation proof. Aggregation only moves from
/// `Individual` to `Aggregated`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub enum ProofState {
    #[default]
    Individual,
    Aggregated(AggregationProof),
}

impl Transaction {
    // Create a new transaction with the given actions and delta.
    // Delta proof is a deterministic process, no proving key is needed.
    // Delta instance can be constructed from the actions.
    pub fn create(actions: Vec<Action>, delta: Delta) -> Self {
        Transaction {
            actions,
            delta_proof: delta,
            expected_balance: None,
            proof_state: ProofState::Individual,
        }
    }

    pub fn with_expected_balance(mut self, expected_balance: Vec<ExpectedBalance>) -> Self {
        self.expected_balance = Some(expected_balance);
        self
    }

    pub fn generate_delta_proof(&mut self) -> Result<(), ArmError> {
        if let Delta::Witness(ref witness) = self.delta_proof {
            let msg = self.get_delta_msg()?;
            let proof = DeltaProof::prove(&msg, witness)?;
            self.delta_proof = Delta::Proof(proof);
        }
        Ok(())
    }

    pub fn is_aggregated(&self) -> bool {
        matches!(self.proof_state, ProofState::Aggregated(_))
    }

    pub fn get_aggregation_proof(&self) -> Option<&AggregationProof> {
        match &self.proof_state {
            ProofState::Aggregated(proof) => Some(proof),
            ProofState::Individual => None,
        }
    }

    pub fn verify(&self) -> Result<(), ArmError> {
        self.verify_with(default_backend())
    }

    /// Verifies, in order: the logic proofs, the compliance proofs (or the
    /// aggregation proof in their place), the consistency of every action,
    /// the uniqueness of nullifiers and the delta proof. Stops at the first
    /// failing stage.
    pub fn verify_with(&self, backend: &dyn ProvingBackend) -> Result<(), ArmError> {
        let Delta::Proof(ref proof) = self.delta_proof else {
            return Err(ArmError::ExpectedDeltaProof);
        };

        match self.proof_state {
            ProofState::Individual => {
                for action in &self.actions {
                    action.verify_logic_proofs(backend)?;
                }
                for action in &self.actions {
                    action.verify_compliance_proofs(backend)?;
                }
            }
            ProofState::Aggregated(_) => self.verify_aggregation_with(backend)?,
        }

        for action in &self.actions {
            action.check_consistency()?;
        }

        self.check_nullifiers()?;

        let msg = self.get_delta_msg()?;
        let instance = self
            .delta()
            .map_err(|err| ArmError::BalanceMismatch(err.to_string()))?;
        DeltaProof::verify(&msg, proof, &instance)
    }

    /// Verifies the transaction and that every consumed resource was proved
    /// against a root of `view`.
    pub fn verify_against<V: CommitmentTreeView + ?Sized>(
        &self,
        backend: &dyn ProvingBackend,
        view: &V,
    ) -> Result<(), ArmError> {
        self.verify_with(backend)?;
        for action in &self.actions {
            for instance in action.compliance_instances()? {
                let root = instance.consumed_commitment_tree_root;
                if !view.is_known_root(&root) {
                    return Err(ArmError::UnknownCommitmentTreeRoot(root));
                }
            }
        }
        Ok(())
    }

    fn check_nullifiers(&self) -> Result<(), ArmError> {
        let mut seen = HashSet::new();
        for nf in self.nullifiers()? {
            if !seen.insert(nf) {
                return Err(ArmError::DoubleSpend(nf));
            }
        }
        Ok(())
    }

    pub fn nullifiers(&self) -> Result<Vec<Digest>, ArmError> {
        let mut nullifiers = Vec::new();
        for action in &self.actions {
            nullifiers.extend(action.nullifiers()?);
        }
        Ok(nullifiers)
    }

    pub fn commitments(&self) -> Result<Vec<Digest>, ArmError> {
        let mut commitments = Vec::new();
        for action in &self.actions {
            commitments.extend(action.commitments()?);
        }
        Ok(commitments)
    }

    // Returns the DeltaInstance constructed from the sum of all actions'
    // deltas, minus the declared balances.
    pub fn delta(&self) -> Result<DeltaInstance, ArmError> {
        let mut deltas = self
            .actions
            .iter()
            .map(|action| action.delta())
            .collect::<Result<Vec<ProjectivePoint>, _>>()?;
        for balance in self.expected_balance.iter().flatten() {
            deltas.push(-balance.delta()?);
        }
        DeltaInstance::from_deltas(&deltas)
    }

    pub fn get_delta_msg(&self) -> Result<Vec<u8>, ArmError> {
        let mut msg = Vec::new();
        for action in &self.actions {
            msg.extend(action.get_delta_msg()?);
        }
        for balance in self.expected_balance.iter().flatten() {
            msg.extend(balance.to_msg());
        }
        Ok(msg)
    }

    /// Merges two partial transactions. Both must still carry their delta
    /// witness and their individual proofs.
    pub fn compose(tx1: Transaction, tx2: Transaction) -> Result<Transaction, ArmError> {
        if tx1.is_aggregated() || tx2.is_aggregated() {
            return Err(ArmError::AlreadyAggregated);
        }
        let delta = match (&tx1.delta_proof, &tx2.delta_proof) {
            (Delta::Witness(witness1), Delta::Witness(witness2)) => {
                Delta::Witness(witness1.compose(witness2)?)
            }
            _ => return Err(ArmError::ExpectedDeltaWitness),
        };

        let expected_balance = match (tx1.expected_balance, tx2.expected_balance) {
            (None, None) => None,
            (first, second) => Some(
                first
                    .into_iter()
                    .flatten()
                    .chain(second.into_iter().flatten())
                    .collect(),
            ),
        };

        let mut actions = tx1.actions;
        actions.extend(tx2.actions);
        let mut tx = Transaction::create(actions, delta);
        tx.expected_balance = expected_balance;
        Ok(tx)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArmError> {
        bincode::serialize(self).map_err(|_| ArmError::SerializationError)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArmError> {
        bincode::deserialize(bytes).map_err(|_| ArmError::DeserializationError)
    }

    pub(crate) fn unset_proofs(&mut self) {
        self.actions.iter_mut().for_each(Action::unset_proofs);
    }
}
