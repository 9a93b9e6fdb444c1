use crate::{
    compliance::ComplianceInstance,
    compliance_unit::ComplianceUnit,
    error::ArmError,
    logic_instance::LogicInstance,
    logic_proof::LogicProof,
    proving_system::{default_backend, ProvingBackend},
};
use k256::ProjectivePoint;
use risc0_zkvm::Digest;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Compliance units and the logic proofs of every resource they reference.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Action {
    pub compliance_units: Vec<ComplianceUnit>,
    pub logic_proofs: Vec<LogicProof>,
}

/// A resource referenced by a compliance unit, as its logic proof must
/// report it.
struct ExpectedTag {
    tag: Digest,
    logic_ref: Digest,
    root: Digest,
    is_consumed: bool,
}

impl Action {
    /// Assembles an action, rejecting logic proofs that do not match the
    /// compliance units one to one.
    pub fn new(
        compliance_units: Vec<ComplianceUnit>,
        logic_proofs: Vec<LogicProof>,
    ) -> Result<Self, ArmError> {
        let action = Action {
            compliance_units,
            logic_proofs,
        };
        action.check_consistency()?;
        Ok(action)
    }

    pub fn get_compliance_units(&self) -> &[ComplianceUnit] {
        &self.compliance_units
    }

    pub fn get_logic_proofs(&self) -> &[LogicProof] {
        &self.logic_proofs
    }

    pub fn compliance_instances(&self) -> Result<Vec<ComplianceInstance>, ArmError> {
        self.compliance_units
            .iter()
            .map(|unit| unit.get_instance())
            .collect()
    }

    fn expected_tags(&self) -> Result<Vec<ExpectedTag>, ArmError> {
        let mut expected = Vec::with_capacity(2 * self.compliance_units.len());
        for instance in self.compliance_instances()? {
            expected.push(ExpectedTag {
                tag: instance.consumed_nullifier,
                logic_ref: instance.consumed_logic_ref,
                root: instance.consumed_commitment_tree_root,
                is_consumed: true,
            });
            expected.push(ExpectedTag {
                tag: instance.created_commitment,
                logic_ref: instance.created_logic_ref,
                root: instance.consumed_commitment_tree_root,
                is_consumed: false,
            });
        }
        Ok(expected)
    }

    /// Every tag of the compliance instances must be matched by exactly one
    /// logic proof with the same tag, program, consumed flag and root.
    pub fn check_consistency(&self) -> Result<(), ArmError> {
        let expected = self.expected_tags()?;

        let mut seen = HashSet::with_capacity(expected.len());
        for entry in &expected {
            if !seen.insert(entry.tag) {
                return Err(if entry.is_consumed {
                    ArmError::DoubleSpend(entry.tag)
                } else {
                    ArmError::LogicComplianceMismatch(format!(
                        "commitment {} is created twice",
                        entry.tag
                    ))
                });
            }
        }

        if expected.len() != self.logic_proofs.len() {
            return Err(ArmError::LogicComplianceMismatch(format!(
                "{} tags but {} logic proofs",
                expected.len(),
                self.logic_proofs.len()
            )));
        }

        let mut logic_instances: HashMap<Digest, (Digest, LogicInstance)> =
            HashMap::with_capacity(self.logic_proofs.len());
        for proof in &self.logic_proofs {
            let instance = proof.get_instance()?;
            if logic_instances
                .insert(instance.tag, (proof.verifying_key, instance))
                .is_some()
            {
                return Err(ArmError::LogicComplianceMismatch(
                    "two logic proofs for the same tag".into(),
                ));
            }
        }

        for entry in &expected {
            let (verifying_key, instance) = logic_instances.get(&entry.tag).ok_or_else(|| {
                ArmError::LogicComplianceMismatch(format!("no logic proof for tag {}", entry.tag))
            })?;
            if *verifying_key != entry.logic_ref {
                return Err(ArmError::LogicComplianceMismatch(format!(
                    "tag {} is proved by {} instead of {}",
                    entry.tag, verifying_key, entry.logic_ref
                )));
            }
            if instance.is_consumed != entry.is_consumed || instance.root != entry.root {
                return Err(ArmError::LogicComplianceMismatch(format!(
                    "logic instance of tag {} disagrees with its compliance unit",
                    entry.tag
                )));
            }
        }

        Ok(())
    }

    pub fn verify_logic_proofs(&self, backend: &dyn ProvingBackend) -> Result<(), ArmError> {
        self.logic_proofs
            .iter()
            .try_for_each(|proof| proof.verify_with(backend))
    }

    pub fn verify_compliance_proofs(&self, backend: &dyn ProvingBackend) -> Result<(), ArmError> {
        self.compliance_units
            .iter()
            .try_for_each(|unit| unit.verify_with(backend))
    }

    pub fn verify(&self) -> Result<(), ArmError> {
        self.verify_with(default_backend())
    }

    pub fn verify_with(&self, backend: &dyn ProvingBackend) -> Result<(), ArmError> {
        self.verify_logic_proofs(backend)?;
        self.verify_compliance_proofs(backend)?;
        self.check_consistency()
    }

    pub fn nullifiers(&self) -> Result<Vec<Digest>, ArmError> {
        Ok(self
            .compliance_instances()?
            .iter()
            .map(|instance| instance.consumed_nullifier)
            .collect())
    }

    pub fn commitments(&self) -> Result<Vec<Digest>, ArmError> {
        Ok(self
            .compliance_instances()?
            .iter()
            .map(|instance| instance.created_commitment)
            .collect())
    }

    // The delta of an action is the sum of the deltas of its compliance units.
    pub fn delta(&self) -> Result<ProjectivePoint, ArmError> {
        self.compliance_units
            .iter()
            .try_fold(ProjectivePoint::IDENTITY, |acc, unit| {
                Ok(acc + unit.delta()?)
            })
    }

    pub fn get_delta_msg(&self) -> Result<Vec<u8>, ArmError> {
        let mut msg = Vec::with_capacity(64 * self.compliance_units.len());
        for instance in self.compliance_instances()? {
            msg.extend_from_slice(&instance.delta_msg());
        }
        Ok(msg)
    }

    pub(crate) fn unset_proofs(&mut self) {
        self.compliance_units
            .iter_mut()
            .for_each(ComplianceUnit::unset_proof);
        self.logic_proofs.iter_mut().for_each(LogicProof::unset_proof);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::VerificationStage, proving_system::DevProver, proving_system::ProofType,
        test_logic::create_an_action,
    };

    #[test]
    fn test_action_consistency() {
        let backend = DevProver::default();
        let (action, _) = create_an_action(&backend, ProofType::Succinct, 3).unwrap();
        action.verify_with(&backend).unwrap();
        assert_eq!(action.nullifiers().unwrap().len(), 1);
        assert_eq!(action.commitments().unwrap().len(), 1);
    }

    #[test]
    fn test_missing_logic_proof() {
        let backend = DevProver::default();
        let (action, _) = create_an_action(&backend, ProofType::Succinct, 4).unwrap();
        let mut logic_proofs = action.logic_proofs.clone();
        logic_proofs.pop();

        let err = Action::new(action.compliance_units.clone(), logic_proofs).unwrap_err();
        assert!(matches!(err, ArmError::LogicComplianceMismatch(_)));
        assert_eq!(err.stage(), Some(VerificationStage::ActionConsistency));
    }

    #[test]
    fn test_swapped_logic_proofs() {
        let backend = DevProver::default();
        let (first, _) = create_an_action(&backend, ProofType::Succinct, 5).unwrap();
        let (second, _) = create_an_action(&backend, ProofType::Succinct, 6).unwrap();

        let err = Action::new(first.compliance_units, second.logic_proofs).unwrap_err();
        assert!(matches!(err, ArmError::LogicComplianceMismatch(_)));
    }

    #[test]
    fn test_duplicate_nullifier_in_action() {
        let backend = DevProver::default();
        let (action, _) = create_an_action(&backend, ProofType::Succinct, 7).unwrap();
        let mut units = action.compliance_units.clone();
        units.push(units[0].clone());
        let mut logic_proofs = action.logic_proofs.clone();
        logic_proofs.extend(action.logic_proofs.clone());

        let nf = action.nullifiers().unwrap()[0];
        assert_eq!(
            Action::new(units, logic_proofs).unwrap_err(),
            ArmError::DoubleSpend(nf)
        );
    }
}
