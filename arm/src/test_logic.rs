// A permissive test logic and transaction fixtures. They are public so that
// benchmarks and binding libraries can build valid transactions too.

use crate::{
    action::Action,
    compliance::{ComplianceWitness, INITIAL_ROOT},
    compliance_unit::ComplianceUnit,
    constants::TEST_LOGIC_VK,
    delta_proof::DeltaWitness,
    encryption::{AffinePoint, Ciphertext, SecretKey},
    error::ArmError,
    logic_instance::{AppData, DeletionCriterion, ExpirableBlob, LogicInstance},
    logic_proof::LogicProver,
    merkle_path::MerklePath,
    nullifier_key::NullifierKey,
    proving_system::{ProofType, ProvingBackend},
    resource::Resource,
    resource_logic::{resource_tag_and_root, LogicCircuit},
    transaction::{Delta, Transaction},
    utils::bytes_to_words,
};
use risc0_zkvm::Digest;
use serde::{Deserialize, Serialize};

/// Accepts any resource. Publishes the resource in the resource payload and
/// an encryption of it to `discovery_pk` in the discovery payload.
#[derive(Clone, Serialize, Deserialize)]
pub struct TestLogicWitness {
    pub resource: Resource,
    pub is_consumed: bool,
    pub nf_key: NullifierKey,
    pub merkle_path: MerklePath,
    pub root: Digest,
    pub discovery_pk: AffinePoint,
    pub discovery_sk: SecretKey,
    pub discovery_nonce: [u8; 12],
}

impl LogicCircuit for TestLogicWitness {
    fn constrain(&self) -> Result<LogicInstance, ArmError> {
        let (tag, root) = resource_tag_and_root(
            &self.resource,
            self.is_consumed,
            &self.nf_key,
            &self.merkle_path,
            self.root,
        )?;

        let resource_bytes = self.resource.to_bytes()?;
        let cipher = Ciphertext::encrypt(
            &resource_bytes,
            &self.discovery_pk,
            &self.discovery_sk,
            self.discovery_nonce,
        )?;

        let mut app_data = AppData::new();
        app_data.add_resource_payload(ExpirableBlob::new(
            bytes_to_words(&resource_bytes),
            DeletionCriterion::AfterTransaction,
        ));
        app_data.add_discovery_payload(ExpirableBlob::new(
            cipher.as_words(),
            DeletionCriterion::Never,
        ));

        Ok(LogicInstance {
            tag,
            is_consumed: self.is_consumed,
            root,
            app_data,
        })
    }
}

impl Default for TestLogicWitness {
    fn default() -> Self {
        let nf_key = NullifierKey::default();
        let resource = Resource {
            logic_ref: *TEST_LOGIC_VK,
            quantity: 1,
            nk_commitment: nf_key.commit(),
            ..Default::default()
        };
        TestLogicWitness {
            resource,
            is_consumed: false,
            nf_key,
            merkle_path: MerklePath::empty(),
            root: *INITIAL_ROOT,
            discovery_pk: AffinePoint::GENERATOR,
            discovery_sk: SecretKey::default(),
            discovery_nonce: [0u8; 12],
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TestLogic {
    witness: TestLogicWitness,
}

impl TestLogic {
    pub fn new(
        resource: Resource,
        is_consumed: bool,
        nf_key: NullifierKey,
        merkle_path: MerklePath,
        root: Digest,
    ) -> Self {
        TestLogic {
            witness: TestLogicWitness {
                resource,
                is_consumed,
                nf_key,
                merkle_path,
                root,
                ..Default::default()
            },
        }
    }

    /// Encrypts the discovery payload to `receiver_pk`.
    pub fn with_discovery(mut self, receiver_pk: AffinePoint, nonce: [u8; 12]) -> Self {
        self.witness.discovery_pk = receiver_pk;
        self.witness.discovery_sk = SecretKey::random();
        self.witness.discovery_nonce = nonce;
        self
    }
}

impl LogicProver for TestLogic {
    type Witness = TestLogicWitness;

    fn name() -> &'static str {
        "test-logic"
    }

    fn verifying_key() -> Digest {
        *TEST_LOGIC_VK
    }

    fn witness(&self) -> &Self::Witness {
        &self.witness
    }
}

/// Proves the compliance units of `witnesses` and the test logic of every
/// resource they reference, and assembles them into an action.
pub fn build_action(
    backend: &dyn ProvingBackend,
    proof_type: ProofType,
    witnesses: &[ComplianceWitness],
) -> Result<(Action, DeltaWitness), ArmError> {
    let mut compliance_units = Vec::with_capacity(witnesses.len());
    let mut logic_proofs = Vec::with_capacity(2 * witnesses.len());
    let mut rcvs = Vec::with_capacity(witnesses.len());

    for witness in witnesses {
        let unit = ComplianceUnit::create_with(backend, witness, proof_type)?;
        let root = unit.get_instance()?.consumed_commitment_tree_root;
        compliance_units.push(unit);
        rcvs.push(witness.rcv_scalar()?);

        let consumed = TestLogic::new(
            witness.consumed_resource,
            true,
            witness.nf_key.clone(),
            witness.merkle_path.clone(),
            root,
        );
        logic_proofs.push(consumed.prove_with(backend, proof_type)?);

        let created = TestLogic::new(
            witness.created_resource,
            false,
            witness.nf_key.clone(),
            MerklePath::empty(),
            root,
        );
        logic_proofs.push(created.prove_with(backend, proof_type)?);
    }

    let action = Action::new(compliance_units, logic_proofs)?;
    Ok((action, DeltaWitness::from_scalars(&rcvs)?))
}

/// A balanced action consuming an ephemeral test resource. `nonce` makes
/// the consumed resource, hence its nullifier, distinct across actions.
pub fn create_an_action(
    backend: &dyn ProvingBackend,
    proof_type: ProofType,
    nonce: u8,
) -> Result<(Action, DeltaWitness), ArmError> {
    let nf_key = NullifierKey::default();
    let mut consumed_resource = Resource {
        logic_ref: *TEST_LOGIC_VK,
        nk_commitment: nf_key.commit(),
        quantity: 1,
        ..Default::default()
    };
    consumed_resource.nonce[0] = nonce;

    let mut created_resource = consumed_resource;
    created_resource.set_nonce(consumed_resource.nullifier(&nf_key)?);

    let witness = ComplianceWitness::from_resources(
        consumed_resource,
        *INITIAL_ROOT,
        nf_key,
        created_resource,
    );
    build_action(backend, proof_type, &[witness])
}

pub fn create_multiple_actions(
    backend: &dyn ProvingBackend,
    proof_type: ProofType,
    n: usize,
) -> Result<(Vec<Action>, DeltaWitness), ArmError> {
    let mut actions = Vec::with_capacity(n);
    let mut delta_witnesses = Vec::with_capacity(n);
    for i in 0..n {
        let nonce = u8::try_from(i).map_err(|_| ArmError::InvalidResourceIndex)?;
        let (action, delta_witness) = create_an_action(backend, proof_type, nonce)?;
        actions.push(action);
        delta_witnesses.push(delta_witness);
    }
    Ok((actions, DeltaWitness::compress(&delta_witnesses)?))
}

/// A verified, balanced transaction of `n_actions` test actions.
pub fn generate_test_transaction(
    backend: &dyn ProvingBackend,
    proof_type: ProofType,
    n_actions: usize,
) -> Result<Transaction, ArmError> {
    let (actions, delta_witness) = create_multiple_actions(backend, proof_type, n_actions)?;
    let mut tx = Transaction::create(actions, Delta::Witness(delta_witness));
    tx.generate_delta_proof()?;
    tx.verify_with(backend)?;
    Ok(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encryption::random_keypair, proving_system::DevProver};

    #[test]
    fn test_logic_prover() {
        let backend = DevProver::default();
        let proof = TestLogic::default()
            .prove_with(&backend, ProofType::Succinct)
            .unwrap();
        proof.verify_with(&backend).unwrap();
    }

    #[test]
    fn test_discovery_payload_decrypts() {
        let backend = DevProver::default();
        let (receiver_sk, receiver_pk) = random_keypair();
        let logic = TestLogic::default().with_discovery(receiver_pk, [7u8; 12]);
        let proof = logic.prove_with(&backend, ProofType::Succinct).unwrap();

        let instance = proof.get_instance().unwrap();
        let cipher = Ciphertext::from_words(&instance.app_data.discovery_payload[0].blob);
        let plaintext = cipher.decrypt(&receiver_sk).unwrap();
        assert_eq!(
            Resource::from_bytes(&plaintext).unwrap(),
            logic.witness().resource
        );
    }

    #[test]
    fn test_action() {
        let backend = DevProver::default();
        let (action, _) = create_an_action(&backend, ProofType::Succinct, 1).unwrap();
        action.verify_with(&backend).unwrap();
    }

    #[test]
    fn test_transaction() {
        let backend = DevProver::default();
        let tx = generate_test_transaction(&backend, ProofType::Succinct, 2).unwrap();
        assert_eq!(tx.nullifiers().unwrap().len(), 2);
    }
}
