// Transaction scenarios running against the development prover.

use crate::{
    commitment_tree::{CommitmentTree, CommitmentTreeView},
    compliance::ComplianceWitness,
    constants::TEST_LOGIC_VK,
    delta_proof::ExpectedBalance,
    error::{ArmError, ErrorKind, VerificationStage},
    hash::hash_bytes,
    nullifier_key::NullifierKey,
    proving_system::{DevProver, ProofType},
    resource::Resource,
    test_logic::{
        build_action, create_an_action, create_multiple_actions, generate_test_transaction,
    },
    transaction::{Delta, Transaction},
};
use risc0_zkvm::Digest;
use tracing_subscriber::EnvFilter;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Mints a persistent resource of quantity 5 into a commitment tree, then
/// consumes it to create one of `created_quantity`.
fn transfer(
    backend: &DevProver,
    created_quantity: u128,
) -> (Transaction, CommitmentTree, Resource) {
    let (nf_key, nk_commitment) = NullifierKey::random_pair();
    let label = hash_bytes(b"token");
    let minted = Resource::create(
        *TEST_LOGIC_VK,
        label,
        5,
        Digest::default(),
        false,
        rand::random(),
        nk_commitment,
    );

    let mut tree = CommitmentTree::new();
    tree.append(hash_bytes(b"someone else's resource")).unwrap();
    tree.append(minted.commitment()).unwrap();

    let mut created = minted;
    created.quantity = created_quantity;
    created.set_nonce(minted.nullifier(&nf_key).unwrap());
    created.reset_randomness();

    let witness =
        ComplianceWitness::from_snapshot(minted, nf_key, created, &tree.snapshot()).unwrap();
    let (action, delta_witness) = build_action(backend, ProofType::Succinct, &[witness]).unwrap();
    let tx = Transaction::create(vec![action], Delta::Witness(delta_witness));
    (tx, tree, minted)
}

#[test]
fn test_transfer_verifies() {
    init_logging();
    let backend = DevProver::default();
    let (mut tx, tree, _) = transfer(&backend, 5);
    tx.generate_delta_proof().unwrap();

    tx.verify_with(&backend).unwrap();
    tx.verify_against(&backend, &tree.snapshot()).unwrap();
}

#[test]
fn test_unknown_root_is_rejected() {
    let backend = DevProver::default();
    let (mut tx, tree, _) = transfer(&backend, 5);
    tx.generate_delta_proof().unwrap();

    let stale = CommitmentTree::new();
    assert_eq!(
        tx.verify_against(&backend, &stale),
        Err(ArmError::UnknownCommitmentTreeRoot(tree.snapshot().root()))
    );
}

#[test]
fn test_unbalanced_transfer_fails() {
    let backend = DevProver::default();
    let (mut tx, _, _) = transfer(&backend, 6);
    tx.generate_delta_proof().unwrap();

    let err = tx.verify_with(&backend).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BalanceMismatch);
    assert_eq!(err.stage(), Some(VerificationStage::DeltaProof));
}

#[test]
fn test_expected_balance_compensates() {
    let backend = DevProver::default();
    let (tx, _, minted) = transfer(&backend, 6);
    let mut tx = tx.with_expected_balance(vec![ExpectedBalance::new(
        minted.logic_ref,
        minted.label_ref,
        6,
        5,
    )]);
    tx.generate_delta_proof().unwrap();
    tx.verify_with(&backend).unwrap();

    // The balance is bound into the delta message.
    let mut tampered = tx.clone();
    tampered.expected_balance = Some(vec![ExpectedBalance::new(
        minted.logic_ref,
        minted.label_ref,
        7,
        6,
    )]);
    assert_eq!(
        tampered.verify_with(&backend).unwrap_err().kind(),
        ErrorKind::BalanceMismatch
    );
}

#[test]
fn test_double_spend_across_actions() {
    let backend = DevProver::default();
    let (first, first_witness) = create_an_action(&backend, ProofType::Succinct, 9).unwrap();
    let (second, second_witness) = create_an_action(&backend, ProofType::Succinct, 9).unwrap();

    let mut tx = Transaction::create(
        vec![first, second],
        Delta::Witness(first_witness.compose(&second_witness).unwrap()),
    );
    tx.generate_delta_proof().unwrap();

    let nf = tx.nullifiers().unwrap()[0];
    assert_eq!(tx.verify_with(&backend), Err(ArmError::DoubleSpend(nf)));
}

#[test]
fn test_forged_compliance_proof_is_rejected() {
    let backend = DevProver::default();
    let mut tx = generate_test_transaction(&backend, ProofType::Succinct, 2).unwrap();
    if let Some(proof) = tx.actions[1].compliance_units[0].proof.as_mut() {
        proof.seal[0] ^= 1;
    }

    let err = tx.verify_with(&backend).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::VerificationFailure);
    assert_eq!(err.stage(), Some(VerificationStage::ComplianceProofs));
}

#[test]
fn test_other_prover_key_is_rejected() {
    let backend = DevProver::default();
    let tx = generate_test_transaction(&backend, ProofType::Succinct, 1).unwrap();

    let err = tx.verify_with(&DevProver::new([7u8; 32])).unwrap_err();
    assert_eq!(err.stage(), Some(VerificationStage::LogicProofs));
}

#[test]
fn test_compose_transactions() {
    let backend = DevProver::default();
    let (first, first_witness) = create_multiple_actions(&backend, ProofType::Succinct, 1).unwrap();
    let (second, second_witness) = create_an_action(&backend, ProofType::Succinct, 42).unwrap();

    let mut tx = Transaction::compose(
        Transaction::create(first, Delta::Witness(first_witness)),
        Transaction::create(vec![second], Delta::Witness(second_witness)),
    )
    .unwrap();
    tx.generate_delta_proof().unwrap();
    tx.verify_with(&backend).unwrap();
    assert_eq!(tx.nullifiers().unwrap().len(), 2);
}

#[cfg(feature = "aggregation")]
mod aggregation {
    use super::*;
    use crate::{
        aggregation::{AggregationProof, AggregationStrategy},
        delta_proof::DeltaWitness,
        transaction::ProofState,
    };
    use k256::Scalar;

    const STRATEGIES: [AggregationStrategy; 3] = [
        AggregationStrategy::Batch,
        AggregationStrategy::Sequential,
        AggregationStrategy::BTree,
    ];

    fn has_individual_proofs(tx: &Transaction) -> bool {
        tx.actions.iter().any(|action| {
            action.compliance_units.iter().any(|unit| unit.proof.is_some())
                || action.logic_proofs.iter().any(|proof| proof.proof.is_some())
        })
    }

    #[test]
    fn test_aggregation_works() {
        init_logging();
        let backend = DevProver::default();
        let tx = generate_test_transaction(&backend, ProofType::Succinct, 3).unwrap();

        for strategy in STRATEGIES {
            let mut aggregated = tx.clone();
            aggregated
                .aggregate_with(&backend, strategy, ProofType::Succinct)
                .unwrap();

            assert!(aggregated.is_aggregated());
            assert!(!has_individual_proofs(&aggregated));
            aggregated.verify_aggregation_with(&backend).unwrap();
            aggregated.verify_with(&backend).unwrap();
        }
    }

    #[test]
    fn test_aggregation_of_single_action() {
        let backend = DevProver::default();
        let tx = generate_test_transaction(&backend, ProofType::Composite, 1).unwrap();

        for strategy in STRATEGIES {
            let mut aggregated = tx.clone();
            aggregated
                .aggregate_with(&backend, strategy, ProofType::Groth16)
                .unwrap();
            aggregated.verify_with(&backend).unwrap();
        }
    }

    #[test]
    fn test_aggregation_is_destructive() {
        let backend = DevProver::default();
        let mut tx = generate_test_transaction(&backend, ProofType::Succinct, 2).unwrap();
        tx.aggregate_with(&backend, AggregationStrategy::Sequential, ProofType::Succinct)
            .unwrap();

        let proof = tx.get_aggregation_proof().cloned();
        assert_eq!(
            tx.aggregate_with(&backend, AggregationStrategy::Batch, ProofType::Succinct),
            Err(ArmError::AlreadyAggregated)
        );
        assert_eq!(tx.get_aggregation_proof().cloned(), proof);
    }

    #[test]
    fn test_verify_aggregation_fails_for_incorrect_instances() {
        let backend = DevProver::default();
        let tx = generate_test_transaction(&backend, ProofType::Succinct, 2).unwrap();

        for strategy in STRATEGIES {
            let mut aggregated = tx.clone();
            aggregated
                .aggregate_with(&backend, strategy, ProofType::Succinct)
                .unwrap();

            let mut tampered = aggregated.clone();
            let last = tampered.actions[0].logic_proofs[0].instance.len() - 1;
            tampered.actions[0].logic_proofs[0].instance[last] ^= 1;
            let err = tampered.verify_aggregation_with(&backend).unwrap_err();
            assert_eq!(err.stage(), Some(VerificationStage::AggregationProof));

            let mut dropped = aggregated.clone();
            dropped.actions[1].logic_proofs.pop();
            assert!(dropped.verify_with(&backend).is_err());
        }
    }

    #[test]
    fn test_cannot_aggregate_invalid_proofs() {
        let backend = DevProver::default();
        let mut tx = generate_test_transaction(&backend, ProofType::Succinct, 2).unwrap();
        tx.actions[0].logic_proofs[0].verifying_key = Digest::from_bytes([66u8; 32]);

        for strategy in STRATEGIES {
            let mut bad_tx = tx.clone();
            let err = bad_tx
                .aggregate_with(&backend, strategy, ProofType::Succinct)
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::ProofGenerationFailure);
            assert_eq!(bad_tx.proof_state, ProofState::Individual);
            assert!(has_individual_proofs(&bad_tx));
        }
    }

    #[test]
    fn test_groth16_proofs_cannot_be_aggregated() {
        let backend = DevProver::default();
        let mut tx = generate_test_transaction(&backend, ProofType::Groth16, 1).unwrap();
        assert_eq!(
            tx.aggregate_with(&backend, AggregationStrategy::Batch, ProofType::Succinct),
            Err(ArmError::IncompatibleProofType(ProofType::Groth16))
        );
        assert!(!tx.is_aggregated());
    }

    #[test]
    fn test_empty_transaction_cannot_be_aggregated() {
        let backend = DevProver::default();
        let witness = DeltaWitness::from_scalars(&[Scalar::ONE]).unwrap();
        let mut tx = Transaction::create(Vec::new(), Delta::Witness(witness));
        for strategy in STRATEGIES {
            assert_eq!(
                tx.aggregate_with(&backend, strategy, ProofType::Succinct),
                Err(ArmError::EmptyAggregationSet)
            );
        }
    }

    #[test]
    fn test_missing_proof_cannot_be_aggregated() {
        let backend = DevProver::default();
        let mut tx = generate_test_transaction(&backend, ProofType::Succinct, 1).unwrap();
        tx.actions[0].compliance_units[0].proof = None;
        assert!(matches!(
            tx.aggregate_with(&backend, AggregationStrategy::BTree, ProofType::Succinct),
            Err(ArmError::ProveFailed(_))
        ));
    }

    #[test]
    fn test_aggregated_transaction_bytes() {
        let backend = DevProver::default();
        let mut tx = generate_test_transaction(&backend, ProofType::Succinct, 2).unwrap();
        tx.aggregate_with(&backend, AggregationStrategy::BTree, ProofType::Succinct)
            .unwrap();

        let proof = tx.get_aggregation_proof().unwrap();
        assert_eq!(
            &AggregationProof::from_bytes(&proof.to_bytes().unwrap()).unwrap(),
            proof
        );

        let decoded = Transaction::from_bytes(&tx.to_bytes().unwrap()).unwrap();
        decoded.verify_with(&backend).unwrap();
    }

    #[test]
    fn test_instance_is_recomputed_per_strategy() {
        let backend = DevProver::default();
        let tx = generate_test_transaction(&backend, ProofType::Succinct, 2).unwrap();
        let batch = tx.aggregation_instance(AggregationStrategy::Batch).unwrap();
        let sequential = tx.aggregation_instance(AggregationStrategy::Sequential).unwrap();
        let btree = tx.aggregation_instance(AggregationStrategy::BTree).unwrap();

        assert_ne!(batch.verifying_key(), sequential.verifying_key());
        assert_ne!(sequential.verifying_key(), btree.verifying_key());
        assert_ne!(sequential.journal().unwrap(), btree.journal().unwrap());
    }
}
