//! Compliance module containing the compliance instance, witness and program.

use crate::{
    commitment_tree::{CommitmentTree, CommitmentTreeView},
    constants::COMPLIANCE_VK,
    error::ArmError,
    merkle_path::{MerklePath, COMMITMENT_TREE_DEPTH},
    nullifier_key::NullifierKey,
    program::{GuestEnv, Program},
    resource::Resource,
    utils::{bytes_to_words, words_to_bytes},
};
use k256::{
    elliptic_curve::{
        sec1::{FromEncodedPoint, ToEncodedPoint},
        Field, PrimeField,
    },
    EncodedPoint, ProjectivePoint, Scalar,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use risc0_zkvm::Digest;
use serde::{Deserialize, Serialize};

lazy_static! {
    /// Root of the empty commitment tree.
    pub static ref INITIAL_ROOT: Digest = CommitmentTree::new().root();
}

/// The compliance instance contains all public inputs to the compliance proof.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComplianceInstance {
    pub consumed_nullifier: Digest,
    pub consumed_logic_ref: Digest,
    /// The commitment tree root the consumed commitment was proved against.
    pub consumed_commitment_tree_root: Digest,
    pub created_commitment: Digest,
    pub created_logic_ref: Digest,
    /// Affine x coordinate of the delta commitment, as words to avoid padding
    /// issues in the zkVM.
    pub delta_x: [u32; 8],
    pub delta_y: [u32; 8],
}

/// The compliance witness contains all private inputs to the compliance proof.
#[derive(Clone, Serialize, Deserialize)]
pub struct ComplianceWitness {
    pub consumed_resource: Resource,
    /// The path from the consumed commitment to the root in the commitment tree
    pub merkle_path: MerklePath,
    /// The root published for an ephemeral consumed resource
    pub ephemeral_root: Digest,
    pub nf_key: NullifierKey,
    pub created_resource: Resource,
    /// Random scalar blinding the delta commitment
    pub rcv: Vec<u8>,
}

impl ComplianceWitness {
    /// Witness for an ephemeral consumed resource, bound to `latest_root`.
    pub fn from_resources(
        consumed_resource: Resource,
        latest_root: Digest,
        nf_key: NullifierKey,
        created_resource: Resource,
    ) -> Self {
        ComplianceWitness {
            consumed_resource,
            created_resource,
            merkle_path: MerklePath::empty(),
            rcv: random_rcv(),
            nf_key,
            ephemeral_root: latest_root,
        }
    }

    /// Witness for a persistent consumed resource at `merkle_path`.
    pub fn from_resources_with_path(
        consumed_resource: Resource,
        nf_key: NullifierKey,
        merkle_path: MerklePath,
        created_resource: Resource,
    ) -> Self {
        ComplianceWitness {
            consumed_resource,
            created_resource,
            merkle_path,
            rcv: random_rcv(),
            nf_key,
            ephemeral_root: *INITIAL_ROOT,
        }
    }

    /// Looks the consumed resource up in a commitment tree view: ephemeral
    /// resources bind to its latest root, persistent ones need a path.
    pub fn from_snapshot<V: CommitmentTreeView + ?Sized>(
        consumed_resource: Resource,
        nf_key: NullifierKey,
        created_resource: Resource,
        tree: &V,
    ) -> Result<Self, ArmError> {
        if consumed_resource.is_ephemeral {
            Ok(Self::from_resources(
                consumed_resource,
                tree.root(),
                nf_key,
                created_resource,
            ))
        } else {
            let path = tree.path(&consumed_resource.commitment())?;
            Ok(Self::from_resources_with_path(
                consumed_resource,
                nf_key,
                path,
                created_resource,
            ))
        }
    }

    pub fn with_rcv(mut self, rcv: Scalar) -> Self {
        self.rcv = rcv.to_bytes().to_vec();
        self
    }

    /// Compliance constraints
    pub fn constrain(&self) -> Result<ComplianceInstance, ArmError> {
        let consumed_cm = self.consumed_resource.commitment();
        let consumed_nullifier = self
            .consumed_resource
            .nullifier_from_commitment(&self.nf_key, &consumed_cm)?;
        if !self.consumed_resource.is_ephemeral
            && self.merkle_path.depth() != COMMITMENT_TREE_DEPTH
        {
            return Err(ArmError::InvalidMerklePathDepth(
                self.merkle_path.depth(),
                COMMITMENT_TREE_DEPTH,
            ));
        }
        let consumed_commitment_tree_root = self.consumed_commitment_tree_root(&consumed_cm);

        // the created resource is chained to the consumed one
        if self.created_resource.nonce != *consumed_nullifier.as_bytes() {
            return Err(ArmError::InvalidResourceNonce);
        }

        let (delta_x, delta_y) = self.delta()?;

        Ok(ComplianceInstance {
            consumed_nullifier,
            consumed_logic_ref: self.consumed_resource.logic_ref,
            consumed_commitment_tree_root,
            created_commitment: self.created_resource.commitment(),
            created_logic_ref: self.created_resource.logic_ref,
            delta_x,
            delta_y,
        })
    }

    pub fn consumed_commitment_tree_root(&self, cm: &Digest) -> Digest {
        if self.consumed_resource.is_ephemeral {
            self.ephemeral_root
        } else {
            self.merkle_path.root(cm)
        }
    }

    pub fn rcv_scalar(&self) -> Result<Scalar, ArmError> {
        let rcv_array: [u8; 32] = self
            .rcv
            .as_slice()
            .try_into()
            .map_err(|_| ArmError::InvalidRcv)?;
        Scalar::from_repr(rcv_array.into())
            .into_option()
            .ok_or(ArmError::InvalidRcv)
    }

    /// `delta = kind_created * q_created - kind_consumed * q_consumed + G * rcv`
    pub fn delta(&self) -> Result<([u32; 8], [u32; 8]), ArmError> {
        let consumed_kind = self.consumed_resource.kind()?;
        let created_kind = self.created_resource.kind()?;
        let delta = created_kind * self.created_resource.quantity_scalar()
            - consumed_kind * self.consumed_resource.quantity_scalar()
            + ProjectivePoint::GENERATOR * self.rcv_scalar()?;

        let encoded_delta = delta.to_encoded_point(false);
        let delta_x: [u32; 8] = bytes_to_words(encoded_delta.x().ok_or(ArmError::InvalidDelta)?)
            .try_into()
            .map_err(|_| ArmError::InvalidDelta)?;
        let delta_y: [u32; 8] = bytes_to_words(encoded_delta.y().ok_or(ArmError::InvalidDelta)?)
            .try_into()
            .map_err(|_| ArmError::InvalidDelta)?;

        Ok((delta_x, delta_y))
    }
}

fn random_rcv() -> Vec<u8> {
    Scalar::random(&mut OsRng).to_bytes().to_vec()
}

impl Default for ComplianceWitness {
    fn default() -> Self {
        let nf_key = NullifierKey::default();
        let consumed_resource = Resource {
            quantity: 1,
            nk_commitment: nf_key.commit(),
            ..Default::default()
        };

        let mut created_resource = consumed_resource;
        if let Ok(nf) = consumed_resource.nullifier(&nf_key) {
            created_resource.set_nonce(nf);
        }

        ComplianceWitness {
            consumed_resource,
            created_resource,
            ephemeral_root: *INITIAL_ROOT,
            merkle_path: MerklePath::empty(),
            rcv: Scalar::ONE.to_bytes().to_vec(),
            nf_key,
        }
    }
}

impl ComplianceInstance {
    pub fn delta_projective(&self) -> Result<ProjectivePoint, ArmError> {
        let encoded_point = EncodedPoint::from_affine_coordinates(
            words_to_bytes(&self.delta_x).into(),
            words_to_bytes(&self.delta_y).into(),
            false,
        );
        ProjectivePoint::from_encoded_point(&encoded_point)
            .into_option()
            .ok_or(ArmError::InvalidDelta)
    }

    /// The part of the delta message contributed by this unit.
    pub fn delta_msg(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(64);
        msg.extend_from_slice(self.consumed_nullifier.as_bytes());
        msg.extend_from_slice(self.created_commitment.as_bytes());
        msg
    }
}

/// The compliance circuit.
pub struct ComplianceProgram;

impl Program for ComplianceProgram {
    fn name(&self) -> &str {
        "compliance"
    }

    fn image_id(&self) -> Digest {
        *COMPLIANCE_VK
    }

    fn execute(&self, env: &mut GuestEnv) -> Result<(), ArmError> {
        let witness: ComplianceWitness = env.read()?;
        let instance = witness.constrain()?;
        env.commit(&instance)
    }
}
