//! Resources, their commitments and nullifiers.

use crate::{
    error::ArmError,
    hash::hash_bytes,
    nullifier_key::{NullifierKey, NullifierKeyCommitment},
};
use k256::{
    elliptic_curve::hash2curve::{ExpandMsgXmd, GroupDigest},
    ProjectivePoint, Scalar, Secp256k1,
};
use rand::Rng;
use risc0_zkvm::sha::{rust_crypto::Sha256 as Sha256Type, DIGEST_BYTES};
use risc0_zkvm::Digest;
use serde::{Deserialize, Serialize};

const KIND_DST: &[u8] = b"QUUX-V01-CS02-with-secp256k1_XMD:SHA-256_SSWU_RO_";
const PRF_EXPAND_PERSONALIZATION: &[u8; 16] = b"RISC0_ExpandSeed";
const PRF_EXPAND_PSI: u8 = 0;
const PRF_EXPAND_RCM: u8 = 1;
const COMMITMENT_DOMAIN: &[u8] = b"ARM_ResourceCommitment";
const NULLIFIER_DOMAIN: &[u8] = b"ARM_ResourceNullifier";
const QUANTITY_BYTES: usize = 16;
const RESOURCE_BYTES: usize = COMMITMENT_DOMAIN.len()
    + DIGEST_BYTES // logic_ref
    + DIGEST_BYTES // label_ref
    + QUANTITY_BYTES
    + DIGEST_BYTES // value_ref
    + 1
    + DIGEST_BYTES // nonce
    + DIGEST_BYTES // nk_commitment
    + DIGEST_BYTES; // rcm

/// A resource that can be created and consumed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    // a succinct representation of the predicate associated with the resource
    pub logic_ref: Digest,
    // specifies the fungibility domain for the resource
    pub label_ref: Digest,
    pub quantity: u128,
    // the application data of the resource
    pub value_ref: Digest,
    // ephemeral resources are never inserted into the commitment tree
    pub is_ephemeral: bool,
    // guarantees the uniqueness of the resource computable components
    pub nonce: [u8; 32],
    // commitment to the nullifier key
    pub nk_commitment: NullifierKeyCommitment,
    // randomness seed used to derive whatever randomness needed
    pub rand_seed: [u8; 32],
}

impl Resource {
    /// Mints a resource with a fresh random seed.
    pub fn create(
        logic_ref: Digest,
        label_ref: Digest,
        quantity: u128,
        value_ref: Digest,
        is_ephemeral: bool,
        nonce: [u8; 32],
        nk_commitment: NullifierKeyCommitment,
    ) -> Self {
        Self {
            logic_ref,
            label_ref,
            quantity,
            value_ref,
            is_ephemeral,
            nonce,
            nk_commitment,
            rand_seed: rand::thread_rng().gen(),
        }
    }

    pub fn quantity_scalar(&self) -> Scalar {
        Scalar::from(self.quantity)
    }

    /// The kind of a resource is the curve point its quantity is weighted with
    /// in the delta commitment. It only depends on `logic_ref` and `label_ref`.
    pub fn kind(&self) -> Result<ProjectivePoint, ArmError> {
        let mut bytes = [0u8; DIGEST_BYTES * 2];
        bytes[0..DIGEST_BYTES].clone_from_slice(self.logic_ref.as_ref());
        bytes[DIGEST_BYTES..].clone_from_slice(self.label_ref.as_ref());
        Secp256k1::hash_from_bytes::<ExpandMsgXmd<Sha256Type>>(&[&bytes], &[KIND_DST])
            .map_err(|_| ArmError::InvalidResourceKind)
    }

    fn prf_expand(&self, tag: u8) -> Digest {
        let mut bytes = [0u8; PRF_EXPAND_PERSONALIZATION.len() + 1 + 2 * DIGEST_BYTES];
        let (personalization, rest) = bytes.split_at_mut(PRF_EXPAND_PERSONALIZATION.len());
        personalization.copy_from_slice(PRF_EXPAND_PERSONALIZATION);
        rest[0] = tag;
        rest[1..1 + DIGEST_BYTES].copy_from_slice(&self.rand_seed);
        rest[1 + DIGEST_BYTES..].copy_from_slice(&self.nonce);
        hash_bytes(&bytes)
    }

    fn psi(&self) -> Digest {
        self.prf_expand(PRF_EXPAND_PSI)
    }

    fn rcm(&self) -> Digest {
        self.prf_expand(PRF_EXPAND_RCM)
    }

    /// Commitment to every field of the resource, blinded with `rcm`.
    pub fn commitment(&self) -> Digest {
        let mut bytes = Vec::with_capacity(RESOURCE_BYTES);
        bytes.extend_from_slice(COMMITMENT_DOMAIN);
        bytes.extend_from_slice(self.logic_ref.as_bytes());
        bytes.extend_from_slice(self.label_ref.as_bytes());
        bytes.extend_from_slice(&self.quantity.to_be_bytes());
        bytes.extend_from_slice(self.value_ref.as_bytes());
        bytes.push(self.is_ephemeral as u8);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(self.nk_commitment.as_bytes());
        bytes.extend_from_slice(self.rcm().as_bytes());
        debug_assert_eq!(bytes.len(), RESOURCE_BYTES);
        hash_bytes(&bytes)
    }

    pub fn nullifier(&self, nf_key: &NullifierKey) -> Result<Digest, ArmError> {
        let cm = self.commitment();
        self.nullifier_from_commitment(nf_key, &cm)
    }

    /// Computes the nullifier from an already computed commitment. Fails if
    /// `nf_key` does not open the resource's nullifier key commitment.
    pub fn nullifier_from_commitment(
        &self,
        nf_key: &NullifierKey,
        cm: &Digest,
    ) -> Result<Digest, ArmError> {
        if self.nk_commitment != nf_key.commit() {
            return Err(ArmError::InvalidNullifierKey);
        }

        let mut bytes = Vec::with_capacity(NULLIFIER_DOMAIN.len() + 4 * DIGEST_BYTES);
        bytes.extend_from_slice(NULLIFIER_DOMAIN);
        bytes.extend_from_slice(nf_key.inner());
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(self.psi().as_bytes());
        bytes.extend_from_slice(cm.as_bytes());
        Ok(hash_bytes(&bytes))
    }

    /// The nullifier when consumed, the commitment when created.
    pub fn tag(&self, is_consumed: bool, nf_key: &NullifierKey) -> Result<Digest, ArmError> {
        let cm = self.commitment();
        if is_consumed {
            self.nullifier_from_commitment(nf_key, &cm)
        } else {
            Ok(cm)
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ArmError> {
        bincode::serialize(self).map_err(|_| ArmError::InvalidResourceSerialization)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ArmError> {
        bincode::deserialize(bytes).map_err(|_| ArmError::InvalidResourceDeserialization)
    }

    pub fn set_nonce(&mut self, nonce: Digest) {
        self.nonce.copy_from_slice(nonce.as_bytes());
    }

    pub fn set_value_ref(&mut self, value_ref: Digest) {
        self.value_ref = value_ref;
    }

    pub fn set_nf_commitment(&mut self, nf_commitment: NullifierKeyCommitment) {
        self.nk_commitment = nf_commitment;
    }

    pub fn reset_randomness(&mut self) {
        self.rand_seed = rand::thread_rng().gen();
    }

    /// Derives the nonce of the `index`-th created resource from the
    /// nullifiers of the consumed ones. The index must fit in 32 bits.
    pub fn derive_nonce_from_nullifiers(
        index: usize,
        nullifiers: &[Digest],
    ) -> Result<[u8; 32], ArmError> {
        Self::derive_nonce(index, Self::hash_nullifiers(nullifiers))
    }

    pub fn derive_nonce(index: usize, nullifiers_digest: Digest) -> Result<[u8; 32], ArmError> {
        let index_u32: u32 = index
            .try_into()
            .map_err(|_| ArmError::InvalidResourceIndex)?;
        let mut bytes = [0u8; DIGEST_BYTES + 4];
        bytes[0..4].clone_from_slice(&index_u32.to_le_bytes());
        bytes[4..].clone_from_slice(nullifiers_digest.as_ref());

        hash_bytes(&bytes)
            .as_bytes()
            .try_into()
            .map_err(|_| ArmError::InvalidResourceNonce)
    }

    pub fn hash_nullifiers(nullifiers: &[Digest]) -> Digest {
        let bytes: Vec<u8> = nullifiers
            .iter()
            .flat_map(|nf| nf.as_bytes().iter().copied())
            .collect();
        hash_bytes(&bytes)
    }
}

impl Default for Resource {
    fn default() -> Self {
        Self {
            logic_ref: Digest::default(),
            label_ref: Digest::default(),
            quantity: 0,
            value_ref: Digest::default(),
            is_ephemeral: true,
            nonce: [0; 32],
            nk_commitment: NullifierKeyCommitment::default(),
            rand_seed: [0; 32],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_resource() -> (Resource, NullifierKey) {
        let (nf_key, nk_commitment) = NullifierKey::random_pair();
        let resource = Resource::create(
            hash_bytes(b"logic"),
            hash_bytes(b"label"),
            5,
            hash_bytes(b"value"),
            false,
            rand::random(),
            nk_commitment,
        );
        (resource, nf_key)
    }

    #[test]
    fn test_commitment_and_nullifier_are_deterministic() {
        let (resource, nf_key) = sample_resource();
        assert_eq!(resource.commitment(), resource.commitment());
        assert_eq!(
            resource.nullifier(&nf_key).unwrap(),
            resource.nullifier(&nf_key).unwrap()
        );
        assert_ne!(resource.commitment(), resource.nullifier(&nf_key).unwrap());
    }

    #[test]
    fn test_nonce_makes_commitments_unique() {
        let (resource, nf_key) = sample_resource();
        let mut other = resource;
        other.nonce[0] ^= 1;
        assert_ne!(resource.commitment(), other.commitment());
        assert_ne!(
            resource.nullifier(&nf_key).unwrap(),
            other.nullifier(&nf_key).unwrap()
        );
    }

    #[test]
    fn test_nullifier_requires_matching_key() {
        let (resource, _) = sample_resource();
        let (wrong_key, _) = NullifierKey::random_pair();
        assert_eq!(
            resource.nullifier(&wrong_key),
            Err(ArmError::InvalidNullifierKey)
        );
    }

    #[test]
    fn test_kind_ignores_quantity() {
        let (resource, _) = sample_resource();
        let mut other = resource;
        other.quantity = 10;
        assert_eq!(resource.kind().unwrap(), other.kind().unwrap());
        other.label_ref = hash_bytes(b"another label");
        assert_ne!(resource.kind().unwrap(), other.kind().unwrap());
    }

    #[test]
    fn test_serialization_preserves_identity() {
        let (resource, nf_key) = sample_resource();
        let decoded = Resource::from_bytes(&resource.to_bytes().unwrap()).unwrap();
        assert_eq!(resource.commitment(), decoded.commitment());
        assert_eq!(
            resource.nullifier(&nf_key).unwrap(),
            decoded.nullifier(&nf_key).unwrap()
        );
    }

    #[test]
    fn test_derive_nonce() {
        let nfs = [hash_bytes(b"nf0"), hash_bytes(b"nf1")];
        let first = Resource::derive_nonce_from_nullifiers(0, &nfs).unwrap();
        let second = Resource::derive_nonce_from_nullifiers(1, &nfs).unwrap();
        assert_ne!(first, second);
        assert_eq!(first, Resource::derive_nonce_from_nullifiers(0, &nfs).unwrap());
    }
}
