use crate::{error::ArmError, resource::Resource};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::{elliptic_curve::PublicKey, ProjectivePoint, Scalar, SecretKey};
use risc0_zkvm::Digest;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use serde_bytes::ByteArray;
use sha3::{Digest as _, Keccak256};

/// Binding signature proving that the transaction delta opens to zero: the
/// key recovered from the signature must equal the aggregated delta point.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeltaProof {
    #[serde(
        deserialize_with = "deserialize_signature",
        serialize_with = "serialize_signature"
    )]
    pub signature: Signature,
    #[serde(
        deserialize_with = "deserialize_recovery_id",
        serialize_with = "serialize_recovery_id"
    )]
    pub recid: RecoveryId,
}

fn serialize_signature<S>(t: &Signature, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    ByteArray::<64>::new(t.to_bytes().into()).serialize(s)
}

fn deserialize_signature<'de, D>(deserializer: D) -> Result<Signature, D::Error>
where
    D: Deserializer<'de>,
{
    let b: [u8; 64] = ByteArray::deserialize(deserializer)?.into_array();
    Signature::from_bytes(&b.into()).map_err(de::Error::custom)
}

fn serialize_recovery_id<S>(t: &RecoveryId, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_u8(t.to_byte())
}

fn deserialize_recovery_id<'de, D>(d: D) -> Result<RecoveryId, D::Error>
where
    D: Deserializer<'de>,
{
    let s: u8 = de::Deserialize::deserialize(d)?;
    RecoveryId::try_from(s).map_err(de::Error::custom)
}

/// The sum of the `rcv`s of every compliance unit of a transaction.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DeltaWitness {
    #[serde(
        deserialize_with = "deserialize_signing_key",
        serialize_with = "serialize_signing_key"
    )]
    pub signing_key: SigningKey,
}

fn serialize_signing_key<S>(t: &SigningKey, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    ByteArray::<32>::new(t.to_bytes().into()).serialize(s)
}

fn deserialize_signing_key<'de, D>(deserializer: D) -> Result<SigningKey, D::Error>
where
    D: Deserializer<'de>,
{
    let b: [u8; 32] = ByteArray::deserialize(deserializer)?.into_array();
    SigningKey::from_bytes(&b.into()).map_err(de::Error::custom)
}

pub struct DeltaInstance {
    pub verifying_key: VerifyingKey,
}

/// A declared imbalance of one resource kind, for transactions that mint or
/// burn on purpose.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExpectedBalance {
    pub logic_ref: Digest,
    pub label_ref: Digest,
    pub created: u128,
    pub consumed: u128,
}

impl ExpectedBalance {
    pub fn new(logic_ref: Digest, label_ref: Digest, created: u128, consumed: u128) -> Self {
        ExpectedBalance {
            logic_ref,
            label_ref,
            created,
            consumed,
        }
    }

    /// The part of the delta this balance accounts for.
    pub fn delta(&self) -> Result<ProjectivePoint, ArmError> {
        let kind = Resource {
            logic_ref: self.logic_ref,
            label_ref: self.label_ref,
            ..Default::default()
        }
        .kind()?;
        Ok(kind * Scalar::from(self.created) - kind * Scalar::from(self.consumed))
    }

    pub fn to_msg(&self) -> Vec<u8> {
        let mut msg = Vec::with_capacity(96);
        msg.extend_from_slice(self.logic_ref.as_bytes());
        msg.extend_from_slice(self.label_ref.as_bytes());
        msg.extend_from_slice(&self.created.to_le_bytes());
        msg.extend_from_slice(&self.consumed.to_le_bytes());
        msg
    }
}

impl DeltaProof {
    pub fn prove(message: &[u8], witness: &DeltaWitness) -> Result<DeltaProof, ArmError> {
        let mut digest = Keccak256::new();
        digest.update(message);

        // RFC6979 nonce, so proving twice yields the same proof
        let (signature, recid) = witness
            .signing_key
            .sign_digest_recoverable(digest)
            .map_err(|_| ArmError::DeltaProofGenerationFailed)?;

        Ok(DeltaProof { signature, recid })
    }

    pub fn verify(
        message: &[u8],
        proof: &DeltaProof,
        instance: &DeltaInstance,
    ) -> Result<(), ArmError> {
        let mut digest = Keccak256::new();
        digest.update(message);

        let vk = VerifyingKey::recover_from_digest(digest, &proof.signature, proof.recid)
            .map_err(|err| ArmError::BalanceMismatch(err.to_string()))?;
        if vk == instance.verifying_key {
            Ok(())
        } else {
            Err(ArmError::BalanceMismatch("delta does not open to zero".into()))
        }
    }

    pub fn to_bytes(&self) -> [u8; 65] {
        let mut bytes = [0u8; 65];
        bytes[0..64].clone_from_slice(&self.signature.to_bytes());
        bytes[64] = self.recid.to_byte() + 27;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<DeltaProof, ArmError> {
        if bytes.len() != 65 {
            return Err(ArmError::InvalidSignature);
        }
        let signature =
            Signature::from_slice(&bytes[0..64]).map_err(|_| ArmError::InvalidSignature)?;
        let recid = bytes[64]
            .checked_sub(27)
            .and_then(RecoveryId::from_byte)
            .ok_or(ArmError::InvalidSignature)?;
        Ok(DeltaProof { signature, recid })
    }
}

impl DeltaWitness {
    pub fn from_scalars(secret_keys: &[Scalar]) -> Result<DeltaWitness, ArmError> {
        let sum = secret_keys.iter().fold(Scalar::ZERO, |acc, x| acc + x);
        Self::from_scalar(sum)
    }

    fn from_scalar(scalar: Scalar) -> Result<DeltaWitness, ArmError> {
        let sk = SecretKey::from_bytes(&scalar.to_bytes()).map_err(|_| ArmError::InvalidRcv)?;
        Ok(DeltaWitness {
            signing_key: SigningKey::from(sk),
        })
    }

    pub fn from_bytes_vec(keys: &[Vec<u8>]) -> Result<DeltaWitness, ArmError> {
        let witnesses = keys
            .iter()
            .map(|key| DeltaWitness::from_bytes(key))
            .collect::<Result<Vec<_>, _>>()?;
        DeltaWitness::compress(&witnesses)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<DeltaWitness, ArmError> {
        let bytes: [u8; 32] = bytes.try_into().map_err(|_| ArmError::InvalidSigningKey)?;
        let signing_key =
            SigningKey::from_bytes(&bytes.into()).map_err(|_| ArmError::InvalidSigningKey)?;
        Ok(DeltaWitness { signing_key })
    }

    pub fn to_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes().into()
    }

    fn scalar(&self) -> Scalar {
        *self.signing_key.as_nonzero_scalar().as_ref()
    }

    pub fn compose(&self, other: &DeltaWitness) -> Result<Self, ArmError> {
        Self::from_scalar(self.scalar() + other.scalar())
    }

    pub fn compress(witnesses: &[DeltaWitness]) -> Result<DeltaWitness, ArmError> {
        let sum = witnesses
            .iter()
            .fold(Scalar::ZERO, |acc, witness| acc + witness.scalar());
        Self::from_scalar(sum)
    }
}

impl DeltaInstance {
    pub fn from_deltas(deltas: &[ProjectivePoint]) -> Result<DeltaInstance, ArmError> {
        let sum = deltas
            .iter()
            .fold(ProjectivePoint::IDENTITY, |acc, x| acc + x);
        let pk = PublicKey::from_affine(sum.to_affine()).map_err(|_| ArmError::InvalidDelta)?;
        Ok(DeltaInstance {
            verifying_key: VerifyingKey::from(&pk),
        })
    }
}
