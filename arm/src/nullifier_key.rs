//! Nullifier key and its commitment

use crate::error::ArmError;
use crate::hash::hash_bytes;
use rand::{rngs::OsRng, Rng};
use risc0_zkvm::sha::{Digest, DIGEST_BYTES};
use serde::{Deserialize, Serialize};

/// Nullifier spending key. Holding it is the only authorization needed to
/// consume a resource committed to its [NullifierKeyCommitment].
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NullifierKey([u8; DIGEST_BYTES]);

impl NullifierKey {
    pub fn new(nf_key: [u8; DIGEST_BYTES]) -> NullifierKey {
        NullifierKey(nf_key)
    }

    /// Derives the public commitment (npk) of the key
    pub fn commit(&self) -> NullifierKeyCommitment {
        NullifierKeyCommitment(hash_bytes(self.inner()))
    }

    pub fn inner(&self) -> &[u8] {
        &self.0
    }

    pub fn from_slice(bytes: &[u8]) -> Result<NullifierKey, ArmError> {
        let key: [u8; DIGEST_BYTES] = bytes.try_into().map_err(|_| ArmError::InvalidNullifierKey)?;
        Ok(NullifierKey(key))
    }

    /// Generate a random nullifier key and its commitment
    pub fn random_pair() -> (NullifierKey, NullifierKeyCommitment) {
        let nf_key = NullifierKey(OsRng.gen());
        let nk_commitment = nf_key.commit();
        (nf_key, nk_commitment)
    }
}

impl std::fmt::Debug for NullifierKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("NullifierKey(..)")
    }
}

impl Default for NullifierKey {
    fn default() -> Self {
        NullifierKey([0u8; DIGEST_BYTES])
    }
}

/// Commitment to nullifier key
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct NullifierKeyCommitment(Digest);

impl NullifierKeyCommitment {
    pub fn inner(&self) -> Digest {
        self.0
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<NullifierKeyCommitment, ArmError> {
        let nk_cm: Digest =
            Digest::try_from(bytes).map_err(|_| ArmError::InvalidNullifierCommitment)?;
        Ok(NullifierKeyCommitment(nk_cm))
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Default for NullifierKeyCommitment {
    fn default() -> Self {
        NullifierKey::default().commit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commitment_is_deterministic() {
        let (nf_key, nk_commitment) = NullifierKey::random_pair();
        assert_eq!(nf_key.commit(), nk_commitment);

        let other = NullifierKey::from_slice(nf_key.inner()).unwrap();
        assert_eq!(other.commit(), nk_commitment);
        assert_ne!(NullifierKey::default().commit(), nk_commitment);
    }

    #[test]
    fn test_invalid_lengths() {
        assert_eq!(
            NullifierKey::from_slice(&[0u8; 31]),
            Err(ArmError::InvalidNullifierKey)
        );
        assert_eq!(
            NullifierKeyCommitment::from_bytes(&[0u8; 33]),
            Err(ArmError::InvalidNullifierCommitment)
        );
    }
}
