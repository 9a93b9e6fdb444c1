use crate::{
    error::ArmError,
    hash::hash_bytes,
    utils::{bytes_to_words, words_to_bytes},
};
use aes_gcm::{aead::Aead, Aes256Gcm, Key, KeyInit};
pub use k256::AffinePoint;
use k256::{
    elliptic_curve::{group::GroupEncoding, Field},
    ProjectivePoint, Scalar,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

const KEY_DERIVATION_DOMAIN: &[u8] = b"ARM_DiscoveryEncryptionKey";

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct SecretKey(Scalar);

impl SecretKey {
    pub fn new(sk: Scalar) -> Self {
        SecretKey(sk)
    }

    pub fn random() -> Self {
        SecretKey(Scalar::random(&mut OsRng))
    }

    pub fn inner(&self) -> &Scalar {
        &self.0
    }

    pub fn public_key(&self) -> AffinePoint {
        generate_public_key(&self.0)
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// AES-256-GCM ciphertext under a key agreed with ECDH on secp256k1. The
/// sender's public key travels with the ciphertext.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ciphertext(Vec<u8>);

#[derive(Debug, Clone, Serialize, Deserialize)]
struct InnerCiphertext {
    cipher: Vec<u8>,
    // 96 bits, unique per message
    nonce: [u8; 12],
    sender_pk: AffinePoint,
}

impl Ciphertext {
    pub fn from_bytes(cipher: Vec<u8>) -> Self {
        Ciphertext(cipher)
    }

    pub fn from_words(words: &[u32]) -> Self {
        Ciphertext(words_to_bytes(words).to_vec())
    }

    pub fn inner(&self) -> &[u8] {
        &self.0
    }

    pub fn inner_mut(&mut self) -> &mut Vec<u8> {
        &mut self.0
    }

    pub fn as_words(&self) -> Vec<u32> {
        bytes_to_words(self.inner())
    }

    pub fn encrypt(
        message: &[u8],
        receiver_pk: &AffinePoint,
        sender_sk: &SecretKey,
        nonce: [u8; 12],
    ) -> Result<Self, ArmError> {
        let cipher = shared_cipher(receiver_pk, sender_sk.inner())
            .encrypt(&nonce.into(), message)
            .map_err(|_| ArmError::EncryptionFailed)?;

        let inner = InnerCiphertext {
            cipher,
            nonce,
            sender_pk: sender_sk.public_key(),
        };
        bincode::serialize(&inner)
            .map(Ciphertext)
            .map_err(|_| ArmError::EncryptionFailed)
    }

    /// Decrypts with the receiver's secret key. Any malformed or tampered
    /// ciphertext fails with [ArmError::DecryptionFailed].
    pub fn decrypt(&self, receiver_sk: &SecretKey) -> Result<Vec<u8>, ArmError> {
        let inner: InnerCiphertext =
            bincode::deserialize(self.inner()).map_err(|_| ArmError::DecryptionFailed)?;
        // words padding may leave trailing zero bytes, bincode ignores them
        shared_cipher(&inner.sender_pk, receiver_sk.inner())
            .decrypt(&inner.nonce.into(), inner.cipher.as_ref())
            .map_err(|_| ArmError::DecryptionFailed)
    }
}

fn shared_cipher(pk: &AffinePoint, sk: &Scalar) -> Aes256Gcm {
    let shared_point = ProjectivePoint::from(*pk) * sk;
    let mut bytes = KEY_DERIVATION_DOMAIN.to_vec();
    bytes.extend_from_slice(&shared_point.to_bytes());
    let key_digest = hash_bytes(&bytes);
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key_digest.as_bytes()))
}

pub fn generate_public_key(sk: &Scalar) -> AffinePoint {
    (ProjectivePoint::GENERATOR * sk).to_affine()
}

pub fn random_keypair() -> (SecretKey, AffinePoint) {
    let sk = SecretKey::random();
    let pk = sk.public_key();
    (sk, pk)
}
