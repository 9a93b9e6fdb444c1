use crate::error::ArmError;
use serde::{de::DeserializeOwned, Serialize};

pub fn bytes_to_words(bytes: &[u8]) -> Vec<u32> {
    let mut words = Vec::with_capacity(bytes.len().div_ceil(4));
    let mut iter = bytes.chunks_exact(4);
    for chunk in iter.by_ref() {
        let mut word = [0u8; 4];
        word.copy_from_slice(chunk);
        words.push(u32::from_le_bytes(word));
    }

    let rem = iter.remainder();
    if !rem.is_empty() {
        let mut word = [0u8; 4];
        word[..rem.len()].copy_from_slice(rem);
        words.push(u32::from_le_bytes(word));
    }
    words
}

pub fn words_to_bytes(words: &[u32]) -> &[u8] {
    bytemuck::cast_slice(words)
}

/// Encodes a value with the zkVM word serializer.
pub fn to_words<T: Serialize>(value: &T) -> Result<Vec<u32>, ArmError> {
    risc0_zkvm::serde::to_vec(value).map_err(|_| ArmError::SerializationError)
}

/// Encodes a value as a journal, i.e. the little-endian bytes of its words.
pub fn to_journal<T: Serialize>(value: &T) -> Result<Vec<u8>, ArmError> {
    Ok(words_to_bytes(&to_words(value)?).to_vec())
}

/// Decodes a journal into the public instance it commits to.
pub fn journal_to_instance<T: DeserializeOwned>(journal: &[u8]) -> Result<T, ArmError> {
    if journal.len() % 4 != 0 {
        return Err(ArmError::JournalDecodingError);
    }
    risc0_zkvm::serde::from_slice::<T, u32>(&bytes_to_words(journal))
        .map_err(|_| ArmError::JournalDecodingError)
}

#[cfg(test)]
mod tests {
    use super::*;
    use risc0_zkvm::Digest;

    #[test]
    fn test_bytes_to_words() {
        let bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07];
        let words = bytes_to_words(&bytes);
        let expected_bytes = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x00];
        assert_eq!(expected_bytes, words_to_bytes(&words));
    }

    #[test]
    fn test_words_to_bytes() {
        let words = vec![0x01020304, 0x05060708];
        let bytes = words_to_bytes(&words);
        assert_eq!(words, bytes_to_words(bytes));
    }

    #[test]
    fn test_journal_decoding() {
        let value = (Digest::from([7u32; 8]), true, 42u64);
        let journal = to_journal(&value).unwrap();
        let decoded: (Digest, bool, u64) = journal_to_instance(&journal).unwrap();
        assert_eq!(value, decoded);

        assert_eq!(
            journal_to_instance::<(Digest, bool, u64)>(&journal[1..]),
            Err(ArmError::JournalDecodingError)
        );
    }
}
