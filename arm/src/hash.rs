//! Domain-separated hashing used by the resource model, the commitment tree
//! and the aggregation transcripts.

use risc0_zkvm::sha::{Impl, Sha256, DIGEST_BYTES, DIGEST_WORDS};
use risc0_zkvm::Digest;

use crate::utils::words_to_bytes;

pub fn hash_bytes(bytes: &[u8]) -> Digest {
    *Impl::hash_bytes(bytes)
}

/// Order-sensitive hash of two digests.
pub fn hash_two(left: &Digest, right: &Digest) -> Digest {
    let mut words = Vec::with_capacity(2 * DIGEST_WORDS);
    words.extend_from_slice(left.as_words());
    words.extend_from_slice(right.as_words());
    *Impl::hash_words(&words)
}

/// Hashes a list of byte strings. Every item is length-prefixed so that
/// different splits of the same bytes never collide.
pub fn hash_many(items: &[&[u8]]) -> Digest {
    let total: usize = items.iter().map(|item| 8 + item.len()).sum();
    let mut bytes = Vec::with_capacity(total);
    for item in items {
        bytes.extend_from_slice(&(item.len() as u64).to_le_bytes());
        bytes.extend_from_slice(item);
    }
    hash_bytes(&bytes)
}

const STEP_BASE_DOMAIN: &[u8] = b"ARM_AGGREGATION_STEP_BASE";
const STEP_CHAIN_DOMAIN: &[u8] = b"ARM_AGGREGATION_STEP_CHAIN";
const STEP_MERGE_DOMAIN: &[u8] = b"ARM_AGGREGATION_STEP_MERGE";

/// Commits a single step instance: `H(base || program || output)`.
pub fn commit_step(program: &Digest, step_output: &[u32]) -> Digest {
    sha_digest(STEP_BASE_DOMAIN, &[], program, words_to_bytes(step_output))
}

/// Folds a step instance into a running hash:
/// `H(chain || prev || program || output)`.
pub fn chain_step(prev: &Digest, program: &Digest, step_output: &[u32]) -> Digest {
    sha_digest(
        STEP_CHAIN_DOMAIN,
        &flatten_prev_hashes(&[*prev]),
        program,
        words_to_bytes(step_output),
    )
}

/// Merges the running hashes of two sibling subtrees: `H(merge || left || right)`.
pub fn merge_running_hashes(left: &Digest, right: &Digest) -> Digest {
    let mut bytes = STEP_MERGE_DOMAIN.to_vec();
    bytes.extend_from_slice(&flatten_prev_hashes(&[*left, *right]));
    hash_bytes(&bytes)
}

fn sha_digest(domain: &[u8], prev_hashes: &[u8], program: &Digest, tip: &[u8]) -> Digest {
    let mut bytes =
        Vec::with_capacity(domain.len() + prev_hashes.len() + DIGEST_BYTES + tip.len());
    bytes.extend_from_slice(domain);
    bytes.extend_from_slice(prev_hashes);
    bytes.extend_from_slice(program.as_bytes());
    bytes.extend_from_slice(tip);

    hash_bytes(&bytes)
}

fn flatten_prev_hashes(prev_hashes: &[Digest]) -> Vec<u8> {
    let mut prev_hashes_bytes = vec![0u8; DIGEST_BYTES * prev_hashes.len()];
    let mut offset: usize = 0;
    for h in prev_hashes {
        prev_hashes_bytes[offset..offset + DIGEST_BYTES].clone_from_slice(h.as_bytes());
        offset += DIGEST_BYTES;
    }

    prev_hashes_bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_two_is_order_sensitive() {
        let a = hash_bytes(b"a");
        let b = hash_bytes(b"b");
        assert_ne!(hash_two(&a, &b), hash_two(&b, &a));
        assert_ne!(merge_running_hashes(&a, &b), merge_running_hashes(&b, &a));
    }

    #[test]
    fn test_hash_many_is_prefix_free() {
        assert_ne!(hash_many(&[b"ab", b"c"]), hash_many(&[b"a", b"bc"]));
        assert_eq!(hash_many(&[b"ab", b"c"]), hash_many(&[b"ab", b"c"]));
    }

    #[test]
    fn test_chain_differs_from_base() {
        let program = hash_bytes(b"program");
        let output = [1u32, 2, 3];
        let base = commit_step(&program, &output);
        assert_ne!(base, chain_step(&base, &program, &output));
        assert_ne!(chain_step(&base, &program, &output), chain_step(&base, &program, &[1, 2]));
    }

    #[test]
    fn test_merge_differs_from_base_of_same_bytes() {
        let left = hash_bytes(b"left");
        let right = hash_bytes(b"right");
        // a base step over an 8-word output has the byte layout of a merge
        assert_ne!(
            merge_running_hashes(&left, &right),
            commit_step(&left, right.as_words())
        );
        let prev = hash_bytes(b"prev");
        assert_ne!(
            chain_step(&prev, &left, right.as_words()),
            commit_step(&prev, &[left.as_words(), right.as_words()].concat())
        );
    }
}
