use crate::hash::{hash_bytes, hash_two};
use lazy_static::lazy_static;
use rand::Rng;
use risc0_zkvm::sha::Digest;
use serde::{Deserialize, Serialize};

pub const COMMITMENT_TREE_DEPTH: usize = 32;

lazy_static! {
    /// Value of an unoccupied leaf, the hash of the empty string.
    pub static ref PADDING_LEAF: Digest = hash_bytes(&[]);
}

/// A hashable node within a Merkle tree.
pub trait Hashable: Clone + Copy {
    /// Returns the parent node within the tree of the two given nodes.
    fn combine(_: &Self, _: &Self) -> Self;

    /// Returns a blank leaf node.
    fn blank() -> Self;
}

impl Hashable for Digest {
    fn blank() -> Self {
        *PADDING_LEAF
    }

    fn combine(lhs: &Self, rhs: &Self) -> Self {
        hash_two(lhs, rhs)
    }
}

/// A path from a leaf to the root of a commitment tree. Each entry holds the
/// sibling node and whether that sibling sits on the left.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerklePath(Vec<(Digest, bool)>);

impl MerklePath {
    pub fn from_path(auth_path: Vec<(Digest, bool)>) -> Self {
        MerklePath(auth_path)
    }

    /// The path of a resource that is not in any tree (ephemeral resources).
    pub fn empty() -> Self {
        MerklePath(Vec::new())
    }

    /// A random path, only useful for testing.
    pub fn random(depth: usize) -> Self {
        let mut rng = rand::thread_rng();
        let auth_path = (0..depth)
            .map(|_| (Digest::from(rng.gen::<[u32; 8]>()), rng.gen()))
            .collect();
        MerklePath(auth_path)
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn auth_path(&self) -> &[(Digest, bool)] {
        &self.0
    }

    /// Returns the root of the tree corresponding to this path applied to `leaf`.
    pub fn root(&self, leaf: &Digest) -> Digest {
        self.0
            .iter()
            .fold(*leaf, |node, (sibling, sibling_is_left)| {
                if *sibling_is_left {
                    Digest::combine(sibling, &node)
                } else {
                    Digest::combine(&node, sibling)
                }
            })
    }
}
