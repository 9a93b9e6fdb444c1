//! Read interface to the global commitment tree and an append-only
//! in-memory implementation of it.

use crate::{
    error::ArmError,
    merkle_path::{Hashable, MerklePath, COMMITMENT_TREE_DEPTH},
};
use risc0_zkvm::Digest;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// What transaction construction and validation need from the ledger.
pub trait CommitmentTreeView {
    /// The latest root.
    fn root(&self) -> Digest;

    /// Whether `root` is the current root or any root the tree ever had.
    fn is_known_root(&self, root: &Digest) -> bool;

    /// The membership path of a commitment against the latest root.
    fn path(&self, commitment: &Digest) -> Result<MerklePath, ArmError>;
}

/// An append-only sparse Merkle tree of resource commitments.
#[derive(Clone, Debug)]
pub struct CommitmentTree {
    depth: usize,
    // levels[0] are the leaves, levels[depth] holds at most the root
    levels: Vec<Vec<Digest>>,
    empty_subtrees: Vec<Digest>,
    leaf_index: HashMap<Digest, usize>,
    known_roots: HashSet<Digest>,
}

impl CommitmentTree {
    pub fn new() -> Self {
        Self::with_depth(COMMITMENT_TREE_DEPTH)
    }

    pub fn with_depth(depth: usize) -> Self {
        let mut empty_subtrees = Vec::with_capacity(depth + 1);
        empty_subtrees.push(Digest::blank());
        for level in 0..depth {
            let node = empty_subtrees[level];
            empty_subtrees.push(Digest::combine(&node, &node));
        }
        let mut known_roots = HashSet::new();
        known_roots.insert(empty_subtrees[depth]);

        CommitmentTree {
            depth,
            levels: vec![Vec::new(); depth + 1],
            empty_subtrees,
            leaf_index: HashMap::new(),
            known_roots,
        }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn len(&self) -> usize {
        self.levels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    /// Appends a commitment and returns its leaf index.
    pub fn append(&mut self, commitment: Digest) -> Result<usize, ArmError> {
        let index = self.len();
        if self.depth < usize::BITS as usize && index >= 1usize << self.depth {
            return Err(ArmError::CommitmentTreeFull);
        }
        self.levels[0].push(commitment);
        self.leaf_index.entry(commitment).or_insert(index);

        let mut node_index = index;
        for level in 0..self.depth {
            let left_index = node_index & !1;
            let left = self.levels[level][left_index];
            let right = self.node_or_empty(level, left_index + 1);
            let parent = Digest::combine(&left, &right);

            node_index >>= 1;
            let parents = &mut self.levels[level + 1];
            if node_index < parents.len() {
                parents[node_index] = parent;
            } else {
                parents.push(parent);
            }
        }

        self.known_roots.insert(self.root());
        Ok(index)
    }

    pub fn extend<I>(&mut self, commitments: I) -> Result<(), ArmError>
    where
        I: IntoIterator<Item = Digest>,
    {
        for cm in commitments {
            self.append(cm)?;
        }
        Ok(())
    }

    /// Freezes the current state into a cheaply cloneable, shareable view.
    pub fn snapshot(&self) -> CommitmentTreeSnapshot {
        CommitmentTreeSnapshot {
            tree: Arc::new(self.clone()),
        }
    }

    fn node_or_empty(&self, level: usize, index: usize) -> Digest {
        self.levels[level]
            .get(index)
            .copied()
            .unwrap_or(self.empty_subtrees[level])
    }
}

impl Default for CommitmentTree {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitmentTreeView for CommitmentTree {
    fn root(&self) -> Digest {
        self.node_or_empty(self.depth, 0)
    }

    fn is_known_root(&self, root: &Digest) -> bool {
        self.known_roots.contains(root)
    }

    fn path(&self, commitment: &Digest) -> Result<MerklePath, ArmError> {
        let mut index = *self
            .leaf_index
            .get(commitment)
            .ok_or(ArmError::CommitmentNotFound)?;

        let mut auth_path = Vec::with_capacity(self.depth);
        for level in 0..self.depth {
            let sibling = self.node_or_empty(level, index ^ 1);
            auth_path.push((sibling, index & 1 == 1));
            index >>= 1;
        }
        Ok(MerklePath::from_path(auth_path))
    }
}

/// An immutable view of a [CommitmentTree]. Snapshots can be shared across
/// threads to validate many transactions against the same state.
#[derive(Clone, Debug)]
pub struct CommitmentTreeSnapshot {
    tree: Arc<CommitmentTree>,
}

impl CommitmentTreeView for CommitmentTreeSnapshot {
    fn root(&self) -> Digest {
        self.tree.root()
    }

    fn is_known_root(&self, root: &Digest) -> bool {
        self.tree.is_known_root(root)
    }

    fn path(&self, commitment: &Digest) -> Result<MerklePath, ArmError> {
        self.tree.path(commitment)
    }
}
