use risc0_zkvm::Digest;
use serde::{Deserialize, Serialize};

/// Public output of a resource logic proof.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicInstance {
    /// Nullifier of a consumed resource, commitment of a created one.
    pub tag: Digest,
    pub is_consumed: bool,
    /// The commitment tree root of the compliance unit the resource belongs to.
    pub root: Digest,
    pub app_data: AppData,
}

/// Application data carried alongside a logic proof for off-chain delivery.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppData {
    pub resource_payload: Vec<ExpirableBlob>,
    pub discovery_payload: Vec<ExpirableBlob>,
    pub external_payload: Vec<ExpirableBlob>,
    pub application_payload: Vec<ExpirableBlob>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpirableBlob {
    pub blob: Vec<u32>,
    pub deletion_criterion: DeletionCriterion,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeletionCriterion {
    /// Deleted once the transaction has been executed.
    #[default]
    AfterTransaction,
    /// Kept forever.
    Never,
}

impl ExpirableBlob {
    pub fn new(blob: Vec<u32>, deletion_criterion: DeletionCriterion) -> Self {
        ExpirableBlob {
            blob,
            deletion_criterion,
        }
    }
}

impl AppData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_resource_payload(&mut self, blob: ExpirableBlob) {
        self.resource_payload.push(blob);
    }

    pub fn add_discovery_payload(&mut self, blob: ExpirableBlob) {
        self.discovery_payload.push(blob);
    }

    pub fn add_external_payload(&mut self, blob: ExpirableBlob) {
        self.external_payload.push(blob);
    }

    pub fn add_application_payload(&mut self, blob: ExpirableBlob) {
        self.application_payload.push(blob);
    }

    pub fn is_empty(&self) -> bool {
        self.resource_payload.is_empty()
            && self.discovery_payload.is_empty()
            && self.external_payload.is_empty()
            && self.application_payload.is_empty()
    }
}
