use crate::{
    error::ArmError,
    logic_instance::{AppData, LogicInstance},
    merkle_path::MerklePath,
    nullifier_key::NullifierKey,
    resource::Resource,
};
use risc0_zkvm::Digest;
use serde::{de::DeserializeOwned, Serialize};

/// This is a trait for logic constraints implementation.
pub trait LogicCircuit: Default + Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    // In general, it's implemented as `Self::default()`
    fn default_witness() -> Self {
        Self::default()
    }

    // Logic constraints implementation
    fn constrain(&self) -> Result<LogicInstance, ArmError>;
}

/// Computes the tag of a resource and the commitment tree root its logic
/// instance is bound to. A consumed persistent resource proves membership
/// with `merkle_path`, every other resource uses the given `root`.
pub fn resource_tag_and_root(
    resource: &Resource,
    is_consumed: bool,
    nf_key: &NullifierKey,
    merkle_path: &MerklePath,
    root: Digest,
) -> Result<(Digest, Digest), ArmError> {
    let cm = resource.commitment();
    if is_consumed {
        let nf = resource.nullifier_from_commitment(nf_key, &cm)?;
        let root = if resource.is_ephemeral {
            root
        } else {
            merkle_path.root(&cm)
        };
        Ok((nf, root))
    } else {
        Ok((cm, root))
    }
}

/// Logic of padding resources: ephemeral and of zero quantity.
#[derive(Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct TrivialLogicWitness {
    pub resource: Resource,
    pub is_consumed: bool,
    pub nf_key: NullifierKey,
    pub root: Digest,
}

impl LogicCircuit for TrivialLogicWitness {
    fn constrain(&self) -> Result<LogicInstance, ArmError> {
        if self.resource.quantity != 0 || !self.resource.is_ephemeral {
            return Err(ArmError::ProveFailed(
                "padding resources must be ephemeral with zero quantity".into(),
            ));
        }
        let (tag, root) = resource_tag_and_root(
            &self.resource,
            self.is_consumed,
            &self.nf_key,
            &MerklePath::empty(),
            self.root,
        )?;

        Ok(LogicInstance {
            tag,
            is_consumed: self.is_consumed,
            root,
            app_data: AppData::default(),
        })
    }
}

impl TrivialLogicWitness {
    pub fn new(resource: Resource, root: Digest, nf_key: NullifierKey, is_consumed: bool) -> Self {
        Self {
            resource,
            is_consumed,
            nf_key,
            root,
        }
    }
}
