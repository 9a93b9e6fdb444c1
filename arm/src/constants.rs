use crate::hash::hash_many;
use lazy_static::lazy_static;
use risc0_zkvm::Digest;

const IMAGE_ID_DOMAIN: &[u8] = b"ARM_ProgramImageId";

/// Image id of a built-in program, derived from its name and version.
pub(crate) fn builtin_image_id(name: &str) -> Digest {
    hash_many(&[IMAGE_ID_DOMAIN, name.as_bytes()])
}

lazy_static! {
    // compliance verification key / compliance image id
    pub static ref COMPLIANCE_VK: Digest = builtin_image_id("compliance-v1");

    // padding logic verification key / padding logic image id
    pub static ref PADDING_LOGIC_VK: Digest = builtin_image_id("padding-logic-v1");

    // test logic verification key / test logic image id
    pub static ref TEST_LOGIC_VK: Digest = builtin_image_id("test-logic-v1");
}
