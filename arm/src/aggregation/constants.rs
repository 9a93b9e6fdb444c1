use crate::constants::builtin_image_id;
use lazy_static::lazy_static;
use risc0_zkvm::Digest;

lazy_static! {
    // Batch aggregation verification key / batch aggregation image id.
    pub static ref BATCH_AGGREGATION_VK: Digest = builtin_image_id("batch-aggregation-v1");

    // Sequential aggregation verification key / sequential aggregation image id.
    pub static ref SEQUENTIAL_AGGREGATION_VK: Digest =
        builtin_image_id("sequential-aggregation-v1");

    // Tree aggregation verification key / tree aggregation image id.
    pub static ref BTREE_AGGREGATION_VK: Digest = builtin_image_id("btree-aggregation-v1");
}
