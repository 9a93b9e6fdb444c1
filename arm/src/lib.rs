//! Transactions of the Anoma resource machine: resources, compliance and
//! logic proofs, actions, the delta (balance) proof and the aggregation of a
//! transaction's proofs into a single one.

pub mod action;
pub mod aggregation;
pub mod commitment_tree;
pub mod compliance;
pub mod compliance_unit;
pub mod config;
pub mod constants;
pub mod delta_proof;
pub mod encryption;
pub mod error;
pub mod hash;
pub mod logic_instance;
pub mod logic_proof;
pub mod merkle_path;
pub mod nullifier_key;
pub mod program;
pub mod proving_system;
pub mod resource;
pub mod resource_logic;
#[cfg(feature = "prove")]
pub mod risc0_prover;
pub mod test_logic;
pub mod transaction;
pub mod utils;

#[cfg(test)]
mod tests;
