use crate::proving_system::ProofType;
use risc0_zkvm::Digest;
use std::fmt;
use thiserror::Error;

/// The stage of transaction verification that rejected a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStage {
    LogicProofs,
    ComplianceProofs,
    ActionConsistency,
    NullifierUniqueness,
    DeltaProof,
    AggregationProof,
}

impl fmt::Display for VerificationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VerificationStage::LogicProofs => "logic proofs",
            VerificationStage::ComplianceProofs => "compliance proofs",
            VerificationStage::ActionConsistency => "action consistency",
            VerificationStage::NullifierUniqueness => "nullifier uniqueness",
            VerificationStage::DeltaProof => "delta proof",
            VerificationStage::AggregationProof => "aggregation proof",
        };
        f.write_str(name)
    }
}

/// Coarse classification of [ArmError]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    ProofGenerationFailure,
    VerificationFailure,
    DoubleSpend,
    BalanceMismatch,
    LogicComplianceMismatch,
    IncompatibleProofType,
    AlreadyAggregated,
    EmptyAggregationSet,
    DecryptionFailure,
    /// Malformed input, keys or encodings.
    Malformed,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ArmError {
    #[error("Invalid resource kind")]
    InvalidResourceKind,
    #[error("Invalid resource serialization")]
    InvalidResourceSerialization,
    #[error("Invalid resource deserialization")]
    InvalidResourceDeserialization,
    #[error("Invalid nullifier key")]
    InvalidNullifierKey,
    #[error("Invalid nullifier commitment")]
    InvalidNullifierCommitment,
    #[error("Invalid resource nonce")]
    InvalidResourceNonce,
    #[error("Merkle path of depth {0}, the commitment tree has depth {1}")]
    InvalidMerklePathDepth(usize, usize),
    #[error("Invalid resource index")]
    InvalidResourceIndex,
    #[error("Invalid delta")]
    InvalidDelta,
    #[error("Invalid Random Commitment Value")]
    InvalidRcv,
    #[error("Invalid signing key")]
    InvalidSigningKey,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Serialization error")]
    SerializationError,
    #[error("Deserialization error")]
    DeserializationError,
    #[error("Journal decode error")]
    JournalDecodingError,
    #[error("Inner receipt deserialization error")]
    InnerReceiptDeserializationError,
    #[error("Failed to write witness")]
    WriteWitnessFailed,
    #[error("Failed to read witness")]
    ReadWitnessFailed,
    #[error("Failed to build prover environment")]
    BuildProverEnvFailed,
    #[error("Program {0} has no proving key")]
    MissingProvingKey(Digest),
    #[error("Unknown program {0}")]
    UnknownProgram(Digest),
    #[error("Missing field: {0}")]
    MissingField(&'static str),
    #[error("Failed to generate proof with error: {0}")]
    ProveFailed(String),
    #[error("Invalid proof: {0}")]
    InvalidProof(String),
    #[error("Proof verification failed at {stage}: {reason}")]
    ProofVerificationFailed {
        stage: VerificationStage,
        reason: String,
    },
    #[error("Logic proofs do not match compliance units: {0}")]
    LogicComplianceMismatch(String),
    #[error("Nullifier {0} is spent more than once")]
    DoubleSpend(Digest),
    #[error("Balance mismatch: {0}")]
    BalanceMismatch(String),
    #[error("Expected delta proof, but found witness")]
    ExpectedDeltaProof,
    #[error("Expected delta witness, but found proof")]
    ExpectedDeltaWitness,
    #[error("Delta proof generation failed")]
    DeltaProofGenerationFailed,
    #[error("Commitment not found in the commitment tree")]
    CommitmentNotFound,
    #[error("Commitment tree is full")]
    CommitmentTreeFull,
    #[error("Unknown commitment tree root {0}")]
    UnknownCommitmentTreeRoot(Digest),
    #[error("Proof type {0:?} cannot be aggregated")]
    IncompatibleProofType(ProofType),
    #[error("Transaction is already aggregated")]
    AlreadyAggregated,
    #[error("Nothing to aggregate")]
    EmptyAggregationSet,
    #[error("Missing aggregation proof")]
    MissingAggregationProof,
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed")]
    DecryptionFailed,
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ArmError {
    /// Maps the error onto the failure taxonomy callers branch on.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ArmError::ProveFailed(_)
            | ArmError::WriteWitnessFailed
            | ArmError::ReadWitnessFailed
            | ArmError::BuildProverEnvFailed
            | ArmError::MissingProvingKey(_)
            | ArmError::UnknownProgram(_)
            | ArmError::DeltaProofGenerationFailed => ErrorKind::ProofGenerationFailure,
            ArmError::InvalidProof(_)
            | ArmError::ProofVerificationFailed { .. }
            | ArmError::MissingAggregationProof
            | ArmError::UnknownCommitmentTreeRoot(_) => ErrorKind::VerificationFailure,
            ArmError::DoubleSpend(_) => ErrorKind::DoubleSpend,
            ArmError::BalanceMismatch(_) => ErrorKind::BalanceMismatch,
            ArmError::LogicComplianceMismatch(_) => ErrorKind::LogicComplianceMismatch,
            ArmError::IncompatibleProofType(_) => ErrorKind::IncompatibleProofType,
            ArmError::AlreadyAggregated => ErrorKind::AlreadyAggregated,
            ArmError::EmptyAggregationSet => ErrorKind::EmptyAggregationSet,
            ArmError::DecryptionFailed => ErrorKind::DecryptionFailure,
            _ => ErrorKind::Malformed,
        }
    }

    /// Returns the verification stage that produced this error, if any.
    pub fn stage(&self) -> Option<VerificationStage> {
        match self {
            ArmError::ProofVerificationFailed { stage, .. } => Some(*stage),
            ArmError::LogicComplianceMismatch(_) => Some(VerificationStage::ActionConsistency),
            ArmError::DoubleSpend(_) => Some(VerificationStage::NullifierUniqueness),
            ArmError::BalanceMismatch(_) => Some(VerificationStage::DeltaProof),
            ArmError::MissingAggregationProof => Some(VerificationStage::AggregationProof),
            _ => None,
        }
    }

    pub(crate) fn at_stage(stage: VerificationStage) -> impl FnOnce(ArmError) -> ArmError {
        move |err| match err {
            ArmError::ProofVerificationFailed { .. } => err,
            other => ArmError::ProofVerificationFailed {
                stage,
                reason: other.to_string(),
            },
        }
    }
}
