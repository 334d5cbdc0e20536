use thiserror::Error;

/// Why a single block was refused against its predecessor. Variants follow
/// the order in which the checks run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid structure: {0}")]
    Structure(&'static str),

    #[error("invalid index: expected {expected}, got {got}")]
    Index { expected: u64, got: u64 },

    #[error("invalid previous hash: expected {expected}, got {got}")]
    Linkage { expected: String, got: String },

    #[error("invalid hash: computed {computed}, block claims {claimed}")]
    HashMismatch { computed: String, claimed: String },

    #[error("invalid timestamp {timestamp} (previous {previous}, now {now})")]
    Timestamp {
        timestamp: u64,
        previous: u64,
        now: u64,
    },

    #[error("difficulty not satisfied: need {difficulty} leading zero bits, hash has {zeros}")]
    ProofOfWork { difficulty: u32, zeros: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainValidationError {
    #[error("chain is empty")]
    Empty,

    #[error("genesis block does not match the canonical genesis")]
    GenesisMismatch,

    #[error("block {index} is invalid: {source}")]
    Block {
        index: u64,
        #[source]
        source: ValidationError,
    },
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("block rejected: {0}")]
    Rejected(#[from] ValidationError),

    #[error("candidate chain rejected: {0}")]
    InvalidChain(#[from] ChainValidationError),

    #[error("candidate chain of length {candidate} is not longer than current length {current}")]
    NotLonger { candidate: usize, current: usize },

    #[error("chain head moved while the block was being mined")]
    StaleHead,

    #[error("mining aborted because the chain head changed")]
    MiningAborted,

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
