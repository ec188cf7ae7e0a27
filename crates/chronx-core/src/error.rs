use thiserror::Error;

/// Error kinds produced by the ledger, state machine, mempool, validator
/// pool, reward router, and block producer. Variant names correspond to the
/// error *kinds*, not to the component that raised them — the same
/// `InvalidNonce` can come from a mempool dry-run or a block application.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChronxError {
    #[error("invalid structure: {0}")]
    InvalidStructure(String),

    #[error("invalid signature for {subject}")]
    InvalidSignature { subject: String },

    #[error("invalid nonce for {address}: expected {expected}, got {got}")]
    InvalidNonce {
        address: String,
        expected: u64,
        got: u64,
    },

    #[error("insufficient balance for {address}: need {need}, have {have}")]
    InsufficientBalance {
        address: String,
        need: u128,
        have: u128,
    },

    #[error("invalid fee for tx {tx_id}: {reason}")]
    InvalidFee { tx_id: String, reason: String },

    #[error("duplicate transaction: {0}")]
    Duplicate(String),

    #[error("transaction {0} has expired")]
    Expired(String),

    #[error("chain link error: {0}")]
    ChainLinkError(String),

    #[error("quorum shortfall: block at height {height} committed with {got} of {wanted} witness signatures")]
    QuorumShortfall { height: u64, got: usize, wanted: usize },

    #[error("double-sign detected for validator {validator_id} at height {height}")]
    DoubleSign { validator_id: String, height: u64 },

    #[error("reorg invalid: {0}")]
    ReorgInvalid(String),

    #[error("genesis mismatch: expected hash {expected}, found {found}")]
    GenesisMismatch { expected: String, found: String },

    #[error("unknown validator: {0}")]
    UnknownValidator(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("{0}")]
    Other(String),
}

pub type ChronxResult<T> = Result<T, ChronxError>;
