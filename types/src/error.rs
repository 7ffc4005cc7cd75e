//! Error type for constructing and validating model types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid bech32 human readable part: {0}")]
    InvalidHrp(String),

    #[error("invalid output id: {0}")]
    InvalidOutputId(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("insufficient storage deposit: amount {amount}, required {required}")]
    InsufficientStorageDeposit { amount: u64, required: u64 },

    #[error("storage deposit return of {deposit} exceeds output amount {amount}")]
    StorageDepositReturnExceedsAmount { deposit: u64, amount: u64 },

    #[error("too many native tokens in one output: {count}, max {max}")]
    TooManyNativeTokens { count: usize, max: usize },

    #[error("native token amount overflow")]
    NativeTokenOverflow,

    #[error("native token amount must not be zero")]
    ZeroNativeTokenAmount,

    #[error("duplicate unlock condition: {0}")]
    DuplicateUnlockCondition(&'static str),

    #[error("missing unlock condition: {0}")]
    MissingUnlockCondition(&'static str),

    #[error("unlock condition {0} is not allowed on this output kind")]
    ForbiddenUnlockCondition(&'static str),

    #[error("invalid token scheme: {0}")]
    InvalidTokenScheme(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<bincode::Error> for TypesError {
    fn from(e: bincode::Error) -> Self {
        TypesError::Serialization(e.to_string())
    }
}
