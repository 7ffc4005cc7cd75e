use serde::{Deserialize, Serialize};
use thiserror::Error;

use tessera_client::ClientError;
use tessera_crypto::MnemonicError;
use tessera_store::StoreError;
use tessera_store_lmdb::LmdbError;
use tessera_types::{OutputId, TokenId, TransactionId, TypesError};

use crate::keystore::KeystoreError;

/// Broad category of a [`WalletError`], stable across variants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// The caller asked for something invalid; nothing was changed.
    Input,
    /// The request conflicts with the wallet's current state.
    State,
    /// Key material is unavailable or a signer refused.
    Secret,
    /// The node could not be reached or answered with an error.
    Network,
    /// Local state could not be read, written or reconciled.
    Consistency,
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("output amount {amount} is below its minimum storage deposit {required}")]
    BelowMinimumStorageDeposit { amount: u64, required: u64 },

    #[error("insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("insufficient funds for remainder: {available} left, remainder needs {required}")]
    InsufficientFundsForRemainder { available: u64, required: u64 },

    #[error("no viable inputs: {needed} needed but only {spendable} is spendable now")]
    NoViableInputs { needed: u64, spendable: u64 },

    #[error("transaction would need {count} inputs, max {max}; consolidate outputs first")]
    TooManyInputs { count: usize, max: usize },

    #[error("too many native tokens in one output: {count}, max {max}")]
    TooManyNativeTokens { count: usize, max: usize },

    #[error("native token amount overflow")]
    NativeTokenOverflow,

    #[error("native token {token_id} unbalanced: need {needed}, have {available}")]
    UnbalancedNativeTokens {
        token_id: TokenId,
        needed: u128,
        available: u128,
    },

    #[error("invalid output: {0}")]
    InvalidOutput(String),

    #[error("missing parameter: {0}")]
    MissingParameter(&'static str),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("account alias already exists: {0}")]
    AccountAliasAlreadyExists(String),

    #[error("cannot remove account: {0}")]
    CannotRemoveAccount(String),

    #[error("wallet already holds accounts")]
    AccountsAlreadyExist,

    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("output not found: {0}")]
    OutputNotFound(OutputId),

    #[error("burning or melting failed: {0}")]
    BurningOrMeltingFailed(String),

    #[error("background syncing is already running")]
    BackgroundSyncAlreadyRunning,

    #[error("vault is locked: set the password first")]
    LockedVault,

    #[error("invalid mnemonic: {0}")]
    InvalidMnemonic(String),

    #[error("signing device did not answer within {0}s")]
    SigningTimeout(u64),

    #[error("signing rejected: {0}")]
    SigningRejected(String),

    #[error("invalid password")]
    InvalidPassword,

    #[error("secret manager error: {0}")]
    Secret(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("{0} timed out")]
    Timeout(String),

    #[error("consistency error: {0}")]
    Consistency(String),

    #[error("sync failed: {0}")]
    SyncFailed(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl WalletError {
    pub fn kind(&self) -> ErrorKind {
        use WalletError::*;
        match self {
            InvalidAddress(_)
            | BelowMinimumStorageDeposit { .. }
            | InsufficientFunds { .. }
            | InsufficientFundsForRemainder { .. }
            | NoViableInputs { .. }
            | TooManyInputs { .. }
            | TooManyNativeTokens { .. }
            | NativeTokenOverflow
            | UnbalancedNativeTokens { .. }
            | InvalidOutput(_)
            | MissingParameter(_)
            | InvalidCommand(_)
            | Config(_) => ErrorKind::Input,
            AccountNotFound(_)
            | AccountAliasAlreadyExists(_)
            | CannotRemoveAccount(_)
            | AccountsAlreadyExist
            | TransactionNotFound(_)
            | OutputNotFound(_)
            | BurningOrMeltingFailed(_)
            | BackgroundSyncAlreadyRunning => ErrorKind::State,
            LockedVault
            | InvalidMnemonic(_)
            | SigningTimeout(_)
            | SigningRejected(_)
            | InvalidPassword
            | Secret(_) => ErrorKind::Secret,
            Network(_) | Timeout(_) => ErrorKind::Network,
            Consistency(_) | SyncFailed(_) | Storage(_) | Io(_) | Serialization(_) => {
                ErrorKind::Consistency
            }
        }
    }

    /// Surface this error as the reason a sync cycle failed.
    pub(crate) fn into_sync_failure(self) -> Self {
        match self {
            WalletError::SyncFailed(_) => self,
            other => WalletError::SyncFailed(other.to_string()),
        }
    }
}

impl From<TypesError> for WalletError {
    fn from(e: TypesError) -> Self {
        match e {
            TypesError::InvalidAddress(msg) | TypesError::InvalidHrp(msg) => {
                WalletError::InvalidAddress(msg)
            }
            TypesError::InsufficientStorageDeposit { amount, required } => {
                WalletError::BelowMinimumStorageDeposit { amount, required }
            }
            TypesError::TooManyNativeTokens { count, max } => {
                WalletError::TooManyNativeTokens { count, max }
            }
            TypesError::NativeTokenOverflow => WalletError::NativeTokenOverflow,
            other => WalletError::InvalidOutput(other.to_string()),
        }
    }
}

impl From<StoreError> for WalletError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Inconsistent(msg) => WalletError::Consistency(msg),
            other => WalletError::Storage(other.to_string()),
        }
    }
}

impl From<LmdbError> for WalletError {
    fn from(e: LmdbError) -> Self {
        StoreError::from(e).into()
    }
}

impl From<ClientError> for WalletError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Timeout => WalletError::Timeout("node request".to_string()),
            other => WalletError::Network(other.to_string()),
        }
    }
}

impl From<MnemonicError> for WalletError {
    fn from(e: MnemonicError) -> Self {
        match e {
            MnemonicError::InvalidMnemonic(msg) => WalletError::InvalidMnemonic(msg),
            MnemonicError::DerivationFailed(msg) => WalletError::Secret(msg),
        }
    }
}

impl From<KeystoreError> for WalletError {
    fn from(e: KeystoreError) -> Self {
        match e {
            KeystoreError::Decryption => WalletError::InvalidPassword,
            KeystoreError::Io(e) => WalletError::Io(e),
            other => WalletError::Secret(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for WalletError {
    fn from(e: serde_json::Error) -> Self {
        WalletError::Serialization(e.to_string())
    }
}

impl From<tokio::task::JoinError> for WalletError {
    fn from(e: tokio::task::JoinError) -> Self {
        WalletError::Consistency(format!("background task failed: {e}"))
    }
}
