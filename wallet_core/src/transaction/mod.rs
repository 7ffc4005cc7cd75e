//! Building, signing and submitting transactions.
//!
//! Every high-level operation (send, mint, burn, claim, sweep, consolidate)
//! reduces to a list of outputs plus [`TransactionOptions`] and goes through
//! the same three steps, each of which is also exposed on its own for offline signing:
//!
//! 1. [`Account::prepare_transaction`](crate::Account::prepare_transaction)
//!    selects inputs and produces [`PreparedTransactionData`].
//! 2. [`Account::sign_transaction_essence`](crate::Account::sign_transaction_essence)
//!    asks the secret manager for unlocks.
//! 3. [`Account::submit_and_store_transaction`](crate::Account::submit_and_store_transaction)
//!    verifies, submits and records the pending transaction.

pub mod burn;
pub mod claim;
pub mod consolidation;
pub mod mint;
pub mod prepare;
pub mod send;
pub mod submit;
pub mod sweep;

use serde::{Deserialize, Serialize};
use tessera_types::{
    Address, Bech32Address, Bip44, InputSigningData, OutputId, TokenId, TransactionEssence,
};

pub use claim::ClaimableOutput;
pub use mint::{CreateAliasParams, MintNativeTokenParams, MintNftParams, MintTokenTransaction};
pub use send::{SendAmountParams, SendNativeTokensParams, SendNftParams};
pub use submit::{verify_unlocks, SignedTransactionData};

/// Where change goes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", content = "address")]
pub enum RemainderStrategy {
    /// The account's first public address.
    #[default]
    ReuseFirstAddress,
    /// A freshly derived internal address.
    ChangeAddress,
    Custom(Bech32Address),
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionOptions {
    /// Overrides the configured strategy.
    pub remainder_strategy: Option<RemainderStrategy>,
    pub tag: Option<Vec<u8>>,
    /// Use exactly these inputs instead of selecting.
    pub custom_inputs: Option<Vec<OutputId>>,
    /// Always consume these, selecting more as needed.
    pub mandatory_inputs: Option<Vec<OutputId>>,
    /// Allow alias and NFT inputs to be consumed without a successor.
    pub allow_burning: bool,
    /// Native tokens to destroy along the way.
    pub burn_native_tokens: Vec<(TokenId, u128)>,
}

impl TransactionOptions {
    pub(crate) fn with_mandatory_inputs(mut self, ids: impl IntoIterator<Item = OutputId>) -> Self {
        self.mandatory_inputs.get_or_insert_with(Vec::new).extend(ids);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemainderData {
    pub output_index: usize,
    pub address: Address,
    /// Set when the remainder goes to one of the account's own addresses.
    pub chain: Option<Bip44>,
}

/// An unsigned transaction together with everything needed to sign it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedTransactionData {
    pub essence: TransactionEssence,
    pub inputs_data: Vec<InputSigningData>,
    pub remainder: Option<RemainderData>,
}
