//! Fundamental types for the Tessera wallet engine.
//!
//! This crate defines the ledger model shared across every other crate in the workspace:
//! identifiers, bech32 addresses, native tokens, unlock conditions, outputs,
//! transactions, keys, timestamps and protocol parameters.

pub mod address;
pub mod amount;
pub mod error;
pub mod feature;
pub mod ids;
pub mod keys;
pub mod output;
pub mod params;
pub mod state;
pub mod time;
pub mod transaction;
pub mod unlock;

pub use address::{Address, Bech32Address};
pub use amount::{NativeToken, NativeTokens, NativeTokensSum};
pub use error::TypesError;
pub use feature::Feature;
pub use ids::{AliasId, FoundryId, NftId, OutputId, TokenId, TransactionId};
pub use keys::{Bip44, KeyPair, PrivateKey, PublicKey, Signature};
pub use output::{
    AliasOutput, BasicOutput, FoundryOutput, NftOutput, Output, OutputKind, SimpleTokenScheme,
    TokenScheme,
};
pub use params::{ProtocolParams, RentStructure, INPUT_COUNT_MAX, OUTPUT_COUNT_MAX};
pub use state::InclusionState;
pub use time::{Clock, SystemClock, Timestamp};
pub use transaction::{
    InputSigningData, SignatureUnlock, SignedTransaction, TransactionEssence, Unlock,
};
pub use unlock::{UnlockCondition, UnlockConditions};
