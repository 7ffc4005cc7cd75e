//! The node API the wallet consumes, and the ledger-side records it returns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tessera_types::{
    Bech32Address, InclusionState, Output, OutputId, ProtocolParams, SignedTransaction, Timestamp,
    TransactionId,
};

use crate::ClientError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub name: String,
    pub version: String,
    pub is_healthy: bool,
    pub protocol: ProtocolParams,
}

/// An output as the ledger reports it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputWithMetadata {
    pub output_id: OutputId,
    pub output: Output,
    pub is_spent: bool,
    pub spent_by: Option<TransactionId>,
    pub booked_at: Timestamp,
}

/// What the ledger knows about a submitted transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerInclusionState {
    Pending,
    Included,
    Conflicting,
    /// The node has never seen the transaction, or has pruned it.
    Unknown,
}

impl LedgerInclusionState {
    /// The local state this ledger state maps to, if it settles anything.
    pub fn settled(self) -> Option<InclusionState> {
        match self {
            LedgerInclusionState::Included => Some(InclusionState::Confirmed),
            LedgerInclusionState::Conflicting => Some(InclusionState::Conflicting),
            LedgerInclusionState::Pending | LedgerInclusionState::Unknown => None,
        }
    }
}

#[async_trait]
pub trait NodeApi: Send + Sync {
    async fn get_info(&self) -> Result<NodeInfo, ClientError>;

    /// All outputs currently or formerly owned by `address`.
    async fn get_outputs_for_address(
        &self,
        address: &Bech32Address,
    ) -> Result<Vec<OutputWithMetadata>, ClientError>;

    async fn get_output(&self, output_id: &OutputId) -> Result<OutputWithMetadata, ClientError>;

    async fn submit_transaction(&self, transaction: &SignedTransaction) -> Result<TransactionId, ClientError>;

    async fn get_transaction_inclusion_state(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<LedgerInclusionState, ClientError>;

    async fn get_transaction(&self, transaction_id: &TransactionId) -> Result<SignedTransaction, ClientError>;

    /// Ask a faucet to fund `address`; returns the faucet's response body.
    async fn request_funds_from_faucet(
        &self,
        url: &str,
        address: &Bech32Address,
    ) -> Result<String, ClientError>;
}
