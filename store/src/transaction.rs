//! Transaction records, filters and their storage trait.

use serde::{Deserialize, Serialize};
use tessera_types::{InclusionState, OutputId, SignedTransaction, Timestamp, TransactionId};

use crate::StoreError;

/// A transaction an account sent or received.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub transaction_id: TransactionId,
    pub payload: SignedTransaction,
    pub inclusion_state: InclusionState,
    pub timestamp: Timestamp,
    pub incoming: bool,
    pub network_id: u64,
    pub broadcast_attempts: u32,
    pub last_broadcast: Option<Timestamp>,
}

impl TransactionRecord {
    pub fn inputs(&self) -> &[OutputId] {
        &self.payload.essence.inputs
    }

    pub fn is_pending(&self) -> bool {
        self.inclusion_state == InclusionState::Pending
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    pub inclusion_state: Option<InclusionState>,
    pub incoming: Option<bool>,
}

impl TransactionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn pending() -> Self {
        Self {
            inclusion_state: Some(InclusionState::Pending),
            incoming: None,
        }
    }

    pub fn incoming(mut self, incoming: bool) -> Self {
        self.incoming = Some(incoming);
        self
    }

    pub fn matches(&self, record: &TransactionRecord) -> bool {
        self.inclusion_state.map_or(true, |s| s == record.inclusion_state)
            && self.incoming.map_or(true, |i| i == record.incoming)
    }
}

pub trait TransactionStore {
    fn get_transaction(
        &self,
        account: u32,
        transaction_id: &TransactionId,
    ) -> Result<TransactionRecord, StoreError>;

    /// Insert or replace a transaction by id.
    fn append_transaction(&self, account: u32, record: &TransactionRecord) -> Result<(), StoreError>;

    /// Matching transactions ordered by timestamp, then id.
    fn get_transactions(
        &self,
        account: u32,
        filter: &TransactionFilter,
    ) -> Result<Vec<TransactionRecord>, StoreError>;

    fn transaction_exists(&self, account: u32, transaction_id: &TransactionId) -> Result<bool, StoreError> {
        match self.get_transaction(account, transaction_id) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}
