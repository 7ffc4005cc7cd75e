//! The unit of atomic change produced by one sync or send.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tessera_types::{InclusionState, OutputId, TransactionId};

use crate::{AccountRecord, OutputRecord, StoreError, TransactionRecord};

/// Marks `output_id` as consumed by `spent_by`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpentMark {
    pub output_id: OutputId,
    pub spent_by: TransactionId,
}

/// All changes for one account, applied all-or-nothing.
///
/// Apply order is fixed: account record, output upserts, spent marks, then
/// transactions. A spent mark may therefore target an output upserted in the
/// same batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncBatch {
    pub account: Option<AccountRecord>,
    pub upsert_outputs: Vec<OutputRecord>,
    pub spent_outputs: Vec<SpentMark>,
    pub transactions: Vec<TransactionRecord>,
}

impl SyncBatch {
    pub fn is_empty(&self) -> bool {
        self.account.is_none()
            && self.upsert_outputs.is_empty()
            && self.spent_outputs.is_empty()
            && self.transactions.is_empty()
    }

    /// Reject batches that would leave a spent mark without its consuming
    /// transaction, or a confirmed transaction whose owned inputs stay unspent.
    ///
    /// `known_tx` reports transactions already stored. `is_unspent_owned`
    /// reports outputs of this account that currently sit in the unspent partition.
    pub fn validate(
        &self,
        known_tx: impl Fn(&TransactionId) -> Result<bool, StoreError>,
        is_unspent_owned: impl Fn(&OutputId) -> Result<bool, StoreError>,
    ) -> Result<(), StoreError> {
        let batched: HashSet<TransactionId> =
            self.transactions.iter().map(|t| t.transaction_id).collect();

        for mark in &self.spent_outputs {
            if !batched.contains(&mark.spent_by) && !known_tx(&mark.spent_by)? {
                return Err(StoreError::Inconsistent(format!(
                    "output {} marked spent by unrecorded transaction {}",
                    mark.output_id, mark.spent_by
                )));
            }
        }

        let marked: HashSet<OutputId> = self.spent_outputs.iter().map(|m| m.output_id).collect();
        let upserted_spent: HashSet<OutputId> = self
            .upsert_outputs
            .iter()
            .filter(|o| o.is_spent)
            .map(|o| o.output_id)
            .collect();
        for tx in self
            .transactions
            .iter()
            .filter(|t| !t.incoming && t.inclusion_state == InclusionState::Confirmed)
        {
            for input in tx.inputs() {
                if marked.contains(input) || upserted_spent.contains(input) {
                    continue;
                }
                if is_unspent_owned(input)? {
                    return Err(StoreError::Inconsistent(format!(
                        "confirmed transaction {} leaves input {} unspent",
                        tx.transaction_id, input
                    )));
                }
            }
        }
        Ok(())
    }
}
