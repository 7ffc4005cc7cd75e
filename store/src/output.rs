//! Output records, filters and their storage trait.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tessera_types::{Address, Bip44, Output, OutputId, OutputKind, Timestamp, TransactionId};

use crate::StoreError;

/// An output known to an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub output_id: OutputId,
    pub output: Output,
    /// The account address the output was found on.
    pub address: Address,
    /// Derivation chain of `address`, absent for outputs owned through an alias or NFT.
    pub chain: Option<Bip44>,
    pub is_spent: bool,
    pub spent_by: Option<TransactionId>,
    /// Created by this wallet as change.
    pub remainder: bool,
    pub network_id: u64,
    pub booked_at: Timestamp,
}

impl OutputRecord {
    pub fn amount(&self) -> u64 {
        self.output.amount()
    }

    pub fn kind(&self) -> OutputKind {
        self.output.kind()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpentFilter {
    #[default]
    Unspent,
    Spent,
    All,
}

/// Selects outputs by partition, kind and id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFilter {
    pub spent: SpentFilter,
    pub kinds: Option<Vec<OutputKind>>,
    pub output_ids: Option<BTreeSet<OutputId>>,
}

impl OutputFilter {
    pub fn unspent() -> Self {
        Self::default()
    }

    pub fn spent() -> Self {
        Self {
            spent: SpentFilter::Spent,
            ..Self::default()
        }
    }

    pub fn all() -> Self {
        Self {
            spent: SpentFilter::All,
            ..Self::default()
        }
    }

    pub fn with_kinds(mut self, kinds: Vec<OutputKind>) -> Self {
        self.kinds = Some(kinds);
        self
    }

    pub fn with_ids(mut self, ids: impl IntoIterator<Item = OutputId>) -> Self {
        self.output_ids = Some(ids.into_iter().collect());
        self
    }

    pub fn includes_unspent(&self) -> bool {
        self.spent != SpentFilter::Spent
    }

    pub fn includes_spent(&self) -> bool {
        self.spent != SpentFilter::Unspent
    }

    pub fn matches(&self, record: &OutputRecord) -> bool {
        let partition = if record.is_spent {
            self.includes_spent()
        } else {
            self.includes_unspent()
        };
        partition
            && self.kinds.as_ref().map_or(true, |k| k.contains(&record.kind()))
            && self
                .output_ids
                .as_ref()
                .map_or(true, |ids| ids.contains(&record.output_id))
    }
}

pub trait OutputStore {
    /// Look an output up in either partition.
    fn get_output(&self, account: u32, output_id: &OutputId) -> Result<OutputRecord, StoreError>;

    /// Insert or replace an output by id.
    ///
    /// An output already in the spent partition stays spent: the call is a no-op.
    fn upsert_output(&self, account: u32, record: &OutputRecord) -> Result<(), StoreError>;

    /// Move an unspent output into the spent partition.
    ///
    /// Marking an already spent output is a no-op. An unknown id is `NotFound`.
    fn mark_output_spent(
        &self,
        account: u32,
        output_id: &OutputId,
        spent_by: TransactionId,
    ) -> Result<(), StoreError>;

    /// Matching outputs ordered by output id.
    fn get_outputs(&self, account: u32, filter: &OutputFilter) -> Result<Vec<OutputRecord>, StoreError>;
}
