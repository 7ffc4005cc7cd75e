//! Inclusion state of wallet transactions.

use serde::{Deserialize, Serialize};

/// Where a transaction stands with respect to the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InclusionState {
    /// Submitted but not yet confirmed.
    Pending,
    /// Confirmed by the ledger; its inputs are spent.
    Confirmed,
    /// Rejected by the ledger, usually because an input was spent elsewhere.
    Conflicting,
}

impl InclusionState {
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}
