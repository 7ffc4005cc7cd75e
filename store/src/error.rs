use thiserror::Error;

/// Failures surfaced by any wallet store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found in wallet store: {0}")]
    NotFound(String),

    #[error("store backend failure: {0}")]
    Backend(String),

    #[error("record encoding failed: {0}")]
    Serialization(String),

    #[error("wallet store is corrupted: {0}")]
    Corruption(String),

    /// A sync batch or write that would break account/output/transaction
    /// consistency. Nothing from it was applied.
    #[error("inconsistent write rejected: {0}")]
    Inconsistent(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}
