//! Abstract storage traits for the Tessera wallet.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The wallet depends only on [`WalletStore`].
//!
//! Outputs live in two partitions per account: unspent and spent. A spent
//! output is retained forever and never moves back to the unspent partition.

pub mod account;
pub mod batch;
pub mod error;
pub mod meta;
pub mod output;
pub mod transaction;

pub use account::{AccountAddress, AccountRecord, AccountStore};
pub use batch::{SpentMark, SyncBatch};
pub use error::StoreError;
pub use meta::MetaStore;
pub use output::{OutputFilter, OutputRecord, OutputStore, SpentFilter};
pub use transaction::{TransactionFilter, TransactionRecord, TransactionStore};

/// The full storage surface a wallet needs, plus atomic multi-record writes.
pub trait WalletStore:
    AccountStore + OutputStore + TransactionStore + MetaStore + Send + Sync
{
    /// Apply every change in `batch` for `account` in one atomic write.
    ///
    /// Implementations must call [`SyncBatch::validate`] first and write
    /// nothing when it fails.
    fn apply_batch(&self, account: u32, batch: &SyncBatch) -> Result<(), StoreError>;

    /// Delete the account record together with all of its outputs and transactions.
    fn remove_account_data(&self, account: u32) -> Result<(), StoreError>;
}
