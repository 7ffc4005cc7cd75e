//! LMDB storage backend for the Tessera wallet.
//!
//! Implements every storage trait from `tessera-store` on top of the `heed`
//! LMDB bindings. All data lives in a single environment with one database
//! per partition; per-account keys are prefixed with the big-endian account
//! index so one account's records are contiguous.

pub mod account;
pub mod environment;
pub mod error;
pub mod integrity;
pub mod meta;
pub mod migration;
pub mod output;
pub mod store;
pub mod transaction;
pub mod write_batch;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use store::LmdbWalletStore;
pub use write_batch::WriteBatch;

/// Key of an account record.
pub(crate) fn account_key(account: u32) -> [u8; 4] {
    account.to_be_bytes()
}

/// Key of a per-account record: account index followed by the record id.
pub(crate) fn scoped_key(account: u32, id: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + id.len());
    key.extend_from_slice(&account.to_be_bytes());
    key.extend_from_slice(id);
    key
}
