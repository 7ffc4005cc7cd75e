//! The LMDB-backed [`WalletStore`].

use std::path::Path;

use tessera_store::{StoreError, SyncBatch, WalletStore};

use crate::environment::LmdbEnvironment;
use crate::integrity::check_integrity;
use crate::migration::Migrator;
use crate::LmdbError;

/// Databases in one wallet environment.
pub const MAX_DBS: u32 = 8;
/// Default LMDB map size: 1 GiB.
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

pub struct LmdbWalletStore {
    pub(crate) env: LmdbEnvironment,
}

impl LmdbWalletStore {
    /// Open the store at `path`, run migrations and verify integrity.
    pub fn open(path: &Path) -> Result<Self, LmdbError> {
        Self::open_with_map_size(path, DEFAULT_MAP_SIZE)
    }

    pub fn open_with_map_size(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        let env = LmdbEnvironment::open(path, MAX_DBS, map_size)?;
        let store = Self { env };
        Migrator::run(&store)?;

        let report = check_integrity(store.env.env())?;
        if !report.is_healthy() {
            tracing::warn!(errors = ?report.errors, "wallet database failed integrity check");
            return Err(LmdbError::Corruption(report.errors.join("; ")));
        }
        tracing::info!(
            path = %path.display(),
            databases = report.databases_checked,
            entries = report.total_entries,
            "opened wallet store"
        );
        Ok(store)
    }

    pub fn environment(&self) -> &LmdbEnvironment {
        &self.env
    }
}

impl WalletStore for LmdbWalletStore {
    fn apply_batch(&self, account: u32, batch: &SyncBatch) -> Result<(), StoreError> {
        let mut wb = self.env.write_batch()?;
        batch.validate(
            |id| wb.has_transaction(account, id).map_err(StoreError::from),
            |id| wb.is_unspent(account, id).map_err(StoreError::from),
        )?;
        wb.apply(account, batch)?;
        wb.commit()?;
        Ok(())
    }

    fn remove_account_data(&self, account: u32) -> Result<(), StoreError> {
        let mut wb = self.env.write_batch()?;
        wb.delete_account_data(account)?;
        wb.commit()?;
        tracing::info!(account, "removed account data");
        Ok(())
    }
}
