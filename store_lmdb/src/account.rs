//! LMDB implementation of AccountStore.

use tessera_store::{AccountRecord, AccountStore, StoreError};

use crate::store::LmdbWalletStore;
use crate::{account_key, LmdbError};

impl AccountStore for LmdbWalletStore {
    fn put_account(&self, record: &AccountRecord) -> Result<(), StoreError> {
        let mut wb = self.env.write_batch()?;
        wb.put_account(record)?;
        wb.commit()?;
        Ok(())
    }

    fn get_account(&self, index: u32) -> Result<AccountRecord, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        let bytes = self
            .env
            .accounts_db
            .get(&rtxn, &account_key(index))
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("account {}", index)))?;
        Ok(bincode::deserialize(bytes).map_err(LmdbError::from)?)
    }

    fn account_exists(&self, index: u32) -> Result<bool, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        Ok(self
            .env
            .accounts_db
            .get(&rtxn, &account_key(index))
            .map_err(LmdbError::from)?
            .is_some())
    }

    fn iter_accounts(&self) -> Result<Vec<AccountRecord>, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        let mut accounts = Vec::new();
        for entry in self.env.accounts_db.iter(&rtxn).map_err(LmdbError::from)? {
            let (_, bytes) = entry.map_err(LmdbError::from)?;
            accounts.push(bincode::deserialize(bytes).map_err(LmdbError::from)?);
        }
        Ok(accounts)
    }

    fn account_count(&self) -> Result<u64, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        Ok(self.env.accounts_db.len(&rtxn).map_err(LmdbError::from)?)
    }
}
