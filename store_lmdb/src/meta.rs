//! LMDB implementation of MetaStore.

use tessera_store::{MetaStore, StoreError};

use crate::store::LmdbWalletStore;
use crate::LmdbError;

const SCHEMA_VERSION_KEY: &[u8] = b"schema_version";

impl MetaStore for LmdbWalletStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut wb = self.env.write_batch()?;
        wb.put_meta(key, value)?;
        wb.commit()?;
        Ok(())
    }

    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        let val = self
            .env
            .meta_db
            .get(&rtxn, key.as_bytes())
            .map_err(LmdbError::from)?
            .ok_or_else(|| LmdbError::NotFound(format!("meta key '{}'", key)))?;
        Ok(val.to_vec())
    }

    fn delete_meta(&self, key: &str) -> Result<(), StoreError> {
        let mut wb = self.env.write_batch()?;
        wb.delete_meta(key)?;
        wb.commit()?;
        Ok(())
    }

    fn get_schema_version(&self) -> Result<u32, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        match self
            .env
            .meta_db
            .get(&rtxn, SCHEMA_VERSION_KEY)
            .map_err(LmdbError::from)?
        {
            Some(bytes) => {
                let arr: [u8; 4] = bytes.try_into().map_err(|_| {
                    LmdbError::Serialization("schema_version has unexpected byte length".to_string())
                })?;
                Ok(u32::from_le_bytes(arr))
            }
            None => Ok(0),
        }
    }

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError> {
        let mut wb = self.env.write_batch()?;
        wb.put_meta("schema_version", &version.to_le_bytes())?;
        wb.commit()?;
        Ok(())
    }
}
