//! Metadata storage trait.

use crate::StoreError;

/// Meta key holding the serialized wallet configuration.
pub const WALLET_CONFIG_KEY: &str = "wallet_config";
/// Meta key holding the kind of secret manager the wallet was created with.
pub const SECRET_MANAGER_KIND_KEY: &str = "secret_manager_kind";

/// Wallet-level key-value metadata that belongs to no single account.
pub trait MetaStore {
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    fn delete_meta(&self, key: &str) -> Result<(), StoreError>;

    /// The stored schema version, or 0 for a fresh database.
    fn get_schema_version(&self) -> Result<u32, StoreError>;

    fn set_schema_version(&self, version: u32) -> Result<(), StoreError>;

    /// Like [`MetaStore::get_meta`] but maps a missing key to `None`.
    fn try_get_meta(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match self.get_meta(key) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }
}
