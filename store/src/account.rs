//! Account records and their storage trait.

use serde::{Deserialize, Serialize};
use tessera_types::{Address, Bech32Address, Bip44, Timestamp};

use crate::StoreError;

/// One derived address of an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountAddress {
    pub address: Bech32Address,
    pub key_index: u32,
    pub internal: bool,
    /// Set once any output has ever been seen on the address.
    pub used: bool,
}

/// Persisted per-account state, excluding outputs and transactions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub index: u32,
    pub alias: String,
    pub coin_type: u32,
    pub public_addresses: Vec<AccountAddress>,
    pub internal_addresses: Vec<AccountAddress>,
    pub last_synced: Option<Timestamp>,
}

impl AccountRecord {
    pub fn new(index: u32, alias: String, coin_type: u32) -> Self {
        Self {
            index,
            alias,
            coin_type,
            public_addresses: Vec::new(),
            internal_addresses: Vec::new(),
            last_synced: None,
        }
    }

    /// Public addresses followed by internal ones.
    pub fn addresses(&self) -> impl Iterator<Item = &AccountAddress> {
        self.public_addresses.iter().chain(self.internal_addresses.iter())
    }

    pub fn find(&self, address: &Address) -> Option<&AccountAddress> {
        self.addresses().find(|a| a.address.inner() == address)
    }

    pub fn owns(&self, address: &Address) -> bool {
        self.find(address).is_some()
    }

    /// Derivation chain of an owned address.
    pub fn chain_of(&self, address: &Address) -> Option<Bip44> {
        self.find(address)
            .map(|a| Bip44::new(self.coin_type, self.index, a.internal, a.key_index))
    }

    pub fn next_address_index(&self, internal: bool) -> u32 {
        let list = if internal { &self.internal_addresses } else { &self.public_addresses };
        list.iter().map(|a| a.key_index + 1).max().unwrap_or(0)
    }

    /// Flag an owned address as used. Returns whether anything changed.
    pub fn mark_used(&mut self, address: &Address) -> bool {
        for entry in self
            .public_addresses
            .iter_mut()
            .chain(self.internal_addresses.iter_mut())
        {
            if entry.address.inner() == address && !entry.used {
                entry.used = true;
                return true;
            }
        }
        false
    }
}

pub trait AccountStore {
    /// Insert or replace the record at `record.index`.
    fn put_account(&self, record: &AccountRecord) -> Result<(), StoreError>;

    fn get_account(&self, index: u32) -> Result<AccountRecord, StoreError>;

    fn account_exists(&self, index: u32) -> Result<bool, StoreError>;

    /// All accounts ordered by index.
    fn iter_accounts(&self) -> Result<Vec<AccountRecord>, StoreError>;

    fn account_count(&self) -> Result<u64, StoreError> {
        self.iter_accounts().map(|v| v.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(byte: u8, index: u32, internal: bool) -> AccountAddress {
        AccountAddress {
            address: Address::Ed25519([byte; 32]).to_bech32("tst").unwrap(),
            key_index: index,
            internal,
            used: false,
        }
    }

    #[test]
    fn next_index_per_chain() {
        let mut record = AccountRecord::new(0, "main".into(), 1);
        assert_eq!(record.next_address_index(false), 0);
        record.public_addresses.push(entry(1, 0, false));
        record.public_addresses.push(entry(2, 1, false));
        record.internal_addresses.push(entry(3, 0, true));
        assert_eq!(record.next_address_index(false), 2);
        assert_eq!(record.next_address_index(true), 1);
    }

    #[test]
    fn chain_of_owned_address() {
        let mut record = AccountRecord::new(3, "a".into(), 4218);
        record.internal_addresses.push(entry(9, 5, true));
        let chain = record.chain_of(&Address::Ed25519([9; 32])).unwrap();
        assert_eq!(chain, Bip44::new(4218, 3, true, 5));
        assert!(record.chain_of(&Address::Ed25519([8; 32])).is_none());
    }

    #[test]
    fn mark_used_only_once() {
        let mut record = AccountRecord::new(0, "a".into(), 1);
        record.public_addresses.push(entry(1, 0, false));
        assert!(record.mark_used(&Address::Ed25519([1; 32])));
        assert!(!record.mark_used(&Address::Ed25519([1; 32])));
        assert!(record.public_addresses[0].used);
    }
}
