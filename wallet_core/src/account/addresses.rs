use tessera_store::{AccountAddress, AccountRecord};
use tessera_types::Address;
use tracing::debug;

use super::Account;
use crate::error::WalletError;
use crate::secret::SecretManage;
use crate::transaction::RemainderStrategy;

impl Account {
    /// Public addresses followed by internal ones.
    pub async fn addresses(&self) -> Vec<AccountAddress> {
        self.inner().record.read().await.addresses().cloned().collect()
    }

    pub async fn public_addresses(&self) -> Vec<AccountAddress> {
        self.inner().record.read().await.public_addresses.clone()
    }

    /// Derive and persist `amount` new addresses on the public or internal chain.
    pub async fn generate_addresses(
        &self,
        amount: u32,
        internal: bool,
    ) -> Result<Vec<AccountAddress>, WalletError> {
        let mut record = self.inner().record.write().await;
        self.extend_addresses(&mut record, amount, internal).await
    }

    /// Derive `amount` addresses past the highest known index and persist the
    /// record. The caller holds the record lock.
    pub(crate) async fn extend_addresses(
        &self,
        record: &mut AccountRecord,
        amount: u32,
        internal: bool,
    ) -> Result<Vec<AccountAddress>, WalletError> {
        let start = record.next_address_index(internal);
        let derived = self
            .derive_range(record.coin_type, start, start + amount, internal)
            .await?;
        let target = match internal {
            true => &mut record.internal_addresses,
            false => &mut record.public_addresses,
        };
        target.extend(derived.iter().cloned());
        self.ctx().store.put_account(record)?;
        debug!(
            account = record.index,
            internal,
            from = start,
            count = amount,
            "generated addresses"
        );
        Ok(derived)
    }

    /// Derive addresses `start..end` without recording them.
    pub(crate) async fn derive_range(
        &self,
        coin_type: u32,
        start: u32,
        end: u32,
        internal: bool,
    ) -> Result<Vec<AccountAddress>, WalletError> {
        if start >= end {
            return Ok(Vec::new());
        }
        let hrp = self.ctx().protocol().await?.bech32_hrp;
        let addresses = self
            .ctx()
            .secret_manager
            .read()
            .await
            .generate_addresses(coin_type, self.index(), start..end, internal)
            .await?;
        addresses
            .into_iter()
            .zip(start..end)
            .map(|(address, key_index)| {
                Ok(AccountAddress {
                    address: address.to_bech32(&hrp)?,
                    key_index,
                    internal,
                    used: false,
                })
            })
            .collect()
    }

    /// The address remainders go to under `strategy`.
    pub(crate) async fn remainder_address(
        &self,
        record: &mut AccountRecord,
        strategy: &RemainderStrategy,
    ) -> Result<Address, WalletError> {
        match strategy {
            RemainderStrategy::ReuseFirstAddress => record
                .public_addresses
                .first()
                .map(|a| *a.address.inner())
                .ok_or_else(|| WalletError::Consistency("account has no address".into())),
            RemainderStrategy::ChangeAddress => {
                let generated = self.extend_addresses(record, 1, true).await?;
                generated
                    .first()
                    .map(|a| *a.address.inner())
                    .ok_or_else(|| WalletError::Secret("no change address derived".into()))
            }
            RemainderStrategy::Custom(address) => Ok(*address.inner()),
        }
    }
}
