//! The wallet: accounts, the secret manager and the node connection.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use tessera_client::{ClientOptions, HttpNodeClient, NodeApi};
use tessera_crypto::{generate_mnemonic, validate_mnemonic};
use tessera_store::meta::WALLET_CONFIG_KEY;
use tessera_store::AccountRecord;
use tessera_types::Bech32Address;
use tessera_utils::StatsSnapshot;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::account::Account;
use crate::background::BackgroundSync;
use crate::balance::Balance;
use crate::builder::WalletBuilder;
use crate::config::{SyncOptions, WalletConfig};
use crate::context::WalletContext;
use crate::error::WalletError;
use crate::events::{EventFilter, Listener, SubscriptionId};
use crate::keystore::KdfParams;
use crate::locks::lock;
use crate::secret::{MnemonicPhrase, Password, SecretManager, VaultSecretManager};

/// Selects an account by index or alias.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AccountIdentifier {
    Index(u32),
    Alias(String),
}

impl From<u32> for AccountIdentifier {
    fn from(index: u32) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for AccountIdentifier {
    fn from(alias: &str) -> Self {
        Self::Alias(alias.to_string())
    }
}

impl From<String> for AccountIdentifier {
    fn from(alias: String) -> Self {
        Self::Alias(alias)
    }
}

impl fmt::Display for AccountIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "#{index}"),
            Self::Alias(alias) => write!(f, "{alias:?}"),
        }
    }
}

/// A cheap, cloneable handle to one wallet.
#[derive(Clone)]
pub struct Wallet {
    pub(crate) inner: Arc<WalletInner>,
}

pub(crate) struct WalletInner {
    pub(crate) ctx: Arc<WalletContext>,
    /// Ordered by index. The write lock is the all-account lock.
    pub(crate) accounts: RwLock<Vec<Account>>,
    pub(crate) background: Mutex<Option<BackgroundSync>>,
    pub(crate) kdf_params: KdfParams,
}

impl Drop for WalletInner {
    fn drop(&mut self) {
        if let Some(background) = lock(&self.background).take() {
            background.signal();
        }
    }
}

impl Wallet {
    pub fn builder() -> WalletBuilder {
        WalletBuilder::new()
    }

    /// Open the wallet stored at `config.storage_path`, reloading its accounts.
    pub async fn open(config: WalletConfig, secret_manager: SecretManager) -> Result<Self, WalletError> {
        WalletBuilder::new()
            .with_config(config)
            .with_secret_manager(secret_manager)
            .finish()
            .await
    }

    pub(crate) fn ctx(&self) -> &Arc<WalletContext> {
        &self.inner.ctx
    }

    pub fn config(&self) -> WalletConfig {
        self.ctx().config()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.ctx().stats.snapshot()
    }

    // ── Accounts ──────────────────────────────────────────────────────

    /// Create the account with the next free index and derive its first address.
    ///
    /// The alias defaults to the index and must be unique.
    pub async fn create_account(&self, alias: Option<String>) -> Result<Account, WalletError> {
        let mut accounts = self.inner.accounts.write().await;
        let index = match accounts.last() {
            Some(last) => last
                .index()
                .checked_add(1)
                .ok_or_else(|| WalletError::InvalidCommand("no account index left".into()))?,
            None => 0,
        };
        let alias = alias.unwrap_or_else(|| index.to_string());
        if alias.trim().is_empty() {
            return Err(WalletError::MissingParameter("alias"));
        }
        for account in accounts.iter() {
            if account.alias().await == alias {
                return Err(WalletError::AccountAliasAlreadyExists(alias));
            }
        }

        let record = AccountRecord::new(index, alias.clone(), self.config().coin_type);
        let account = Account::new(record, self.ctx().clone());
        {
            let mut record = account.inner().record.write().await;
            account.extend_addresses(&mut record, 1, false).await?;
        }
        accounts.push(account.clone());
        info!(account = index, alias = %alias, "created account");
        Ok(account)
    }

    pub async fn get_account(&self, id: impl Into<AccountIdentifier>) -> Result<Account, WalletError> {
        let id = id.into();
        let accounts = self.inner.accounts.read().await;
        for account in accounts.iter() {
            let matches = match &id {
                AccountIdentifier::Index(index) => account.index() == *index,
                AccountIdentifier::Alias(alias) => account.alias().await == *alias,
            };
            if matches {
                return Ok(account.clone());
            }
        }
        Err(WalletError::AccountNotFound(id.to_string()))
    }

    pub async fn get_accounts(&self) -> Vec<Account> {
        self.inner.accounts.read().await.clone()
    }

    /// Remove the most recently created account, freeing its index.
    pub async fn remove_latest_account(&self) -> Result<u32, WalletError> {
        let mut accounts = self.inner.accounts.write().await;
        let latest = accounts
            .last()
            .ok_or_else(|| WalletError::AccountNotFound("wallet has no accounts".into()))?;
        let index = latest.index();
        // Wait out in-flight mutations of the account.
        let guard = latest.inner().record.write().await;
        self.ctx().store.remove_account_data(index)?;
        drop(guard);
        accounts.pop();
        info!(account = index, "removed account");
        Ok(index)
    }

    /// Remove an account. Only the latest one may be removed.
    pub async fn remove_account(&self, id: impl Into<AccountIdentifier>) -> Result<u32, WalletError> {
        let account = self.get_account(id).await?;
        let latest = self.inner.accounts.read().await.last().map(Account::index);
        if latest != Some(account.index()) {
            return Err(WalletError::CannotRemoveAccount(format!(
                "account {} is not the latest account",
                account.index()
            )));
        }
        self.remove_latest_account().await
    }

    /// Rebuild accounts from the ledger.
    ///
    /// Accounts below `account_start_index` are always kept. Past it, new
    /// accounts are created and synced until `account_gap_limit` consecutive
    /// ones show no history; those trailing empty accounts are removed again.
    pub async fn recover_accounts(
        &self,
        account_start_index: u32,
        account_gap_limit: u32,
        address_gap_limit: u32,
        sync_options: Option<SyncOptions>,
    ) -> Result<Vec<Account>, WalletError> {
        let options = SyncOptions {
            address_gap_limit,
            force_syncing: true,
            ..sync_options.unwrap_or_else(|| self.config().sync)
        };
        info!(
            start = account_start_index,
            account_gap_limit, address_gap_limit, "recovering accounts"
        );
        for account in self.get_accounts().await {
            account.sync(Some(options.clone())).await?;
        }

        let mut empty_run = 0;
        let mut created = Vec::new();
        loop {
            let next = self.inner.accounts.read().await.last().map_or(0, |a| a.index() + 1);
            if next >= account_start_index && empty_run >= account_gap_limit {
                break;
            }
            let account = self.create_account(None).await?;
            account.sync(Some(options.clone())).await?;
            if account.index() >= account_start_index {
                match account_has_history(&account)? {
                    true => empty_run = 0,
                    false => empty_run += 1,
                }
            }
            created.push(account.index());
        }

        // Trailing empty accounts this recovery created are not kept.
        loop {
            let Some(last) = self.inner.accounts.read().await.last().cloned() else {
                break;
            };
            let removable = created.contains(&last.index())
                && last.index() >= account_start_index
                && !account_has_history(&last)?;
            if !removable {
                break;
            }
            self.remove_latest_account().await?;
        }
        Ok(self.get_accounts().await)
    }

    // ── Node & sync ───────────────────────────────────────────────────

    /// Replace the node connection and persist the new options.
    pub async fn set_client_options(&self, options: ClientOptions) -> Result<(), WalletError> {
        let node = HttpNodeClient::new(&options)?;
        self.set_node(Arc::new(node), options)
    }

    pub(crate) fn set_node(&self, node: Arc<dyn NodeApi>, options: ClientOptions) -> Result<(), WalletError> {
        let config = self.ctx().update_config(|c| c.client = options);
        self.persist_config(&config)?;
        self.ctx().set_node(node);
        info!(nodes = ?config.client.nodes, "client options updated");
        Ok(())
    }

    pub(crate) fn persist_config(&self, config: &WalletConfig) -> Result<(), WalletError> {
        let bytes = serde_json::to_vec(config)?;
        self.ctx().store.put_meta(WALLET_CONFIG_KEY, &bytes)?;
        Ok(())
    }

    /// Sync every account in parallel.
    pub async fn sync_all(&self, options: Option<SyncOptions>) -> Result<Vec<Balance>, WalletError> {
        let accounts = self.get_accounts().await;
        try_join_all(accounts.iter().map(|a| a.sync(options.clone()))).await
    }

    /// Ask a faucet to fund `address`. The URL defaults to the configured one.
    pub async fn request_funds_from_faucet(
        &self,
        url: Option<&str>,
        address: &str,
    ) -> Result<String, WalletError> {
        let config = self.config();
        let url = url
            .map(str::to_string)
            .or(config.client.faucet_url)
            .ok_or(WalletError::MissingParameter("faucet_url"))?;
        let hrp = self.ctx().protocol().await?.bech32_hrp;
        let address = Bech32Address::try_from_str_with_hrp(address, &hrp)?;
        let node = self.ctx().node();
        self.ctx()
            .request("faucet request", node.request_funds_from_faucet(&url, &address))
            .await
    }

    // ── Secrets ───────────────────────────────────────────────────────

    /// A fresh 24-word mnemonic.
    pub fn generate_mnemonic(&self) -> Result<MnemonicPhrase, WalletError> {
        let phrase = generate_mnemonic()?;
        Ok(MnemonicPhrase::new(phrase.as_str()))
    }

    pub fn verify_mnemonic(&self, mnemonic: &MnemonicPhrase) -> Result<(), WalletError> {
        Ok(validate_mnemonic(mnemonic.as_str())?)
    }

    /// Install a mnemonic: written to the vault, or replacing an in-memory
    /// manager while the wallet has no accounts.
    pub async fn store_mnemonic(&self, mnemonic: MnemonicPhrase) -> Result<(), WalletError> {
        validate_mnemonic(mnemonic.as_str())?;
        let accounts = self.inner.accounts.read().await;
        let mut manager = self.ctx().secret_manager.write().await;
        match &*manager {
            SecretManager::Vault(vault) => vault.store_mnemonic(mnemonic.as_str()),
            SecretManager::Hardware(_) => Err(WalletError::Secret(
                "a hardware device cannot store a mnemonic".into(),
            )),
            SecretManager::Mnemonic(_) | SecretManager::Seed(_) => {
                if !accounts.is_empty() {
                    return Err(WalletError::AccountsAlreadyExist);
                }
                *manager = SecretManager::from_mnemonic(mnemonic.as_str())?;
                Ok(())
            }
        }
    }

    async fn with_vault<T>(
        &self,
        f: impl FnOnce(&VaultSecretManager) -> Result<T, WalletError>,
    ) -> Result<T, WalletError> {
        let manager = self.ctx().secret_manager.read().await;
        let vault = manager
            .as_vault()
            .ok_or_else(|| WalletError::Secret("secret manager is not a vault".into()))?;
        f(vault)
    }

    pub async fn set_vault_password(&self, password: &Password) -> Result<(), WalletError> {
        self.with_vault(|vault| vault.set_password(password)).await
    }

    pub async fn clear_vault_password(&self) -> Result<(), WalletError> {
        self.with_vault(|vault| {
            vault.clear_password();
            Ok(())
        })
        .await
    }

    pub async fn is_vault_password_available(&self) -> Result<bool, WalletError> {
        self.with_vault(|vault| Ok(vault.is_password_available())).await
    }

    pub async fn change_vault_password(&self, current: &Password, new: &Password) -> Result<(), WalletError> {
        self.with_vault(|vault| vault.change_password(current, new)).await
    }

    pub async fn set_vault_password_clear_interval(&self, timeout: Duration) -> Result<(), WalletError> {
        self.with_vault(|vault| {
            vault.set_password_clear_interval(timeout);
            Ok(())
        })
        .await?;
        let config = self
            .ctx()
            .update_config(|c| c.password_timeout_secs = timeout.as_secs());
        self.persist_config(&config)
    }

    // ── Events ────────────────────────────────────────────────────────

    pub fn subscribe(&self, filter: EventFilter, listener: Listener) -> SubscriptionId {
        self.ctx().events.subscribe(filter, listener)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.ctx().events.unsubscribe(id)
    }
}

/// Whether an account has ever held an output or recorded a transaction.
fn account_has_history(account: &Account) -> Result<bool, WalletError> {
    let outputs = account.outputs(&tessera_store::OutputFilter::all())?;
    if !outputs.is_empty() {
        return Ok(true);
    }
    let transactions = account.transactions(&tessera_store::TransactionFilter::all())?;
    if transactions.is_empty() {
        return Ok(false);
    }
    warn!(account = account.index(), "account has transactions but no outputs");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_from_json() {
        let by_index: AccountIdentifier = serde_json::from_str("3").unwrap();
        assert_eq!(by_index, AccountIdentifier::Index(3));
        let by_alias: AccountIdentifier = serde_json::from_str("\"savings\"").unwrap();
        assert_eq!(by_alias, AccountIdentifier::from("savings"));
    }

    #[test]
    fn identifier_display() {
        assert_eq!(AccountIdentifier::from(2).to_string(), "#2");
        assert_eq!(AccountIdentifier::from("main").to_string(), "\"main\"");
    }
}
