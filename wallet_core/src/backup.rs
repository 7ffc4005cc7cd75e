//! Encrypted wallet backups.
//!
//! A backup is a keystore file (Argon2id + AES-256-GCM, see
//! [`crate::keystore`]) whose plaintext is a JSON [`BackupPayload`]: the
//! coin type, client options, the seed when the secret manager can export
//! one, and every account with its outputs (spent ones included) and
//! transactions. Backup and restore hold the all-account lock.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tessera_client::{ClientOptions, HttpNodeClient};
use tessera_store::{AccountRecord, OutputFilter, OutputRecord, SyncBatch, TransactionFilter, TransactionRecord};
use tessera_store::meta::SECRET_MANAGER_KIND_KEY;
use tracing::{info, warn};
use zeroize::{Zeroize, Zeroizing};

use crate::account::Account;
use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::keystore::{decrypt_keystore, encrypt_keystore, load_keystore, save_keystore};
use crate::secret::{Password, SecretManager, SecretManagerKind};
use crate::wallet::Wallet;

pub const BACKUP_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct BackupPayload {
    version: u32,
    coin_type: u32,
    client_options: ClientOptions,
    /// Hex-encoded 64-byte seed.
    seed: Option<String>,
    accounts: Vec<AccountBackup>,
}

impl Drop for BackupPayload {
    fn drop(&mut self) {
        if let Some(seed) = self.seed.as_mut() {
            seed.zeroize();
        }
    }
}

#[derive(Serialize, Deserialize)]
struct AccountBackup {
    record: AccountRecord,
    outputs: Vec<OutputRecord>,
    transactions: Vec<TransactionRecord>,
}

impl Wallet {
    /// Write all accounts and the exportable secret to `path`, encrypted with `password`.
    pub async fn backup(&self, path: &Path, password: &Password) -> Result<(), WalletError> {
        let accounts = self.inner.accounts.write().await;
        let mut backups = Vec::with_capacity(accounts.len());
        for account in accounts.iter() {
            let record = account.inner().record.read().await;
            backups.push(AccountBackup {
                record: record.clone(),
                outputs: account.outputs(&OutputFilter::all())?,
                transactions: account.transactions(&TransactionFilter::all())?,
            });
        }

        let seed = self.ctx().secret_manager.read().await.export_seed()?;
        if seed.is_none() {
            warn!("secret manager exports no seed; backup holds account state only");
        }
        let config = self.config();
        let payload = BackupPayload {
            version: BACKUP_VERSION,
            coin_type: config.coin_type,
            client_options: config.client,
            seed: seed.map(|s| hex::encode(&s[..])),
            accounts: backups,
        };
        let plaintext = Zeroizing::new(serde_json::to_vec(&payload)?);
        let keystore = encrypt_keystore(&plaintext, password.as_str(), self.inner.kdf_params)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        save_keystore(&keystore, path)?;
        info!(
            path = %path.display(),
            accounts = payload.accounts.len(),
            "wallet backup written"
        );
        Ok(())
    }

    /// Restore a backup into a wallet that has no accounts yet.
    ///
    /// Either everything is restored or the wallet is left as it was: the
    /// account data is written first, then the config, and the secret
    /// manager is swapped last.
    pub async fn restore_backup(&self, path: &Path, password: &Password) -> Result<(), WalletError> {
        let mut accounts = self.inner.accounts.write().await;
        if !accounts.is_empty() {
            return Err(WalletError::AccountsAlreadyExist);
        }

        let keystore = load_keystore(path)?;
        let plaintext = decrypt_keystore(&keystore, password.as_str())?;
        let payload: BackupPayload = serde_json::from_slice(&plaintext)?;
        if payload.version != BACKUP_VERSION {
            return Err(WalletError::Config(format!(
                "unsupported backup version {}",
                payload.version
            )));
        }
        let seed = payload.seed.as_deref().map(decode_seed).transpose()?;
        let previous = self.config();
        let node = if payload.client_options != previous.client {
            Some(HttpNodeClient::new(&payload.client_options)?)
        } else {
            None
        };
        let mut config = previous.clone();
        config.client = payload.client_options.clone();
        config.coin_type = payload.coin_type;

        let mut restored = self.write_account_backups(&payload.accounts)?;
        if let Err(e) = self.adopt_backup_settings(&config, seed).await {
            self.discard_restored(&restored);
            if let Err(undo) = self.persist_config(&previous) {
                warn!(error = %undo, "could not restore the previous wallet config");
            }
            return Err(e);
        }

        self.ctx().update_config(|c| *c = config.clone());
        if let Some(node) = node {
            self.ctx().set_node(Arc::new(node));
            info!(nodes = ?config.client.nodes, "client options updated");
        }
        restored.sort_by_key(Account::index);
        info!(
            path = %path.display(),
            accounts = restored.len(),
            "wallet backup restored"
        );
        *accounts = restored;
        Ok(())
    }

    /// Commit every backed up account, removing the ones already written if one fails.
    fn write_account_backups(&self, backups: &[AccountBackup]) -> Result<Vec<Account>, WalletError> {
        let mut restored = Vec::with_capacity(backups.len());
        for backup in backups {
            let batch = SyncBatch {
                account: Some(backup.record.clone()),
                upsert_outputs: backup.outputs.clone(),
                spent_outputs: Vec::new(),
                transactions: backup.transactions.clone(),
            };
            if let Err(e) = self.ctx().store.apply_batch(backup.record.index, &batch) {
                warn!(account = backup.record.index, error = %e, "restoring account failed");
                self.discard_restored(&restored);
                return Err(e.into());
            }
            restored.push(Account::new(backup.record.clone(), self.ctx().clone()));
        }
        Ok(restored)
    }

    fn discard_restored(&self, restored: &[Account]) {
        for account in restored {
            if let Err(e) = self.ctx().store.remove_account_data(account.index()) {
                warn!(account = account.index(), error = %e, "could not remove restored account");
            }
        }
    }

    /// Persist `config` and take over the backed up seed.
    async fn adopt_backup_settings(
        &self,
        config: &WalletConfig,
        seed: Option<Zeroizing<[u8; 64]>>,
    ) -> Result<(), WalletError> {
        self.persist_config(config)?;
        let Some(seed) = seed else {
            return Ok(());
        };
        let mut manager = self.ctx().secret_manager.write().await;
        let replace = match &*manager {
            SecretManager::Vault(vault) => {
                vault.store_seed(&seed)?;
                false
            }
            SecretManager::Hardware(_) => {
                warn!("hardware secret manager ignores the backed up seed");
                false
            }
            SecretManager::Mnemonic(_) | SecretManager::Seed(_) => true,
        };
        if replace {
            let kind = serde_json::to_vec(&SecretManagerKind::Seed)?;
            self.ctx().store.put_meta(SECRET_MANAGER_KIND_KEY, &kind)?;
            *manager = SecretManager::from_seed(seed);
        }
        Ok(())
    }
}

fn decode_seed(encoded: &str) -> Result<Zeroizing<[u8; 64]>, WalletError> {
    let bytes =
        Zeroizing::new(hex::decode(encoded).map_err(|e| WalletError::Serialization(e.to_string()))?);
    let seed: [u8; 64] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| WalletError::Serialization("backup seed has the wrong length".into()))?;
    Ok(Zeroizing::new(seed))
}
