//! Password-protected seed file.
//!
//! The seed is stored as an argon2id + AES-256-GCM keystore. The password is
//! cached in memory after `set_password` and cleared again once it has gone
//! unused for the configured timeout. While no password is cached every
//! operation that needs the seed fails with [`WalletError::LockedVault`].
//!
//! Status changes (unlocked / locked) are reported to an optional listener so
//! the wallet can surface them as events.

use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tessera_crypto::{mnemonic_to_seed, validate_mnemonic};
use tessera_types::{Address, InputSigningData, SignedTransaction, TransactionEssence};
use tokio::time::Instant;
use tracing::{debug, info};
use zeroize::Zeroizing;

use super::password::Password;
use super::seed::{derive_addresses, sign_with_seed};
use super::SecretManage;
use crate::error::WalletError;
use crate::keystore::{decrypt_keystore, encrypt_keystore, load_keystore, save_keystore, KdfParams};
use crate::locks::lock;

pub type StatusListener = Arc<dyn Fn(bool) + Send + Sync>;

struct CachedPassword {
    password: Option<Zeroizing<String>>,
    last_used: Instant,
    /// Bumped on every set/clear so stale auto-clear tasks exit.
    generation: u64,
}

pub struct VaultSecretManager {
    path: PathBuf,
    kdf_params: KdfParams,
    timeout: Mutex<Duration>,
    cache: Arc<Mutex<CachedPassword>>,
    listener: Arc<Mutex<Option<StatusListener>>>,
}

impl VaultSecretManager {
    pub fn new(path: impl Into<PathBuf>, password_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            kdf_params: KdfParams::default(),
            timeout: Mutex::new(password_timeout),
            cache: Arc::new(Mutex::new(CachedPassword {
                password: None,
                last_used: Instant::now(),
                generation: 0,
            })),
            listener: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_kdf_params(mut self, kdf_params: KdfParams) -> Self {
        self.kdf_params = kdf_params;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn set_status_listener(&self, listener: StatusListener) {
        *lock(&self.listener) = Some(listener);
    }

    pub fn set_password_clear_interval(&self, timeout: Duration) {
        *lock(&self.timeout) = timeout;
    }

    /// Whether the vault file already holds a seed.
    pub fn has_secret(&self) -> bool {
        self.path.exists()
    }

    /// Cache `password`. When the vault already holds a seed the password is
    /// checked against it first.
    pub fn set_password(&self, password: &Password) -> Result<(), WalletError> {
        if self.has_secret() {
            let keystore = load_keystore(&self.path)?;
            decrypt_keystore(&keystore, password.as_str())?;
        }
        let generation = {
            let mut cache = lock(&self.cache);
            cache.password = Some(Zeroizing::new(password.as_str().to_owned()));
            cache.last_used = Instant::now();
            cache.generation += 1;
            cache.generation
        };
        info!(path = %self.path.display(), "vault unlocked");
        self.notify(true);
        self.spawn_auto_clear(generation);
        Ok(())
    }

    pub fn clear_password(&self) {
        let was_set = {
            let mut cache = lock(&self.cache);
            cache.generation += 1;
            cache.password.take().is_some()
        };
        if was_set {
            info!(path = %self.path.display(), "vault locked");
            self.notify(false);
        }
    }

    pub fn is_password_available(&self) -> bool {
        self.cached_password(false).is_some()
    }

    /// Re-encrypt the vault under a new password.
    pub fn change_password(&self, current: &Password, new: &Password) -> Result<(), WalletError> {
        let keystore = load_keystore(&self.path)?;
        let seed = decrypt_keystore(&keystore, current.as_str())?;
        let reencrypted = encrypt_keystore(&seed, new.as_str(), self.kdf_params)?;
        save_keystore(&reencrypted, &self.path)?;
        let mut cache = lock(&self.cache);
        if cache.password.is_some() {
            cache.password = Some(Zeroizing::new(new.as_str().to_owned()));
            cache.last_used = Instant::now();
        }
        info!(path = %self.path.display(), "vault password changed");
        Ok(())
    }

    /// Store the seed of `mnemonic`. Refuses to overwrite an existing seed.
    pub fn store_mnemonic(&self, mnemonic: &str) -> Result<(), WalletError> {
        if self.has_secret() {
            return Err(WalletError::Secret("vault already holds a mnemonic".into()));
        }
        validate_mnemonic(mnemonic)?;
        let seed = mnemonic_to_seed(mnemonic)?;
        self.write_seed(&seed)
    }

    /// Replace the stored seed, as done when restoring a backup.
    pub(crate) fn store_seed(&self, seed: &[u8; 64]) -> Result<(), WalletError> {
        self.write_seed(seed)
    }

    fn write_seed(&self, seed: &[u8; 64]) -> Result<(), WalletError> {
        let password = self.cached_password(true).ok_or(WalletError::LockedVault)?;
        let keystore = encrypt_keystore(seed, &password, self.kdf_params)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        save_keystore(&keystore, &self.path)?;
        debug!(path = %self.path.display(), "seed written to vault");
        Ok(())
    }

    /// Run `f` with the decrypted seed.
    pub(crate) fn with_seed<T>(
        &self,
        f: impl FnOnce(&[u8; 64]) -> Result<T, WalletError>,
    ) -> Result<T, WalletError> {
        let password = self.cached_password(true).ok_or(WalletError::LockedVault)?;
        if !self.has_secret() {
            return Err(WalletError::Secret("vault holds no seed".into()));
        }
        let keystore = load_keystore(&self.path)?;
        let plaintext = decrypt_keystore(&keystore, &password)?;
        let seed: Zeroizing<[u8; 64]> = Zeroizing::new(
            plaintext
                .as_slice()
                .try_into()
                .map_err(|_| WalletError::Secret("vault seed has the wrong length".into()))?,
        );
        f(&seed)
    }

    /// The cached password, or `None` once it expired. `touch` restarts the
    /// inactivity timer.
    fn cached_password(&self, touch: bool) -> Option<Zeroizing<String>> {
        let timeout = *lock(&self.timeout);
        let expired = {
            let mut cache = lock(&self.cache);
            match cache.password.clone() {
                Some(password) if cache.last_used + timeout > Instant::now() => {
                    if touch {
                        cache.last_used = Instant::now();
                    }
                    return Some(password);
                }
                Some(_) => {
                    cache.password = None;
                    cache.generation += 1;
                    true
                }
                None => false,
            }
        };
        if expired {
            info!(path = %self.path.display(), "vault password expired");
            self.notify(false);
        }
        None
    }

    fn notify(&self, unlocked: bool) {
        let listener = lock(&self.listener).clone();
        if let Some(listener) = listener {
            listener(unlocked);
        }
    }

    fn spawn_auto_clear(&self, generation: u64) {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let cache = self.cache.clone();
        let listener = self.listener.clone();
        let timeout = *lock(&self.timeout);
        handle.spawn(async move {
            loop {
                let deadline = {
                    let cache = lock(&cache);
                    if cache.generation != generation || cache.password.is_none() {
                        return;
                    }
                    cache.last_used + timeout
                };
                tokio::time::sleep_until(deadline).await;
                let cleared = {
                    let mut cache = lock(&cache);
                    if cache.generation != generation {
                        return;
                    }
                    if cache.last_used + timeout <= Instant::now() {
                        cache.password = None;
                        cache.generation += 1;
                        true
                    } else {
                        false
                    }
                };
                if cleared {
                    info!("vault password cleared after inactivity");
                    let listener = lock(&listener).clone();
                    if let Some(listener) = listener {
                        listener(false);
                    }
                    return;
                }
            }
        });
    }
}

#[async_trait]
impl SecretManage for VaultSecretManager {
    async fn generate_addresses(
        &self,
        coin_type: u32,
        account_index: u32,
        range: Range<u32>,
        internal: bool,
    ) -> Result<Vec<Address>, WalletError> {
        self.with_seed(|seed| derive_addresses(seed, coin_type, account_index, range, internal))
    }

    async fn sign_transaction_essence(
        &self,
        essence: &TransactionEssence,
        inputs: &[InputSigningData],
    ) -> Result<SignedTransaction, WalletError> {
        self.with_seed(|seed| sign_with_seed(seed, essence, inputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn vault(dir: &tempfile::TempDir) -> VaultSecretManager {
        VaultSecretManager::new(dir.path().join("vault.json"), Duration::from_secs(300))
            .with_kdf_params(KdfParams::testing())
    }

    #[tokio::test]
    async fn locked_vault_refuses_derivation() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        vault.set_password(&Password::new("pw")).unwrap();
        vault.store_mnemonic(MNEMONIC).unwrap();
        vault.clear_password();

        let result = vault.generate_addresses(4219, 0, 0..1, false).await;
        assert!(matches!(result, Err(WalletError::LockedVault)));
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        vault.set_password(&Password::new("right")).unwrap();
        vault.store_mnemonic(MNEMONIC).unwrap();
        vault.clear_password();

        assert!(matches!(
            vault.set_password(&Password::new("wrong")),
            Err(WalletError::InvalidPassword)
        ));
        assert!(!vault.is_password_available());
    }

    #[tokio::test]
    async fn vault_matches_plain_mnemonic() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        vault.set_password(&Password::new("pw")).unwrap();
        vault.store_mnemonic(MNEMONIC).unwrap();

        let plain = super::super::SeedSecretManager::from_mnemonic(MNEMONIC).unwrap();
        assert_eq!(
            vault.generate_addresses(4219, 0, 0..2, false).await.unwrap(),
            plain.generate_addresses(4219, 0, 0..2, false).await.unwrap()
        );
    }

    #[tokio::test]
    async fn refuses_second_mnemonic() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        vault.set_password(&Password::new("pw")).unwrap();
        vault.store_mnemonic(MNEMONIC).unwrap();
        assert!(vault.store_mnemonic(MNEMONIC).is_err());
    }

    #[tokio::test]
    async fn change_password_reencrypts() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        vault.set_password(&Password::new("old")).unwrap();
        vault.store_mnemonic(MNEMONIC).unwrap();
        vault
            .change_password(&Password::new("old"), &Password::new("new"))
            .unwrap();
        vault.clear_password();

        assert!(vault.set_password(&Password::new("old")).is_err());
        vault.set_password(&Password::new("new")).unwrap();
        assert!(vault.generate_addresses(4219, 0, 0..1, false).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn password_clears_after_inactivity() {
        let dir = tempfile::tempdir().unwrap();
        let vault = vault(&dir);
        let locks = Arc::new(AtomicUsize::new(0));
        let seen = locks.clone();
        vault.set_status_listener(Arc::new(move |unlocked| {
            if !unlocked {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        }));

        vault.set_password(&Password::new("pw")).unwrap();
        assert!(vault.is_password_available());

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(!vault.is_password_available());
        assert_eq!(locks.load(Ordering::SeqCst), 1);
    }
}
