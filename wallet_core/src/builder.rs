//! Assembling a [`Wallet`] from its collaborators.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tessera_client::{ClientOptions, HttpNodeClient, NodeApi};
use tessera_store::meta::{SECRET_MANAGER_KIND_KEY, WALLET_CONFIG_KEY};
use tessera_store::WalletStore;
use tessera_store_lmdb::LmdbWalletStore;
use tessera_types::{Clock, SystemClock};
use tokio::sync::RwLock;
use tracing::info;

use crate::account::Account;
use crate::config::WalletConfig;
use crate::context::WalletContext;
use crate::error::WalletError;
use crate::events::{EventBus, WalletEvent};
use crate::keystore::KdfParams;
use crate::secret::{SecretManager, SecretManagerKind};
use crate::wallet::{Wallet, WalletInner};

/// Builds a [`Wallet`].
///
/// Unset collaborators get production defaults: an LMDB store at
/// `storage_path`, an HTTP client for the configured nodes and the system
/// clock. Without an explicit configuration the one persisted in the store
/// is used, if any.
#[derive(Default)]
pub struct WalletBuilder {
    config: Option<WalletConfig>,
    secret_manager: Option<SecretManager>,
    store: Option<Arc<dyn WalletStore>>,
    node: Option<Arc<dyn NodeApi>>,
    clock: Option<Arc<dyn Clock>>,
    kdf_params: Option<KdfParams>,
}

impl WalletBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: WalletConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_coin_type(mut self, coin_type: u32) -> Self {
        self.config.get_or_insert_with(WalletConfig::default).coin_type = coin_type;
        self
    }

    pub fn with_client_options(mut self, options: ClientOptions) -> Self {
        self.config.get_or_insert_with(WalletConfig::default).client = options;
        self
    }

    pub fn with_secret_manager(mut self, secret_manager: SecretManager) -> Self {
        self.secret_manager = Some(secret_manager);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn WalletStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_node(mut self, node: Arc<dyn NodeApi>) -> Self {
        self.node = Some(node);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Key derivation cost for backup files.
    pub fn with_kdf_params(mut self, kdf_params: KdfParams) -> Self {
        self.kdf_params = Some(kdf_params);
        self
    }

    pub async fn finish(self) -> Result<Wallet, WalletError> {
        let secret_manager = self
            .secret_manager
            .ok_or(WalletError::MissingParameter("secret_manager"))?;

        let store: Arc<dyn WalletStore> = match self.store {
            Some(store) => store,
            None => {
                let path = &self
                    .config
                    .as_ref()
                    .map(|c| c.storage_path.clone())
                    .unwrap_or_else(|| WalletConfig::default().storage_path);
                std::fs::create_dir_all(path)?;
                Arc::new(LmdbWalletStore::open(path)?)
            }
        };

        let stored_config: Option<WalletConfig> = store
            .try_get_meta(WALLET_CONFIG_KEY)?
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()?;
        let records = store.iter_accounts()?;
        let config = match (self.config, stored_config) {
            (Some(config), Some(stored))
                if !records.is_empty() && config.coin_type != stored.coin_type =>
            {
                return Err(WalletError::Config(format!(
                    "coin type {} does not match the stored accounts' coin type {}",
                    config.coin_type, stored.coin_type
                )));
            }
            (Some(config), _) => config,
            (None, Some(stored)) => stored,
            (None, None) => WalletConfig::default(),
        };

        let stored_kind: Option<SecretManagerKind> = store
            .try_get_meta(SECRET_MANAGER_KIND_KEY)?
            .map(|bytes| serde_json::from_slice(&bytes))
            .transpose()?;
        if let Some(stored_kind) = stored_kind {
            if !records.is_empty() && stored_kind != secret_manager.kind() {
                return Err(WalletError::Config(format!(
                    "wallet was created with a {:?} secret manager, got {:?}",
                    stored_kind,
                    secret_manager.kind()
                )));
            }
        }

        let node: Arc<dyn NodeApi> = match self.node {
            Some(node) => node,
            None => Arc::new(HttpNodeClient::new(&config.client)?),
        };
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let events = Arc::new(EventBus::new());

        if let Some(vault) = secret_manager.as_vault() {
            let bus = Arc::clone(&events);
            vault.set_status_listener(Arc::new(move |unlocked| {
                bus.emit(&WalletEvent::StrongholdStatusChange { unlocked });
            }));
            vault.set_password_clear_interval(Duration::from_secs(config.password_timeout_secs));
        }

        store.put_meta(WALLET_CONFIG_KEY, &serde_json::to_vec(&config)?)?;
        store.put_meta(
            SECRET_MANAGER_KIND_KEY,
            &serde_json::to_vec(&secret_manager.kind())?,
        )?;

        let ctx = Arc::new(WalletContext::new(
            store,
            node,
            secret_manager,
            events,
            clock,
            config,
        ));
        let mut records = records;
        records.sort_by_key(|r| r.index);
        let accounts: Vec<Account> = records
            .into_iter()
            .map(|record| Account::new(record, Arc::clone(&ctx)))
            .collect();
        info!(accounts = accounts.len(), "wallet opened");

        Ok(Wallet {
            inner: Arc::new(WalletInner {
                ctx,
                accounts: RwLock::new(accounts),
                background: Mutex::new(None),
                kdf_params: self.kdf_params.unwrap_or_default(),
            }),
        })
    }
}
