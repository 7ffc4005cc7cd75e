//! State shared by the wallet and all of its accounts.

use std::future::Future;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tessera_client::{ClientError, NodeApi};
use tessera_store::WalletStore;
use tessera_types::{Clock, ProtocolParams, Timestamp};
use tessera_utils::StatsCounter;
use tracing::debug;

use crate::config::WalletConfig;
use crate::error::WalletError;
use crate::events::{EventBus, WalletEvent};
use crate::locks::{read, write};
use crate::secret::SecretManager;

/// Meta key caching the last protocol parameters reported by a node.
pub(crate) const PROTOCOL_PARAMS_KEY: &str = "protocol_params";

pub(crate) struct WalletContext {
    pub(crate) store: Arc<dyn WalletStore>,
    node: RwLock<Arc<dyn NodeApi>>,
    pub(crate) secret_manager: tokio::sync::RwLock<SecretManager>,
    pub(crate) events: Arc<EventBus>,
    pub(crate) clock: Arc<dyn Clock>,
    config: RwLock<WalletConfig>,
    protocol: RwLock<Option<ProtocolParams>>,
    pub(crate) stats: StatsCounter,
}

impl WalletContext {
    pub(crate) fn new(
        store: Arc<dyn WalletStore>,
        node: Arc<dyn NodeApi>,
        secret_manager: SecretManager,
        events: Arc<EventBus>,
        clock: Arc<dyn Clock>,
        config: WalletConfig,
    ) -> Self {
        let protocol = store
            .try_get_meta(PROTOCOL_PARAMS_KEY)
            .ok()
            .flatten()
            .and_then(|bytes| serde_json::from_slice(&bytes).ok());
        Self {
            store,
            node: RwLock::new(node),
            secret_manager: tokio::sync::RwLock::new(secret_manager),
            events,
            clock,
            config: RwLock::new(config),
            protocol: RwLock::new(protocol),
            stats: StatsCounter::new(),
        }
    }

    pub(crate) fn node(&self) -> Arc<dyn NodeApi> {
        read(&self.node).clone()
    }

    pub(crate) fn set_node(&self, node: Arc<dyn NodeApi>) {
        *write(&self.node) = node;
        *write(&self.protocol) = None;
    }

    pub(crate) fn config(&self) -> WalletConfig {
        read(&self.config).clone()
    }

    pub(crate) fn update_config(&self, update: impl FnOnce(&mut WalletConfig)) -> WalletConfig {
        let mut config = write(&self.config);
        update(&mut config);
        config.clone()
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub(crate) fn emit(&self, event: WalletEvent) {
        self.events.emit(&event);
    }

    /// Run a node request bounded by the configured request timeout.
    pub(crate) async fn request<T>(
        &self,
        what: &str,
        request: impl Future<Output = Result<T, ClientError>>,
    ) -> Result<T, WalletError> {
        let timeout = Duration::from_secs(read(&self.config).client.request_timeout_secs);
        match tokio::time::timeout(timeout, request).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(WalletError::Timeout(what.to_string())),
        }
    }

    /// Protocol parameters, fetched from the node on first use and cached.
    pub(crate) async fn protocol(&self) -> Result<ProtocolParams, WalletError> {
        if let Some(params) = read(&self.protocol).clone() {
            return Ok(params);
        }
        let node = self.node();
        let info = self.request("node info", node.get_info()).await?;
        debug!(
            network = %info.protocol.network_name,
            hrp = %info.protocol.bech32_hrp,
            "fetched protocol parameters"
        );
        let bytes = serde_json::to_vec(&info.protocol)?;
        self.store.put_meta(PROTOCOL_PARAMS_KEY, &bytes)?;
        *write(&self.protocol) = Some(info.protocol.clone());
        Ok(info.protocol)
    }
}
