//! Wallet configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use tessera_client::ClientOptions;
use tessera_utils::{init_logging, LogFormat, LoggingError};

use crate::error::WalletError;
use crate::transaction::RemainderStrategy;

/// Configuration for a wallet.
///
/// Can be loaded from a TOML file via [`WalletConfig::from_toml_file`] or
/// built programmatically (e.g. for tests). The wallet persists it in the
/// store so a reopened wallet keeps its client options.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletConfig {
    /// Directory of the LMDB environment.
    #[serde(default = "default_storage_path")]
    pub storage_path: PathBuf,

    /// BIP44 coin type used for every derivation path.
    #[serde(default = "default_coin_type")]
    pub coin_type: u32,

    #[serde(default)]
    pub client: ClientOptions,

    #[serde(default)]
    pub sync: SyncOptions,

    #[serde(default = "default_background_sync_interval_secs")]
    pub background_sync_interval_secs: u64,

    /// Idle time after which a cached vault password is cleared.
    #[serde(default = "default_password_timeout_secs")]
    pub password_timeout_secs: u64,

    /// How long to wait for a hardware device to sign.
    #[serde(default = "default_signing_timeout_secs")]
    pub signing_timeout_secs: u64,

    #[serde(default)]
    pub remainder_strategy: RemainderStrategy,

    #[serde(default)]
    pub log_format: LogFormat,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Options for one sync cycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// First public address index to scan.
    #[serde(default)]
    pub address_start_index: u32,

    /// Consecutive unused addresses after which scanning stops.
    #[serde(default = "default_address_gap_limit")]
    pub address_gap_limit: u32,

    /// Consecutive empty accounts after which recovery stops.
    #[serde(default = "default_account_gap_limit")]
    pub account_gap_limit: u32,

    #[serde(default = "default_true")]
    pub sync_pending_transactions: bool,

    #[serde(default = "default_true")]
    pub sync_incoming_transactions: bool,

    #[serde(default = "default_true")]
    pub automatic_output_consolidation: bool,

    #[serde(default = "default_output_consolidation_threshold")]
    pub output_consolidation_threshold: usize,

    /// Resubmit a pending transaction once its last broadcast is this old.
    #[serde(default = "default_pending_retry_after_secs")]
    pub pending_retry_after_secs: u64,

    /// A sync within this interval of the previous one returns the cached balance.
    #[serde(default = "default_min_sync_interval_ms")]
    pub min_sync_interval_ms: u64,

    #[serde(default)]
    pub force_syncing: bool,
}

// ── Defaults ───────────────────────────────────────────────────────────

fn default_storage_path() -> PathBuf {
    PathBuf::from("./tessera_wallet")
}

fn default_coin_type() -> u32 {
    4219
}

fn default_background_sync_interval_secs() -> u64 {
    7
}

fn default_password_timeout_secs() -> u64 {
    300
}

fn default_signing_timeout_secs() -> u64 {
    120
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

fn default_address_gap_limit() -> u32 {
    20
}

fn default_account_gap_limit() -> u32 {
    3
}

fn default_output_consolidation_threshold() -> usize {
    100
}

fn default_pending_retry_after_secs() -> u64 {
    30
}

fn default_min_sync_interval_ms() -> u64 {
    1000
}

// ── Impl ───────────────────────────────────────────────────────────────

impl WalletConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: &Path) -> Result<Self, WalletError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| WalletError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, WalletError> {
        toml::from_str(s).map_err(|e| WalletError::Config(e.to_string()))
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, WalletError> {
        toml::to_string_pretty(self).map_err(|e| WalletError::Config(e.to_string()))
    }

    /// Install the global tracing subscriber described by `log_format` and `log_level`.
    ///
    /// An already installed subscriber is left in place.
    pub fn init_logging(&self) -> Result<(), WalletError> {
        match init_logging(self.log_format, &self.log_level) {
            Ok(()) | Err(LoggingError::AlreadyInitialized(_)) => Ok(()),
            Err(e) => Err(WalletError::Config(e.to_string())),
        }
    }
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            storage_path: default_storage_path(),
            coin_type: default_coin_type(),
            client: ClientOptions::default(),
            sync: SyncOptions::default(),
            background_sync_interval_secs: default_background_sync_interval_secs(),
            password_timeout_secs: default_password_timeout_secs(),
            signing_timeout_secs: default_signing_timeout_secs(),
            remainder_strategy: RemainderStrategy::default(),
            log_format: LogFormat::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            address_start_index: 0,
            address_gap_limit: default_address_gap_limit(),
            account_gap_limit: default_account_gap_limit(),
            sync_pending_transactions: true,
            sync_incoming_transactions: true,
            automatic_output_consolidation: true,
            output_consolidation_threshold: default_output_consolidation_threshold(),
            pending_retry_after_secs: default_pending_retry_after_secs(),
            min_sync_interval_ms: default_min_sync_interval_ms(),
            force_syncing: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_round_trips_through_toml() {
        let config = WalletConfig::default();
        let toml_str = config.to_toml_string().unwrap();
        let parsed = WalletConfig::from_toml_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = WalletConfig::from_toml_str("").unwrap();
        assert_eq!(config.background_sync_interval_secs, 7);
        assert_eq!(config.password_timeout_secs, 300);
        assert_eq!(config.signing_timeout_secs, 120);
        assert_eq!(config.sync.address_gap_limit, 20);
        assert_eq!(config.sync.account_gap_limit, 3);
        assert_eq!(config.sync.output_consolidation_threshold, 100);
        assert_eq!(config.remainder_strategy, RemainderStrategy::ReuseFirstAddress);
        assert_eq!(config.client.request_timeout_secs, 30);
    }

    #[test]
    fn partial_toml_overrides_only_given_fields() {
        let config = WalletConfig::from_toml_str(
            r#"
            coin_type = 1
            log_format = "json"

            [client]
            nodes = ["http://node-a:14265", "http://node-b:14265"]

            [sync]
            address_gap_limit = 5
            force_syncing = true
            "#,
        )
        .unwrap();
        assert_eq!(config.coin_type, 1);
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.client.nodes.len(), 2);
        assert_eq!(config.sync.address_gap_limit, 5);
        assert!(config.sync.force_syncing);
        assert!(config.sync.sync_pending_transactions);
        assert_eq!(config.sync.pending_retry_after_secs, 30);
    }

    #[test]
    fn malformed_toml_is_config_error() {
        let err = WalletConfig::from_toml_str("coin_type = \"many\"").unwrap_err();
        assert!(matches!(err, WalletError::Config(_)));
    }

    #[test]
    fn config_file_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("wallet.toml");
        std::fs::write(&path, "password_timeout_secs = 60\n").unwrap();
        let config = WalletConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.password_timeout_secs, 60);
        assert!(WalletConfig::from_toml_file(&dir.path().join("missing.toml")).is_err());
    }

    #[test]
    fn logging_init_tolerates_repeat_calls() {
        let config = WalletConfig::default();
        config.init_logging().unwrap();
        config.init_logging().unwrap();
    }
}
