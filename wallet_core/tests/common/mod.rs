//! Shared wiring for the wallet scenario tests: a wallet over a null node,
//! a null store and a null clock.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use tessera_nullables::{NullClock, NullNode, NullStore};
use tessera_types::{Address, Clock};
use tessera_wallet::{
    Account, EventFilter, KdfParams, SecretManager, Wallet, WalletConfig, WalletEvent,
};
use zeroize::Zeroizing;

pub const MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

pub struct Harness {
    pub wallet: Wallet,
    pub node: Arc<NullNode>,
    pub clock: Arc<NullClock>,
    pub store: Arc<NullStore>,
    pub events: Arc<Mutex<Vec<WalletEvent>>>,
}

pub fn test_config() -> WalletConfig {
    let mut config = WalletConfig::default();
    config.sync.min_sync_interval_ms = 0;
    config.sync.automatic_output_consolidation = false;
    config
}

pub fn seed_manager(byte: u8) -> SecretManager {
    SecretManager::from_seed(Zeroizing::new([byte; 64]))
}

pub async fn harness() -> Harness {
    harness_with(seed_manager(3), Arc::new(NullNode::default())).await
}

/// A wallet over `node` with its own store and clock.
pub async fn harness_with(secret_manager: SecretManager, node: Arc<NullNode>) -> Harness {
    let clock = Arc::new(NullClock::default());
    node.set_time(clock.now());
    let store = Arc::new(NullStore::new());
    let wallet = Wallet::builder()
        .with_config(test_config())
        .with_secret_manager(secret_manager)
        .with_store(store.clone())
        .with_node(node.clone())
        .with_clock(clock.clone())
        .with_kdf_params(KdfParams::testing())
        .finish()
        .await
        .expect("wallet builds");

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&events);
    wallet.subscribe(
        EventFilter::all(),
        Arc::new(move |event: &WalletEvent| sink.lock().unwrap().push(event.clone())),
    );

    Harness {
        wallet,
        node,
        clock,
        store,
        events,
    }
}

impl Harness {
    pub fn events(&self) -> Vec<WalletEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().unwrap().clear();
    }
}

pub async fn first_address(account: &Account) -> Address {
    *account.addresses().await[0].address.inner()
}

/// Bech32 form of an address nobody in the test owns.
pub fn stranger(byte: u8) -> String {
    Address::Ed25519([byte; 32]).to_bech32("tst").unwrap().to_string()
}
