//! Tessera wallet engine.
//!
//! A stateful UTXO wallet on top of a remote ledger node:
//! - Pluggable secret managers (mnemonic, seed, password vault, hardware)
//! - Accounts with public and internal address chains
//! - Balance computation over spendable, locked and conditional outputs
//! - Input selection, transaction building, signing and submission
//! - Ledger synchronization with reattachment of stuck transactions
//! - Output consolidation, claiming and native token / NFT / alias minting
//! - Encrypted backup and restore, events and a serialized command interface

pub mod account;
pub mod backup;
pub mod balance;
pub(crate) mod background;
pub mod builder;
pub mod command;
pub mod config;
pub(crate) mod context;
pub mod error;
pub mod events;
pub mod input_selection;
pub mod keystore;
pub(crate) mod locks;
pub mod secret;
pub mod shutdown;
pub mod transaction;
pub mod unlock;
pub mod wallet;

pub use account::{Account, SyncPhase};
pub use balance::{Balance, BaseCoinBalance, ConditionalOutput, NativeTokenBalance};
pub use builder::WalletBuilder;
pub use command::{AccountMethod, Command, Response};
pub use config::{SyncOptions, WalletConfig};
pub use error::{ErrorKind, WalletError};
pub use events::{
    EventFilter, Listener, SubscriptionId, TransactionProgress, WalletEvent, WalletEventKind,
};
pub use keystore::{
    decrypt_keystore, encrypt_keystore, load_keystore, save_keystore, KdfParams, KeystoreFile,
};
pub use secret::{
    HardwareSecretManager, MnemonicPhrase, Password, SecretManage, SecretManager,
    SecretManagerKind, SeedSecretManager, SigningDevice, VaultSecretManager,
};
pub use transaction::{
    ClaimableOutput, CreateAliasParams, MintNativeTokenParams, MintNftParams,
    MintTokenTransaction, PreparedTransactionData, RemainderStrategy, SendAmountParams,
    SendNativeTokensParams, SendNftParams, SignedTransactionData, TransactionOptions,
};
pub use wallet::{AccountIdentifier, Wallet};
