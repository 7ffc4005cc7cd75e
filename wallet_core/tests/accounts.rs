//! Wallet-level scenarios: account lifecycle, recovery, backup and restore,
//! vault handling, background syncing and the command interface.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{first_address, harness, harness_with, seed_manager, test_config, MNEMONIC};
use tessera_nullables::{NullClock, NullNode, NullStore};
use tessera_wallet::{
    AccountIdentifier, ErrorKind, KdfParams, MnemonicPhrase, Password, SecretManager,
    VaultSecretManager, Wallet, WalletError, WalletEvent,
};

// ---------------------------------------------------------------------------
// Account lifecycle
// ---------------------------------------------------------------------------

#[tokio::test]
async fn accounts_get_consecutive_indexes_and_one_address() {
    let h = harness().await;
    let first = h.wallet.create_account(None).await.unwrap();
    let second = h.wallet.create_account(Some("savings".into())).await.unwrap();

    assert_eq!(first.index(), 0);
    assert_eq!(first.alias().await, "0");
    assert_eq!(second.index(), 1);
    assert_eq!(first.addresses().await.len(), 1);
    assert_ne!(first_address(&first).await, first_address(&second).await);

    let by_alias = h.wallet.get_account("savings").await.unwrap();
    assert_eq!(by_alias.index(), 1);
    let by_index = h.wallet.get_account(0u32).await.unwrap();
    assert_eq!(by_index.index(), 0);
}

#[tokio::test]
async fn duplicate_alias_is_rejected() {
    let h = harness().await;
    h.wallet.create_account(Some("main".into())).await.unwrap();
    let Err(err) = h.wallet.create_account(Some("main".into())).await else {
        panic!("duplicate alias accepted");
    };
    assert!(matches!(err, WalletError::AccountAliasAlreadyExists(alias) if alias == "main"));
    assert_eq!(h.wallet.get_accounts().await.len(), 1);
}

#[tokio::test]
async fn remove_latest_account_frees_its_index() {
    let h = harness().await;
    h.wallet.create_account(None).await.unwrap();
    let second = h.wallet.create_account(None).await.unwrap();
    let address = first_address(&second).await;

    let err = h.wallet.remove_account(0u32).await.unwrap_err();
    assert!(matches!(err, WalletError::CannotRemoveAccount(_)));
    assert_eq!(err.kind(), ErrorKind::State);

    assert_eq!(h.wallet.remove_latest_account().await.unwrap(), 1);
    assert!(matches!(
        h.wallet.get_account(1u32).await,
        Err(WalletError::AccountNotFound(_))
    ));

    let recreated = h.wallet.create_account(None).await.unwrap();
    assert_eq!(recreated.index(), 1);
    assert_eq!(first_address(&recreated).await, address);
}

#[tokio::test]
async fn reopening_reloads_accounts() {
    let node = Arc::new(NullNode::default());
    let store = Arc::new(NullStore::new());
    let open = || {
        Wallet::builder()
            .with_config(test_config())
            .with_secret_manager(seed_manager(3))
            .with_store(store.clone())
            .with_node(node.clone())
            .with_clock(Arc::new(NullClock::default()))
            .finish()
    };

    let wallet = open().await.unwrap();
    let account = wallet.create_account(Some("kept".into())).await.unwrap();
    node.fund(first_address(&account).await, 1_000_000);
    account.sync(None).await.unwrap();
    drop(wallet);

    let reopened = open().await.unwrap();
    let account = reopened.get_account("kept").await.unwrap();
    assert_eq!(account.balance().await.unwrap().base_coin.total, 1_000_000);
}

#[tokio::test]
async fn coin_type_mismatch_is_a_config_error() {
    let node = Arc::new(NullNode::default());
    let store = Arc::new(NullStore::new());
    let wallet = Wallet::builder()
        .with_config(test_config())
        .with_secret_manager(seed_manager(3))
        .with_store(store.clone())
        .with_node(node.clone())
        .finish()
        .await
        .unwrap();
    wallet.create_account(None).await.unwrap();
    drop(wallet);

    let mut config = test_config();
    config.coin_type = 1;
    let Err(err) = Wallet::builder()
        .with_config(config)
        .with_secret_manager(seed_manager(3))
        .with_store(store)
        .with_node(node)
        .finish()
        .await
    else {
        panic!("wallet opened with a different coin type");
    };
    assert!(matches!(err, WalletError::Config(_)));
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn recovery_keeps_accounts_with_history() {
    let node = Arc::new(NullNode::default());
    let original = harness_with(seed_manager(4), node.clone()).await;
    original.wallet.create_account(None).await.unwrap();
    let funded = original.wallet.create_account(None).await.unwrap();
    node.fund(first_address(&funded).await, 1_000_000);

    let recovered = harness_with(seed_manager(4), node.clone()).await;
    let accounts = recovered.wallet.recover_accounts(0, 2, 5, None).await.unwrap();
    let indexes: Vec<u32> = accounts.iter().map(|a| a.index()).collect();
    assert_eq!(indexes, vec![0, 1]);
    assert_eq!(accounts[1].balance().await.unwrap().base_coin.total, 1_000_000);
}

// ---------------------------------------------------------------------------
// Backup and restore
// ---------------------------------------------------------------------------

#[tokio::test]
async fn backup_then_restore_reproduces_accounts() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wallet.backup");
    let password = Password::new("correct horse");

    let node = Arc::new(NullNode::default());
    let source = harness_with(seed_manager(5), node.clone()).await;
    let account = source.wallet.create_account(Some("main".into())).await.unwrap();
    account.generate_addresses(2, false).await.unwrap();
    node.fund(first_address(&account).await, 3_000_000);
    let balance = account.sync(None).await.unwrap();
    source.wallet.backup(&path, &password).await.unwrap();

    let target = harness_with(seed_manager(6), node.clone()).await;
    target.wallet.restore_backup(&path, &password).await.unwrap();
    let restored = target.wallet.get_account("main").await.unwrap();
    assert_eq!(restored.addresses().await, account.addresses().await);
    assert_eq!(restored.balance().await.unwrap(), balance);

    // The seed came along: both wallets derive the same next address.
    let next_source = account.generate_addresses(1, false).await.unwrap();
    let next_target = restored.generate_addresses(1, false).await.unwrap();
    assert_eq!(next_source, next_target);
}

#[tokio::test]
async fn failed_restore_leaves_the_wallet_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wallet.backup");
    let password = Password::new("pw");

    let node = Arc::new(NullNode::default());
    let source = harness_with(seed_manager(3), node.clone()).await;
    let backed_up = source.wallet.create_account(None).await.unwrap();
    source.wallet.create_account(None).await.unwrap();
    source.wallet.backup(&path, &password).await.unwrap();

    let target = harness_with(seed_manager(7), node.clone()).await;
    let coin_type = target.wallet.config().coin_type;
    // The first account is written, the second fails.
    target.store.fail_batch_after(1);
    let Err(err) = target.wallet.restore_backup(&path, &password).await else {
        panic!("restore succeeded despite a store failure");
    };
    assert!(matches!(err, WalletError::Storage(_)));
    assert!(target.wallet.get_accounts().await.is_empty());
    assert_eq!(target.wallet.config().coin_type, coin_type);

    // The wallet keeps its own seed and nothing of the first account remains.
    let fresh = target.wallet.create_account(None).await.unwrap();
    assert_eq!(fresh.index(), 0);
    assert_ne!(first_address(&fresh).await, first_address(&backed_up).await);
    assert_eq!(fresh.balance().await.unwrap().base_coin.total, 0);
}

#[tokio::test]
async fn restore_requires_an_empty_wallet() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wallet.backup");
    let password = Password::new("pw");

    let h = harness().await;
    h.wallet.create_account(None).await.unwrap();
    h.wallet.backup(&path, &password).await.unwrap();

    let err = h.wallet.restore_backup(&path, &password).await.unwrap_err();
    assert!(matches!(err, WalletError::AccountsAlreadyExist));
}

#[tokio::test]
async fn restore_with_wrong_password_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("wallet.backup");

    let source = harness().await;
    source.wallet.create_account(None).await.unwrap();
    source.wallet.backup(&path, &Password::new("right")).await.unwrap();

    let target = harness().await;
    let err = target
        .wallet
        .restore_backup(&path, &Password::new("wrong"))
        .await
        .unwrap_err();
    assert!(matches!(err, WalletError::InvalidPassword));
    assert!(target.wallet.get_accounts().await.is_empty());
}

// ---------------------------------------------------------------------------
// Secrets
// ---------------------------------------------------------------------------

#[tokio::test]
async fn store_mnemonic_only_on_an_empty_wallet() {
    let h = harness().await;
    let phrase = h.wallet.generate_mnemonic().unwrap();
    h.wallet.verify_mnemonic(&phrase).unwrap();
    h.wallet.store_mnemonic(MnemonicPhrase::new(MNEMONIC)).await.unwrap();
    h.wallet.create_account(None).await.unwrap();

    let err = h.wallet.store_mnemonic(phrase).await.unwrap_err();
    assert!(matches!(err, WalletError::AccountsAlreadyExist));
    assert!(h
        .wallet
        .verify_mnemonic(&MnemonicPhrase::new("not a mnemonic"))
        .is_err());
}

#[tokio::test]
async fn vault_locks_derivation_until_password_is_set() {
    let dir = tempfile::tempdir().unwrap();
    let vault = VaultSecretManager::new(dir.path().join("vault.key"), Duration::from_secs(300))
        .with_kdf_params(KdfParams::testing());
    let h = harness_with(SecretManager::Vault(vault), Arc::new(NullNode::default())).await;

    let Err(err) = h.wallet.create_account(None).await else {
        panic!("account created with a locked vault");
    };
    assert_eq!(err.kind(), ErrorKind::Secret);

    let password = Password::new("vault password");
    h.wallet.set_vault_password(&password).await.unwrap();
    assert!(h.wallet.is_vault_password_available().await.unwrap());
    h.wallet.store_mnemonic(MnemonicPhrase::new(MNEMONIC)).await.unwrap();
    let account = h.wallet.create_account(None).await.unwrap();

    h.wallet.clear_vault_password().await.unwrap();
    let err = account.generate_addresses(1, false).await.unwrap_err();
    assert!(matches!(err, WalletError::LockedVault));

    h.wallet.set_vault_password(&password).await.unwrap();
    account.generate_addresses(1, false).await.unwrap();

    let changes: Vec<bool> = h
        .events()
        .iter()
        .filter_map(|e| match e {
            WalletEvent::StrongholdStatusChange { unlocked } => Some(*unlocked),
            _ => None,
        })
        .collect();
    assert_eq!(changes, vec![true, false, true]);
}

#[tokio::test]
async fn vault_rejects_wrong_password() {
    let dir = tempfile::tempdir().unwrap();
    let vault = VaultSecretManager::new(dir.path().join("vault.key"), Duration::from_secs(300))
        .with_kdf_params(KdfParams::testing());
    let h = harness_with(SecretManager::Vault(vault), Arc::new(NullNode::default())).await;
    h.wallet.set_vault_password(&Password::new("first")).await.unwrap();
    h.wallet.store_mnemonic(MnemonicPhrase::new(MNEMONIC)).await.unwrap();
    h.wallet.clear_vault_password().await.unwrap();

    let err = h.wallet.set_vault_password(&Password::new("second")).await.unwrap_err();
    assert!(matches!(err, WalletError::InvalidPassword));

    h.wallet
        .change_vault_password(&Password::new("first"), &Password::new("second"))
        .await
        .unwrap();
    h.wallet.set_vault_password(&Password::new("second")).await.unwrap();
}

#[tokio::test]
async fn non_vault_manager_rejects_vault_calls() {
    let h = harness().await;
    let err = h.wallet.set_vault_password(&Password::new("pw")).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Secret);
}

// ---------------------------------------------------------------------------
// Background syncing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn background_sync_picks_up_new_funds() {
    let h = harness().await;
    let account = h.wallet.create_account(None).await.unwrap();
    h.wallet
        .start_background_syncing(None, Some(Duration::from_millis(10)))
        .unwrap();
    assert!(h.wallet.is_background_syncing());
    assert!(matches!(
        h.wallet.start_background_syncing(None, None),
        Err(WalletError::BackgroundSyncAlreadyRunning)
    ));

    h.node.fund(first_address(&account).await, 1_000_000);
    let mut total = 0;
    for _ in 0..100 {
        tokio::time::sleep(Duration::from_millis(10)).await;
        total = account.balance().await.unwrap().base_coin.total;
        if total > 0 {
            break;
        }
    }
    assert_eq!(total, 1_000_000);

    h.wallet.stop_background_syncing().await.unwrap();
    assert!(!h.wallet.is_background_syncing());
}

// ---------------------------------------------------------------------------
// Command interface
// ---------------------------------------------------------------------------

#[tokio::test]
async fn json_commands_drive_the_wallet() {
    let h = harness().await;
    let created: serde_json::Value = serde_json::from_str(
        &h.wallet
            .execute_json(r#"{"cmd":"createAccount","payload":{"alias":"cli"}}"#)
            .await,
    )
    .unwrap();
    assert_eq!(created["type"], "account");
    assert_eq!(created["payload"]["alias"], "cli");

    let account = h.wallet.get_account(AccountIdentifier::from("cli")).await.unwrap();
    h.node.fund(first_address(&account).await, 1_000_000);
    let synced: serde_json::Value = serde_json::from_str(
        &h.wallet
            .execute_json(r#"{"cmd":"callAccount","payload":{"accountId":"cli","method":{"name":"sync","data":null}}}"#)
            .await,
    )
    .unwrap();
    assert_eq!(synced["type"], "balance");
    assert_eq!(synced["payload"]["base_coin"]["total"], 1_000_000);

    let failed: serde_json::Value = serde_json::from_str(
        &h.wallet
            .execute_json(r#"{"cmd":"callAccount","payload":{"accountId":7,"method":{"name":"getBalance"}}}"#)
            .await,
    )
    .unwrap();
    assert_eq!(failed["type"], "error");
    assert_eq!(failed["payload"]["kind"], "state");

    let garbage: serde_json::Value =
        serde_json::from_str(&h.wallet.execute_json("{not json").await).unwrap();
    assert_eq!(garbage["payload"]["kind"], "input");
}
