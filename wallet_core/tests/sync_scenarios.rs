//! Ledger synchronization: discovery, confirmation, conflicts, reattachment
//! and incoming transactions.

mod common;

use common::{first_address, harness, stranger};
use tessera_client::NodeApi;
use tessera_store::{OutputFilter, TransactionFilter};
use tessera_types::{
    Address, BasicOutput, InclusionState, Output, SignedTransaction, TransactionEssence, Unlock,
};
use tessera_wallet::{SendAmountParams, SyncOptions, SyncPhase, WalletEvent, WalletError};

fn pay(amount: u64) -> Vec<SendAmountParams> {
    vec![SendAmountParams {
        address: stranger(9),
        amount,
    }]
}

#[tokio::test]
async fn sync_discovers_funded_outputs() {
    let h = harness().await;
    let account = h.wallet.create_account(None).await.unwrap();
    let funded = h.node.fund(first_address(&account).await, 1_500_000);

    let balance = account.sync(None).await.unwrap();
    assert_eq!(balance.base_coin.total, 1_500_000);
    assert_eq!(account.unspent_outputs().unwrap()[0].output_id, funded);
    assert_eq!(account.sync_phase(), SyncPhase::Idle);

    let events = h.events();
    assert!(events.iter().any(|e| matches!(
        e,
        WalletEvent::NewOutput { output_id, amount: 1_500_000, .. } if *output_id == funded
    )));
    assert!(events
        .iter()
        .any(|e| matches!(e, WalletEvent::BalanceChanged { account: 0, .. })));
    assert!(account.addresses().await[0].used);
}

#[tokio::test]
async fn replaying_a_sync_changes_nothing() {
    let h = harness().await;
    let account = h.wallet.create_account(None).await.unwrap();
    h.node.fund(first_address(&account).await, 1_000_000);
    account.sync(None).await.unwrap();
    let outputs = account.outputs(&OutputFilter::all()).unwrap();
    let transactions = account.transactions(&TransactionFilter::all()).unwrap();
    h.clear_events();

    let balance = account.sync(None).await.unwrap();
    assert_eq!(account.outputs(&OutputFilter::all()).unwrap(), outputs);
    assert_eq!(account.transactions(&TransactionFilter::all()).unwrap(), transactions);
    assert_eq!(balance.base_coin.total, 1_000_000);
    assert!(
        h.events().is_empty(),
        "a no-op sync emitted events: {:?}",
        h.events()
    );
}

#[tokio::test]
async fn outputs_on_look_ahead_addresses_are_found() {
    let h = harness().await;
    let account = h.wallet.create_account(None).await.unwrap();
    let ahead = account.generate_addresses(5, false).await.unwrap();
    let fifth = *ahead[4].address.inner();
    h.node.fund(fifth, 700_000);

    let balance = account.sync(None).await.unwrap();
    assert_eq!(balance.base_coin.total, 700_000);
    let addresses = account.addresses().await;
    assert!(addresses.iter().any(|a| *a.address.inner() == fifth && a.used));
}

#[tokio::test]
async fn conflicting_transaction_frees_its_inputs() {
    let h = harness().await;
    let account = h.wallet.create_account(None).await.unwrap();
    h.node.fund(first_address(&account).await, 1_000_000);
    account.sync(None).await.unwrap();

    let tx = account.send_amount(pay(400_000), None).await.unwrap();
    assert_eq!(account.balance().await.unwrap().base_coin.available, 0);

    h.node.conflict(&tx.transaction_id);
    let balance = account.sync(None).await.unwrap();
    assert_eq!(balance.base_coin.available, 1_000_000);
    assert_eq!(
        account.get_transaction(&tx.transaction_id).unwrap().inclusion_state,
        InclusionState::Conflicting
    );
    assert!(h.events().iter().any(|e| matches!(
        e,
        WalletEvent::TransactionConflicting { transaction_id, .. } if *transaction_id == tx.transaction_id
    )));
}

#[tokio::test]
async fn stuck_transaction_is_reattached() {
    let h = harness().await;
    let account = h.wallet.create_account(None).await.unwrap();
    h.node.fund(first_address(&account).await, 1_000_000);
    account.sync(None).await.unwrap();
    let tx = account.send_amount(pay(400_000), None).await.unwrap();

    // Not old enough yet.
    account.sync(None).await.unwrap();
    assert_eq!(h.node.submitted().len(), 1);

    h.clock.advance(31);
    account.sync(None).await.unwrap();
    assert_eq!(h.node.submitted(), vec![tx.transaction_id, tx.transaction_id]);
    let record = account.get_transaction(&tx.transaction_id).unwrap();
    assert_eq!(record.broadcast_attempts, 2);
    assert!(record.is_pending());
    assert!(h.events().iter().any(|e| matches!(
        e,
        WalletEvent::Reattached { attempt: 2, transaction_id, .. } if *transaction_id == tx.transaction_id
    )));
    assert_eq!(h.wallet.stats().reattachments, 1);
}

#[tokio::test]
async fn incoming_transaction_is_recorded() {
    let h = harness().await;
    let account = h.wallet.create_account(None).await.unwrap();
    let ours = first_address(&account).await;
    let theirs = Address::Ed25519([42; 32]);
    let source = h.node.fund(theirs, 3_000_000);

    let payload = SignedTransaction {
        essence: TransactionEssence {
            network_id: 1,
            inputs: vec![source],
            inputs_commitment: [0; 32],
            outputs: vec![
                Output::Basic(BasicOutput::new(1_000_000, ours)),
                Output::Basic(BasicOutput::new(2_000_000, theirs)),
            ],
            tag: None,
        },
        unlocks: vec![Unlock::Reference(0)],
    };
    let id = h.node.submit_transaction(&payload).await.unwrap();
    h.node.confirm(&id);

    let balance = account.sync(None).await.unwrap();
    assert_eq!(balance.base_coin.total, 1_000_000);
    let incoming = account.incoming_transactions().unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].transaction_id, id);
    assert_eq!(incoming[0].inclusion_state, InclusionState::Confirmed);
    assert!(h.events().iter().any(|e| matches!(
        e,
        WalletEvent::NewTransaction { incoming: true, transaction_id, .. } if *transaction_id == id
    )));
}

#[tokio::test]
async fn incoming_transactions_can_be_skipped() {
    let h = harness().await;
    let account = h.wallet.create_account(None).await.unwrap();
    h.node.fund(first_address(&account).await, 1_000_000);
    let options = SyncOptions {
        sync_incoming_transactions: false,
        ..h.wallet.config().sync
    };
    account.sync(Some(options)).await.unwrap();
    assert_eq!(account.unspent_outputs().unwrap().len(), 1);
    assert!(account.incoming_transactions().unwrap().is_empty());
}

#[tokio::test]
async fn externally_spent_output_leaves_the_balance() {
    let h = harness().await;
    let account = h.wallet.create_account(None).await.unwrap();
    let funded = h.node.fund(first_address(&account).await, 1_000_000);
    account.sync(None).await.unwrap();

    let unknown = tessera_types::TransactionId::new([0x55; 32]);
    h.node.spend_externally(&funded, unknown);
    let balance = account.sync(None).await.unwrap();
    assert_eq!(balance.base_coin.total, 0);
    let spent = account.outputs(&OutputFilter::spent()).unwrap();
    assert_eq!(spent.len(), 1);
    assert!(spent[0].is_spent);
}

#[tokio::test]
async fn failed_sync_leaves_state_untouched() {
    let h = harness().await;
    let account = h.wallet.create_account(None).await.unwrap();
    h.node.fund(first_address(&account).await, 1_000_000);
    account.sync(None).await.unwrap();
    let before = account.outputs(&OutputFilter::all()).unwrap();

    h.node.fund(first_address(&account).await, 2_000_000);
    h.node.set_offline(true);
    let err = account.sync(None).await.unwrap_err();
    assert!(matches!(err, WalletError::SyncFailed(_)));
    assert_eq!(account.outputs(&OutputFilter::all()).unwrap(), before);
    assert_eq!(account.sync_phase(), SyncPhase::Idle);
    assert!(h.events().iter().any(|e| matches!(e, WalletEvent::Error { account: Some(0), .. })));

    h.node.set_offline(false);
    assert_eq!(account.sync(None).await.unwrap().base_coin.total, 3_000_000);
}

#[tokio::test]
async fn sync_all_covers_every_account() {
    let h = harness().await;
    let first = h.wallet.create_account(Some("first".into())).await.unwrap();
    let second = h.wallet.create_account(Some("second".into())).await.unwrap();
    h.node.fund(first_address(&first).await, 1_000_000);
    h.node.fund(first_address(&second).await, 2_000_000);

    let balances = h.wallet.sync_all(None).await.unwrap();
    let totals: Vec<u64> = balances.iter().map(|b| b.base_coin.total).collect();
    assert_eq!(totals, vec![1_000_000, 2_000_000]);
}
