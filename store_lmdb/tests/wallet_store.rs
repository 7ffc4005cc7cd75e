use tessera_store::{
    AccountAddress, AccountRecord, AccountStore, OutputFilter, OutputRecord, OutputStore,
    SpentMark, StoreError, SyncBatch, TransactionFilter, TransactionRecord, TransactionStore,
    WalletStore,
};
use tessera_store_lmdb::LmdbWalletStore;
use tessera_types::{
    Address, BasicOutput, InclusionState, Output, OutputId, SignedTransaction, Timestamp,
    TransactionEssence, TransactionId,
};

fn open(dir: &tempfile::TempDir) -> LmdbWalletStore {
    LmdbWalletStore::open_with_map_size(dir.path(), 10 << 20).expect("open store")
}

fn account(index: u32) -> AccountRecord {
    let mut record = AccountRecord::new(index, format!("account-{index}"), 4218);
    record.public_addresses.push(AccountAddress {
        address: Address::Ed25519([index as u8; 32]).to_bech32("tst").unwrap(),
        key_index: 0,
        internal: false,
        used: false,
    });
    record
}

fn output(n: u8, amount: u64) -> OutputRecord {
    OutputRecord {
        output_id: OutputId::new(TransactionId::new([n; 32]), 0),
        output: Output::Basic(BasicOutput::new(amount, Address::Ed25519([0; 32]))),
        address: Address::Ed25519([0; 32]),
        chain: None,
        is_spent: false,
        spent_by: None,
        remainder: false,
        network_id: 1,
        booked_at: Timestamp::new(100),
    }
}

fn transaction(n: u8, inputs: Vec<OutputId>, state: InclusionState) -> TransactionRecord {
    TransactionRecord {
        transaction_id: TransactionId::new([n; 32]),
        payload: SignedTransaction {
            essence: TransactionEssence {
                network_id: 1,
                inputs,
                inputs_commitment: [0; 32],
                outputs: vec![Output::Basic(BasicOutput::new(1, Address::Ed25519([5; 32])))],
                tag: None,
            },
            unlocks: Vec::new(),
        },
        inclusion_state: state,
        timestamp: Timestamp::new(n as u64),
        incoming: false,
        network_id: 1,
        broadcast_attempts: 1,
        last_broadcast: None,
    }
}

fn spend_batch(spent: &OutputRecord, tx_byte: u8) -> SyncBatch {
    let tx = transaction(tx_byte, vec![spent.output_id], InclusionState::Confirmed);
    SyncBatch {
        account: Some(account(0)),
        upsert_outputs: vec![output(50, 10)],
        spent_outputs: vec![SpentMark {
            output_id: spent.output_id,
            spent_by: tx.transaction_id,
        }],
        transactions: vec![tx],
    }
}

#[test]
fn batch_applies_all_parts() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);
    let spent = output(1, 1_000_000);
    store.upsert_output(0, &spent).unwrap();

    store.apply_batch(0, &spend_batch(&spent, 9)).unwrap();

    assert_eq!(store.get_account(0).unwrap().alias, "account-0");
    let unspent = store.get_outputs(0, &OutputFilter::unspent()).unwrap();
    assert_eq!(unspent.len(), 1);
    assert_eq!(unspent[0].output_id, output(50, 10).output_id);
    let gone = store.get_output(0, &spent.output_id).unwrap();
    assert!(gone.is_spent);
    assert_eq!(gone.spent_by, Some(TransactionId::new([9; 32])));
    assert_eq!(store.get_transactions(0, &TransactionFilter::all()).unwrap().len(), 1);
}

#[test]
fn replaying_a_batch_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);
    let spent = output(1, 1_000_000);
    store.upsert_output(0, &spent).unwrap();
    let batch = spend_batch(&spent, 9);

    store.apply_batch(0, &batch).unwrap();
    let outputs = store.get_outputs(0, &OutputFilter::all()).unwrap();
    let txs = store.get_transactions(0, &TransactionFilter::all()).unwrap();

    store.apply_batch(0, &batch).unwrap();
    // Re-upserting the spent output as unspent must not resurrect it.
    store.upsert_output(0, &spent).unwrap();

    assert_eq!(store.get_outputs(0, &OutputFilter::all()).unwrap(), outputs);
    assert_eq!(store.get_transactions(0, &TransactionFilter::all()).unwrap(), txs);
}

#[test]
fn inconsistent_batch_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);
    let spent = output(1, 1_000_000);
    store.upsert_output(0, &spent).unwrap();

    let mut batch = spend_batch(&spent, 9);
    batch.transactions.clear();

    let err = store.apply_batch(0, &batch).unwrap_err();
    assert!(matches!(err, StoreError::Inconsistent(_)));
    assert!(!store.account_exists(0).unwrap());
    assert!(!store.get_output(0, &spent.output_id).unwrap().is_spent);
}

#[test]
fn data_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = open(&dir);
        store.put_account(&account(0)).unwrap();
        store.put_account(&account(1)).unwrap();
        store.upsert_output(1, &output(3, 42)).unwrap();
    }
    let store = open(&dir);
    let accounts = store.iter_accounts().unwrap();
    assert_eq!(accounts.iter().map(|a| a.index).collect::<Vec<_>>(), vec![0, 1]);
    assert_eq!(store.get_outputs(1, &OutputFilter::unspent()).unwrap().len(), 1);
    assert!(store.get_outputs(0, &OutputFilter::unspent()).unwrap().is_empty());
}

#[test]
fn remove_account_data_leaves_others() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);
    store.put_account(&account(0)).unwrap();
    store.put_account(&account(1)).unwrap();
    store.upsert_output(0, &output(3, 42)).unwrap();
    store.upsert_output(1, &output(4, 42)).unwrap();
    store
        .append_transaction(1, &transaction(7, Vec::new(), InclusionState::Pending))
        .unwrap();

    store.remove_account_data(1).unwrap();

    assert_eq!(store.account_count().unwrap(), 1);
    assert!(store.get_outputs(1, &OutputFilter::all()).unwrap().is_empty());
    assert!(store.get_transactions(1, &TransactionFilter::all()).unwrap().is_empty());
    assert_eq!(store.get_outputs(0, &OutputFilter::all()).unwrap().len(), 1);
}

#[test]
fn pending_filter_and_ordering() {
    let dir = tempfile::tempdir().unwrap();
    let store = open(&dir);
    store
        .append_transaction(0, &transaction(3, Vec::new(), InclusionState::Pending))
        .unwrap();
    store
        .append_transaction(0, &transaction(1, Vec::new(), InclusionState::Pending))
        .unwrap();
    store
        .append_transaction(0, &transaction(2, Vec::new(), InclusionState::Conflicting))
        .unwrap();

    let pending = store.get_transactions(0, &TransactionFilter::pending()).unwrap();
    let ids: Vec<_> = pending.iter().map(|t| t.transaction_id).collect();
    assert_eq!(ids, vec![TransactionId::new([1; 32]), TransactionId::new([3; 32])]);
}
