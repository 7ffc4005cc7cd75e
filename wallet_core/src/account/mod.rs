//! Accounts: one BIP44 account index with its addresses, outputs and history.
//!
//! An [`Account`] is a cheap handle. All mutations of one account are
//! serialized by its record lock; reads of stored outputs and transactions go
//! straight to the store.

pub mod addresses;
pub(crate) mod reservation;
pub mod sync;

use std::sync::{Arc, Mutex};

use tessera_store::{
    AccountRecord, OutputFilter, OutputRecord, TransactionFilter, TransactionRecord,
};
use tessera_types::{OutputId, TransactionId};
use tokio::sync::RwLock;

use crate::balance::{compute_balance, Balance};
use crate::context::WalletContext;
use crate::error::WalletError;
use crate::locks::lock;
use crate::unlock::Unavailable;

use reservation::Reservations;
use sync::SyncState;

pub use sync::SyncPhase;

#[derive(Clone)]
pub struct Account {
    inner: Arc<AccountInner>,
}

pub(crate) struct AccountInner {
    index: u32,
    pub(crate) record: RwLock<AccountRecord>,
    pub(crate) reservations: Reservations,
    pub(crate) sync: Mutex<SyncState>,
    /// Held for a whole sync cycle so cycles of one account never overlap.
    pub(crate) sync_lock: tokio::sync::Mutex<()>,
    pub(crate) ctx: Arc<WalletContext>,
}

impl Account {
    pub(crate) fn new(record: AccountRecord, ctx: Arc<WalletContext>) -> Self {
        Self {
            inner: Arc::new(AccountInner {
                index: record.index,
                record: RwLock::new(record),
                reservations: Reservations::default(),
                sync: Mutex::new(SyncState::default()),
                sync_lock: tokio::sync::Mutex::new(()),
                ctx,
            }),
        }
    }

    pub(crate) fn inner(&self) -> &AccountInner {
        &self.inner
    }

    pub(crate) fn ctx(&self) -> &Arc<WalletContext> {
        &self.inner.ctx
    }

    pub fn index(&self) -> u32 {
        self.inner.index
    }

    pub async fn alias(&self) -> String {
        self.inner.record.read().await.alias.clone()
    }

    /// A copy of the persisted account record.
    pub async fn details(&self) -> AccountRecord {
        self.inner.record.read().await.clone()
    }

    pub fn sync_phase(&self) -> SyncPhase {
        lock(&self.inner.sync).phase
    }

    /// Number of outputs currently held back by in-flight sends.
    pub fn reserved_output_count(&self) -> usize {
        self.inner.reservations.len()
    }

    pub async fn balance(&self) -> Result<Balance, WalletError> {
        let rent = self.ctx().protocol().await?.rent_structure;
        let record = self.inner.record.read().await;
        let unspent = self.unspent_outputs()?;
        let unavailable = self.unavailable()?;
        compute_balance(&record, &unspent, &unavailable, &rent, self.ctx().now())
    }

    pub fn outputs(&self, filter: &OutputFilter) -> Result<Vec<OutputRecord>, WalletError> {
        Ok(self.ctx().store.get_outputs(self.index(), filter)?)
    }

    pub fn unspent_outputs(&self) -> Result<Vec<OutputRecord>, WalletError> {
        self.outputs(&OutputFilter::unspent())
    }

    pub fn get_output(&self, output_id: &OutputId) -> Result<OutputRecord, WalletError> {
        self.ctx()
            .store
            .get_output(self.index(), output_id)
            .map_err(|e| match e.is_not_found() {
                true => WalletError::OutputNotFound(*output_id),
                false => e.into(),
            })
    }

    pub fn transactions(&self, filter: &TransactionFilter) -> Result<Vec<TransactionRecord>, WalletError> {
        Ok(self.ctx().store.get_transactions(self.index(), filter)?)
    }

    pub fn pending_transactions(&self) -> Result<Vec<TransactionRecord>, WalletError> {
        self.transactions(&TransactionFilter::pending())
    }

    pub fn incoming_transactions(&self) -> Result<Vec<TransactionRecord>, WalletError> {
        self.transactions(&TransactionFilter::all().incoming(true))
    }

    pub fn get_transaction(&self, transaction_id: &TransactionId) -> Result<TransactionRecord, WalletError> {
        self.ctx()
            .store
            .get_transaction(self.index(), transaction_id)
            .map_err(|e| match e.is_not_found() {
                true => WalletError::TransactionNotFound(*transaction_id),
                false => e.into(),
            })
    }

    /// Outputs that input selection must skip right now.
    pub(crate) fn unavailable(&self) -> Result<Unavailable, WalletError> {
        let pending_spent = self
            .pending_transactions()?
            .iter()
            .filter(|tx| !tx.incoming)
            .flat_map(|tx| tx.inputs().iter().copied())
            .chain(self.inner.reservations.unrecorded())
            .collect();
        Ok(Unavailable {
            reserved: self.inner.reservations.snapshot(),
            pending_spent,
        })
    }
}
