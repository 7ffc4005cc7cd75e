//! Account synchronization.
//!
//! A cycle walks `Idle → FetchingOutputs → FetchingTransactions →
//! ReconcilingState → RetryingPending → ConsolidatingIfNeeded → Idle`.
//! The fetch phases only read. Everything they learn is committed as one
//! [`SyncBatch`] under the record lock, and events follow the commit.
//! A failure before the commit leaves stored state untouched.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Duration;

use futures_util::future::try_join_all;
use serde::{Deserialize, Serialize};
use tessera_client::{LedgerInclusionState, OutputWithMetadata};
use tessera_store::{
    AccountAddress, AccountRecord, OutputFilter, OutputRecord, SpentMark, SyncBatch,
    TransactionFilter, TransactionRecord,
};
use tessera_types::{Address, Bech32Address, InclusionState, OutputId, SignedTransaction, TransactionId};
use tessera_utils::{format_duration, Counter};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::Account;
use crate::balance::Balance;
use crate::config::SyncOptions;
use crate::error::{ErrorKind, WalletError};
use crate::events::WalletEvent;
use crate::locks::lock;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncPhase {
    #[default]
    Idle,
    FetchingOutputs,
    FetchingTransactions,
    ReconcilingState,
    RetryingPending,
    ConsolidatingIfNeeded,
}

#[derive(Default)]
pub(crate) struct SyncState {
    pub(crate) phase: SyncPhase,
    last_sync: Option<(Instant, Balance)>,
}

/// What a cycle learned from the node before reconciling.
#[derive(Default)]
struct Fetched {
    /// Look-ahead addresses up to the last one with activity.
    new_addresses: Vec<AccountAddress>,
    /// Addresses that hold or held outputs.
    active: HashSet<Address>,
    /// Output metadata keyed by id, with the address it was found on.
    outputs: BTreeMap<OutputId, (Address, OutputWithMetadata)>,
    inclusion: HashMap<TransactionId, LedgerInclusionState>,
    transactions: BTreeMap<TransactionId, SignedTransaction>,
}

/// End of the look-ahead window: `gap` indices past the highest used one.
fn window_end(highest_used: Option<u32>, gap: u32) -> u32 {
    highest_used.map_or(0, |i| i.saturating_add(1)).saturating_add(gap)
}

impl Account {
    /// Reconcile the account with the ledger and return its balance.
    pub async fn sync(&self, options: Option<SyncOptions>) -> Result<Balance, WalletError> {
        let options = options.unwrap_or_else(|| self.ctx().config().sync);
        let _cycle = self.inner().sync_lock.lock().await;

        if !options.force_syncing {
            if let Some(balance) = self.recent_balance(options.min_sync_interval_ms) {
                debug!(account = self.index(), "synced recently, returning cached balance");
                return Ok(balance);
            }
        }

        let started = Instant::now();
        let result = self.run_cycle(&options).await;
        self.set_phase(SyncPhase::Idle);
        match result {
            Ok(balance) => {
                self.ctx().stats.increment(Counter::SyncRuns);
                debug!(
                    account = self.index(),
                    elapsed = %format_duration(started.elapsed()),
                    total = balance.base_coin.total,
                    "sync finished"
                );
                Ok(balance)
            }
            Err(e) => {
                self.ctx().stats.increment(Counter::SyncFailures);
                warn!(account = self.index(), error = %e, "sync failed");
                self.ctx().emit(WalletEvent::Error {
                    account: Some(self.index()),
                    message: e.to_string(),
                });
                Err(e.into_sync_failure())
            }
        }
    }

    async fn run_cycle(&self, options: &SyncOptions) -> Result<Balance, WalletError> {
        let snapshot = self.details().await;
        let fetched = self.fetch(options, &snapshot).await?;
        let inclusion = fetched.inclusion.clone();
        let events = self.reconcile(fetched).await?;
        self.ctx().events.emit_all(&events);

        if let Err(e) = self.retry_pending(options, &inclusion).await {
            warn!(account = self.index(), error = %e, "retrying pending transactions failed");
        }
        if options.automatic_output_consolidation {
            if let Err(e) = self.consolidate_if_needed(options).await {
                warn!(account = self.index(), error = %e, "automatic consolidation failed");
            }
        }

        let balance = self.balance().await?;
        let previous = lock(&self.inner().sync)
            .last_sync
            .replace((Instant::now(), balance.clone()))
            .map(|(_, balance)| balance)
            .unwrap_or_default();
        if previous != balance {
            self.ctx().emit(WalletEvent::BalanceChanged {
                account: self.index(),
                balance: balance.clone(),
            });
        }
        Ok(balance)
    }

    fn recent_balance(&self, min_interval_ms: u64) -> Option<Balance> {
        let state = lock(&self.inner().sync);
        let (at, balance) = state.last_sync.as_ref()?;
        (at.elapsed() < Duration::from_millis(min_interval_ms)).then(|| balance.clone())
    }

    fn set_phase(&self, phase: SyncPhase) {
        let mut state = lock(&self.inner().sync);
        if state.phase != phase {
            debug!(account = self.index(), from = ?state.phase, to = ?phase, "sync phase");
            state.phase = phase;
        }
    }

    // ── Fetching ──────────────────────────────────────────────────────

    async fn fetch(&self, options: &SyncOptions, snapshot: &AccountRecord) -> Result<Fetched, WalletError> {
        self.set_phase(SyncPhase::FetchingOutputs);
        let mut fetched = Fetched::default();

        let known: Vec<Bech32Address> = snapshot
            .addresses()
            .filter(|a| a.internal || a.key_index >= options.address_start_index)
            .map(|a| a.address.clone())
            .collect();
        self.fetch_addresses(&known, &mut fetched).await?;
        for internal in [false, true] {
            self.scan_ahead(snapshot, internal, options.address_gap_limit, &mut fetched)
                .await?;
        }
        self.fetch_chain_owned(&mut fetched).await?;

        self.set_phase(SyncPhase::FetchingTransactions);
        let stored_tx: HashSet<TransactionId> = self
            .transactions(&TransactionFilter::all())?
            .into_iter()
            .map(|t| t.transaction_id)
            .collect();

        if options.sync_pending_transactions {
            let pending = self.pending_transactions()?;
            let node = self.ctx().node();
            let states = try_join_all(pending.iter().map(|tx| {
                self.ctx().request(
                    "inclusion state",
                    node.get_transaction_inclusion_state(&tx.transaction_id),
                )
            }))
            .await?;
            fetched.inclusion = pending.iter().map(|t| t.transaction_id).zip(states).collect();
        }

        let stored_outputs: HashMap<OutputId, bool> = self
            .outputs(&OutputFilter::all())?
            .into_iter()
            .map(|o| (o.output_id, o.is_spent))
            .collect();
        let mut wanted = BTreeSet::new();
        for (_, meta) in fetched.outputs.values() {
            let stored = stored_outputs.get(&meta.output_id);
            let creator = meta.output_id.transaction_id();
            if options.sync_incoming_transactions && stored.is_none() && !stored_tx.contains(creator) {
                wanted.insert(*creator);
            }
            if meta.is_spent && stored == Some(&false) {
                if let Some(spender) = meta.spent_by.filter(|s| !stored_tx.contains(s)) {
                    wanted.insert(spender);
                }
            }
        }
        for id in wanted {
            match self.fetch_transaction(&id).await? {
                Some(payload) => {
                    fetched.transactions.insert(id, payload);
                }
                None => debug!(account = self.index(), transaction_id = %id, "transaction unknown to node"),
            }
        }
        Ok(fetched)
    }

    async fn fetch_addresses(
        &self,
        addresses: &[Bech32Address],
        fetched: &mut Fetched,
    ) -> Result<(), WalletError> {
        let node = self.ctx().node();
        let results = try_join_all(addresses.iter().map(|address| {
            self.ctx()
                .request("address outputs", node.get_outputs_for_address(address))
        }))
        .await?;
        for (address, outputs) in addresses.iter().zip(results) {
            if !outputs.is_empty() {
                fetched.active.insert(*address.inner());
            }
            for output in outputs {
                fetched
                    .outputs
                    .entry(output.output_id)
                    .or_insert((*address.inner(), output));
            }
        }
        Ok(())
    }

    /// Query addresses past the highest known index until `gap` consecutive
    /// ones show no activity. A secret manager that cannot derive right now
    /// (a locked vault) limits the scan to known addresses.
    async fn scan_ahead(
        &self,
        snapshot: &AccountRecord,
        internal: bool,
        gap: u32,
        fetched: &mut Fetched,
    ) -> Result<(), WalletError> {
        let known = match internal {
            true => &snapshot.internal_addresses,
            false => &snapshot.public_addresses,
        };
        let mut highest_used = known
            .iter()
            .filter(|a| a.used || fetched.active.contains(a.address.inner()))
            .map(|a| a.key_index)
            .max();
        let mut next = snapshot.next_address_index(internal);
        let mut derived = Vec::new();
        loop {
            let end = window_end(highest_used, gap);
            if next >= end {
                break;
            }
            let window = match self.derive_range(snapshot.coin_type, next, end, internal).await {
                Ok(window) => window,
                Err(e) if e.kind() == ErrorKind::Secret => {
                    debug!(account = self.index(), internal, error = %e, "look-ahead skipped");
                    break;
                }
                Err(e) => return Err(e),
            };
            let addresses: Vec<Bech32Address> = window.iter().map(|a| a.address.clone()).collect();
            self.fetch_addresses(&addresses, fetched).await?;
            for address in &window {
                if fetched.active.contains(address.address.inner()) {
                    highest_used = highest_used.max(Some(address.key_index));
                }
            }
            derived.extend(window);
            next = end;
        }
        if let Some(highest) = highest_used {
            fetched
                .new_addresses
                .extend(derived.into_iter().filter(|a| a.key_index <= highest));
        }
        Ok(())
    }

    /// Outputs owned through alias and NFT chains the account holds.
    async fn fetch_chain_owned(&self, fetched: &mut Fetched) -> Result<(), WalletError> {
        let hrp = self.ctx().protocol().await?.bech32_hrp;
        let stored = self.unspent_outputs()?;
        let held = stored
            .iter()
            .map(|o| (o.output_id, &o.output))
            .chain(
                fetched
                    .outputs
                    .values()
                    .filter(|(_, meta)| !meta.is_spent)
                    .map(|(_, meta)| (meta.output_id, &meta.output)),
            )
            .filter_map(|(id, output)| {
                output
                    .alias_id(&id)
                    .map(Address::Alias)
                    .or_else(|| output.nft_id(&id).map(Address::Nft))
            })
            .collect::<BTreeSet<_>>();
        let addresses = held
            .into_iter()
            .map(|address| address.to_bech32(&hrp))
            .collect::<Result<Vec<_>, _>>()?;
        self.fetch_addresses(&addresses, fetched).await
    }

    async fn fetch_transaction(&self, id: &TransactionId) -> Result<Option<SignedTransaction>, WalletError> {
        let node = self.ctx().node();
        let lookup = async {
            match node.get_transaction(id).await {
                Ok(payload) => Ok(Some(payload)),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e),
            }
        };
        self.ctx().request("transaction lookup", lookup).await
    }

    // ── Reconciling ───────────────────────────────────────────────────

    /// Commit what was fetched as one batch and return the events to emit.
    async fn reconcile(&self, fetched: Fetched) -> Result<Vec<WalletEvent>, WalletError> {
        self.set_phase(SyncPhase::ReconcilingState);
        let network_id = self.ctx().protocol().await?.network_id;
        let now = self.ctx().now();
        let account = self.index();

        let mut record = self.inner().record.write().await;
        // Sends may have committed while fetching; read the store again under the lock.
        let stored_outputs: HashMap<OutputId, OutputRecord> = self
            .outputs(&OutputFilter::all())?
            .into_iter()
            .map(|o| (o.output_id, o))
            .collect();
        let stored_tx: HashMap<TransactionId, TransactionRecord> = self
            .transactions(&TransactionFilter::all())?
            .into_iter()
            .map(|t| (t.transaction_id, t))
            .collect();
        let is_unspent = |id: &OutputId| stored_outputs.get(id).is_some_and(|o| !o.is_spent);

        let mut updated = record.clone();
        for address in fetched.new_addresses {
            if updated.find(address.address.inner()).is_none() {
                match address.internal {
                    true => updated.internal_addresses.push(address),
                    false => updated.public_addresses.push(address),
                }
            }
        }
        for address in &fetched.active {
            updated.mark_used(address);
        }
        updated.last_synced = Some(now);

        let mut marks: BTreeMap<OutputId, TransactionId> = BTreeMap::new();
        let mut transactions: BTreeMap<TransactionId, TransactionRecord> = BTreeMap::new();
        let mut settle_events = Vec::new();
        let mut tx_events = Vec::new();

        for (id, state) in &fetched.inclusion {
            let Some(tx) = stored_tx.get(id).filter(|t| t.is_pending()) else {
                continue;
            };
            let Some(settled) = state.settled() else {
                continue;
            };
            let mut tx = tx.clone();
            tx.inclusion_state = settled;
            match settled {
                InclusionState::Confirmed => {
                    for input in tx.inputs().iter().filter(|i| is_unspent(i)) {
                        marks.insert(*input, *id);
                    }
                    info!(account, transaction_id = %id, "transaction confirmed");
                    settle_events.push(WalletEvent::TransactionConfirmed {
                        account,
                        transaction_id: *id,
                    });
                }
                _ => {
                    warn!(account, transaction_id = %id, "transaction conflicting, inputs released");
                    settle_events.push(WalletEvent::TransactionConflicting {
                        account,
                        transaction_id: *id,
                    });
                }
            }
            transactions.insert(*id, tx);
        }

        for (id, payload) in fetched.transactions {
            if stored_tx.contains_key(&id) {
                continue;
            }
            let incoming = !payload
                .essence
                .inputs
                .iter()
                .any(|i| stored_outputs.contains_key(i) || fetched.outputs.contains_key(i));
            if !incoming {
                for input in payload.essence.inputs.iter().filter(|i| is_unspent(i)) {
                    marks.insert(*input, id);
                }
            }
            tx_events.push(WalletEvent::NewTransaction {
                account,
                transaction_id: id,
                incoming,
            });
            transactions.insert(
                id,
                TransactionRecord {
                    transaction_id: id,
                    network_id: payload.essence.network_id,
                    payload,
                    inclusion_state: InclusionState::Confirmed,
                    timestamp: now,
                    incoming,
                    broadcast_attempts: 0,
                    last_broadcast: None,
                },
            );
        }

        let recorded = |id: &TransactionId| stored_tx.contains_key(id) || transactions.contains_key(id);
        let mut upserts = Vec::new();
        let mut output_events = Vec::new();
        for (found_on, meta) in fetched.outputs.values() {
            let spender = meta.spent_by.filter(|s| recorded(s));
            match stored_outputs.get(&meta.output_id) {
                None => {
                    let creator = meta.output_id.transaction_id();
                    let remainder = stored_tx
                        .get(creator)
                        .or_else(|| transactions.get(creator))
                        .is_some_and(|t| !t.incoming);
                    let owner = meta.output.unlock_conditions().owner_at(now).copied();
                    let chain = owner
                        .and_then(|o| updated.chain_of(&o))
                        .or_else(|| updated.chain_of(found_on));
                    upserts.push(OutputRecord {
                        output_id: meta.output_id,
                        output: meta.output.clone(),
                        address: *found_on,
                        chain,
                        is_spent: meta.is_spent && spender.is_none(),
                        spent_by: None,
                        remainder,
                        network_id,
                        booked_at: meta.booked_at,
                    });
                    match (meta.is_spent, spender) {
                        (false, _) => output_events.push(WalletEvent::NewOutput {
                            account,
                            output_id: meta.output_id,
                            amount: meta.output.amount(),
                        }),
                        (true, Some(spender)) => {
                            marks.insert(meta.output_id, spender);
                        }
                        (true, None) => {}
                    }
                }
                Some(stored) if !stored.is_spent && meta.is_spent => match spender {
                    Some(spender) => {
                        marks.insert(meta.output_id, spender);
                    }
                    None => {
                        debug!(account, output_id = %meta.output_id, "output spent by unknown transaction");
                        upserts.push(OutputRecord {
                            is_spent: true,
                            spent_by: None,
                            ..stored.clone()
                        });
                    }
                },
                Some(_) => {}
            }
        }

        let spent_events: Vec<WalletEvent> = marks
            .iter()
            .filter(|(output_id, _)| is_unspent(output_id))
            .map(|(output_id, spent_by)| WalletEvent::SpentOutput {
                account,
                output_id: *output_id,
                spent_by: *spent_by,
            })
            .collect();
        let discovered = output_events.len() as u64;
        let confirmed = settle_events
            .iter()
            .filter(|e| matches!(e, WalletEvent::TransactionConfirmed { .. }))
            .count() as u64;

        let batch = SyncBatch {
            account: Some(updated.clone()),
            upsert_outputs: upserts,
            spent_outputs: marks
                .into_iter()
                .map(|(output_id, spent_by)| SpentMark { output_id, spent_by })
                .collect(),
            transactions: transactions.into_values().collect(),
        };
        self.ctx().store.apply_batch(account, &batch)?;
        *record = updated;
        drop(record);
        let spent: HashSet<OutputId> = batch
            .spent_outputs
            .iter()
            .map(|mark| mark.output_id)
            .chain(batch.upsert_outputs.iter().filter(|o| o.is_spent).map(|o| o.output_id))
            .collect();
        self.inner().reservations.settle_unrecorded(&spent);

        self.ctx().stats.add(Counter::OutputsDiscovered, discovered);
        self.ctx().stats.add(Counter::TransactionsConfirmed, confirmed);
        debug!(
            account,
            outputs = batch.upsert_outputs.len(),
            spent = batch.spent_outputs.len(),
            transactions = batch.transactions.len(),
            "sync batch committed"
        );

        let mut events = output_events;
        events.extend(spent_events);
        events.extend(tx_events);
        events.extend(settle_events);
        Ok(events)
    }

    // ── After the commit ──────────────────────────────────────────────

    /// Resubmit our pending transactions whose last broadcast is older than
    /// the retry threshold and which the ledger has not settled.
    async fn retry_pending(
        &self,
        options: &SyncOptions,
        inclusion: &HashMap<TransactionId, LedgerInclusionState>,
    ) -> Result<(), WalletError> {
        self.set_phase(SyncPhase::RetryingPending);
        let now = self.ctx().now();
        let due: Vec<TransactionRecord> = self
            .pending_transactions()?
            .into_iter()
            .filter(|t| !t.incoming)
            .filter(|t| {
                t.last_broadcast
                    .unwrap_or(t.timestamp)
                    .has_expired(options.pending_retry_after_secs, now)
            })
            .filter(|t| {
                inclusion
                    .get(&t.transaction_id)
                    .map_or(true, |s| s.settled().is_none())
            })
            .collect();

        for mut tx in due {
            let node = self.ctx().node();
            self.ctx()
                .request("resubmit transaction", node.submit_transaction(&tx.payload))
                .await?;
            tx.broadcast_attempts = tx.broadcast_attempts.saturating_add(1);
            tx.last_broadcast = Some(now);
            {
                let _record = self.inner().record.write().await;
                let batch = SyncBatch {
                    transactions: vec![tx.clone()],
                    ..SyncBatch::default()
                };
                self.ctx().store.apply_batch(self.index(), &batch)?;
            }
            self.ctx().stats.increment(Counter::Reattachments);
            info!(
                account = self.index(),
                transaction_id = %tx.transaction_id,
                attempt = tx.broadcast_attempts,
                "resubmitted pending transaction"
            );
            self.ctx().emit(WalletEvent::Reattached {
                account: self.index(),
                transaction_id: tx.transaction_id,
                attempt: tx.broadcast_attempts,
            });
        }
        Ok(())
    }

    async fn consolidate_if_needed(&self, options: &SyncOptions) -> Result<(), WalletError> {
        self.set_phase(SyncPhase::ConsolidatingIfNeeded);
        let threshold = options.output_consolidation_threshold.max(2);
        let output_count = self.consolidation_candidates().await?.len();
        if output_count < threshold {
            return Ok(());
        }
        let unattended = self.ctx().secret_manager.read().await.signs_unattended();
        match unattended {
            true => {
                self.consolidate_outputs(false, Some(threshold)).await?;
            }
            false => {
                debug!(account = self.index(), output_count, "consolidation needs the user");
                self.ctx().emit(WalletEvent::ConsolidationRequired {
                    account: self.index(),
                    output_count,
                });
            }
        }
        Ok(())
    }
}
