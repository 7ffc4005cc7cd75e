//! Wallet events and the bus that delivers them to subscribers.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tessera_types::{OutputId, TransactionId};

use crate::balance::Balance;

/// Progress of a transaction through the send pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionProgress {
    SelectingInputs,
    GeneratingRemainderDepositAddress,
    PreparedTransaction,
    SigningTransaction,
    Broadcasting,
}

/// Events observers can subscribe to via the [`EventBus`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WalletEvent {
    /// The account's balance differs from the one computed at the previous sync.
    BalanceChanged { account: u32, balance: Balance },
    /// A new output was found on one of the account's addresses.
    NewOutput {
        account: u32,
        output_id: OutputId,
        amount: u64,
    },
    /// An output of the account was consumed.
    SpentOutput {
        account: u32,
        output_id: OutputId,
        spent_by: TransactionId,
    },
    /// A transaction was recorded: sent by this wallet or received from elsewhere.
    NewTransaction {
        account: u32,
        transaction_id: TransactionId,
        incoming: bool,
    },
    TransactionConfirmed {
        account: u32,
        transaction_id: TransactionId,
    },
    TransactionConflicting {
        account: u32,
        transaction_id: TransactionId,
    },
    /// A pending transaction was submitted again.
    Reattached {
        account: u32,
        transaction_id: TransactionId,
        attempt: u32,
    },
    /// A transaction was accepted by the node.
    Broadcast {
        account: u32,
        transaction_id: TransactionId,
    },
    /// Too many outputs, but the secret manager cannot consolidate unattended.
    ConsolidationRequired { account: u32, output_count: usize },
    TransactionProgress {
        account: u32,
        progress: TransactionProgress,
    },
    Error {
        account: Option<u32>,
        message: String,
    },
    /// The vault password became available or was cleared.
    StrongholdStatusChange { unlocked: bool },
}

/// Discriminant of [`WalletEvent`], used to filter subscriptions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletEventKind {
    BalanceChanged,
    NewOutput,
    SpentOutput,
    NewTransaction,
    TransactionConfirmed,
    TransactionConflicting,
    Reattached,
    Broadcast,
    ConsolidationRequired,
    TransactionProgress,
    Error,
    StrongholdStatusChange,
}

impl WalletEvent {
    pub fn kind(&self) -> WalletEventKind {
        match self {
            Self::BalanceChanged { .. } => WalletEventKind::BalanceChanged,
            Self::NewOutput { .. } => WalletEventKind::NewOutput,
            Self::SpentOutput { .. } => WalletEventKind::SpentOutput,
            Self::NewTransaction { .. } => WalletEventKind::NewTransaction,
            Self::TransactionConfirmed { .. } => WalletEventKind::TransactionConfirmed,
            Self::TransactionConflicting { .. } => WalletEventKind::TransactionConflicting,
            Self::Reattached { .. } => WalletEventKind::Reattached,
            Self::Broadcast { .. } => WalletEventKind::Broadcast,
            Self::ConsolidationRequired { .. } => WalletEventKind::ConsolidationRequired,
            Self::TransactionProgress { .. } => WalletEventKind::TransactionProgress,
            Self::Error { .. } => WalletEventKind::Error,
            Self::StrongholdStatusChange { .. } => WalletEventKind::StrongholdStatusChange,
        }
    }

    /// The account the event concerns, if any.
    pub fn account(&self) -> Option<u32> {
        match self {
            Self::BalanceChanged { account, .. }
            | Self::NewOutput { account, .. }
            | Self::SpentOutput { account, .. }
            | Self::NewTransaction { account, .. }
            | Self::TransactionConfirmed { account, .. }
            | Self::TransactionConflicting { account, .. }
            | Self::Reattached { account, .. }
            | Self::Broadcast { account, .. }
            | Self::ConsolidationRequired { account, .. }
            | Self::TransactionProgress { account, .. } => Some(*account),
            Self::Error { account, .. } => *account,
            Self::StrongholdStatusChange { .. } => None,
        }
    }
}

/// Which events a subscription receives. An empty filter receives everything.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventFilter {
    pub kinds: HashSet<WalletEventKind>,
}

impl EventFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn only(kinds: impl IntoIterator<Item = WalletEventKind>) -> Self {
        Self {
            kinds: kinds.into_iter().collect(),
        }
    }

    pub fn matches(&self, event: &WalletEvent) -> bool {
        self.kinds.is_empty() || self.kinds.contains(&event.kind())
    }
}

/// Token returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriptionId(u64);

pub type Listener = Arc<dyn Fn(&WalletEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    filter: EventFilter,
    listener: Listener,
}

/// Synchronous fan-out event bus for wallet events.
///
/// Listeners are invoked inline on the emitting task, in subscription order.
/// Keep handlers fast; they must not subscribe or unsubscribe from within
/// a callback.
pub struct EventBus {
    subscriptions: Mutex<Vec<Subscription>>,
    next_id: AtomicU64,
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            subscriptions: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self, filter: EventFilter, listener: Listener) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push(Subscription {
            id,
            filter,
            listener,
        });
        id
    }

    /// Remove a subscription; `false` if the id was unknown.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscriptions = self.lock();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.id != id);
        subscriptions.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Deliver `event` to every matching listener.
    ///
    /// The bus lock is held during delivery so concurrent emitters cannot
    /// interleave their events at any one listener.
    pub fn emit(&self, event: &WalletEvent) {
        let subscriptions = self.lock();
        for subscription in subscriptions.iter() {
            if subscription.filter.matches(event) {
                (subscription.listener)(event);
            }
        }
    }

    pub fn emit_all(&self, events: &[WalletEvent]) {
        let subscriptions = self.lock();
        for event in events {
            for subscription in subscriptions.iter() {
                if subscription.filter.matches(event) {
                    (subscription.listener)(event);
                }
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
