//! Lock-free counters for wallet activity.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// The activities a wallet counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    SyncRuns,
    SyncFailures,
    OutputsDiscovered,
    TransactionsSent,
    TransactionsConfirmed,
    Reattachments,
    Consolidations,
}

impl Counter {
    pub const ALL: [Counter; 7] = [
        Counter::SyncRuns,
        Counter::SyncFailures,
        Counter::OutputsDiscovered,
        Counter::TransactionsSent,
        Counter::TransactionsConfirmed,
        Counter::Reattachments,
        Counter::Consolidations,
    ];

    fn slot(self) -> usize {
        self as usize
    }
}

/// Point-in-time copy of every counter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub sync_runs: u64,
    pub sync_failures: u64,
    pub outputs_discovered: u64,
    pub transactions_sent: u64,
    pub transactions_confirmed: u64,
    pub reattachments: u64,
    pub consolidations: u64,
}

#[derive(Debug, Default)]
pub struct StatsCounter {
    slots: [AtomicU64; 7],
}

impl StatsCounter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, counter: Counter) {
        self.add(counter, 1);
    }

    pub fn add(&self, counter: Counter, value: u64) {
        self.slots[counter.slot()].fetch_add(value, Ordering::Relaxed);
    }

    pub fn get(&self, counter: Counter) -> u64 {
        self.slots[counter.slot()].load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            sync_runs: self.get(Counter::SyncRuns),
            sync_failures: self.get(Counter::SyncFailures),
            outputs_discovered: self.get(Counter::OutputsDiscovered),
            transactions_sent: self.get(Counter::TransactionsSent),
            transactions_confirmed: self.get(Counter::TransactionsConfirmed),
            reattachments: self.get(Counter::Reattachments),
            consolidations: self.get(Counter::Consolidations),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_independent() {
        let stats = StatsCounter::new();
        stats.increment(Counter::SyncRuns);
        stats.add(Counter::OutputsDiscovered, 5);
        assert_eq!(stats.get(Counter::SyncRuns), 1);
        assert_eq!(stats.get(Counter::OutputsDiscovered), 5);
        assert_eq!(stats.get(Counter::SyncFailures), 0);
    }

    #[test]
    fn snapshot_reflects_every_counter() {
        let stats = StatsCounter::new();
        for (i, counter) in Counter::ALL.iter().enumerate() {
            stats.add(*counter, i as u64 + 1);
        }
        let snap = stats.snapshot();
        assert_eq!(snap.sync_runs, 1);
        assert_eq!(snap.consolidations, 7);
    }
}
