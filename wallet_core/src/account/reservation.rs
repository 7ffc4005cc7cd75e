//! Outputs held back for an in-flight send.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use tessera_types::OutputId;

use crate::error::WalletError;
use crate::locks::lock;

#[derive(Default)]
struct Held {
    reserved: HashSet<OutputId>,
    /// Inputs of a transaction the node accepted but the store never recorded.
    unrecorded: HashSet<OutputId>,
}

#[derive(Clone, Default)]
pub(crate) struct Reservations(Arc<Mutex<Held>>);

impl Reservations {
    pub(crate) fn snapshot(&self) -> HashSet<OutputId> {
        lock(&self.0).reserved.clone()
    }

    pub(crate) fn len(&self) -> usize {
        lock(&self.0).reserved.len()
    }

    /// Reserve all of `ids` or none of them.
    pub(crate) fn reserve(
        &self,
        ids: impl IntoIterator<Item = OutputId>,
    ) -> Result<ReservationGuard, WalletError> {
        let ids: Vec<OutputId> = ids.into_iter().collect();
        let mut held = lock(&self.0);
        if let Some(taken) = ids
            .iter()
            .find(|id| held.reserved.contains(id) || held.unrecorded.contains(id))
        {
            return Err(WalletError::Consistency(format!(
                "output {} is already reserved",
                taken
            )));
        }
        held.reserved.extend(ids.iter().copied());
        Ok(ReservationGuard {
            reservations: self.clone(),
            ids,
        })
    }

    /// Keep `ids` out of selection until a sync records them as spent.
    pub(crate) fn mark_unrecorded(&self, ids: &[OutputId]) {
        lock(&self.0).unrecorded.extend(ids.iter().copied());
    }

    pub(crate) fn unrecorded(&self) -> HashSet<OutputId> {
        lock(&self.0).unrecorded.clone()
    }

    /// Forget unrecorded inputs that the store now knows to be spent.
    pub(crate) fn settle_unrecorded(&self, spent: &HashSet<OutputId>) {
        lock(&self.0).unrecorded.retain(|id| !spent.contains(id));
    }
}

/// Releases its outputs when dropped, whether the send succeeded, failed or
/// was cancelled.
pub(crate) struct ReservationGuard {
    reservations: Reservations,
    ids: Vec<OutputId>,
}

impl ReservationGuard {
    pub(crate) fn ids(&self) -> &[OutputId] {
        &self.ids
    }
}

impl Drop for ReservationGuard {
    fn drop(&mut self) {
        let mut held = lock(&self.reservations.0);
        for id in &self.ids {
            held.reserved.remove(id);
        }
    }
}
