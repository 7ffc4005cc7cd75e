use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tessera_crypto::{ed25519_address, verify_unlock};
use tessera_store::{SyncBatch, TransactionRecord};
use tessera_types::{
    Address, InclusionState, InputSigningData, OutputId, SignedTransaction, Timestamp, Unlock,
};
use tessera_utils::Counter;
use tracing::{info, warn};

use super::PreparedTransactionData;
use crate::account::reservation::ReservationGuard;
use crate::account::Account;
use crate::error::WalletError;
use crate::events::{TransactionProgress, WalletEvent};
use crate::secret::SecretManage;

/// A signed transaction with the inputs it unlocks.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransactionData {
    pub payload: SignedTransaction,
    pub inputs_data: Vec<InputSigningData>,
}

impl Account {
    pub async fn sign_transaction_essence(
        &self,
        prepared: &PreparedTransactionData,
    ) -> Result<SignedTransactionData, WalletError> {
        self.emit_progress(TransactionProgress::SigningTransaction);
        let payload = self
            .ctx()
            .secret_manager
            .read()
            .await
            .sign_transaction_essence(&prepared.essence, &prepared.inputs_data)
            .await?;
        Ok(SignedTransactionData {
            payload,
            inputs_data: prepared.inputs_data.clone(),
        })
    }

    /// Verify, submit and record a signed transaction as pending.
    pub async fn submit_and_store_transaction(
        &self,
        signed: SignedTransactionData,
    ) -> Result<TransactionRecord, WalletError> {
        self.submit_inner(signed, None).await
    }

    pub(crate) async fn submit_inner(
        &self,
        signed: SignedTransactionData,
        reservation: Option<&ReservationGuard>,
    ) -> Result<TransactionRecord, WalletError> {
        let now = self.ctx().now();
        verify_unlocks(&signed, now)?;
        self.check_inputs_free(&signed.payload.essence.inputs, reservation)?;

        self.emit_progress(TransactionProgress::Broadcasting);
        let node = self.ctx().node();
        let transaction_id = self
            .ctx()
            .request("submit transaction", node.submit_transaction(&signed.payload))
            .await?;
        info!(
            account = self.index(),
            transaction_id = %transaction_id,
            inputs = signed.inputs_data.len(),
            "submitted transaction"
        );

        let record = TransactionRecord {
            transaction_id,
            network_id: signed.payload.essence.network_id,
            payload: signed.payload,
            inclusion_state: InclusionState::Pending,
            timestamp: now,
            incoming: false,
            broadcast_attempts: 1,
            last_broadcast: Some(now),
        };
        let batch = SyncBatch {
            transactions: vec![record.clone()],
            ..SyncBatch::default()
        };
        {
            let _record = self.inner().record.write().await;
            if let Err(e) = self.ctx().store.apply_batch(self.index(), &batch) {
                warn!(
                    account = self.index(),
                    transaction_id = %transaction_id,
                    error = %e,
                    "submitted transaction could not be recorded"
                );
                self.inner().reservations.mark_unrecorded(record.inputs());
                return Err(e.into());
            }
        }

        self.ctx().stats.increment(Counter::TransactionsSent);
        self.ctx().events.emit_all(&[
            WalletEvent::NewTransaction {
                account: self.index(),
                transaction_id,
                incoming: false,
            },
            WalletEvent::Broadcast {
                account: self.index(),
                transaction_id,
            },
        ]);
        Ok(record)
    }

    /// Inputs must still be unspent and not claimed by anyone else.
    fn check_inputs_free(
        &self,
        inputs: &[OutputId],
        reservation: Option<&ReservationGuard>,
    ) -> Result<(), WalletError> {
        let own: HashSet<OutputId> = reservation
            .map(|r| r.ids().iter().copied().collect())
            .unwrap_or_default();
        let unavailable = self.unavailable()?;
        for input in inputs {
            let record = self.get_output(input)?;
            let taken = record.is_spent
                || unavailable.pending_spent.contains(input)
                || (unavailable.reserved.contains(input) && !own.contains(input));
            if taken {
                return Err(WalletError::InvalidOutput(format!(
                    "input {} is already spent or being spent",
                    input
                )));
            }
        }
        Ok(())
    }
}

/// Check every unlock against the essence hash and the input it unlocks.
pub fn verify_unlocks(signed: &SignedTransactionData, now: Timestamp) -> Result<(), WalletError> {
    let payload = &signed.payload;
    if payload.unlocks.len() != signed.inputs_data.len()
        || payload.essence.inputs.len() != signed.inputs_data.len()
    {
        return Err(WalletError::InvalidOutput(
            "unlock count does not match input count".into(),
        ));
    }
    let hash = payload.essence.hash()?;
    for (index, (unlock, input)) in payload.unlocks.iter().zip(&signed.inputs_data).enumerate() {
        let owner = input.output.unlock_conditions().owner_at(now);
        let valid = match unlock {
            Unlock::Signature(signature) => {
                verify_unlock(&hash, signature)
                    && owner == Some(&ed25519_address(&signature.public_key))
            }
            Unlock::Reference(target) => {
                let target = *target as usize;
                target < index
                    && matches!(payload.unlocks[target], Unlock::Signature(_))
                    && signed.inputs_data[target].output.unlock_conditions().owner_at(now) == owner
            }
            Unlock::Alias(target) | Unlock::Nft(target) => {
                let target = *target as usize;
                let kind_matches = matches!(
                    (unlock, owner),
                    (Unlock::Alias(_), Some(Address::Alias(_))) | (Unlock::Nft(_), Some(Address::Nft(_)))
                );
                kind_matches
                    && target < index
                    && signed.inputs_data[target]
                        .output
                        .chain_address(&signed.inputs_data[target].output_id)
                        .as_ref()
                        == owner
            }
        };
        if !valid {
            return Err(WalletError::InvalidOutput(format!(
                "unlock {} does not unlock input {}",
                index, input.output_id
            )));
        }
    }
    Ok(())
}
