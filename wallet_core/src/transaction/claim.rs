//! Claiming outputs that carry storage deposit return, expiration or
//! timelock conditions.

use serde::{Deserialize, Serialize};
use tessera_store::TransactionRecord;
use tessera_types::{BasicOutput, Output, OutputId, Timestamp};
use tracing::info;

use super::TransactionOptions;
use crate::account::Account;
use crate::error::WalletError;
use crate::unlock::Ownership;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimableOutput {
    pub output_id: OutputId,
    pub amount: u64,
    /// Deposit that must be returned when claiming.
    pub return_amount: u64,
    /// After this the output returns to the sender.
    pub expires_at: Option<Timestamp>,
}

impl Account {
    /// Conditional outputs this account could claim right now.
    pub async fn claimable_outputs(&self) -> Result<Vec<ClaimableOutput>, WalletError> {
        let record = self.inner().record.read().await;
        let unspent = self.unspent_outputs()?;
        let unavailable = self.unavailable()?;
        let now = self.ctx().now();
        let ownership = Ownership::new(&record, &unspent);
        Ok(unspent
            .iter()
            .filter(|o| Ownership::is_conditional(&o.output))
            .filter(|o| !unavailable.contains(&o.output_id) && ownership.can_claim(&o.output, now))
            .map(|o| {
                let conditions = o.output.unlock_conditions();
                ClaimableOutput {
                    output_id: o.output_id,
                    amount: o.output.amount(),
                    return_amount: conditions.storage_deposit_return().map_or(0, |(_, a)| a),
                    expires_at: conditions.expiration().map(|(_, t)| t),
                }
            })
            .collect())
    }

    /// Consume the given outputs, returning any storage deposits to their senders.
    pub async fn claim_outputs(
        &self,
        output_ids: Vec<OutputId>,
        options: Option<TransactionOptions>,
    ) -> Result<TransactionRecord, WalletError> {
        if output_ids.is_empty() {
            return Err(WalletError::MissingParameter("output_ids"));
        }
        let claimable = self.claimable_outputs().await?;
        let mut returns = Vec::new();
        for id in &output_ids {
            let entry = claimable.iter().find(|c| c.output_id == *id).ok_or_else(|| {
                WalletError::InvalidOutput(format!("output {} is not claimable", id))
            })?;
            if entry.return_amount == 0 {
                continue;
            }
            let record = self.get_output(id)?;
            if let Some((return_address, amount)) =
                record.output.unlock_conditions().storage_deposit_return()
            {
                returns.push(Output::Basic(BasicOutput::new(amount, *return_address)));
            }
        }

        let mut options = options.unwrap_or_default();
        let mut mandatory = options.mandatory_inputs.take().unwrap_or_default();
        mandatory.extend(output_ids.iter().copied());
        options.mandatory_inputs = Some(mandatory);

        // Without deposits to return the claim is a plain sweep to ourselves.
        let outputs = match returns.is_empty() {
            true => {
                let rent = self.ctx().protocol().await?.rent_structure;
                let mut sweep = Output::Basic(BasicOutput::new(0, self.first_address().await?));
                sweep.set_amount(sweep.min_storage_deposit(&rent)?);
                vec![sweep]
            }
            false => returns,
        };
        let transaction = self.send_outputs(outputs, Some(options)).await?;
        info!(
            account = self.index(),
            claimed = output_ids.len(),
            transaction_id = %transaction.transaction_id,
            "claimed outputs"
        );
        Ok(transaction)
    }
}
