//! Output consolidation.
//!
//! Many small outputs make every later transaction larger and eventually hit
//! the input limit. Consolidation merges plain basic outputs into as few
//! outputs as the native token limit allows, sent back to the account's
//! first address. Smallest outputs are merged first, at most one
//! transaction's worth of inputs per call.

use tessera_store::{OutputRecord, TransactionRecord};
use tessera_types::{BasicOutput, NativeTokensSum, Output, INPUT_COUNT_MAX};
use tessera_utils::Counter;
use tracing::{debug, info};

use super::TransactionOptions;
use crate::account::Account;
use crate::error::WalletError;
use crate::unlock::Ownership;

impl Account {
    /// Outputs eligible for consolidation, smallest first.
    pub(crate) async fn consolidation_candidates(&self) -> Result<Vec<OutputRecord>, WalletError> {
        let record = self.inner().record.read().await;
        let unspent = self.unspent_outputs()?;
        let unavailable = self.unavailable()?;
        let now = self.ctx().now();
        let ownership = Ownership::new(&record, &unspent);
        let mut candidates: Vec<OutputRecord> = unspent
            .iter()
            .filter(|o| o.output.as_basic().is_some_and(BasicOutput::is_simple))
            .filter(|o| !unavailable.contains(&o.output_id))
            .filter(|o| ownership.can_spend(&o.output, now))
            .filter(|o| o.output.unlock_conditions().address().is_some_and(|a| record.owns(a)))
            .cloned()
            .collect();
        candidates.sort_by_key(|o| (o.amount(), o.output_id));
        Ok(candidates)
    }

    /// Merge outputs once there are at least `threshold` of them, or whenever
    /// two or more exist with `force`. Returns `None` when nothing was done.
    pub async fn consolidate_outputs(
        &self,
        force: bool,
        threshold: Option<usize>,
    ) -> Result<Option<TransactionRecord>, WalletError> {
        let threshold = threshold
            .unwrap_or_else(|| self.ctx().config().sync.output_consolidation_threshold)
            .max(2);
        let mut candidates = self.consolidation_candidates().await?;
        if candidates.len() < 2 || (!force && candidates.len() < threshold) {
            debug!(
                account = self.index(),
                outputs = candidates.len(),
                threshold,
                "no consolidation needed"
            );
            return Ok(None);
        }
        candidates.truncate(INPUT_COUNT_MAX);

        let rent = self.ctx().protocol().await?.rent_structure;
        let target = self.first_address().await?;
        let mut total = 0u64;
        let mut tokens = NativeTokensSum::default();
        for candidate in &candidates {
            total = total
                .checked_add(candidate.amount())
                .ok_or_else(|| WalletError::Consistency("amount overflow".into()))?;
            tokens.add_all(candidate.output.native_tokens())?;
        }

        let mut outputs: Vec<Output> = match tokens.is_empty() {
            true => vec![Output::Basic(BasicOutput::new(0, target))],
            false => tokens
                .chunks()
                .into_iter()
                .map(|chunk| Output::Basic(BasicOutput::new(0, target).with_native_tokens(chunk)))
                .collect(),
        };
        let mut deposits = Vec::with_capacity(outputs.len());
        for output in &outputs {
            deposits.push(output.min_storage_deposit(&rent)?);
        }
        let rest: u64 = deposits[1..].iter().sum();
        if total < rest + deposits[0] {
            return Err(WalletError::InsufficientFundsForRemainder {
                available: total,
                required: rest + deposits[0],
            });
        }
        outputs[0].set_amount(total - rest);
        for (output, deposit) in outputs.iter_mut().zip(&deposits).skip(1) {
            output.set_amount(*deposit);
        }

        let inputs = candidates.len();
        let options = TransactionOptions {
            custom_inputs: Some(candidates.iter().map(|o| o.output_id).collect()),
            ..TransactionOptions::default()
        };
        let transaction = self.send_outputs(outputs, Some(options)).await?;
        self.ctx().stats.increment(Counter::Consolidations);
        info!(
            account = self.index(),
            inputs,
            transaction_id = %transaction.transaction_id,
            "consolidated outputs"
        );
        Ok(Some(transaction))
    }
}
