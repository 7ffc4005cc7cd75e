use std::collections::{HashMap, HashSet};

use tessera_store::{AccountRecord, OutputRecord};
use tessera_types::{
    Address, InputSigningData, NativeTokensSum, Output, OutputId, RentStructure, Timestamp,
    TransactionEssence,
};
use tracing::debug;

use super::{PreparedTransactionData, RemainderData, RemainderStrategy, TransactionOptions};
use crate::account::reservation::ReservationGuard;
use crate::account::Account;
use crate::error::WalletError;
use crate::events::{TransactionProgress, WalletEvent};
use crate::input_selection::{InputSelection, Selected};
use crate::unlock::{Ownership, Unavailable};

impl Account {
    /// Select inputs for `outputs` and build the unsigned essence.
    ///
    /// Nothing is reserved once this returns: the result is meant for
    /// signing elsewhere. Use the send operations to build, sign and submit
    /// in one go.
    pub async fn prepare_transaction(
        &self,
        outputs: Vec<Output>,
        options: Option<TransactionOptions>,
    ) -> Result<PreparedTransactionData, WalletError> {
        let (prepared, _reservation) = self.prepare_reserved(outputs, options).await?;
        Ok(prepared)
    }

    /// Like [`Account::prepare_transaction`] but keeps the chosen inputs
    /// reserved until the returned guard is dropped.
    pub(crate) async fn prepare_reserved(
        &self,
        outputs: Vec<Output>,
        options: Option<TransactionOptions>,
    ) -> Result<(PreparedTransactionData, ReservationGuard), WalletError> {
        let options = options.unwrap_or_default();
        let protocol = self.ctx().protocol().await?;
        self.emit_progress(TransactionProgress::SelectingInputs);

        let mut record = self.inner().record.write().await;
        let now = self.ctx().now();
        let unspent = self.unspent_outputs()?;
        let unavailable = self.unavailable()?;

        let strategy = options
            .remainder_strategy
            .clone()
            .unwrap_or_else(|| self.ctx().config().remainder_strategy);
        if strategy == RemainderStrategy::ChangeAddress {
            self.emit_progress(TransactionProgress::GeneratingRemainderDepositAddress);
        }
        let remainder_address = self.remainder_address(&mut record, &strategy).await?;

        let inputs = Candidates::collect(&record, &unspent, &unavailable, now, &options)?;
        let selected = inputs.select(outputs, remainder_address, protocol.rent_structure, &options)?;

        let mut essence =
            TransactionEssence::new(protocol.network_id, &selected.inputs, selected.outputs)?;
        essence.tag = options.tag;
        essence.validate_counts()?;

        let reservation = self
            .inner()
            .reservations
            .reserve(selected.inputs.iter().map(|i| i.output_id))?;
        let remainder = selected.remainder.map(|(output_index, _)| RemainderData {
            output_index,
            address: remainder_address,
            chain: record.chain_of(&remainder_address),
        });
        debug!(
            account = self.index(),
            inputs = selected.inputs.len(),
            outputs = essence.outputs.len(),
            remainder = remainder.is_some(),
            "prepared transaction"
        );
        drop(record);

        self.emit_progress(TransactionProgress::PreparedTransaction);
        Ok((
            PreparedTransactionData {
                essence,
                inputs_data: selected.inputs,
                remainder,
            },
            reservation,
        ))
    }

    pub(crate) fn emit_progress(&self, progress: TransactionProgress) {
        self.ctx().emit(WalletEvent::TransactionProgress {
            account: self.index(),
            progress,
        });
    }
}

/// The inputs handed to selection.
struct Candidates {
    available: Vec<InputSigningData>,
    required: Vec<InputSigningData>,
    /// Owned value that cannot be spent right now.
    locked_amount: u64,
    /// Unlockable alias and NFT outputs by the address they hold.
    controllers: HashMap<Address, InputSigningData>,
}

impl Candidates {
    fn collect(
        record: &AccountRecord,
        unspent: &[OutputRecord],
        unavailable: &Unavailable,
        now: Timestamp,
        options: &TransactionOptions,
    ) -> Result<Self, WalletError> {
        let ownership = Ownership::new(record, unspent);
        let signing_data = |output: &OutputRecord| {
            ownership
                .signer(&output.output, now, unavailable)
                .map(|signer| InputSigningData {
                    output_id: output.output_id,
                    output: output.output.clone(),
                    chain: signer.chain,
                    via_chain: signer.via_chain,
                })
        };

        let explicit = options
            .custom_inputs
            .as_ref()
            .or(options.mandatory_inputs.as_ref());
        let mut required = Vec::new();
        if let Some(ids) = explicit {
            let mut seen = HashSet::new();
            for id in ids.iter().filter(|id| seen.insert(**id)) {
                required.push(Self::required_input(id, unspent, unavailable, &ownership, now, &signing_data)?);
            }
        }
        let required_ids: HashSet<OutputId> = required.iter().map(|i| i.output_id).collect();

        let mut available = Vec::new();
        let mut controllers = HashMap::new();
        let mut locked_amount = 0u64;
        for output in unspent {
            // Outputs of another in-flight send are neither spendable nor locked for us.
            if unavailable.contains(&output.output_id) {
                continue;
            }
            let input = signing_data(output);
            if let (Some(address), Some(input)) =
                (output.output.chain_address(&output.output_id), input.as_ref())
            {
                controllers.insert(address, input.clone());
            }
            if required_ids.contains(&output.output_id) {
                continue;
            }
            let spendable = ownership.can_spend(&output.output, now);
            match (spendable, input) {
                (true, Some(input)) if options.custom_inputs.is_none() => available.push(input),
                (true, Some(_)) => {}
                _ => locked_amount = locked_amount.saturating_add(output.amount()),
            }
        }

        Ok(Self {
            available,
            required,
            locked_amount,
            controllers,
        })
    }

    fn required_input(
        id: &OutputId,
        unspent: &[OutputRecord],
        unavailable: &Unavailable,
        ownership: &Ownership<'_>,
        now: Timestamp,
        signing_data: &impl Fn(&OutputRecord) -> Option<InputSigningData>,
    ) -> Result<InputSigningData, WalletError> {
        let output = unspent
            .iter()
            .find(|o| o.output_id == *id)
            .ok_or(WalletError::OutputNotFound(*id))?;
        if unavailable.contains(id) {
            return Err(WalletError::InvalidOutput(format!(
                "output {} is already being spent",
                id
            )));
        }
        if !ownership.can_claim(&output.output, now) {
            return Err(WalletError::InvalidOutput(format!(
                "output {} cannot be unlocked now",
                id
            )));
        }
        signing_data(output).ok_or_else(|| {
            WalletError::InvalidOutput(format!("output {} is not owned by a derived address", id))
        })
    }

    /// Run input selection, pulling in the alias and NFT outputs that own
    /// selected inputs until every chain unlock has its controlling input.
    fn select(
        self,
        mut outputs: Vec<Output>,
        remainder_address: Address,
        rent: RentStructure,
        options: &TransactionOptions,
    ) -> Result<Selected, WalletError> {
        let Candidates {
            mut available,
            mut required,
            locked_amount,
            controllers,
        } = self;
        let mut burn = NativeTokensSum::default();
        for (token_id, amount) in &options.burn_native_tokens {
            burn.add(*token_id, *amount)?;
        }
        loop {
            let mut selected =
                InputSelection::new(available.clone(), outputs.clone(), remainder_address, rent)
                    .with_required(required.clone())
                    .with_locked_amount(locked_amount)
                    .with_burning(options.allow_burning)
                    .with_burned_tokens(burn.clone())
                    .select()?;

            let missing = missing_controllers(&selected.inputs, &controllers)?;
            if missing.is_empty() {
                selected.inputs = order_for_unlocking(selected.inputs);
                return Ok(selected);
            }
            for controller in missing {
                let successor = controller
                    .output
                    .chain_successor(&controller.output_id)
                    .ok_or_else(|| {
                        WalletError::InvalidOutput(format!(
                            "output {} holds no chain address",
                            controller.output_id
                        ))
                    })?;
                debug!(output_id = %controller.output_id, "adding chain controller input");
                available.retain(|i| i.output_id != controller.output_id);
                outputs.push(successor);
                required.push(controller);
            }
        }
    }
}

/// Chain outputs owning a selected input that are not themselves selected.
fn missing_controllers(
    inputs: &[InputSigningData],
    controllers: &HashMap<Address, InputSigningData>,
) -> Result<Vec<InputSigningData>, WalletError> {
    let held: HashSet<Address> = inputs
        .iter()
        .filter_map(|i| i.output.chain_address(&i.output_id))
        .collect();
    let mut seen = HashSet::new();
    let mut missing = Vec::new();
    for address in inputs.iter().filter_map(|i| i.via_chain) {
        if held.contains(&address) || !seen.insert(address) {
            continue;
        }
        let controller = controllers.get(&address).ok_or_else(|| {
            WalletError::InvalidOutput(format!("no unlockable output holds {:?}", address))
        })?;
        missing.push(controller.clone());
    }
    Ok(missing)
}

/// Order inputs so each chain output precedes the inputs it owns.
fn order_for_unlocking(inputs: Vec<InputSigningData>) -> Vec<InputSigningData> {
    let mut placed = HashSet::new();
    let mut ordered = Vec::with_capacity(inputs.len());
    let mut pending = inputs;
    while !pending.is_empty() {
        let before = pending.len();
        let (ready, rest): (Vec<_>, Vec<_>) = pending
            .into_iter()
            .partition(|i| i.via_chain.map_or(true, |owner| placed.contains(&owner)));
        placed.extend(ready.iter().filter_map(|i| i.output.chain_address(&i.output_id)));
        ordered.extend(ready);
        pending = rest;
        if pending.len() == before {
            // Cyclic ownership cannot be unlocked; signing reports it.
            ordered.append(&mut pending);
        }
    }
    ordered
}
