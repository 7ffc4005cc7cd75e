//! Nullable node: an in-memory ledger implementing [`NodeApi`].
//!
//! Submitted transactions stay pending until the test confirms or conflicts
//! them (or auto-confirm is switched on). Confirmation spends the inputs and
//! books the created outputs, exactly like a real ledger would.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tessera_client::{ClientError, LedgerInclusionState, NodeApi, NodeInfo, OutputWithMetadata};
use tessera_types::{
    Address, BasicOutput, Bech32Address, Output, OutputId, ProtocolParams, SignedTransaction,
    Timestamp, TransactionId,
};

struct LedgerTransaction {
    payload: SignedTransaction,
    state: LedgerInclusionState,
}

#[derive(Default)]
struct Ledger {
    outputs: BTreeMap<OutputId, OutputWithMetadata>,
    transactions: HashMap<TransactionId, LedgerTransaction>,
    submitted: Vec<TransactionId>,
    genesis_counter: u64,
    offline: bool,
    fail_next: u32,
    auto_confirm: bool,
    submit_delay: Option<Duration>,
    now: Timestamp,
}

impl Ledger {
    fn check_online(&mut self) -> Result<(), ClientError> {
        if self.offline {
            return Err(ClientError::Request("node offline".into()));
        }
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(ClientError::Request("injected failure".into()));
        }
        Ok(())
    }

    fn book(&mut self, output_id: OutputId, output: Output) {
        self.outputs.insert(
            output_id,
            OutputWithMetadata {
                output_id,
                output,
                is_spent: false,
                spent_by: None,
                booked_at: self.now,
            },
        );
    }

    fn next_genesis_id(&mut self) -> TransactionId {
        self.genesis_counter += 1;
        let mut bytes = [0xEEu8; 32];
        bytes[..8].copy_from_slice(&self.genesis_counter.to_be_bytes());
        TransactionId::new(bytes)
    }

    /// Spend inputs and book outputs. Marks the transaction conflicting when
    /// any input is unknown or already spent.
    fn settle(&mut self, id: &TransactionId) {
        let Some(tx) = self.transactions.get(id) else {
            return;
        };
        if tx.state != LedgerInclusionState::Pending {
            return;
        }
        let payload = tx.payload.clone();
        let spendable = payload
            .essence
            .inputs
            .iter()
            .all(|input| self.outputs.get(input).is_some_and(|o| !o.is_spent));
        if !spendable {
            if let Some(tx) = self.transactions.get_mut(id) {
                tx.state = LedgerInclusionState::Conflicting;
            }
            return;
        }
        for input in &payload.essence.inputs {
            if let Some(o) = self.outputs.get_mut(input) {
                o.is_spent = true;
                o.spent_by = Some(*id);
            }
        }
        for (index, output) in payload.essence.outputs.iter().enumerate() {
            self.book(OutputId::new(*id, index as u16), output.clone());
        }
        if let Some(tx) = self.transactions.get_mut(id) {
            tx.state = LedgerInclusionState::Included;
        }
    }
}

fn relevant_to(output: &Output, address: &Address) -> bool {
    let conditions = output.unlock_conditions();
    conditions.address() == Some(address)
        || conditions.expiration().is_some_and(|(ret, _)| ret == address)
        || conditions.state_controller_address() == Some(address)
        || conditions.governor_address() == Some(address)
        || conditions.immutable_alias_address() == Some(address)
}

pub struct NullNode {
    info: NodeInfo,
    ledger: Mutex<Ledger>,
}

impl NullNode {
    pub fn new(protocol: ProtocolParams) -> Self {
        Self {
            info: NodeInfo {
                name: "null-node".into(),
                version: "0.0.0".into(),
                is_healthy: true,
                protocol,
            },
            ledger: Mutex::new(Ledger::default()),
        }
    }

    pub fn protocol(&self) -> &ProtocolParams {
        &self.info.protocol
    }

    /// Book a basic output of `amount` on `address` and return its id.
    pub fn fund(&self, address: Address, amount: u64) -> OutputId {
        self.add_output(Output::Basic(BasicOutput::new(amount, address)))
    }

    /// Book an arbitrary output, created by a fresh genesis transaction.
    pub fn add_output(&self, output: Output) -> OutputId {
        let mut ledger = self.ledger.lock().unwrap();
        let id = OutputId::new(ledger.next_genesis_id(), 0);
        ledger.book(id, output);
        id
    }

    /// Register a transaction as known to the ledger without booking it.
    pub fn add_transaction(&self, payload: SignedTransaction, state: LedgerInclusionState) -> Option<TransactionId> {
        let id = payload.id().ok()?;
        self.ledger
            .lock()
            .unwrap()
            .transactions
            .insert(id, LedgerTransaction { payload, state });
        Some(id)
    }

    /// Spend an output on the ledger as if someone else consumed it.
    pub fn spend_externally(&self, output_id: &OutputId, spent_by: TransactionId) {
        if let Some(o) = self.ledger.lock().unwrap().outputs.get_mut(output_id) {
            o.is_spent = true;
            o.spent_by = Some(spent_by);
        }
    }

    pub fn confirm(&self, id: &TransactionId) {
        self.ledger.lock().unwrap().settle(id);
    }

    pub fn confirm_all(&self) {
        let mut ledger = self.ledger.lock().unwrap();
        let pending: Vec<TransactionId> = ledger.submitted.clone();
        for id in pending {
            ledger.settle(&id);
        }
    }

    pub fn conflict(&self, id: &TransactionId) {
        if let Some(tx) = self.ledger.lock().unwrap().transactions.get_mut(id) {
            tx.state = LedgerInclusionState::Conflicting;
        }
    }

    /// Forget a transaction, as a node pruning unconfirmed payloads would.
    pub fn forget(&self, id: &TransactionId) {
        self.ledger.lock().unwrap().transactions.remove(id);
    }

    pub fn set_auto_confirm(&self, on: bool) {
        self.ledger.lock().unwrap().auto_confirm = on;
    }

    pub fn set_offline(&self, offline: bool) {
        self.ledger.lock().unwrap().offline = offline;
    }

    /// Fail the next `count` requests with a transport error.
    pub fn fail_next(&self, count: u32) {
        self.ledger.lock().unwrap().fail_next = count;
    }

    /// Delay every submission, widening race windows in concurrency tests.
    pub fn set_submit_delay(&self, delay: Duration) {
        self.ledger.lock().unwrap().submit_delay = Some(delay);
    }

    pub fn set_time(&self, now: Timestamp) {
        self.ledger.lock().unwrap().now = now;
    }

    /// Every submission, in order, including resubmissions.
    pub fn submitted(&self) -> Vec<TransactionId> {
        self.ledger.lock().unwrap().submitted.clone()
    }

    pub fn is_spent(&self, output_id: &OutputId) -> bool {
        self.ledger
            .lock()
            .unwrap()
            .outputs
            .get(output_id)
            .is_some_and(|o| o.is_spent)
    }
}

impl Default for NullNode {
    fn default() -> Self {
        Self::new(ProtocolParams::default())
    }
}

#[async_trait]
impl NodeApi for NullNode {
    async fn get_info(&self) -> Result<NodeInfo, ClientError> {
        self.ledger.lock().unwrap().check_online()?;
        Ok(self.info.clone())
    }

    async fn get_outputs_for_address(
        &self,
        address: &Bech32Address,
    ) -> Result<Vec<OutputWithMetadata>, ClientError> {
        let mut ledger = self.ledger.lock().unwrap();
        ledger.check_online()?;
        Ok(ledger
            .outputs
            .values()
            .filter(|o| relevant_to(&o.output, address.inner()))
            .cloned()
            .collect())
    }

    async fn get_output(&self, output_id: &OutputId) -> Result<OutputWithMetadata, ClientError> {
        let mut ledger = self.ledger.lock().unwrap();
        ledger.check_online()?;
        ledger
            .outputs
            .get(output_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("output {}", output_id)))
    }

    async fn submit_transaction(&self, transaction: &SignedTransaction) -> Result<TransactionId, ClientError> {
        let delay = {
            let mut ledger = self.ledger.lock().unwrap();
            ledger.check_online()?;
            ledger.submit_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let id = transaction
            .id()
            .map_err(|e| ClientError::InvalidResponse(e.to_string()))?;
        let mut ledger = self.ledger.lock().unwrap();
        ledger.submitted.push(id);
        ledger.transactions.entry(id).or_insert(LedgerTransaction {
            payload: transaction.clone(),
            state: LedgerInclusionState::Pending,
        });
        if ledger.auto_confirm {
            ledger.settle(&id);
        }
        tracing::debug!(transaction_id = %id, "null node accepted transaction");
        Ok(id)
    }

    async fn get_transaction_inclusion_state(
        &self,
        transaction_id: &TransactionId,
    ) -> Result<LedgerInclusionState, ClientError> {
        let mut ledger = self.ledger.lock().unwrap();
        ledger.check_online()?;
        Ok(ledger
            .transactions
            .get(transaction_id)
            .map(|t| t.state)
            .unwrap_or(LedgerInclusionState::Unknown))
    }

    async fn get_transaction(&self, transaction_id: &TransactionId) -> Result<SignedTransaction, ClientError> {
        let mut ledger = self.ledger.lock().unwrap();
        ledger.check_online()?;
        ledger
            .transactions
            .get(transaction_id)
            .map(|t| t.payload.clone())
            .ok_or_else(|| ClientError::NotFound(format!("transaction {}", transaction_id)))
    }

    async fn request_funds_from_faucet(
        &self,
        url: &str,
        address: &Bech32Address,
    ) -> Result<String, ClientError> {
        self.ledger.lock().unwrap().check_online()?;
        let id = self.fund(*address.inner(), 1_000_000_000);
        Ok(format!("{url}: funded {address} with output {id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::{TransactionEssence, Unlock};

    fn spend(input: OutputId, to: Address, amount: u64) -> SignedTransaction {
        SignedTransaction {
            essence: TransactionEssence {
                network_id: 1,
                inputs: vec![input],
                inputs_commitment: [0; 32],
                outputs: vec![Output::Basic(BasicOutput::new(amount, to))],
                tag: None,
            },
            unlocks: vec![Unlock::Reference(0)],
        }
    }

    #[tokio::test]
    async fn confirm_spends_inputs_and_books_outputs() {
        let node = NullNode::default();
        let alice = Address::Ed25519([1; 32]);
        let bob = Address::Ed25519([2; 32]);
        let funded = node.fund(alice, 100);

        let id = node.submit_transaction(&spend(funded, bob, 100)).await.unwrap();
        assert_eq!(
            node.get_transaction_inclusion_state(&id).await.unwrap(),
            LedgerInclusionState::Pending
        );

        node.confirm(&id);
        assert!(node.is_spent(&funded));
        let bob_outputs = node
            .get_outputs_for_address(&bob.to_bech32("tst").unwrap())
            .await
            .unwrap();
        assert_eq!(bob_outputs.len(), 1);
        assert_eq!(bob_outputs[0].output_id, OutputId::new(id, 0));
    }

    #[tokio::test]
    async fn double_spend_conflicts() {
        let node = NullNode::default();
        let alice = Address::Ed25519([1; 32]);
        let funded = node.fund(alice, 100);
        let a = node.submit_transaction(&spend(funded, Address::Ed25519([2; 32]), 100)).await.unwrap();
        let b = node.submit_transaction(&spend(funded, Address::Ed25519([3; 32]), 100)).await.unwrap();
        node.confirm_all();
        assert_eq!(node.get_transaction_inclusion_state(&a).await.unwrap(), LedgerInclusionState::Included);
        assert_eq!(node.get_transaction_inclusion_state(&b).await.unwrap(), LedgerInclusionState::Conflicting);
    }

    #[tokio::test]
    async fn offline_node_fails_requests() {
        let node = NullNode::default();
        node.set_offline(true);
        assert!(node.get_info().await.is_err());
        node.set_offline(false);
        node.fail_next(1);
        assert!(node.get_info().await.is_err());
        assert!(node.get_info().await.is_ok());
    }
}
