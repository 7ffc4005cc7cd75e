//! Write batching: groups store operations into a single LMDB write
//! transaction so a whole [`SyncBatch`] lands atomically.
//!
//! If the batch is dropped without calling [`WriteBatch::commit`], all
//! operations are rolled back (the underlying LMDB transaction is aborted).

use heed::RwTxn;

use tessera_store::{AccountRecord, OutputRecord, SyncBatch, TransactionRecord};
use tessera_types::{OutputId, TransactionId};

use crate::environment::LmdbEnvironment;
use crate::{account_key, scoped_key, LmdbError};

pub struct WriteBatch<'a> {
    txn: RwTxn<'a>,
    env: &'a LmdbEnvironment,
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn new(env: &'a LmdbEnvironment) -> Result<Self, LmdbError> {
        let txn = env.env().write_txn()?;
        Ok(Self { txn, env })
    }

    // ── Reads inside the write transaction ──────────────────────────────

    pub fn has_transaction(&self, account: u32, id: &TransactionId) -> Result<bool, LmdbError> {
        let key = scoped_key(account, id.as_bytes());
        Ok(self.env.transactions_db.get(&self.txn, &key)?.is_some())
    }

    pub fn is_unspent(&self, account: u32, id: &OutputId) -> Result<bool, LmdbError> {
        let key = scoped_key(account, &id.to_bytes());
        Ok(self.env.unspent_outputs_db.get(&self.txn, &key)?.is_some())
    }

    // ── Accounts ────────────────────────────────────────────────────────

    pub fn put_account(&mut self, record: &AccountRecord) -> Result<(), LmdbError> {
        let bytes = bincode::serialize(record)?;
        self.env
            .accounts_db
            .put(&mut self.txn, &account_key(record.index), &bytes)?;
        Ok(())
    }

    // ── Outputs ─────────────────────────────────────────────────────────

    /// Insert or replace an output. Outputs in the spent partition are left untouched.
    pub fn upsert_output(&mut self, account: u32, record: &OutputRecord) -> Result<(), LmdbError> {
        let key = scoped_key(account, &record.output_id.to_bytes());
        if self.env.spent_outputs_db.get(&self.txn, &key)?.is_some() {
            return Ok(());
        }
        let bytes = bincode::serialize(record)?;
        if record.is_spent {
            self.env.unspent_outputs_db.delete(&mut self.txn, &key)?;
            self.env.spent_outputs_db.put(&mut self.txn, &key, &bytes)?;
        } else {
            self.env.unspent_outputs_db.put(&mut self.txn, &key, &bytes)?;
        }
        Ok(())
    }

    /// Move an output to the spent partition. Already spent outputs are a no-op.
    pub fn mark_spent(
        &mut self,
        account: u32,
        output_id: &OutputId,
        spent_by: TransactionId,
    ) -> Result<(), LmdbError> {
        let key = scoped_key(account, &output_id.to_bytes());
        if self.env.spent_outputs_db.get(&self.txn, &key)?.is_some() {
            return Ok(());
        }
        let mut record: OutputRecord = match self.env.unspent_outputs_db.get(&self.txn, &key)? {
            Some(bytes) => bincode::deserialize(bytes)?,
            None => return Err(LmdbError::NotFound(format!("output {}", output_id))),
        };
        record.is_spent = true;
        record.spent_by = Some(spent_by);
        let bytes = bincode::serialize(&record)?;
        self.env.unspent_outputs_db.delete(&mut self.txn, &key)?;
        self.env.spent_outputs_db.put(&mut self.txn, &key, &bytes)?;
        Ok(())
    }

    // ── Transactions ────────────────────────────────────────────────────

    pub fn put_transaction(&mut self, account: u32, record: &TransactionRecord) -> Result<(), LmdbError> {
        let key = scoped_key(account, record.transaction_id.as_bytes());
        let bytes = bincode::serialize(record)?;
        self.env.transactions_db.put(&mut self.txn, &key, &bytes)?;
        Ok(())
    }

    // ── Whole batches ───────────────────────────────────────────────────

    /// Write every part of `batch` in the fixed apply order.
    pub fn apply(&mut self, account: u32, batch: &SyncBatch) -> Result<(), LmdbError> {
        if let Some(record) = &batch.account {
            self.put_account(record)?;
        }
        for output in &batch.upsert_outputs {
            self.upsert_output(account, output)?;
        }
        for mark in &batch.spent_outputs {
            self.mark_spent(account, &mark.output_id, mark.spent_by)?;
        }
        for tx in &batch.transactions {
            self.put_transaction(account, tx)?;
        }
        Ok(())
    }

    /// Delete the account record and every record scoped to it.
    pub fn delete_account_data(&mut self, account: u32) -> Result<(), LmdbError> {
        self.env.accounts_db.delete(&mut self.txn, &account_key(account))?;
        let prefix = account_key(account);
        for db in [
            self.env.unspent_outputs_db,
            self.env.spent_outputs_db,
            self.env.transactions_db,
        ] {
            let keys = db
                .prefix_iter(&self.txn, &prefix)?
                .map(|entry| entry.map(|(k, _)| k.to_vec()))
                .collect::<Result<Vec<_>, _>>()?;
            for key in keys {
                db.delete(&mut self.txn, &key)?;
            }
        }
        Ok(())
    }

    // ── Meta ────────────────────────────────────────────────────────────

    pub fn put_meta(&mut self, key: &str, value: &[u8]) -> Result<(), LmdbError> {
        self.env.meta_db.put(&mut self.txn, key.as_bytes(), value)?;
        Ok(())
    }

    pub fn delete_meta(&mut self, key: &str) -> Result<(), LmdbError> {
        self.env.meta_db.delete(&mut self.txn, key.as_bytes())?;
        Ok(())
    }

    /// Commit all batched operations in a single write transaction.
    pub fn commit(self) -> Result<(), LmdbError> {
        self.txn.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::{Address, BasicOutput, Output, Timestamp};

    fn temp_env() -> (tempfile::TempDir, LmdbEnvironment) {
        let dir = tempfile::tempdir().expect("failed to create temp dir");
        let env = LmdbEnvironment::open(dir.path(), 8, 10 * 1024 * 1024).expect("failed to open env");
        (dir, env)
    }

    fn output(n: u8) -> OutputRecord {
        OutputRecord {
            output_id: OutputId::new(TransactionId::new([n; 32]), 0),
            output: Output::Basic(BasicOutput::new(1_000_000, Address::Ed25519([1; 32]))),
            address: Address::Ed25519([1; 32]),
            chain: None,
            is_spent: false,
            spent_by: None,
            remainder: false,
            network_id: 1,
            booked_at: Timestamp::new(0),
        }
    }

    #[test]
    fn dropped_batch_does_not_persist() {
        let (_dir, env) = temp_env();
        let record = output(1);
        {
            let mut batch = env.write_batch().expect("write_batch");
            batch.upsert_output(0, &record).expect("upsert");
        }
        let batch = env.write_batch().expect("write_batch");
        assert!(!batch.is_unspent(0, &record.output_id).expect("read"));
    }

    #[test]
    fn spent_output_is_not_resurrected() {
        let (_dir, env) = temp_env();
        let record = output(2);
        let mut batch = env.write_batch().expect("write_batch");
        batch.upsert_output(0, &record).expect("upsert");
        batch
            .mark_spent(0, &record.output_id, TransactionId::new([7; 32]))
            .expect("mark");
        batch.upsert_output(0, &record).expect("replay upsert");
        assert!(!batch.is_unspent(0, &record.output_id).expect("read"));
        batch.commit().expect("commit");
    }

    #[test]
    fn mark_unknown_output_fails() {
        let (_dir, env) = temp_env();
        let mut batch = env.write_batch().expect("write_batch");
        let result = batch.mark_spent(0, &output(3).output_id, TransactionId::new([7; 32]));
        assert!(matches!(result, Err(LmdbError::NotFound(_))));
    }

    #[test]
    fn delete_account_data_is_scoped() {
        let (_dir, env) = temp_env();
        let mut batch = env.write_batch().expect("write_batch");
        batch.upsert_output(0, &output(4)).expect("upsert");
        batch.upsert_output(1, &output(5)).expect("upsert");
        batch.delete_account_data(0).expect("delete");
        assert!(!batch.is_unspent(0, &output(4).output_id).expect("read"));
        assert!(batch.is_unspent(1, &output(5).output_id).expect("read"));
    }
}
