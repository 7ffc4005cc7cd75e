//! LMDB implementation of OutputStore.

use heed::types::Bytes;
use heed::{Database, RoTxn};

use tessera_store::{OutputFilter, OutputRecord, OutputStore, SpentMark, StoreError, SyncBatch, WalletStore};
use tessera_types::{OutputId, TransactionId};

use crate::store::LmdbWalletStore;
use crate::{account_key, scoped_key, LmdbError};

fn collect_partition(
    db: Database<Bytes, Bytes>,
    rtxn: &RoTxn,
    account: u32,
    filter: &OutputFilter,
    out: &mut Vec<OutputRecord>,
) -> Result<(), LmdbError> {
    let prefix = account_key(account);
    if let Some(ids) = &filter.output_ids {
        for id in ids {
            if let Some(bytes) = db.get(rtxn, &scoped_key(account, &id.to_bytes()))? {
                let record: OutputRecord = bincode::deserialize(bytes)?;
                if filter.matches(&record) {
                    out.push(record);
                }
            }
        }
        return Ok(());
    }
    for entry in db.prefix_iter(rtxn, &prefix)? {
        let (_, bytes) = entry?;
        let record: OutputRecord = bincode::deserialize(bytes)?;
        if filter.matches(&record) {
            out.push(record);
        }
    }
    Ok(())
}

impl OutputStore for LmdbWalletStore {
    fn get_output(&self, account: u32, output_id: &OutputId) -> Result<OutputRecord, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        let key = scoped_key(account, &output_id.to_bytes());
        for db in [self.env.unspent_outputs_db, self.env.spent_outputs_db] {
            if let Some(bytes) = db.get(&rtxn, &key).map_err(LmdbError::from)? {
                return Ok(bincode::deserialize(bytes).map_err(LmdbError::from)?);
            }
        }
        Err(LmdbError::NotFound(format!("output {}", output_id)).into())
    }

    fn upsert_output(&self, account: u32, record: &OutputRecord) -> Result<(), StoreError> {
        let batch = SyncBatch {
            upsert_outputs: vec![record.clone()],
            ..SyncBatch::default()
        };
        self.apply_batch(account, &batch)
    }

    fn mark_output_spent(
        &self,
        account: u32,
        output_id: &OutputId,
        spent_by: TransactionId,
    ) -> Result<(), StoreError> {
        let batch = SyncBatch {
            spent_outputs: vec![SpentMark {
                output_id: *output_id,
                spent_by,
            }],
            ..SyncBatch::default()
        };
        self.apply_batch(account, &batch)
    }

    fn get_outputs(&self, account: u32, filter: &OutputFilter) -> Result<Vec<OutputRecord>, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        let mut out = Vec::new();
        if filter.includes_unspent() {
            collect_partition(self.env.unspent_outputs_db, &rtxn, account, filter, &mut out)?;
        }
        if filter.includes_spent() {
            collect_partition(self.env.spent_outputs_db, &rtxn, account, filter, &mut out)?;
        }
        out.sort_by_key(|r| r.output_id);
        Ok(out)
    }
}
