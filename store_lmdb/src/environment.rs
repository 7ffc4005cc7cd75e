//! LMDB environment setup.

use std::path::Path;
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::write_batch::WriteBatch;
use crate::LmdbError;

pub(crate) const ACCOUNTS_DB: &str = "accounts";
pub(crate) const UNSPENT_OUTPUTS_DB: &str = "unspent_outputs";
pub(crate) const SPENT_OUTPUTS_DB: &str = "spent_outputs";
pub(crate) const TRANSACTIONS_DB: &str = "transactions";
pub(crate) const META_DB: &str = "meta";

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    pub(crate) accounts_db: Database<Bytes, Bytes>,
    pub(crate) unspent_outputs_db: Database<Bytes, Bytes>,
    pub(crate) spent_outputs_db: Database<Bytes, Bytes>,
    pub(crate) transactions_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given directory.
    pub fn open(path: &Path, max_dbs: u32, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        let mut options = EnvOpenOptions::new();
        options.map_size(map_size).max_dbs(max_dbs);
        // SAFETY: the wallet opens each storage directory at most once per process.
        let env = unsafe { options.open(path)? };

        let mut wtxn = env.write_txn()?;
        let accounts_db = env.create_database::<Bytes, Bytes>(&mut wtxn, Some(ACCOUNTS_DB))?;
        let unspent_outputs_db =
            env.create_database::<Bytes, Bytes>(&mut wtxn, Some(UNSPENT_OUTPUTS_DB))?;
        let spent_outputs_db =
            env.create_database::<Bytes, Bytes>(&mut wtxn, Some(SPENT_OUTPUTS_DB))?;
        let transactions_db =
            env.create_database::<Bytes, Bytes>(&mut wtxn, Some(TRANSACTIONS_DB))?;
        let meta_db = env.create_database::<Bytes, Bytes>(&mut wtxn, Some(META_DB))?;
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            env: Arc::new(env),
            accounts_db,
            unspent_outputs_db,
            spent_outputs_db,
            transactions_db,
            meta_db,
        })
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    /// Begin a write batch. Dropping it without commit rolls everything back.
    pub fn write_batch(&self) -> Result<WriteBatch<'_>, LmdbError> {
        WriteBatch::new(self)
    }
}
