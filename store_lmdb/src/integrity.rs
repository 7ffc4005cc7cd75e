//! LMDB database integrity checks, run when a wallet store opens.

use heed::Env;

use crate::environment::{
    ACCOUNTS_DB, META_DB, SPENT_OUTPUTS_DB, TRANSACTIONS_DB, UNSPENT_OUTPUTS_DB,
};
use crate::LmdbError;

/// Summary of an integrity check run.
#[derive(Debug)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

const EXPECTED_DATABASES: &[&str] = &[
    ACCOUNTS_DB,
    UNSPENT_OUTPUTS_DB,
    SPENT_OUTPUTS_DB,
    TRANSACTIONS_DB,
    META_DB,
];

/// Open every expected database and count its entries.
///
/// Missing databases and read failures are recorded in the report rather
/// than returned as errors.
pub fn check_integrity(env: &Env) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport {
        databases_checked: 0,
        total_entries: 0,
        errors: Vec::new(),
    };

    let rtxn = env.read_txn()?;

    for &db_name in EXPECTED_DATABASES {
        match env.open_database::<heed::types::Bytes, heed::types::Bytes>(&rtxn, Some(db_name)) {
            Ok(Some(db)) => {
                report.databases_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => report.total_entries += count,
                    Err(e) => report
                        .errors
                        .push(format!("failed to read database '{}': {}", db_name, e)),
                }
            }
            Ok(None) => report.errors.push(format!("database '{}' is missing", db_name)),
            Err(e) => report
                .errors
                .push(format!("failed to open database '{}': {}", db_name, e)),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LmdbEnvironment;

    #[test]
    fn fresh_environment_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), 8, 10 << 20).unwrap();
        let report = check_integrity(env.env()).unwrap();
        assert!(report.is_healthy());
        assert_eq!(report.databases_checked, EXPECTED_DATABASES.len() as u32);
        assert_eq!(report.total_entries, 0);
    }

    #[test]
    fn unhealthy_report() {
        let report = IntegrityReport {
            databases_checked: 5,
            total_entries: 100,
            errors: vec!["corruption detected".to_string()],
        };
        assert!(!report.is_healthy());
    }
}
