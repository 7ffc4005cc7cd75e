use tessera_store::TransactionRecord;
use tessera_types::{Address, Output};
use tracing::info;

use super::burn::plain_outputs_of;
use super::TransactionOptions;
use crate::account::Account;
use crate::error::WalletError;

impl Account {
    /// Move every plain output owned by an alias or NFT this account holds
    /// back to the remainder address. The chain output carries on unchanged.
    pub async fn sweep_chain_outputs(
        &self,
        address: &str,
        options: Option<TransactionOptions>,
    ) -> Result<TransactionRecord, WalletError> {
        let owner = *self.parse_address(address).await?.inner();
        if !matches!(owner, Address::Alias(_) | Address::Nft(_)) {
            return Err(WalletError::InvalidOutput(format!(
                "{address} is not an alias or nft address"
            )));
        }
        let swept = plain_outputs_of(&self.unspent_outputs()?, &owner);
        if swept.is_empty() {
            return Err(WalletError::InvalidOutput(format!("nothing owned by {address}")));
        }

        let count = swept.len();
        let options = options.unwrap_or_default().with_mandatory_inputs(swept);
        let transaction = self.send_outputs(Vec::new(), Some(options)).await?;
        info!(account = self.index(), count, "swept chain-owned outputs");
        Ok(transaction)
    }

    /// The smallest amount `output` may carry under the current rent structure.
    pub async fn minimum_required_storage_deposit(&self, output: &Output) -> Result<u64, WalletError> {
        let rent = self.ctx().protocol().await?.rent_structure;
        Ok(output.min_storage_deposit(&rent)?)
    }
}
