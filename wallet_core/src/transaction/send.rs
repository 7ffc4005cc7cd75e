use serde::{Deserialize, Serialize};
use tessera_store::TransactionRecord;
use tessera_types::{
    Address, BasicOutput, Bech32Address, NativeToken, NativeTokens, NftId, NftOutput, Output,
    TokenId, UnlockCondition,
};

use super::TransactionOptions;
use crate::account::Account;
use crate::error::WalletError;

/// Default time after which unclaimed native tokens return to the sender.
pub const DEFAULT_EXPIRATION_SECS: u64 = 24 * 60 * 60;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendAmountParams {
    /// Bech32 recipient.
    pub address: String,
    pub amount: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNativeTokensParams {
    pub address: String,
    pub native_tokens: Vec<(TokenId, u128)>,
    /// Where the storage deposit goes back to; the first account address by default.
    #[serde(default)]
    pub return_address: Option<String>,
    /// Seconds until unclaimed tokens return.
    #[serde(default)]
    pub expiration: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendNftParams {
    pub address: String,
    pub nft_id: NftId,
}

impl Account {
    /// Send base coin. Each amount must cover its output's storage deposit.
    pub async fn send_amount(
        &self,
        params: Vec<SendAmountParams>,
        options: Option<TransactionOptions>,
    ) -> Result<TransactionRecord, WalletError> {
        let mut outputs = Vec::with_capacity(params.len());
        for param in &params {
            let address = self.parse_address(&param.address).await?;
            outputs.push(Output::Basic(BasicOutput::new(param.amount, *address.inner())));
        }
        self.send_outputs(outputs, options).await
    }

    /// Send native tokens. The recipient must claim them, returning the
    /// storage deposit, before the expiration passes.
    pub async fn send_native_tokens(
        &self,
        params: Vec<SendNativeTokensParams>,
        options: Option<TransactionOptions>,
    ) -> Result<TransactionRecord, WalletError> {
        let rent = self.ctx().protocol().await?.rent_structure;
        let now = self.ctx().now();
        let mut outputs = Vec::with_capacity(params.len());
        for param in &params {
            let recipient = self.parse_address(&param.address).await?;
            let return_address = match &param.return_address {
                Some(address) => *self.parse_address(address).await?.inner(),
                None => self.first_address().await?,
            };
            let tokens = param
                .native_tokens
                .iter()
                .map(|(id, amount)| NativeToken::new(*id, *amount))
                .collect::<Result<Vec<_>, _>>()?;
            let expiration = now.plus_secs(param.expiration.unwrap_or(DEFAULT_EXPIRATION_SECS));

            let native_tokens = NativeTokens::from_vec(tokens)?;
            let build = |deposit: u64| -> Result<Output, WalletError> {
                Ok(Output::Basic(
                    BasicOutput::new(deposit, *recipient.inner())
                        .with_native_tokens(native_tokens.clone())
                        .with_unlock_condition(UnlockCondition::StorageDepositReturn {
                            return_address,
                            amount: deposit,
                        })?
                        .with_unlock_condition(UnlockCondition::Expiration {
                            return_address,
                            timestamp: expiration,
                        })?,
                ))
            };
            // Integers serialize at fixed width, so the deposit does not
            // depend on the amounts it is computed for.
            let deposit = build(0)?.min_storage_deposit(&rent)?;
            outputs.push(build(deposit)?);
        }
        self.send_outputs(outputs, options).await
    }

    /// Transfer NFTs held by this account.
    pub async fn send_nft(
        &self,
        params: Vec<SendNftParams>,
        options: Option<TransactionOptions>,
    ) -> Result<TransactionRecord, WalletError> {
        let unspent = self.unspent_outputs()?;
        let mut options = options.unwrap_or_default();
        let mut mandatory = options.mandatory_inputs.take().unwrap_or_default();
        let mut outputs = Vec::with_capacity(params.len());
        for param in &params {
            let recipient = self.parse_address(&param.address).await?;
            let held = unspent
                .iter()
                .find(|o| o.output.nft_id(&o.output_id) == Some(param.nft_id))
                .ok_or_else(|| WalletError::InvalidOutput(format!("nft {} not held", param.nft_id)))?;
            let current = held
                .output
                .as_nft()
                .ok_or_else(|| WalletError::InvalidOutput(format!("{} is not an nft", held.output_id)))?;
            let mut next = NftOutput::new(current.amount, param.nft_id, *recipient.inner());
            next.native_tokens = current.native_tokens.clone();
            next.immutable_features = current.immutable_features.clone();
            next.features = current.features.clone();
            mandatory.push(held.output_id);
            outputs.push(Output::Nft(next));
        }
        options.mandatory_inputs = Some(mandatory);
        self.send_outputs(outputs, Some(options)).await
    }

    /// Build, sign and submit a transaction creating `outputs`.
    pub async fn send_outputs(
        &self,
        outputs: Vec<Output>,
        options: Option<TransactionOptions>,
    ) -> Result<TransactionRecord, WalletError> {
        let (prepared, reservation) = self.prepare_reserved(outputs, options).await?;
        let signed = self.sign_transaction_essence(&prepared).await?;
        self.submit_inner(signed, Some(&reservation)).await
    }

    pub(crate) async fn parse_address(&self, address: &str) -> Result<Bech32Address, WalletError> {
        let hrp = self.ctx().protocol().await?.bech32_hrp;
        Ok(Bech32Address::try_from_str_with_hrp(address, &hrp)?)
    }

    pub(crate) async fn first_address(&self) -> Result<Address, WalletError> {
        self.inner()
            .record
            .read()
            .await
            .public_addresses
            .first()
            .map(|a| *a.address.inner())
            .ok_or_else(|| WalletError::Consistency("account has no address".into()))
    }
}
