use serde::{Deserialize, Serialize};
use tessera_store::TransactionRecord;
use tessera_types::{
    AliasId, AliasOutput, Feature, FoundryId, FoundryOutput, NftId, NftOutput, Output,
    SimpleTokenScheme, TokenId, TokenScheme,
};
use tracing::info;

use super::burn::with_scheme;
use super::TransactionOptions;
use crate::account::Account;
use crate::error::WalletError;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MintNftParams {
    /// Owner of the new NFT; the account's first address by default.
    pub address: Option<String>,
    pub immutable_metadata: Option<Vec<u8>>,
    pub metadata: Option<Vec<u8>>,
    pub tag: Option<Vec<u8>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateAliasParams {
    /// State controller and governor; the account's first address by default.
    pub address: Option<String>,
    pub state_metadata: Option<Vec<u8>>,
    pub immutable_metadata: Option<Vec<u8>>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintNativeTokenParams {
    /// Alias that will control the foundry; the only one held if omitted.
    #[serde(default)]
    pub alias_id: Option<AliasId>,
    pub circulating_supply: u128,
    pub maximum_supply: u128,
}

/// The result of minting a native token.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MintTokenTransaction {
    pub token_id: FoundryId,
    pub transaction: TransactionRecord,
}

impl Account {
    pub async fn mint_nfts(
        &self,
        params: Vec<MintNftParams>,
        options: Option<TransactionOptions>,
    ) -> Result<TransactionRecord, WalletError> {
        let rent = self.ctx().protocol().await?.rent_structure;
        let mut outputs = Vec::with_capacity(params.len());
        for param in params {
            let owner = match &param.address {
                Some(address) => *self.parse_address(address).await?.inner(),
                None => self.first_address().await?,
            };
            let mut nft = NftOutput::new(0, NftId::NULL, owner);
            if let Some(metadata) = param.immutable_metadata {
                nft = nft.with_immutable_metadata(metadata);
            }
            if let Some(metadata) = param.metadata {
                nft.features.push(Feature::Metadata(metadata));
            }
            if let Some(tag) = param.tag {
                nft.features.push(Feature::Tag(tag));
            }
            nft.features.sort_by_key(Feature::kind);
            let mut output = Output::Nft(nft);
            output.set_amount(output.min_storage_deposit(&rent)?);
            outputs.push(output);
        }
        self.send_outputs(outputs, options).await
    }

    pub async fn create_alias_output(
        &self,
        params: Option<CreateAliasParams>,
        options: Option<TransactionOptions>,
    ) -> Result<TransactionRecord, WalletError> {
        let params = params.unwrap_or_default();
        let rent = self.ctx().protocol().await?.rent_structure;
        let controller = match &params.address {
            Some(address) => *self.parse_address(address).await?.inner(),
            None => self.first_address().await?,
        };
        let mut alias = AliasOutput::new(0, controller, controller);
        if let Some(metadata) = params.state_metadata {
            alias.state_metadata = metadata;
        }
        if let Some(metadata) = params.immutable_metadata {
            alias.immutable_features.push(Feature::Metadata(metadata));
        }
        let mut output = Output::Alias(alias);
        output.set_amount(output.min_storage_deposit(&rent)?);
        self.send_outputs(vec![output], options).await
    }

    /// Create a foundry under an alias this account controls and mint
    /// `circulating_supply` tokens into the account.
    pub async fn mint_native_token(
        &self,
        params: MintNativeTokenParams,
        options: Option<TransactionOptions>,
    ) -> Result<MintTokenTransaction, WalletError> {
        let rent = self.ctx().protocol().await?.rent_structure;
        let scheme = SimpleTokenScheme::new(params.circulating_supply, 0, params.maximum_supply)?;

        let aliases: Vec<_> = self
            .unspent_outputs()?
            .into_iter()
            .filter(|o| o.output.as_alias().is_some())
            .collect();
        let held = match params.alias_id {
            Some(alias_id) => aliases
                .iter()
                .find(|o| o.output.alias_id(&o.output_id) == Some(alias_id)),
            None if aliases.len() == 1 => aliases.first(),
            None => None,
        }
        .ok_or(WalletError::MissingParameter("alias_id"))?;
        let alias = held
            .output
            .as_alias()
            .ok_or_else(|| WalletError::InvalidOutput("not an alias".into()))?;

        let mut next_alias = alias.state_transition(&held.output_id);
        next_alias.foundry_counter = alias.foundry_counter.saturating_add(1);
        let alias_id = next_alias.alias_id;

        let mut foundry = Output::Foundry(FoundryOutput::new(
            0,
            alias_id,
            next_alias.foundry_counter,
            TokenScheme::Simple(scheme),
        ));
        foundry.set_amount(foundry.min_storage_deposit(&rent)?);
        let token_id = foundry
            .as_foundry()
            .and_then(FoundryOutput::id)
            .ok_or_else(|| WalletError::InvalidOutput("foundry has no id".into()))?;

        let options = options.unwrap_or_default().with_mandatory_inputs([held.output_id]);

        let transaction = self
            .send_outputs(vec![Output::Alias(next_alias), foundry], Some(options))
            .await?;
        info!(
            account = self.index(),
            token_id = %token_id,
            supply = params.circulating_supply,
            "minted native token"
        );
        Ok(MintTokenTransaction {
            token_id,
            transaction,
        })
    }

    /// Mint `amount` more tokens through an existing foundry into the account.
    pub async fn increase_native_token_supply(
        &self,
        token_id: TokenId,
        amount: u128,
        options: Option<TransactionOptions>,
    ) -> Result<MintTokenTransaction, WalletError> {
        let (held, foundry) = self.held_foundry(&token_id)?;
        let scheme = foundry.token_scheme.as_simple();
        let minted = scheme
            .minted_tokens()
            .checked_add(amount)
            .ok_or(WalletError::NativeTokenOverflow)?;
        let next = with_scheme(
            &foundry,
            SimpleTokenScheme::new(minted, scheme.melted_tokens(), scheme.maximum_supply())?,
        );

        let options = options.unwrap_or_default().with_mandatory_inputs([held.output_id]);
        let transaction = self.send_outputs(vec![next], Some(options)).await?;
        info!(account = self.index(), token_id = %token_id, amount, "increased native token supply");
        Ok(MintTokenTransaction {
            token_id,
            transaction,
        })
    }
}
