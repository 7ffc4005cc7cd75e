//! Destroying native tokens, NFTs, aliases and foundries.
//!
//! Each operation is a transaction whose chain inputs are mandatory and, where
//! something disappears, have no successor. Alias inputs that a foundry or an
//! owned output needs are pulled in by input selection.

use tessera_store::{OutputRecord, TransactionRecord};
use tessera_types::{
    Address, AliasId, FoundryOutput, NftId, Output, OutputId, SimpleTokenScheme, TokenId,
    TokenScheme,
};
use tracing::info;

use super::TransactionOptions;
use crate::account::Account;
use crate::error::WalletError;

impl Account {
    /// Destroy `amount` of a native token held by this account.
    pub async fn burn_native_token(
        &self,
        token_id: TokenId,
        amount: u128,
        options: Option<TransactionOptions>,
    ) -> Result<TransactionRecord, WalletError> {
        if amount == 0 {
            return Err(WalletError::BurningOrMeltingFailed("nothing to burn".into()));
        }
        let mut options = options.unwrap_or_default();
        options.burn_native_tokens.push((token_id, amount));
        let transaction = self.send_outputs(Vec::new(), Some(options)).await?;
        info!(account = self.index(), token_id = %token_id, amount, "burned native tokens");
        Ok(transaction)
    }

    /// Melt `amount` tokens through their foundry, lowering the circulating supply.
    pub async fn melt_native_token(
        &self,
        token_id: TokenId,
        amount: u128,
        options: Option<TransactionOptions>,
    ) -> Result<TransactionRecord, WalletError> {
        let (held, foundry) = self.held_foundry(&token_id)?;
        let scheme = foundry.token_scheme.as_simple();
        if amount == 0 || amount > scheme.circulating_supply() {
            return Err(WalletError::BurningOrMeltingFailed(format!(
                "cannot melt {amount} of {token_id} with {} in circulation",
                scheme.circulating_supply()
            )));
        }
        let melted = scheme
            .melted_tokens()
            .checked_add(amount)
            .ok_or(WalletError::NativeTokenOverflow)?;
        let next = with_scheme(
            &foundry,
            SimpleTokenScheme::new(scheme.minted_tokens(), melted, scheme.maximum_supply())?,
        );

        let options = options.unwrap_or_default().with_mandatory_inputs([held.output_id]);
        let transaction = self.send_outputs(vec![next], Some(options)).await?;
        info!(account = self.index(), token_id = %token_id, amount, "melted native tokens");
        Ok(transaction)
    }

    /// Consume an NFT without a successor.
    pub async fn burn_nft(
        &self,
        nft_id: NftId,
        options: Option<TransactionOptions>,
    ) -> Result<TransactionRecord, WalletError> {
        let held = self
            .unspent_outputs()?
            .into_iter()
            .find(|o| o.output.nft_id(&o.output_id) == Some(nft_id))
            .ok_or_else(|| WalletError::BurningOrMeltingFailed(format!("nft {nft_id} not held")))?;

        let mut options = options.unwrap_or_default().with_mandatory_inputs([held.output_id]);
        options.allow_burning = true;
        let transaction = self.send_outputs(Vec::new(), Some(options)).await?;
        info!(account = self.index(), nft_id = %nft_id, "burned nft");
        Ok(transaction)
    }

    /// Consume an alias without a successor, collecting the plain outputs it owns.
    ///
    /// Fails while the alias still controls a foundry: that foundry could
    /// never be unlocked again.
    pub async fn destroy_alias(
        &self,
        alias_id: AliasId,
        options: Option<TransactionOptions>,
    ) -> Result<TransactionRecord, WalletError> {
        let unspent = self.unspent_outputs()?;
        let held = unspent
            .iter()
            .find(|o| o.output.alias_id(&o.output_id) == Some(alias_id))
            .ok_or_else(|| {
                WalletError::BurningOrMeltingFailed(format!("alias {alias_id} not held"))
            })?;
        let alias_address = Address::Alias(alias_id);
        if let Some(foundry) = unspent
            .iter()
            .filter_map(|o| o.output.as_foundry())
            .find(|f| f.unlock_conditions.immutable_alias_address() == Some(&alias_address))
        {
            return Err(WalletError::BurningOrMeltingFailed(format!(
                "alias {alias_id} still controls foundry {}",
                foundry.serial_number
            )));
        }

        let mut mandatory = vec![held.output_id];
        mandatory.extend(plain_outputs_of(&unspent, &alias_address));
        let mut options = options.unwrap_or_default().with_mandatory_inputs(mandatory);
        options.allow_burning = true;
        let transaction = self.send_outputs(Vec::new(), Some(options)).await?;
        info!(account = self.index(), alias_id = %alias_id, "destroyed alias");
        Ok(transaction)
    }

    /// Consume a foundry whose tokens have all been melted.
    pub async fn destroy_foundry(
        &self,
        token_id: TokenId,
        options: Option<TransactionOptions>,
    ) -> Result<TransactionRecord, WalletError> {
        let (held, foundry) = self.held_foundry(&token_id)?;
        let circulating = foundry.token_scheme.as_simple().circulating_supply();
        if circulating != 0 {
            return Err(WalletError::BurningOrMeltingFailed(format!(
                "foundry {token_id} still has {circulating} tokens in circulation"
            )));
        }

        let mut options = options.unwrap_or_default().with_mandatory_inputs([held.output_id]);
        options.allow_burning = true;
        let transaction = self.send_outputs(Vec::new(), Some(options)).await?;
        info!(account = self.index(), token_id = %token_id, "destroyed foundry");
        Ok(transaction)
    }

    pub(crate) fn held_foundry(
        &self,
        token_id: &TokenId,
    ) -> Result<(OutputRecord, FoundryOutput), WalletError> {
        self.unspent_outputs()?
            .into_iter()
            .find_map(|record| {
                let foundry = record.output.as_foundry()?.clone();
                (foundry.id() == Some(*token_id)).then_some((record, foundry))
            })
            .ok_or_else(|| WalletError::BurningOrMeltingFailed(format!("foundry {token_id} not held")))
    }
}

/// Unspent outputs with `owner` as their only unlock condition.
pub(crate) fn plain_outputs_of(unspent: &[OutputRecord], owner: &Address) -> Vec<OutputId> {
    unspent
        .iter()
        .filter(|o| {
            o.output
                .as_basic()
                .is_some_and(|b| b.is_simple() && b.unlock_conditions.address() == Some(owner))
        })
        .map(|o| o.output_id)
        .collect()
}

/// The foundry's successor with a new token scheme.
pub(crate) fn with_scheme(foundry: &FoundryOutput, scheme: SimpleTokenScheme) -> Output {
    let mut next = foundry.clone();
    next.token_scheme = TokenScheme::Simple(scheme);
    Output::Foundry(next)
}
