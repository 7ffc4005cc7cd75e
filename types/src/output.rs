//! Output kinds: basic, alias, foundry and NFT.
//!
//! Every output holds a base coin amount, optional native tokens, unlock
//! conditions and features. Its minimum storage deposit is derived from its
//! bincode-serialized size (fixed-width integers, so independent of the amount
//! value itself) and the [`RentStructure`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::address::Address;
use crate::amount::NativeTokens;
use crate::error::TypesError;
use crate::feature::Feature;
use crate::ids::{AliasId, FoundryId, NftId, OutputId};
use crate::params::RentStructure;
use crate::unlock::{UnlockCondition, UnlockConditions};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputKind {
    Basic,
    Alias,
    Foundry,
    Nft,
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Basic => "basic",
            Self::Alias => "alias",
            Self::Foundry => "foundry",
            Self::Nft => "nft",
        };
        f.write_str(name)
    }
}

/// A plain value-holding output.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BasicOutput {
    pub amount: u64,
    pub native_tokens: NativeTokens,
    pub unlock_conditions: UnlockConditions,
    pub features: Vec<Feature>,
}

impl BasicOutput {
    /// A basic output owned by `address` with no further conditions.
    pub fn new(amount: u64, address: Address) -> Self {
        Self {
            amount,
            native_tokens: NativeTokens::new(),
            unlock_conditions: UnlockConditions::from_vec(vec![UnlockCondition::Address(address)])
                .unwrap_or_default(),
            features: Vec::new(),
        }
    }

    pub fn with_native_tokens(mut self, native_tokens: NativeTokens) -> Self {
        self.native_tokens = native_tokens;
        self
    }

    pub fn with_unlock_condition(mut self, condition: UnlockCondition) -> Result<Self, TypesError> {
        let mut conditions: Vec<UnlockCondition> = self.unlock_conditions.iter().cloned().collect();
        conditions.push(condition);
        self.unlock_conditions = UnlockConditions::from_vec(conditions)?;
        Ok(self)
    }

    pub fn with_feature(mut self, feature: Feature) -> Self {
        self.features.push(feature);
        self.features.sort_by_key(Feature::kind);
        self
    }

    /// Whether the only unlock condition is the owning address.
    pub fn is_simple(&self) -> bool {
        self.unlock_conditions.len() == 1 && self.unlock_conditions.address().is_some()
    }
}

/// An alias: a chain output with a state controller and a governor.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AliasOutput {
    pub amount: u64,
    pub native_tokens: NativeTokens,
    /// Zero while the alias is being created.
    pub alias_id: AliasId,
    pub state_index: u32,
    pub state_metadata: Vec<u8>,
    /// Number of foundries this alias has created.
    pub foundry_counter: u32,
    pub unlock_conditions: UnlockConditions,
    pub features: Vec<Feature>,
    pub immutable_features: Vec<Feature>,
}

impl AliasOutput {
    pub fn new(amount: u64, state_controller: Address, governor: Address) -> Self {
        Self {
            amount,
            native_tokens: NativeTokens::new(),
            alias_id: AliasId::NULL,
            state_index: 0,
            state_metadata: Vec::new(),
            foundry_counter: 0,
            unlock_conditions: UnlockConditions::from_vec(vec![
                UnlockCondition::StateControllerAddress(state_controller),
                UnlockCondition::GovernorAddress(governor),
            ])
            .unwrap_or_default(),
            features: Vec::new(),
            immutable_features: Vec::new(),
        }
    }

    /// The successor of this alias in a state transition created by `output_id`'s transaction.
    pub fn state_transition(&self, output_id: &OutputId) -> Self {
        let mut next = self.clone();
        next.alias_id = self.alias_id.or_from_output_id(output_id);
        next.state_index = self.state_index.saturating_add(1);
        next
    }
}

/// The supply accounting of a native token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenScheme {
    Simple(SimpleTokenScheme),
}

impl TokenScheme {
    pub fn kind(&self) -> u8 {
        match self {
            Self::Simple(_) => 0,
        }
    }

    pub fn as_simple(&self) -> &SimpleTokenScheme {
        match self {
            Self::Simple(scheme) => scheme,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimpleTokenScheme {
    minted_tokens: u128,
    melted_tokens: u128,
    maximum_supply: u128,
}

impl SimpleTokenScheme {
    pub fn new(
        minted_tokens: u128,
        melted_tokens: u128,
        maximum_supply: u128,
    ) -> Result<Self, TypesError> {
        if maximum_supply == 0 {
            return Err(TypesError::InvalidTokenScheme(
                "maximum supply must be positive".to_string(),
            ));
        }
        if melted_tokens > minted_tokens {
            return Err(TypesError::InvalidTokenScheme(
                "melted tokens exceed minted tokens".to_string(),
            ));
        }
        if minted_tokens - melted_tokens > maximum_supply {
            return Err(TypesError::InvalidTokenScheme(
                "circulating supply exceeds maximum supply".to_string(),
            ));
        }
        Ok(Self {
            minted_tokens,
            melted_tokens,
            maximum_supply,
        })
    }

    pub fn minted_tokens(&self) -> u128 {
        self.minted_tokens
    }

    pub fn melted_tokens(&self) -> u128 {
        self.melted_tokens
    }

    pub fn maximum_supply(&self) -> u128 {
        self.maximum_supply
    }

    pub fn circulating_supply(&self) -> u128 {
        self.minted_tokens - self.melted_tokens
    }
}

/// A foundry: controls the supply of one native token, owned by an alias.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FoundryOutput {
    pub amount: u64,
    pub native_tokens: NativeTokens,
    pub serial_number: u32,
    pub token_scheme: TokenScheme,
    pub unlock_conditions: UnlockConditions,
    pub features: Vec<Feature>,
    pub immutable_features: Vec<Feature>,
}

impl FoundryOutput {
    pub fn new(amount: u64, alias_id: AliasId, serial_number: u32, token_scheme: TokenScheme) -> Self {
        Self {
            amount,
            native_tokens: NativeTokens::new(),
            serial_number,
            token_scheme,
            unlock_conditions: UnlockConditions::from_vec(vec![
                UnlockCondition::ImmutableAliasAddress(Address::Alias(alias_id)),
            ])
            .unwrap_or_default(),
            features: Vec::new(),
            immutable_features: Vec::new(),
        }
    }

    /// The foundry's id, which is also the id of the token it controls.
    pub fn id(&self) -> Option<FoundryId> {
        match self.unlock_conditions.immutable_alias_address()? {
            Address::Alias(alias_id) => Some(FoundryId::build(
                *alias_id,
                self.serial_number,
                self.token_scheme.kind(),
            )),
            _ => None,
        }
    }
}

/// A non-fungible token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NftOutput {
    pub amount: u64,
    pub native_tokens: NativeTokens,
    /// Zero while the NFT is being minted.
    pub nft_id: NftId,
    pub unlock_conditions: UnlockConditions,
    pub features: Vec<Feature>,
    pub immutable_features: Vec<Feature>,
}

impl NftOutput {
    pub fn new(amount: u64, nft_id: NftId, address: Address) -> Self {
        Self {
            amount,
            native_tokens: NativeTokens::new(),
            nft_id,
            unlock_conditions: UnlockConditions::from_vec(vec![UnlockCondition::Address(address)])
                .unwrap_or_default(),
            features: Vec::new(),
            immutable_features: Vec::new(),
        }
    }

    pub fn with_immutable_metadata(mut self, metadata: Vec<u8>) -> Self {
        self.immutable_features.push(Feature::Metadata(metadata));
        self.immutable_features.sort_by_key(Feature::kind);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Output {
    Basic(BasicOutput),
    Alias(AliasOutput),
    Foundry(FoundryOutput),
    Nft(NftOutput),
}

impl Output {
    pub fn kind(&self) -> OutputKind {
        match self {
            Self::Basic(_) => OutputKind::Basic,
            Self::Alias(_) => OutputKind::Alias,
            Self::Foundry(_) => OutputKind::Foundry,
            Self::Nft(_) => OutputKind::Nft,
        }
    }

    pub fn amount(&self) -> u64 {
        match self {
            Self::Basic(o) => o.amount,
            Self::Alias(o) => o.amount,
            Self::Foundry(o) => o.amount,
            Self::Nft(o) => o.amount,
        }
    }

    pub fn set_amount(&mut self, amount: u64) {
        match self {
            Self::Basic(o) => o.amount = amount,
            Self::Alias(o) => o.amount = amount,
            Self::Foundry(o) => o.amount = amount,
            Self::Nft(o) => o.amount = amount,
        }
    }

    pub fn native_tokens(&self) -> &NativeTokens {
        match self {
            Self::Basic(o) => &o.native_tokens,
            Self::Alias(o) => &o.native_tokens,
            Self::Foundry(o) => &o.native_tokens,
            Self::Nft(o) => &o.native_tokens,
        }
    }

    pub fn unlock_conditions(&self) -> &UnlockConditions {
        match self {
            Self::Basic(o) => &o.unlock_conditions,
            Self::Alias(o) => &o.unlock_conditions,
            Self::Foundry(o) => &o.unlock_conditions,
            Self::Nft(o) => &o.unlock_conditions,
        }
    }

    pub fn features(&self) -> &[Feature] {
        match self {
            Self::Basic(o) => &o.features,
            Self::Alias(o) => &o.features,
            Self::Foundry(o) => &o.features,
            Self::Nft(o) => &o.features,
        }
    }

    pub fn as_basic(&self) -> Option<&BasicOutput> {
        match self {
            Self::Basic(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_alias(&self) -> Option<&AliasOutput> {
        match self {
            Self::Alias(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_foundry(&self) -> Option<&FoundryOutput> {
        match self {
            Self::Foundry(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_nft(&self) -> Option<&NftOutput> {
        match self {
            Self::Nft(o) => Some(o),
            _ => None,
        }
    }

    /// The alias id of an alias output, resolving a freshly created alias from its output id.
    pub fn alias_id(&self, output_id: &OutputId) -> Option<AliasId> {
        self.as_alias()
            .map(|alias| alias.alias_id.or_from_output_id(output_id))
    }

    /// The NFT id of an NFT output, resolving a freshly minted NFT from its output id.
    pub fn nft_id(&self, output_id: &OutputId) -> Option<NftId> {
        self.as_nft().map(|nft| nft.nft_id.or_from_output_id(output_id))
    }

    /// The address an alias or NFT output holds, which can own other outputs.
    pub fn chain_address(&self, output_id: &OutputId) -> Option<Address> {
        self.alias_id(output_id)
            .map(Address::Alias)
            .or_else(|| self.nft_id(output_id).map(Address::Nft))
    }

    /// The output that continues this alias or NFT chain when `output_id` is consumed.
    pub fn chain_successor(&self, output_id: &OutputId) -> Option<Output> {
        match self {
            Output::Alias(alias) => Some(Output::Alias(alias.state_transition(output_id))),
            Output::Nft(nft) => {
                let mut next = nft.clone();
                next.nft_id = nft.nft_id.or_from_output_id(output_id);
                Some(Output::Nft(next))
            }
            _ => None,
        }
    }

    /// Serialized size in bytes, as charged by the storage deposit rule.
    pub fn byte_size(&self) -> Result<usize, TypesError> {
        Ok(bincode::serialized_size(self)? as usize)
    }

    pub fn min_storage_deposit(&self, rent: &RentStructure) -> Result<u64, TypesError> {
        Ok(rent.min_deposit_for_size(self.byte_size()?))
    }

    /// Check that the output holds at least its minimum storage deposit.
    pub fn verify_storage_deposit(&self, rent: &RentStructure) -> Result<(), TypesError> {
        let required = self.min_storage_deposit(rent)?;
        if self.amount() < required {
            return Err(TypesError::InsufficientStorageDeposit {
                amount: self.amount(),
                required,
            });
        }
        Ok(())
    }

    /// Structural validation: required and allowed unlock conditions per kind,
    /// native token limits, feature sizes and token scheme consistency.
    pub fn validate(&self) -> Result<(), TypesError> {
        let conditions = self.unlock_conditions();
        match self {
            Self::Basic(_) | Self::Nft(_) => {
                if conditions.address().is_none() {
                    return Err(TypesError::MissingUnlockCondition("address"));
                }
                for condition in conditions.iter() {
                    if matches!(
                        condition,
                        UnlockCondition::StateControllerAddress(_)
                            | UnlockCondition::GovernorAddress(_)
                            | UnlockCondition::ImmutableAliasAddress(_)
                    ) {
                        return Err(TypesError::ForbiddenUnlockCondition(condition.name()));
                    }
                }
            }
            Self::Alias(_) => {
                if conditions.state_controller_address().is_none() {
                    return Err(TypesError::MissingUnlockCondition("state controller address"));
                }
                if conditions.governor_address().is_none() {
                    return Err(TypesError::MissingUnlockCondition("governor address"));
                }
                if conditions.len() != 2 {
                    return Err(TypesError::ForbiddenUnlockCondition("non-alias condition"));
                }
            }
            Self::Foundry(foundry) => {
                if !matches!(
                    conditions.immutable_alias_address(),
                    Some(Address::Alias(_))
                ) {
                    return Err(TypesError::MissingUnlockCondition("immutable alias address"));
                }
                if conditions.len() != 1 {
                    return Err(TypesError::ForbiddenUnlockCondition("non-foundry condition"));
                }
                let scheme = foundry.token_scheme.as_simple();
                SimpleTokenScheme::new(
                    scheme.minted_tokens(),
                    scheme.melted_tokens(),
                    scheme.maximum_supply(),
                )?;
            }
        }

        if let Some((_, deposit)) = conditions.storage_deposit_return() {
            if deposit > self.amount() {
                return Err(TypesError::StorageDepositReturnExceedsAmount {
                    deposit,
                    amount: self.amount(),
                });
            }
        }

        if self.native_tokens().len() > NativeTokens::COUNT_MAX {
            return Err(TypesError::TooManyNativeTokens {
                count: self.native_tokens().len(),
                max: NativeTokens::COUNT_MAX,
            });
        }

        for feature in self.features() {
            let too_long = match feature {
                Feature::Metadata(data) => data.len() > Feature::METADATA_LENGTH_MAX,
                Feature::Tag(tag) => tag.len() > Feature::TAG_LENGTH_MAX,
                _ => false,
            };
            if too_long {
                return Err(TypesError::Serialization(
                    "feature exceeds its maximum length".to_string(),
                ));
            }
        }
        Ok(())
    }
}
