//! Native token amounts carried by outputs.
//!
//! The base coin amount of an output is a plain `u64`. Native tokens are
//! `u128` amounts keyed by [`TokenId`]; all arithmetic is checked.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::TypesError;
use crate::ids::TokenId;

/// A native token amount attached to an output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NativeToken {
    pub token_id: TokenId,
    pub amount: u128,
}

impl NativeToken {
    pub fn new(token_id: TokenId, amount: u128) -> Result<Self, TypesError> {
        if amount == 0 {
            return Err(TypesError::ZeroNativeTokenAmount);
        }
        Ok(Self { token_id, amount })
    }
}

/// The native tokens of one output: at most one entry per token id, sorted by id.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeTokens(Vec<NativeToken>);

impl NativeTokens {
    /// Maximum number of distinct native tokens a single output may carry.
    pub const COUNT_MAX: usize = 64;

    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Build from a list, merging duplicate ids and enforcing the per-output limit.
    pub fn from_vec(tokens: Vec<NativeToken>) -> Result<Self, TypesError> {
        let mut sum = NativeTokensSum::default();
        for token in &tokens {
            sum.add(token.token_id, token.amount)?;
        }
        let merged = sum.into_tokens();
        if merged.len() > Self::COUNT_MAX {
            return Err(TypesError::TooManyNativeTokens {
                count: merged.len(),
                max: Self::COUNT_MAX,
            });
        }
        Ok(Self(merged))
    }

    pub fn iter(&self) -> impl Iterator<Item = &NativeToken> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, token_id: &TokenId) -> Option<u128> {
        self.0
            .iter()
            .find(|t| &t.token_id == token_id)
            .map(|t| t.amount)
    }
}

/// Accumulates native token amounts across many outputs.
///
/// Unlike [`NativeTokens`] there is no count limit; use [`NativeTokensSum::chunks`]
/// to split a sum into per-output lists.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NativeTokensSum(BTreeMap<TokenId, u128>);

impl NativeTokensSum {
    pub fn add(&mut self, token_id: TokenId, amount: u128) -> Result<(), TypesError> {
        let entry = self.0.entry(token_id).or_insert(0);
        *entry = entry
            .checked_add(amount)
            .ok_or(TypesError::NativeTokenOverflow)?;
        Ok(())
    }

    pub fn add_all(&mut self, tokens: &NativeTokens) -> Result<(), TypesError> {
        for token in tokens.iter() {
            self.add(token.token_id, token.amount)?;
        }
        Ok(())
    }

    /// Subtract `amount`, returning `false` (and leaving the sum unchanged) if not enough is held.
    pub fn try_sub(&mut self, token_id: &TokenId, amount: u128) -> bool {
        let Some(held) = self.0.get_mut(token_id) else {
            return amount == 0;
        };
        let Some(rest) = held.checked_sub(amount) else {
            return false;
        };
        if rest == 0 {
            self.0.remove(token_id);
        } else {
            *held = rest;
        }
        true
    }

    pub fn get(&self, token_id: &TokenId) -> u128 {
        self.0.get(token_id).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TokenId, &u128)> {
        self.0.iter()
    }

    fn into_tokens(self) -> Vec<NativeToken> {
        self.0
            .into_iter()
            .filter(|(_, amount)| *amount > 0)
            .map(|(token_id, amount)| NativeToken { token_id, amount })
            .collect()
    }

    /// Split into lists of at most [`NativeTokens::COUNT_MAX`] tokens each.
    pub fn chunks(self) -> Vec<NativeTokens> {
        self.into_tokens()
            .chunks(NativeTokens::COUNT_MAX)
            .map(|chunk| NativeTokens(chunk.to_vec()))
            .collect()
    }
}
