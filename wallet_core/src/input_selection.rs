//! Greedy input selection with remainder construction.
//!
//! Native token needs are covered first, then the base coin amount, each
//! taking the largest candidate first with ties broken by output id. Any
//! leftover becomes one or more remainder outputs; if the leftover cannot pay
//! for their storage deposits, more inputs are pulled in.

use std::cmp::Reverse;
use std::collections::HashSet;

use tessera_types::{
    Address, BasicOutput, InputSigningData, NativeTokens, NativeTokensSum, Output, OutputId,
    OutputKind, RentStructure, TokenId, INPUT_COUNT_MAX, OUTPUT_COUNT_MAX,
};

use crate::error::WalletError;

/// Everything input selection needs to know about one transaction.
#[derive(Clone, Debug)]
pub struct InputSelection {
    /// Spendable candidates. Only basic outputs are picked automatically.
    pub available: Vec<InputSigningData>,
    /// Inputs that must be consumed, such as chain outputs being transitioned.
    pub required: Vec<InputSigningData>,
    pub outputs: Vec<Output>,
    pub remainder_address: Address,
    pub rent: RentStructure,
    /// Owned funds that cannot be unlocked yet. Used only to tell
    /// `NoViableInputs` apart from `InsufficientFunds`.
    pub locked_amount: u64,
    /// Allow required alias, NFT and foundry inputs to have no successor.
    pub allow_burning: bool,
    /// Native tokens taken from the inputs and put into no output.
    pub burn: NativeTokensSum,
}

/// The result of input selection: inputs and the full output list,
/// remainders appended at the end.
#[derive(Clone, Debug)]
pub struct Selected {
    pub inputs: Vec<InputSigningData>,
    pub outputs: Vec<Output>,
    /// Index of the first remainder output and the base amount it carries.
    pub remainder: Option<(usize, u64)>,
}

impl InputSelection {
    pub fn new(
        available: Vec<InputSigningData>,
        outputs: Vec<Output>,
        remainder_address: Address,
        rent: RentStructure,
    ) -> Self {
        Self {
            available,
            required: Vec::new(),
            outputs,
            remainder_address,
            rent,
            locked_amount: 0,
            allow_burning: false,
            burn: NativeTokensSum::default(),
        }
    }

    pub fn with_required(mut self, required: Vec<InputSigningData>) -> Self {
        self.required = required;
        self
    }

    pub fn with_locked_amount(mut self, locked_amount: u64) -> Self {
        self.locked_amount = locked_amount;
        self
    }

    pub fn with_burning(mut self, allow_burning: bool) -> Self {
        self.allow_burning = allow_burning;
        self
    }

    pub fn with_burned_tokens(mut self, burn: NativeTokensSum) -> Self {
        self.burn = burn;
        self
    }

    pub fn select(self) -> Result<Selected, WalletError> {
        self.validate_outputs()?;
        self.check_chain_successors()?;

        let out_amount = checked_sum(self.outputs.iter().map(Output::amount))?;
        let mut needed_tokens = NativeTokensSum::default();
        for output in &self.outputs {
            needed_tokens.add_all(output.native_tokens())?;
        }
        let (minted, melted) = self.foundry_deltas()?;
        for (token_id, amount) in melted.iter().chain(self.burn.iter()) {
            needed_tokens.add(*token_id, *amount)?;
        }

        let required_ids: HashSet<OutputId> = self.required.iter().map(|i| i.output_id).collect();
        let mut pool: Vec<InputSigningData> = self
            .available
            .iter()
            .filter(|i| i.output.kind() == OutputKind::Basic && !required_ids.contains(&i.output_id))
            .cloned()
            .collect();
        pool.sort_by_key(|i| (Reverse(i.output.amount()), i.output_id));
        let spendable = checked_sum(
            self.required
                .iter()
                .chain(pool.iter())
                .map(|i| i.output.amount()),
        )?;
        let mut selected = self.required.clone();

        // Native tokens first.
        let mut token_order: Vec<(TokenId, u128)> =
            needed_tokens.iter().map(|(id, amount)| (*id, *amount)).collect();
        token_order.sort_by_key(|(id, amount)| (Reverse(*amount), *id));
        for (token_id, needed) in token_order {
            loop {
                let held = tokens_of(&selected)?.get(&token_id) + minted.get(&token_id);
                if held >= needed {
                    break;
                }
                let best = pool
                    .iter()
                    .enumerate()
                    .filter_map(|(pos, i)| i.output.native_tokens().get(&token_id).map(|a| (pos, a)))
                    .max_by_key(|(pos, amount)| (*amount, Reverse(pool[*pos].output_id)));
                match best {
                    Some((pos, _)) => selected.push(pool.remove(pos)),
                    None => {
                        return Err(WalletError::UnbalancedNativeTokens {
                            token_id,
                            needed,
                            available: held,
                        })
                    }
                }
            }
        }

        // Base amount and remainder.
        loop {
            let in_amount = checked_sum(selected.iter().map(|i| i.output.amount()))?;
            if in_amount < out_amount {
                if pool.is_empty() {
                    return Err(self.shortfall(out_amount, spendable));
                }
                selected.push(pool.remove(0));
                continue;
            }

            let leftover_amount = in_amount - out_amount;
            let mut leftover_tokens = tokens_of(&selected)?;
            for (token_id, amount) in minted.iter() {
                leftover_tokens.add(*token_id, *amount)?;
            }
            for (token_id, amount) in needed_tokens.iter() {
                if !leftover_tokens.try_sub(token_id, *amount) {
                    return Err(WalletError::UnbalancedNativeTokens {
                        token_id: *token_id,
                        needed: *amount,
                        available: leftover_tokens.get(token_id),
                    });
                }
            }

            if leftover_amount == 0 && leftover_tokens.is_empty() {
                return self.finish(selected, self.outputs.clone(), None);
            }

            let mut remainders = self.remainder_outputs(leftover_tokens)?;
            let deposits: Vec<u64> = remainders
                .iter()
                .map(|o| o.min_storage_deposit(&self.rent))
                .collect::<Result<_, _>>()?;
            let required_deposit = checked_sum(deposits.iter().copied())?;
            if leftover_amount < required_deposit {
                if pool.is_empty() {
                    return Err(WalletError::InsufficientFundsForRemainder {
                        available: leftover_amount,
                        required: required_deposit,
                    });
                }
                selected.push(pool.remove(0));
                continue;
            }

            let rest: u64 = deposits[1..].iter().sum();
            remainders[0].set_amount(leftover_amount - rest);
            for (remainder, deposit) in remainders.iter_mut().zip(deposits.iter()).skip(1) {
                remainder.set_amount(*deposit);
            }
            let first_remainder = self.outputs.len();
            let remainder_amount = remainders[0].amount();
            let mut outputs = self.outputs.clone();
            outputs.extend(remainders);
            return self.finish(selected, outputs, Some((first_remainder, remainder_amount)));
        }
    }

    fn finish(
        &self,
        inputs: Vec<InputSigningData>,
        outputs: Vec<Output>,
        remainder: Option<(usize, u64)>,
    ) -> Result<Selected, WalletError> {
        if inputs.len() > INPUT_COUNT_MAX {
            return Err(WalletError::TooManyInputs {
                count: inputs.len(),
                max: INPUT_COUNT_MAX,
            });
        }
        if outputs.len() > OUTPUT_COUNT_MAX {
            return Err(WalletError::InvalidOutput(format!(
                "{} outputs exceed the maximum of {}",
                outputs.len(),
                OUTPUT_COUNT_MAX
            )));
        }
        if inputs.is_empty() {
            return Err(WalletError::InvalidOutput("transaction has no inputs".into()));
        }
        Ok(Selected {
            inputs,
            outputs,
            remainder,
        })
    }

    fn validate_outputs(&self) -> Result<(), WalletError> {
        // Burning and chain transitions may leave everything to the remainder.
        if self.outputs.is_empty() && self.required.is_empty() && self.burn.is_empty() {
            return Err(WalletError::InvalidOutput("no outputs requested".into()));
        }
        for output in &self.outputs {
            if output.native_tokens().len() > NativeTokens::COUNT_MAX {
                return Err(WalletError::TooManyNativeTokens {
                    count: output.native_tokens().len(),
                    max: NativeTokens::COUNT_MAX,
                });
            }
            output.validate()?;
            output.verify_storage_deposit(&self.rent)?;
        }
        Ok(())
    }

    /// Required chain inputs must reappear among the outputs unless burning is allowed.
    fn check_chain_successors(&self) -> Result<(), WalletError> {
        if self.allow_burning {
            return Ok(());
        }
        for input in &self.required {
            let output = &input.output;
            let continued = match output.kind() {
                OutputKind::Alias => {
                    let id = output.alias_id(&input.output_id);
                    self.outputs
                        .iter()
                        .any(|o| o.as_alias().is_some_and(|a| Some(a.alias_id) == id))
                }
                OutputKind::Nft => {
                    let id = output.nft_id(&input.output_id);
                    self.outputs
                        .iter()
                        .any(|o| o.as_nft().is_some_and(|n| Some(n.nft_id) == id))
                }
                OutputKind::Foundry => {
                    let id = output.as_foundry().and_then(|f| f.id());
                    self.outputs
                        .iter()
                        .any(|o| o.as_foundry().is_some_and(|f| f.id() == id))
                }
                OutputKind::Basic => true,
            };
            if !continued {
                return Err(WalletError::InvalidOutput(format!(
                    "{} input {} has no successor output",
                    output.kind(),
                    input.output_id
                )));
            }
        }
        Ok(())
    }

    /// Tokens created and destroyed by foundry transitions in this transaction.
    fn foundry_deltas(&self) -> Result<(NativeTokensSum, NativeTokensSum), WalletError> {
        let mut minted = NativeTokensSum::default();
        let mut melted = NativeTokensSum::default();
        for output in self.outputs.iter().filter_map(Output::as_foundry) {
            let Some(token_id) = output.id() else {
                continue;
            };
            let before = self
                .required
                .iter()
                .filter_map(|i| i.output.as_foundry())
                .find(|f| f.id() == Some(token_id))
                .map(|f| f.token_scheme.as_simple().circulating_supply())
                .unwrap_or(0);
            let after = output.token_scheme.as_simple().circulating_supply();
            if after > before {
                minted.add(token_id, after - before)?;
            } else if before > after {
                melted.add(token_id, before - after)?;
            }
        }
        Ok((minted, melted))
    }

    fn remainder_outputs(&self, tokens: NativeTokensSum) -> Result<Vec<Output>, WalletError> {
        let chunks = tokens.chunks();
        if chunks.is_empty() {
            return Ok(vec![Output::Basic(BasicOutput::new(0, self.remainder_address))]);
        }
        Ok(chunks
            .into_iter()
            .map(|chunk| {
                Output::Basic(BasicOutput::new(0, self.remainder_address).with_native_tokens(chunk))
            })
            .collect())
    }

    fn shortfall(&self, needed: u64, spendable: u64) -> WalletError {
        if spendable.saturating_add(self.locked_amount) >= needed {
            WalletError::NoViableInputs { needed, spendable }
        } else {
            WalletError::InsufficientFunds {
                needed,
                available: spendable,
            }
        }
    }
}

fn tokens_of(inputs: &[InputSigningData]) -> Result<NativeTokensSum, WalletError> {
    let mut sum = NativeTokensSum::default();
    for input in inputs {
        sum.add_all(input.output.native_tokens())?;
    }
    Ok(sum)
}

fn checked_sum(mut amounts: impl Iterator<Item = u64>) -> Result<u64, WalletError> {
    amounts.try_fold(0u64, |acc, amount| {
        acc.checked_add(amount)
            .ok_or_else(|| WalletError::InvalidOutput("amount overflow".into()))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::{
        AliasId, AliasOutput, Bip44, FoundryId, NativeToken, TransactionId,
    };

    fn ours() -> Address {
        Address::Ed25519([1u8; 32])
    }

    fn recipient() -> Address {
        Address::Ed25519([2u8; 32])
    }

    fn input(n: u8, amount: u64) -> InputSigningData {
        InputSigningData {
            output_id: OutputId::new(TransactionId::new([n; 32]), 0),
            output: Output::Basic(BasicOutput::new(amount, ours())),
            chain: Bip44::new(1, 0, false, 0),
            via_chain: None,
        }
    }

    fn token(n: u8) -> TokenId {
        FoundryId::build(AliasId::new([n; 32]), 1, 0)
    }

    fn token_input(n: u8, amount: u64, token_id: TokenId, tokens: u128) -> InputSigningData {
        let mut i = input(n, amount);
        i.output = Output::Basic(BasicOutput::new(amount, ours()).with_native_tokens(
            NativeTokens::from_vec(vec![NativeToken::new(token_id, tokens).unwrap()]).unwrap(),
        ));
        i
    }

    fn pay(amount: u64) -> Output {
        Output::Basic(BasicOutput::new(amount, recipient()))
    }

    fn ids(selected: &Selected) -> Vec<u8> {
        selected
            .inputs
            .iter()
            .map(|i| i.output_id.transaction_id().as_bytes()[0])
            .collect()
    }

    #[test]
    fn exact_amount_needs_no_remainder() {
        let selected = InputSelection::new(
            vec![input(1, 1_000_000)],
            vec![pay(1_000_000)],
            ours(),
            RentStructure::default(),
        )
        .select()
        .unwrap();
        assert_eq!(selected.outputs.len(), 1);
        assert!(selected.remainder.is_none());
    }

    #[test]
    fn largest_first_with_id_tiebreak() {
        let selected = InputSelection::new(
            vec![input(3, 2_000_000), input(1, 500_000), input(2, 2_000_000)],
            vec![pay(2_000_000)],
            ours(),
            RentStructure::default(),
        )
        .select()
        .unwrap();
        assert_eq!(ids(&selected), vec![2]);
    }

    #[test]
    fn leftover_becomes_remainder() {
        let selected = InputSelection::new(
            vec![input(1, 3_000_000)],
            vec![pay(1_000_000)],
            ours(),
            RentStructure::default(),
        )
        .select()
        .unwrap();
        assert_eq!(selected.remainder, Some((1, 2_000_000)));
        assert_eq!(selected.outputs[1].unlock_conditions().address(), Some(&ours()));
    }

    #[test]
    fn dust_leftover_pulls_another_input() {
        let rent = RentStructure::default();
        let selected = InputSelection::new(
            vec![input(1, 1_000_010), input(2, 500_000)],
            vec![pay(1_000_000)],
            ours(),
            rent,
        )
        .select()
        .unwrap();
        assert_eq!(selected.inputs.len(), 2);
        assert_eq!(selected.remainder, Some((1, 500_010)));
    }

    #[test]
    fn dust_leftover_without_more_inputs_fails() {
        let err = InputSelection::new(
            vec![input(1, 1_000_010)],
            vec![pay(1_000_000)],
            ours(),
            RentStructure::default(),
        )
        .select()
        .unwrap_err();
        assert!(matches!(
            err,
            WalletError::InsufficientFundsForRemainder { available: 10, .. }
        ));
    }

    #[test]
    fn empty_wallet_is_insufficient() {
        let err = InputSelection::new(Vec::new(), vec![pay(1_000_000)], ours(), RentStructure::default())
            .select()
            .unwrap_err();
        assert!(matches!(
            err,
            WalletError::InsufficientFunds {
                needed: 1_000_000,
                available: 0
            }
        ));
    }

    #[test]
    fn locked_funds_yield_no_viable_inputs() {
        let err = InputSelection::new(
            vec![input(1, 200_000)],
            vec![pay(1_000_000)],
            ours(),
            RentStructure::default(),
        )
        .with_locked_amount(900_000)
        .select()
        .unwrap_err();
        assert!(matches!(
            err,
            WalletError::NoViableInputs {
                needed: 1_000_000,
                spendable: 200_000
            }
        ));
    }

    #[test]
    fn below_deposit_output_rejected() {
        let err = InputSelection::new(vec![input(1, 1_000_000)], vec![pay(1)], ours(), RentStructure::default())
            .select()
            .unwrap_err();
        assert!(matches!(err, WalletError::BelowMinimumStorageDeposit { amount: 1, .. }));
    }

    #[test]
    fn tokens_selected_before_amount() {
        let t = token(7);
        let output = Output::Basic(BasicOutput::new(100_000, recipient()).with_native_tokens(
            NativeTokens::from_vec(vec![NativeToken::new(t, 50).unwrap()]).unwrap(),
        ));
        let selected = InputSelection::new(
            vec![
                input(1, 5_000_000),
                token_input(2, 100_000, t, 30),
                token_input(3, 100_000, t, 40),
            ],
            vec![output],
            ours(),
            RentStructure::default(),
        )
        .select()
        .unwrap();
        // 40 then 30 covers 50; the base amount is already covered by both.
        assert_eq!(ids(&selected), vec![3, 2]);
        let remainder = &selected.outputs[1];
        assert_eq!(remainder.native_tokens().get(&t), Some(20));
    }

    #[test]
    fn missing_token_is_unbalanced() {
        let output = Output::Basic(BasicOutput::new(100_000, recipient()).with_native_tokens(
            NativeTokens::from_vec(vec![NativeToken::new(token(9), 1).unwrap()]).unwrap(),
        ));
        let err = InputSelection::new(vec![input(1, 5_000_000)], vec![output], ours(), RentStructure::default())
            .select()
            .unwrap_err();
        assert!(matches!(err, WalletError::UnbalancedNativeTokens { needed: 1, available: 0, .. }));
    }

    #[test]
    fn many_leftover_tokens_split_into_chunks() {
        let mut inputs = vec![input(0, 50_000_000)];
        for n in 1..=70u8 {
            inputs.push(token_input(n, 100_000, token(n), 1));
        }
        // Spend everything: all 70 tokens must come back as remainder.
        let total: u64 = inputs.iter().map(|i| i.output.amount()).sum();
        let selected = InputSelection::new(inputs.clone(), vec![pay(1_000_000)], ours(), RentStructure::default())
            .with_required(inputs)
            .select()
            .unwrap();
        let remainders = &selected.outputs[1..];
        assert_eq!(remainders.len(), 2);
        assert!(remainders.iter().all(|o| o.native_tokens().len() <= NativeTokens::COUNT_MAX));
        let rent = RentStructure::default();
        for remainder in remainders {
            assert!(remainder.amount() >= remainder.min_storage_deposit(&rent).unwrap());
        }
        let out: u64 = selected.outputs.iter().map(Output::amount).sum();
        assert_eq!(out, total);
    }

    #[test]
    fn too_many_inputs_rejected() {
        let inputs: Vec<_> = (0..200u8).map(|n| input(n, 100_000)).collect();
        let err = InputSelection::new(inputs, vec![pay(15_000_000)], ours(), RentStructure::default())
            .select()
            .unwrap_err();
        assert!(matches!(err, WalletError::TooManyInputs { .. }));
    }

    #[test]
    fn alias_input_requires_successor() {
        let alias_input = InputSigningData {
            output_id: OutputId::new(TransactionId::new([9u8; 32]), 0),
            output: Output::Alias(AliasOutput::new(1_000_000, ours(), ours())),
            chain: Bip44::new(1, 0, false, 0),
            via_chain: None,
        };
        let selection = InputSelection::new(
            vec![input(1, 5_000_000)],
            vec![pay(1_000_000)],
            ours(),
            RentStructure::default(),
        )
        .with_required(vec![alias_input.clone()]);
        assert!(matches!(
            selection.clone().select(),
            Err(WalletError::InvalidOutput(_))
        ));
        assert!(selection.with_burning(true).select().is_ok());
    }

    #[test]
    fn non_basic_candidates_are_never_picked() {
        let nft = InputSigningData {
            output_id: OutputId::new(TransactionId::new([5u8; 32]), 0),
            output: Output::Nft(tessera_types::NftOutput::new(
                9_000_000,
                tessera_types::NftId::new([5u8; 32]),
                ours(),
            )),
            chain: Bip44::new(1, 0, false, 0),
            via_chain: None,
        };
        let err = InputSelection::new(vec![nft], vec![pay(1_000_000)], ours(), RentStructure::default())
            .select()
            .unwrap_err();
        assert!(matches!(err, WalletError::InsufficientFunds { .. }));
    }

    #[test]
    fn burned_tokens_leave_the_remainder() {
        let t = token(4);
        let mut burn = NativeTokensSum::default();
        burn.add(t, 25).unwrap();
        let selected = InputSelection::new(
            vec![input(1, 5_000_000), token_input(2, 200_000, t, 40)],
            Vec::new(),
            ours(),
            RentStructure::default(),
        )
        .with_burned_tokens(burn.clone())
        .select()
        .unwrap();
        assert_eq!(ids(&selected), vec![2]);
        assert_eq!(selected.outputs.len(), 1);
        assert_eq!(selected.outputs[0].amount(), 200_000);
        assert_eq!(selected.outputs[0].native_tokens().get(&t), Some(15));

        let mut too_much = NativeTokensSum::default();
        too_much.add(t, 41).unwrap();
        let err = InputSelection::new(
            vec![token_input(2, 200_000, t, 40)],
            Vec::new(),
            ours(),
            RentStructure::default(),
        )
        .with_burned_tokens(too_much)
        .select()
        .unwrap_err();
        assert!(matches!(err, WalletError::UnbalancedNativeTokens { needed: 41, .. }));
    }
}
