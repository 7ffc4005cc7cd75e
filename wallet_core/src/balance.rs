//! Account balance computed from unspent outputs.
//!
//! `total = available + locked` for the base coin. An output counts as
//! available when it can be spent right now without settling a claim and is
//! neither reserved by an in-flight send nor consumed by a pending
//! transaction. Everything else is locked.

use serde::{Deserialize, Serialize};
use tessera_store::{AccountRecord, OutputRecord};
use tessera_types::{
    AliasId, FoundryId, NativeTokensSum, NftId, OutputId, RentStructure, Timestamp, TokenId,
};

use crate::error::WalletError;
use crate::unlock::{Ownership, Unavailable};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseCoinBalance {
    pub total: u64,
    pub available: u64,
    pub locked: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeTokenBalance {
    pub token_id: TokenId,
    pub total: u128,
    pub available: u128,
}

/// An output whose conditions may lock it now or later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalOutput {
    pub output_id: OutputId,
    /// Whether it can be claimed right now.
    pub claimable: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub base_coin: BaseCoinBalance,
    /// Sum of the minimum storage deposits of all unspent outputs.
    pub required_storage_deposit: u64,
    pub native_tokens: Vec<NativeTokenBalance>,
    pub aliases: Vec<AliasId>,
    pub foundries: Vec<FoundryId>,
    pub nfts: Vec<NftId>,
    /// Outputs with expiration, timelock or storage deposit return conditions.
    pub potentially_locked_outputs: Vec<ConditionalOutput>,
}

pub fn compute_balance(
    account: &AccountRecord,
    unspent: &[OutputRecord],
    unavailable: &Unavailable,
    rent: &RentStructure,
    now: Timestamp,
) -> Result<Balance, WalletError> {
    let ownership = Ownership::new(account, unspent);
    let mut balance = Balance::default();
    let mut tokens_total = NativeTokensSum::default();
    let mut tokens_available = NativeTokensSum::default();

    for record in unspent.iter().filter(|r| !r.is_spent) {
        let output = &record.output;
        let amount = output.amount();
        balance.base_coin.total = balance
            .base_coin
            .total
            .checked_add(amount)
            .ok_or_else(|| WalletError::Consistency("balance overflow".into()))?;
        balance.required_storage_deposit = balance
            .required_storage_deposit
            .saturating_add(output.min_storage_deposit(rent)?);
        tokens_total.add_all(output.native_tokens())?;

        let spendable = !unavailable.contains(&record.output_id)
            && ownership.can_spend(output, now)
            && ownership.signer(output, now, unavailable).is_some();
        if spendable {
            balance.base_coin.available += amount;
            tokens_available.add_all(output.native_tokens())?;
        } else {
            balance.base_coin.locked += amount;
        }

        if Ownership::is_conditional(output) {
            let claimable = !unavailable.contains(&record.output_id)
                && ownership.can_claim(output, now);
            balance.potentially_locked_outputs.push(ConditionalOutput {
                output_id: record.output_id,
                claimable,
            });
        }

        if let Some(id) = output.alias_id(&record.output_id) {
            balance.aliases.push(id);
        }
        if let Some(id) = output.as_foundry().and_then(|f| f.id()) {
            balance.foundries.push(id);
        }
        if let Some(id) = output.nft_id(&record.output_id) {
            balance.nfts.push(id);
        }
    }

    balance.native_tokens = tokens_total
        .iter()
        .map(|(token_id, total)| NativeTokenBalance {
            token_id: *token_id,
            total: *total,
            available: tokens_available.get(token_id),
        })
        .collect();
    balance.aliases.sort();
    balance.foundries.sort();
    balance.nfts.sort();
    Ok(balance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_store::AccountAddress;
    use tessera_types::{
        Address, AliasOutput, BasicOutput, NativeToken, NativeTokens, Output, TransactionId, UnlockCondition,
    };

    fn ours() -> Address {
        Address::Ed25519([1u8; 32])
    }

    fn account() -> AccountRecord {
        let mut record = AccountRecord::new(0, "main".into(), 1);
        record.public_addresses.push(AccountAddress {
            address: ours().to_bech32("tst").unwrap(),
            key_index: 0,
            internal: false,
            used: true,
        });
        record
    }

    fn record(n: u8, output: Output) -> OutputRecord {
        OutputRecord {
            output_id: OutputId::new(TransactionId::new([n; 32]), 0),
            output,
            address: ours(),
            chain: None,
            is_spent: false,
            spent_by: None,
            remainder: false,
            network_id: 1,
            booked_at: Timestamp::new(0),
        }
    }

    #[test]
    fn plain_outputs_are_available() {
        let outputs = vec![
            record(1, Output::Basic(BasicOutput::new(1_000_000, ours()))),
            record(2, Output::Basic(BasicOutput::new(2_000_000, ours()))),
        ];
        let balance = compute_balance(
            &account(),
            &outputs,
            &Unavailable::default(),
            &RentStructure::default(),
            Timestamp::new(10),
        )
        .unwrap();
        assert_eq!(balance.base_coin.total, 3_000_000);
        assert_eq!(balance.base_coin.available, 3_000_000);
        assert_eq!(balance.base_coin.locked, 0);
        assert!(balance.required_storage_deposit > 0);
    }

    #[test]
    fn reserved_and_timelocked_are_locked() {
        let timelocked = BasicOutput::new(500_000, ours())
            .with_unlock_condition(UnlockCondition::Timelock {
                timestamp: Timestamp::new(100),
            })
            .unwrap();
        let outputs = vec![
            record(1, Output::Basic(BasicOutput::new(1_000_000, ours()))),
            record(2, Output::Basic(timelocked)),
            record(3, Output::Basic(BasicOutput::new(300_000, ours()))),
        ];
        let mut unavailable = Unavailable::default();
        unavailable.reserved.insert(outputs[2].output_id);

        let balance = compute_balance(
            &account(),
            &outputs,
            &unavailable,
            &RentStructure::default(),
            Timestamp::new(10),
        )
        .unwrap();
        assert_eq!(balance.base_coin.available, 1_000_000);
        assert_eq!(balance.base_coin.locked, 800_000);
        assert_eq!(
            balance.potentially_locked_outputs,
            vec![ConditionalOutput {
                output_id: outputs[1].output_id,
                claimable: false
            }]
        );
    }

    #[test]
    fn native_tokens_split_by_availability() {
        let token = FoundryId::build(AliasId::new([4u8; 32]), 1, 0);
        let tokens = NativeTokens::from_vec(vec![NativeToken::new(token, 70).unwrap()]).unwrap();
        let outputs = vec![
            record(
                1,
                Output::Basic(BasicOutput::new(100_000, ours()).with_native_tokens(tokens.clone())),
            ),
            record(
                2,
                Output::Basic(BasicOutput::new(100_000, ours()).with_native_tokens(tokens)),
            ),
        ];
        let mut unavailable = Unavailable::default();
        unavailable.pending_spent.insert(outputs[0].output_id);

        let balance = compute_balance(
            &account(),
            &outputs,
            &unavailable,
            &RentStructure::default(),
            Timestamp::new(0),
        )
        .unwrap();
        assert_eq!(
            balance.native_tokens,
            vec![NativeTokenBalance {
                token_id: token,
                total: 140,
                available: 70
            }]
        );
    }

    #[test]
    fn alias_owned_output_follows_its_alias() {
        let alias = record(1, Output::Alias(AliasOutput::new(100_000, ours(), ours())));
        let alias_address = Address::Alias(AliasId::from_output_id(&alias.output_id));
        let outputs = vec![
            alias,
            record(2, Output::Basic(BasicOutput::new(5_000_000, alias_address))),
        ];
        let free = compute_balance(
            &account(),
            &outputs,
            &Unavailable::default(),
            &RentStructure::default(),
            Timestamp::new(0),
        )
        .unwrap();
        assert_eq!(free.base_coin.available, 5_100_000);

        let mut unavailable = Unavailable::default();
        unavailable.reserved.insert(outputs[0].output_id);
        let busy = compute_balance(
            &account(),
            &outputs,
            &unavailable,
            &RentStructure::default(),
            Timestamp::new(0),
        )
        .unwrap();
        assert_eq!(busy.base_coin.available, 0);
        assert_eq!(busy.base_coin.locked, 5_100_000);
    }
}
