//! Which outputs an account can unlock at a given moment.

use std::collections::{HashMap, HashSet};

use tessera_store::{AccountRecord, OutputRecord};
use tessera_types::{Address, AliasId, Bip44, NftId, Output, OutputId, Timestamp};

/// Alias and NFT chains can own each other; resolution stops after this many hops.
const MAX_CHAIN_DEPTH: usize = 8;

/// The addresses an account controls: its derived ed25519 addresses plus
/// the alias and NFT chains it currently holds.
pub struct Ownership<'a> {
    account: &'a AccountRecord,
    aliases: HashMap<AliasId, &'a OutputRecord>,
    nfts: HashMap<NftId, &'a OutputRecord>,
}

/// The key that ultimately unlocks an output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signer {
    pub chain: Bip44,
    /// Set when the output is owned by an alias or NFT address.
    pub via_chain: Option<Address>,
}

impl<'a> Ownership<'a> {
    pub fn new(account: &'a AccountRecord, unspent: &'a [OutputRecord]) -> Self {
        let mut aliases = HashMap::new();
        let mut nfts = HashMap::new();
        for record in unspent.iter().filter(|r| !r.is_spent) {
            if let Some(id) = record.output.alias_id(&record.output_id) {
                aliases.insert(id, record);
            }
            if let Some(id) = record.output.nft_id(&record.output_id) {
                nfts.insert(id, record);
            }
        }
        Self {
            account,
            aliases,
            nfts,
        }
    }

    pub fn owns(&self, address: &Address) -> bool {
        match address {
            Address::Ed25519(_) => self.account.owns(address),
            Address::Alias(id) => self.aliases.contains_key(id),
            Address::Nft(id) => self.nfts.contains_key(id),
        }
    }

    /// The chain output holding `address`, if it is an alias or NFT we hold.
    pub fn controller(&self, address: &Address) -> Option<&'a OutputRecord> {
        match address {
            Address::Ed25519(_) => None,
            Address::Alias(id) => self.aliases.get(id).copied(),
            Address::Nft(id) => self.nfts.get(id).copied(),
        }
    }

    /// Resolve the key that unlocks `output` at `now`.
    ///
    /// Outputs owned by an alias or NFT resolve through the chain output
    /// holding it, which must itself be unlockable and not `unavailable`.
    pub fn signer(&self, output: &Output, now: Timestamp, unavailable: &Unavailable) -> Option<Signer> {
        let mut owner = *output.unlock_conditions().owner_at(now)?;
        let via_chain = (!matches!(owner, Address::Ed25519(_))).then_some(owner);
        for _ in 0..MAX_CHAIN_DEPTH {
            let Some(controller) = self.controller(&owner) else {
                return self.account.chain_of(&owner).map(|chain| Signer { chain, via_chain });
            };
            let conditions = controller.output.unlock_conditions();
            if unavailable.contains(&controller.output_id) || conditions.is_time_locked(now) {
                return None;
            }
            owner = *conditions.owner_at(now)?;
        }
        None
    }

    /// Whether `output` can be spent at `now` with no claim to settle.
    ///
    /// The owner at `now` must be ours and any timelock must have passed. A
    /// storage deposit return makes the output claimable but not freely
    /// spendable until it expires back to us.
    pub fn can_spend(&self, output: &Output, now: Timestamp) -> bool {
        let conditions = output.unlock_conditions();
        let Some(owner) = conditions.owner_at(now) else {
            return false;
        };
        if !self.owns(owner) || conditions.is_time_locked(now) {
            return false;
        }
        conditions.is_expired(now) || conditions.storage_deposit_return().is_none()
    }

    /// Whether `output` can be consumed now by returning its storage deposit.
    pub fn can_claim(&self, output: &Output, now: Timestamp) -> bool {
        let conditions = output.unlock_conditions();
        let Some(owner) = conditions.owner_at(now) else {
            return false;
        };
        self.owns(owner) && !conditions.is_time_locked(now)
    }

    /// Whether `output` carries conditions that may lock it now or later.
    pub fn is_conditional(output: &Output) -> bool {
        let conditions = output.unlock_conditions();
        conditions.storage_deposit_return().is_some()
            || conditions.expiration().is_some()
            || conditions.timelock().is_some()
    }
}

/// Outputs that must not be selected: reserved by an in-flight send or
/// consumed by a pending transaction.
#[derive(Clone, Debug, Default)]
pub struct Unavailable {
    pub reserved: HashSet<OutputId>,
    pub pending_spent: HashSet<OutputId>,
}

impl Unavailable {
    pub fn contains(&self, output_id: &OutputId) -> bool {
        self.reserved.contains(output_id) || self.pending_spent.contains(output_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_store::AccountAddress;
    use tessera_types::{BasicOutput, TransactionId, UnlockCondition};

    fn ours() -> Address {
        Address::Ed25519([1u8; 32])
    }

    fn theirs() -> Address {
        Address::Ed25519([2u8; 32])
    }

    fn account() -> AccountRecord {
        let mut record = AccountRecord::new(0, "main".into(), 1);
        record.public_addresses.push(AccountAddress {
            address: ours().to_bech32("tst").unwrap(),
            key_index: 0,
            internal: false,
            used: false,
        });
        record
    }

    fn basic(address: Address, conditions: Vec<UnlockCondition>) -> Output {
        let mut output = BasicOutput::new(1_000_000, address);
        for condition in conditions {
            output = output.with_unlock_condition(condition).unwrap();
        }
        Output::Basic(output)
    }

    #[test]
    fn plain_owned_output_is_spendable() {
        let record = account();
        let ownership = Ownership::new(&record, &[]);
        assert!(ownership.can_spend(&basic(ours(), vec![]), Timestamp::new(0)));
        assert!(!ownership.can_spend(&basic(theirs(), vec![]), Timestamp::new(0)));
    }

    #[test]
    fn timelock_blocks_until_elapsed() {
        let record = account();
        let ownership = Ownership::new(&record, &[]);
        let output = basic(
            ours(),
            vec![UnlockCondition::Timelock {
                timestamp: Timestamp::new(100),
            }],
        );
        assert!(!ownership.can_spend(&output, Timestamp::new(99)));
        assert!(ownership.can_spend(&output, Timestamp::new(100)));
    }

    #[test]
    fn storage_deposit_return_needs_claim_until_expiry() {
        let record = account();
        let ownership = Ownership::new(&record, &[]);
        let output = basic(
            ours(),
            vec![
                UnlockCondition::StorageDepositReturn {
                    return_address: theirs(),
                    amount: 50_000,
                },
                UnlockCondition::Expiration {
                    return_address: theirs(),
                    timestamp: Timestamp::new(500),
                },
            ],
        );
        assert!(!ownership.can_spend(&output, Timestamp::new(10)));
        assert!(ownership.can_claim(&output, Timestamp::new(10)));
        assert!(!ownership.can_claim(&output, Timestamp::new(500)));
    }

    #[test]
    fn expired_output_returns_to_us() {
        let record = account();
        let ownership = Ownership::new(&record, &[]);
        let output = basic(
            theirs(),
            vec![UnlockCondition::Expiration {
                return_address: ours(),
                timestamp: Timestamp::new(500),
            }],
        );
        assert!(!ownership.can_spend(&output, Timestamp::new(499)));
        assert!(ownership.can_spend(&output, Timestamp::new(500)));
    }

    #[test]
    fn held_alias_owns_its_address() {
        let record = account();
        let alias_output_id = OutputId::new(TransactionId::new([5u8; 32]), 0);
        let alias = OutputRecord {
            output_id: alias_output_id,
            output: Output::Alias(tessera_types::AliasOutput::new(100, ours(), ours())),
            address: ours(),
            chain: None,
            is_spent: false,
            spent_by: None,
            remainder: false,
            network_id: 1,
            booked_at: Timestamp::new(0),
        };
        let ownership = Ownership::new(&record, std::slice::from_ref(&alias));
        assert!(ownership.owns(&Address::Alias(AliasId::from_output_id(&alias_output_id))));
        assert!(!ownership.owns(&Address::Alias(AliasId::new([9u8; 32]))));
    }

    fn alias_record(n: u8, controller: Address) -> OutputRecord {
        OutputRecord {
            output_id: OutputId::new(TransactionId::new([n; 32]), 0),
            output: Output::Alias(tessera_types::AliasOutput::new(100, controller, controller)),
            address: controller,
            chain: None,
            is_spent: false,
            spent_by: None,
            remainder: false,
            network_id: 1,
            booked_at: Timestamp::new(0),
        }
    }

    #[test]
    fn alias_owned_output_signs_with_the_state_controller() {
        let record = account();
        let alias = alias_record(5, ours());
        let alias_address = Address::Alias(AliasId::from_output_id(&alias.output_id));
        let unspent = [alias];
        let ownership = Ownership::new(&record, &unspent);
        let output = basic(alias_address, vec![]);

        let signer = ownership
            .signer(&output, Timestamp::new(0), &Unavailable::default())
            .unwrap();
        assert_eq!(Some(signer.chain), record.chain_of(&ours()));
        assert_eq!(signer.via_chain, Some(alias_address));

        // A reserved alias cannot unlock what it owns.
        let mut unavailable = Unavailable::default();
        unavailable.reserved.insert(unspent[0].output_id);
        assert!(ownership.signer(&output, Timestamp::new(0), &unavailable).is_none());
    }

    #[test]
    fn foreign_controller_yields_no_signer() {
        let record = account();
        let alias = alias_record(6, theirs());
        let alias_address = Address::Alias(AliasId::from_output_id(&alias.output_id));
        let unspent = [alias];
        let ownership = Ownership::new(&record, &unspent);
        let output = basic(alias_address, vec![]);
        assert!(ownership
            .signer(&output, Timestamp::new(0), &Unavailable::default())
            .is_none());
    }

    #[test]
    fn unavailable_covers_both_sets() {
        let a = OutputId::new(TransactionId::new([1u8; 32]), 0);
        let b = OutputId::new(TransactionId::new([2u8; 32]), 0);
        let mut unavailable = Unavailable::default();
        unavailable.reserved.insert(a);
        unavailable.pending_spent.insert(b);
        assert!(unavailable.contains(&a));
        assert!(unavailable.contains(&b));
        assert!(!unavailable.contains(&OutputId::new(TransactionId::new([3u8; 32]), 0)));
    }
}
