//! Unlock conditions: who may spend an output, and when.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::error::TypesError;
use crate::time::Timestamp;

/// A rule restricting who or when an output can be spent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnlockCondition {
    /// The owner of the output.
    Address(Address),
    /// The consuming transaction must return `amount` to `return_address`.
    StorageDepositReturn { return_address: Address, amount: u64 },
    /// The output cannot be consumed before `timestamp`.
    Timelock { timestamp: Timestamp },
    /// From `timestamp` on, only `return_address` can unlock the output.
    Expiration { return_address: Address, timestamp: Timestamp },
    /// Controls state transitions of an alias.
    StateControllerAddress(Address),
    /// Controls governance transitions (and destruction) of an alias.
    GovernorAddress(Address),
    /// The alias that controls a foundry.
    ImmutableAliasAddress(Address),
}

impl UnlockCondition {
    pub fn kind(&self) -> u8 {
        match self {
            Self::Address(_) => 0,
            Self::StorageDepositReturn { .. } => 1,
            Self::Timelock { .. } => 2,
            Self::Expiration { .. } => 3,
            Self::StateControllerAddress(_) => 4,
            Self::GovernorAddress(_) => 5,
            Self::ImmutableAliasAddress(_) => 6,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Address(_) => "address",
            Self::StorageDepositReturn { .. } => "storage deposit return",
            Self::Timelock { .. } => "timelock",
            Self::Expiration { .. } => "expiration",
            Self::StateControllerAddress(_) => "state controller address",
            Self::GovernorAddress(_) => "governor address",
            Self::ImmutableAliasAddress(_) => "immutable alias address",
        }
    }
}

/// The unlock conditions of one output, sorted by kind with no duplicates.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UnlockConditions(Vec<UnlockCondition>);

impl UnlockConditions {
    pub fn from_vec(mut conditions: Vec<UnlockCondition>) -> Result<Self, TypesError> {
        conditions.sort_by_key(UnlockCondition::kind);
        for pair in conditions.windows(2) {
            if pair[0].kind() == pair[1].kind() {
                return Err(TypesError::DuplicateUnlockCondition(pair[0].name()));
            }
        }
        Ok(Self(conditions))
    }

    pub fn iter(&self) -> impl Iterator<Item = &UnlockCondition> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn address(&self) -> Option<&Address> {
        self.0.iter().find_map(|c| match c {
            UnlockCondition::Address(a) => Some(a),
            _ => None,
        })
    }

    pub fn storage_deposit_return(&self) -> Option<(&Address, u64)> {
        self.0.iter().find_map(|c| match c {
            UnlockCondition::StorageDepositReturn {
                return_address,
                amount,
            } => Some((return_address, *amount)),
            _ => None,
        })
    }

    pub fn timelock(&self) -> Option<Timestamp> {
        self.0.iter().find_map(|c| match c {
            UnlockCondition::Timelock { timestamp } => Some(*timestamp),
            _ => None,
        })
    }

    pub fn expiration(&self) -> Option<(&Address, Timestamp)> {
        self.0.iter().find_map(|c| match c {
            UnlockCondition::Expiration {
                return_address,
                timestamp,
            } => Some((return_address, *timestamp)),
            _ => None,
        })
    }

    pub fn state_controller_address(&self) -> Option<&Address> {
        self.0.iter().find_map(|c| match c {
            UnlockCondition::StateControllerAddress(a) => Some(a),
            _ => None,
        })
    }

    pub fn governor_address(&self) -> Option<&Address> {
        self.0.iter().find_map(|c| match c {
            UnlockCondition::GovernorAddress(a) => Some(a),
            _ => None,
        })
    }

    pub fn immutable_alias_address(&self) -> Option<&Address> {
        self.0.iter().find_map(|c| match c {
            UnlockCondition::ImmutableAliasAddress(a) => Some(a),
            _ => None,
        })
    }

    /// Whether a timelock still prevents spending at `now`.
    pub fn is_time_locked(&self, now: Timestamp) -> bool {
        self.timelock().is_some_and(|t| now < t)
    }

    /// Whether an expiration has passed at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        self.expiration().is_some_and(|(_, t)| now >= t)
    }

    /// The address that can unlock the output at `now`, ignoring timelocks.
    ///
    /// For outputs with an expiration this is the return address once expired.
    /// Alias outputs are unlocked by their state controller and foundries by their alias.
    pub fn owner_at(&self, now: Timestamp) -> Option<&Address> {
        if let Some((return_address, timestamp)) = self.expiration() {
            if now >= timestamp {
                return Some(return_address);
            }
        }
        self.address()
            .or_else(|| self.state_controller_address())
            .or_else(|| self.immutable_alias_address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u8) -> Address {
        Address::Ed25519([n; 32])
    }

    #[test]
    fn duplicates_rejected() {
        let result = UnlockConditions::from_vec(vec![
            UnlockCondition::Address(addr(1)),
            UnlockCondition::Address(addr(2)),
        ]);
        assert!(matches!(
            result,
            Err(TypesError::DuplicateUnlockCondition("address"))
        ));
    }

    #[test]
    fn conditions_sorted_by_kind() {
        let conditions = UnlockConditions::from_vec(vec![
            UnlockCondition::Timelock {
                timestamp: Timestamp::new(5),
            },
            UnlockCondition::Address(addr(1)),
        ])
        .unwrap();
        let kinds: Vec<u8> = conditions.iter().map(UnlockCondition::kind).collect();
        assert_eq!(kinds, vec![0, 2]);
    }

    #[test]
    fn owner_switches_to_return_address_after_expiration() {
        let conditions = UnlockConditions::from_vec(vec![
            UnlockCondition::Address(addr(1)),
            UnlockCondition::Expiration {
                return_address: addr(2),
                timestamp: Timestamp::new(100),
            },
        ])
        .unwrap();
        assert_eq!(conditions.owner_at(Timestamp::new(99)), Some(&addr(1)));
        assert_eq!(conditions.owner_at(Timestamp::new(100)), Some(&addr(2)));
        assert!(conditions.is_expired(Timestamp::new(100)));
    }

    #[test]
    fn timelock_boundary() {
        let conditions = UnlockConditions::from_vec(vec![
            UnlockCondition::Address(addr(1)),
            UnlockCondition::Timelock {
                timestamp: Timestamp::new(50),
            },
        ])
        .unwrap();
        assert!(conditions.is_time_locked(Timestamp::new(49)));
        assert!(!conditions.is_time_locked(Timestamp::new(50)));
    }
}
