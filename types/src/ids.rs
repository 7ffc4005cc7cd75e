//! Identifiers for transactions, outputs and chain outputs (alias, NFT, foundry).

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;

/// A 32-byte transaction identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransactionId([u8; 32]);

impl TransactionId {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TransactionId({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl FromStr for TransactionId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(hex::decode_array(s)?))
    }
}

/// Identifies one output: the producing transaction plus the output's index in it.
///
/// The canonical byte form is 34 bytes: transaction id followed by the index
/// as little-endian `u16`. Ordering is lexicographic over that byte form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputId {
    transaction_id: TransactionId,
    index: u16,
}

impl OutputId {
    pub const LENGTH: usize = 34;

    pub fn new(transaction_id: TransactionId, index: u16) -> Self {
        Self {
            transaction_id,
            index,
        }
    }

    pub fn transaction_id(&self) -> &TransactionId {
        &self.transaction_id
    }

    pub fn index(&self) -> u16 {
        self.index
    }

    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        let mut bytes = [0u8; Self::LENGTH];
        bytes[..32].copy_from_slice(self.transaction_id.as_bytes());
        bytes[32..].copy_from_slice(&self.index.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        if bytes.len() != Self::LENGTH {
            return Err(TypesError::InvalidOutputId(format!(
                "expected {} bytes, got {}",
                Self::LENGTH,
                bytes.len()
            )));
        }
        let mut tx = [0u8; 32];
        tx.copy_from_slice(&bytes[..32]);
        let index = u16::from_le_bytes([bytes[32], bytes[33]]);
        Ok(Self::new(TransactionId::new(tx), index))
    }
}

impl Ord for OutputId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.to_bytes().cmp(&other.to_bytes())
    }
}

impl PartialOrd for OutputId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Debug for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OutputId({}:{})",
            hex::encode(&self.transaction_id.as_bytes()[..4]),
            self.index
        )
    }
}

impl fmt::Display for OutputId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.to_bytes()))
    }
}

impl FromStr for OutputId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_bytes(&bytes)
    }
}

macro_rules! chain_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name([u8; 32]);

        impl $name {
            /// The placeholder id carried by a chain output that is being created.
            pub const NULL: Self = Self([0u8; 32]);

            pub fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            /// The id assigned to a chain created by the output `output_id`.
            pub fn from_output_id(output_id: &OutputId) -> Self {
                Self(crate::transaction::blake2b_256(&output_id.to_bytes()))
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn is_null(&self) -> bool {
                self.0 == [0u8; 32]
            }

            /// Resolve the null placeholder to the id derived from `output_id`.
            pub fn or_from_output_id(self, output_id: &OutputId) -> Self {
                if self.is_null() {
                    Self::from_output_id(output_id)
                } else {
                    self
                }
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), hex::encode(&self.0[..4]))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(&self.0))
            }
        }

        impl FromStr for $name {
            type Err = TypesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(hex::decode_array(s)?))
            }
        }
    };
}

chain_id!(
    /// Identifier of an alias chain.
    AliasId
);
chain_id!(
    /// Identifier of an NFT chain.
    NftId
);

/// Identifier of a foundry: its controlling alias, serial number and token scheme kind.
///
/// The same value identifies the native token the foundry controls.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FoundryId {
    alias_id: AliasId,
    serial_number: u32,
    token_scheme_kind: u8,
}

/// Native tokens are identified by the id of the foundry that minted them.
pub type TokenId = FoundryId;

impl FoundryId {
    pub const LENGTH: usize = 38;

    pub fn build(alias_id: AliasId, serial_number: u32, token_scheme_kind: u8) -> Self {
        Self {
            alias_id,
            serial_number,
            token_scheme_kind,
        }
    }

    pub fn alias_id(&self) -> &AliasId {
        &self.alias_id
    }

    pub fn serial_number(&self) -> u32 {
        self.serial_number
    }

    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        let mut bytes = [0u8; Self::LENGTH];
        bytes[0] = crate::address::Address::ALIAS_KIND;
        bytes[1..33].copy_from_slice(self.alias_id.as_bytes());
        bytes[33..37].copy_from_slice(&self.serial_number.to_le_bytes());
        bytes[37] = self.token_scheme_kind;
        bytes
    }
}

impl fmt::Debug for FoundryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FoundryId({}#{})",
            hex::encode(&self.alias_id.as_bytes()[..4]),
            self.serial_number
        )
    }
}

impl fmt::Display for FoundryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.to_bytes()))
    }
}

impl FromStr for FoundryId {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        if bytes.len() != Self::LENGTH || bytes[0] != crate::address::Address::ALIAS_KIND {
            return Err(TypesError::InvalidHex(format!("not a foundry id: {s}")));
        }
        let mut alias = [0u8; 32];
        alias.copy_from_slice(&bytes[1..33]);
        let serial = u32::from_le_bytes([bytes[33], bytes[34], bytes[35], bytes[36]]);
        Ok(Self::build(AliasId::new(alias), serial, bytes[37]))
    }
}

// Inline hex encoding to avoid adding the `hex` crate as a dependency of types.
pub(crate) mod hex {
    use crate::error::TypesError;

    pub fn encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{:02x}", b)).collect()
    }

    pub fn decode(s: &str) -> Result<Vec<u8>, TypesError> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        if s.len() % 2 != 0 {
            return Err(TypesError::InvalidHex("odd-length hex string".to_string()));
        }
        (0..s.len())
            .step_by(2)
            .map(|i| {
                s.get(i..i + 2)
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| TypesError::InvalidHex(format!("invalid hex at position {i}")))
            })
            .collect()
    }

    pub fn decode_array<const N: usize>(s: &str) -> Result<[u8; N], TypesError> {
        let bytes = decode(s)?;
        bytes
            .as_slice()
            .try_into()
            .map_err(|_| TypesError::InvalidHex(format!("expected {} bytes, got {}", N, bytes.len())))
    }
}
