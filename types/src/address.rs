//! Ledger addresses and their bech32 encoding.
//!
//! An address is a one-byte kind tag followed by 32 bytes:
//! the Blake2b-256 hash of an Ed25519 public key, an alias id, or an NFT id.
//! The bech32 human-readable part (e.g. `tst`) comes from the node's protocol parameters.

use bech32::{Bech32, Hrp};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;
use crate::ids::{AliasId, NftId};

/// An address that can own outputs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Address {
    /// Blake2b-256 hash of an Ed25519 public key.
    Ed25519([u8; 32]),
    /// Address of an alias chain; unlocked by the alias' state controller.
    Alias(AliasId),
    /// Address of an NFT chain; unlocked by the NFT's owner.
    Nft(NftId),
}

impl Address {
    pub const ED25519_KIND: u8 = 0;
    pub const ALIAS_KIND: u8 = 8;
    pub const NFT_KIND: u8 = 16;
    pub const LENGTH: usize = 33;

    pub fn kind(&self) -> u8 {
        match self {
            Self::Ed25519(_) => Self::ED25519_KIND,
            Self::Alias(_) => Self::ALIAS_KIND,
            Self::Nft(_) => Self::NFT_KIND,
        }
    }

    pub fn is_ed25519(&self) -> bool {
        matches!(self, Self::Ed25519(_))
    }

    pub fn to_bytes(&self) -> [u8; Self::LENGTH] {
        let mut bytes = [0u8; Self::LENGTH];
        bytes[0] = self.kind();
        let body = match self {
            Self::Ed25519(hash) => hash,
            Self::Alias(id) => id.as_bytes(),
            Self::Nft(id) => id.as_bytes(),
        };
        bytes[1..].copy_from_slice(body);
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TypesError> {
        if bytes.len() != Self::LENGTH {
            return Err(TypesError::InvalidAddress(format!(
                "expected {} bytes, got {}",
                Self::LENGTH,
                bytes.len()
            )));
        }
        let mut body = [0u8; 32];
        body.copy_from_slice(&bytes[1..]);
        match bytes[0] {
            Self::ED25519_KIND => Ok(Self::Ed25519(body)),
            Self::ALIAS_KIND => Ok(Self::Alias(AliasId::new(body))),
            Self::NFT_KIND => Ok(Self::Nft(NftId::new(body))),
            other => Err(TypesError::InvalidAddress(format!(
                "unknown address kind {other}"
            ))),
        }
    }

    /// Encode this address with the given human-readable part.
    pub fn to_bech32(&self, hrp: &str) -> Result<Bech32Address, TypesError> {
        Bech32Address::new(hrp, *self)
    }
}

/// An [`Address`] together with the human-readable part it is displayed with.
///
/// Serialized as its bech32 string.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Bech32Address {
    hrp: String,
    inner: Address,
}

impl Bech32Address {
    pub fn new(hrp: &str, inner: Address) -> Result<Self, TypesError> {
        let hrp = Hrp::parse(hrp).map_err(|e| TypesError::InvalidHrp(e.to_string()))?;
        Ok(Self {
            hrp: hrp.to_string().to_ascii_lowercase(),
            inner,
        })
    }

    pub fn inner(&self) -> &Address {
        &self.inner
    }

    pub fn hrp(&self) -> &str {
        &self.hrp
    }

    /// Parse a bech32 string, checking it against an expected human-readable part.
    pub fn try_from_str_with_hrp(s: &str, expected_hrp: &str) -> Result<Self, TypesError> {
        let address: Self = s.parse()?;
        if address.hrp() != expected_hrp {
            return Err(TypesError::InvalidAddress(format!(
                "expected hrp '{expected_hrp}', found '{}'",
                address.hrp()
            )));
        }
        Ok(address)
    }

    fn encode(&self) -> String {
        // The hrp was validated on construction and a 33-byte payload is within bech32 limits.
        Hrp::parse(&self.hrp)
            .ok()
            .and_then(|hrp| bech32::encode::<Bech32>(hrp, &self.inner.to_bytes()).ok())
            .unwrap_or_default()
    }
}

impl FromStr for Bech32Address {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hrp, data) =
            bech32::decode(s).map_err(|e| TypesError::InvalidAddress(e.to_string()))?;
        let inner = Address::from_bytes(&data)?;
        Ok(Self {
            hrp: hrp.to_string().to_ascii_lowercase(),
            inner,
        })
    }
}

impl fmt::Display for Bech32Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

impl fmt::Debug for Bech32Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Bech32Address({})", self.encode())
    }
}

impl Serialize for Bech32Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for Bech32Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bech32_roundtrip() {
        let address = Address::Ed25519([0x42; 32]);
        let encoded = address.to_bech32("tst").unwrap();
        let text = encoded.to_string();
        assert!(text.starts_with("tst1"));

        let parsed: Bech32Address = text.parse().unwrap();
        assert_eq!(parsed.inner(), &address);
        assert_eq!(parsed.hrp(), "tst");
    }

    #[test]
    fn alias_and_nft_addresses_keep_their_kind() {
        let alias = Address::Alias(AliasId::new([1u8; 32]));
        let nft = Address::Nft(NftId::new([2u8; 32]));
        for address in [alias, nft] {
            let parsed: Bech32Address = address.to_bech32("tst").unwrap().to_string().parse().unwrap();
            assert_eq!(parsed.inner(), &address);
        }
    }

    #[test]
    fn wrong_hrp_rejected() {
        let text = Address::Ed25519([1u8; 32]).to_bech32("smr").unwrap().to_string();
        assert!(Bech32Address::try_from_str_with_hrp(&text, "tst").is_err());
        assert!(Bech32Address::try_from_str_with_hrp(&text, "smr").is_ok());
    }

    #[test]
    fn malformed_address_rejected() {
        assert!("tst1notanaddress".parse::<Bech32Address>().is_err());
        assert!("".parse::<Bech32Address>().is_err());
    }

    #[test]
    fn unknown_kind_rejected() {
        let mut bytes = Address::Ed25519([0u8; 32]).to_bytes();
        bytes[0] = 3;
        assert!(Address::from_bytes(&bytes).is_err());
    }

    #[test]
    fn serializes_as_string() {
        let address = Address::Ed25519([9u8; 32]).to_bech32("tst").unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", address));
        let back: Bech32Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
