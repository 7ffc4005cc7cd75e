//! Optional feature blocks attached to outputs.

use serde::{Deserialize, Serialize};

use crate::address::Address;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Feature {
    /// The address that sent the output; must be unlocked in the creating transaction.
    Sender(Address),
    /// The address that issued a chain output; immutable.
    Issuer(Address),
    /// Arbitrary binary metadata.
    Metadata(Vec<u8>),
    /// An indexation tag.
    Tag(Vec<u8>),
}

impl Feature {
    pub const METADATA_LENGTH_MAX: usize = 8192;
    pub const TAG_LENGTH_MAX: usize = 64;

    pub fn kind(&self) -> u8 {
        match self {
            Self::Sender(_) => 0,
            Self::Issuer(_) => 1,
            Self::Metadata(_) => 2,
            Self::Tag(_) => 3,
        }
    }
}
