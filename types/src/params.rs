//! Protocol parameters the wallet needs from the ledger: network identity,
//! address encoding and the storage deposit (rent) structure.

use serde::{Deserialize, Serialize};

use crate::ids::OutputId;

/// Maximum number of inputs in one transaction.
pub const INPUT_COUNT_MAX: usize = 128;

/// Maximum number of outputs in one transaction.
pub const OUTPUT_COUNT_MAX: usize = 128;

/// Bytes the ledger stores per output beyond the output itself:
/// block id (32) + confirmation index (4) + confirmation timestamp (4).
const OUTPUT_METADATA_LENGTH: u64 = 40;

/// Parameters for the minimum storage deposit of an output.
///
/// An output of `size` serialized bytes must hold at least
/// `v_byte_cost * (v_byte_factor_data * size + offset)` where the offset covers
/// its key (the output id) and the ledger's per-output metadata.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RentStructure {
    /// Deposit per virtual byte.
    #[serde(default = "default_v_byte_cost")]
    pub v_byte_cost: u32,
    /// Weight of key bytes.
    #[serde(default = "default_v_byte_factor_key")]
    pub v_byte_factor_key: u8,
    /// Weight of data bytes.
    #[serde(default = "default_v_byte_factor_data")]
    pub v_byte_factor_data: u8,
}

fn default_v_byte_cost() -> u32 {
    100
}

fn default_v_byte_factor_key() -> u8 {
    10
}

fn default_v_byte_factor_data() -> u8 {
    1
}

impl RentStructure {
    /// Virtual bytes charged for every output regardless of its content.
    pub fn offset(&self) -> u64 {
        self.v_byte_factor_key as u64 * OutputId::LENGTH as u64
            + self.v_byte_factor_data as u64 * OUTPUT_METADATA_LENGTH
    }

    /// Minimum deposit for an output of `size` serialized bytes.
    pub fn min_deposit_for_size(&self, size: usize) -> u64 {
        let v_bytes = self.v_byte_factor_data as u64 * size as u64 + self.offset();
        (self.v_byte_cost as u64).saturating_mul(v_bytes)
    }
}

impl Default for RentStructure {
    fn default() -> Self {
        Self {
            v_byte_cost: default_v_byte_cost(),
            v_byte_factor_key: default_v_byte_factor_key(),
            v_byte_factor_data: default_v_byte_factor_data(),
        }
    }
}

/// Ledger parameters reported by a node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolParams {
    /// Human-readable network name, e.g. `testnet`.
    pub network_name: String,
    /// Network id committed to in every transaction essence.
    pub network_id: u64,
    /// Bech32 human-readable part for addresses.
    pub bech32_hrp: String,
    pub rent_structure: RentStructure,
    /// Total base coin supply; no output may exceed it.
    pub token_supply: u64,
}

impl Default for ProtocolParams {
    fn default() -> Self {
        Self {
            network_name: "testnet".to_string(),
            network_id: 1,
            bech32_hrp: "tst".to_string(),
            rent_structure: RentStructure::default(),
            token_supply: 2_779_530_283_277_761,
        }
    }
}
