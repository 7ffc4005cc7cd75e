//! Secret managers: the only holders of key material.
//!
//! Every variant derives addresses along `m/44'/coin'/account'/internal'/index'`
//! and signs transaction essences. Seeds and private keys never leave this
//! module except as an encrypted backup.

pub mod hardware;
pub mod password;
pub mod seed;
pub mod vault;

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tessera_types::{
    Address, Bip44, InputSigningData, SignedTransaction, TransactionEssence, Unlock,
};
use zeroize::Zeroizing;

use crate::error::WalletError;

pub use hardware::{DeviceError, HardwareSecretManager, SigningDevice};
pub use password::{MnemonicPhrase, Password};
pub use seed::SeedSecretManager;
pub use vault::VaultSecretManager;

#[async_trait]
pub trait SecretManage: Send + Sync {
    /// Derive the addresses at `range` on one chain of an account.
    async fn generate_addresses(
        &self,
        coin_type: u32,
        account_index: u32,
        range: Range<u32>,
        internal: bool,
    ) -> Result<Vec<Address>, WalletError>;

    async fn derive_address(
        &self,
        coin_type: u32,
        account_index: u32,
        internal: bool,
        address_index: u32,
    ) -> Result<Address, WalletError> {
        self.generate_addresses(coin_type, account_index, address_index..address_index + 1, internal)
            .await?
            .pop()
            .ok_or_else(|| WalletError::Secret("no address derived".into()))
    }

    /// Sign `essence`, producing one unlock per input.
    async fn sign_transaction_essence(
        &self,
        essence: &TransactionEssence,
        inputs: &[InputSigningData],
    ) -> Result<SignedTransaction, WalletError>;
}

/// How one input gets unlocked.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum UnlockSlot {
    Sign(Bip44),
    Reference(u16),
    Alias(u16),
    Nft(u16),
}

impl UnlockSlot {
    /// The unlock for every slot that needs no signature.
    pub(crate) fn without_signature(self) -> Option<Unlock> {
        match self {
            UnlockSlot::Sign(_) => None,
            UnlockSlot::Reference(index) => Some(Unlock::Reference(index)),
            UnlockSlot::Alias(index) => Some(Unlock::Alias(index)),
            UnlockSlot::Nft(index) => Some(Unlock::Nft(index)),
        }
    }
}

/// The first input of each key is signed; later inputs of the same key
/// reference that signature. Inputs owned by an alias or NFT point at the
/// earlier input consuming that chain.
pub(crate) fn unlock_plan(inputs: &[InputSigningData]) -> Result<Vec<UnlockSlot>, WalletError> {
    let mut first_use: HashMap<Bip44, u16> = HashMap::new();
    let mut chain_inputs: HashMap<Address, u16> = HashMap::new();
    let mut plan = Vec::with_capacity(inputs.len());
    for (index, input) in inputs.iter().enumerate() {
        let index = index as u16;
        let slot = match input.via_chain {
            Some(owner) => {
                let holder = chain_inputs.get(&owner).copied().ok_or_else(|| {
                    WalletError::InvalidOutput(format!(
                        "input {} is owned by {:?}, which no earlier input consumes",
                        input.output_id, owner
                    ))
                })?;
                match owner {
                    Address::Nft(_) => UnlockSlot::Nft(holder),
                    _ => UnlockSlot::Alias(holder),
                }
            }
            None => match first_use.get(&input.chain) {
                Some(first) => UnlockSlot::Reference(*first),
                None => {
                    first_use.insert(input.chain, index);
                    UnlockSlot::Sign(input.chain)
                }
            },
        };
        if let Some(address) = input.output.chain_address(&input.output_id) {
            chain_inputs.insert(address, index);
        }
        plan.push(slot);
    }
    Ok(plan)
}

pub(crate) fn assemble(essence: &TransactionEssence, unlocks: Vec<Unlock>) -> SignedTransaction {
    SignedTransaction {
        essence: essence.clone(),
        unlocks,
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecretManagerKind {
    Mnemonic,
    Seed,
    Vault,
    Hardware,
}

pub enum SecretManager {
    Mnemonic(SeedSecretManager),
    Seed(SeedSecretManager),
    Vault(VaultSecretManager),
    Hardware(HardwareSecretManager),
}

impl SecretManager {
    pub fn from_mnemonic(mnemonic: &str) -> Result<Self, WalletError> {
        Ok(Self::Mnemonic(SeedSecretManager::from_mnemonic(mnemonic)?))
    }

    pub fn from_seed(seed: Zeroizing<[u8; 64]>) -> Self {
        Self::Seed(SeedSecretManager::from_seed(seed))
    }

    pub fn kind(&self) -> SecretManagerKind {
        match self {
            Self::Mnemonic(_) => SecretManagerKind::Mnemonic,
            Self::Seed(_) => SecretManagerKind::Seed,
            Self::Vault(_) => SecretManagerKind::Vault,
            Self::Hardware(_) => SecretManagerKind::Hardware,
        }
    }

    pub fn as_vault(&self) -> Option<&VaultSecretManager> {
        match self {
            Self::Vault(vault) => Some(vault),
            _ => None,
        }
    }

    /// Whether signing can run unattended, e.g. for automatic consolidation.
    pub fn signs_unattended(&self) -> bool {
        match self {
            Self::Mnemonic(_) | Self::Seed(_) => true,
            Self::Vault(vault) => vault.is_password_available(),
            Self::Hardware(_) => false,
        }
    }

    /// The seed for a backup. Hardware devices export nothing.
    pub fn export_seed(&self) -> Result<Option<Zeroizing<[u8; 64]>>, WalletError> {
        match self {
            Self::Mnemonic(seed) | Self::Seed(seed) => Ok(Some(seed.seed())),
            Self::Vault(vault) => vault.with_seed(|seed| Ok(Some(Zeroizing::new(*seed)))),
            Self::Hardware(_) => Ok(None),
        }
    }

    fn inner(&self) -> &dyn SecretManage {
        match self {
            Self::Mnemonic(m) | Self::Seed(m) => m,
            Self::Vault(v) => v,
            Self::Hardware(h) => h,
        }
    }
}

impl fmt::Debug for SecretManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SecretManager({:?})", self.kind())
    }
}

#[async_trait]
impl SecretManage for SecretManager {
    async fn generate_addresses(
        &self,
        coin_type: u32,
        account_index: u32,
        range: Range<u32>,
        internal: bool,
    ) -> Result<Vec<Address>, WalletError> {
        self.inner()
            .generate_addresses(coin_type, account_index, range, internal)
            .await
    }

    async fn sign_transaction_essence(
        &self,
        essence: &TransactionEssence,
        inputs: &[InputSigningData],
    ) -> Result<SignedTransaction, WalletError> {
        self.inner().sign_transaction_essence(essence, inputs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_types::{AliasId, AliasOutput, BasicOutput, Output, OutputId, TransactionId};

    fn input(n: u8, chain: Bip44) -> InputSigningData {
        InputSigningData {
            output_id: OutputId::new(TransactionId::new([n; 32]), 0),
            output: Output::Basic(BasicOutput::new(1, Address::Ed25519([0; 32]))),
            chain,
            via_chain: None,
        }
    }

    #[test]
    fn repeated_keys_reference_first_signature() {
        let a = Bip44::new(1, 0, false, 0);
        let b = Bip44::new(1, 0, true, 0);
        let plan = unlock_plan(&[input(1, a), input(2, b), input(3, a), input(4, b)]).unwrap();
        assert_eq!(
            plan,
            vec![
                UnlockSlot::Sign(a),
                UnlockSlot::Sign(b),
                UnlockSlot::Reference(0),
                UnlockSlot::Reference(1),
            ]
        );
    }

    #[test]
    fn chain_owned_inputs_point_at_their_holder() {
        let key = Bip44::new(1, 0, false, 0);
        let owner = Address::Ed25519([0; 32]);
        let alias = InputSigningData {
            output_id: OutputId::new(TransactionId::new([9; 32]), 0),
            output: Output::Alias(AliasOutput::new(100_000, owner, owner)),
            chain: key,
            via_chain: None,
        };
        let alias_address = Address::Alias(AliasId::from_output_id(&alias.output_id));
        let mut owned = input(2, key);
        owned.via_chain = Some(alias_address);

        let plan = unlock_plan(&[input(1, key), alias, owned.clone()]).unwrap();
        assert_eq!(
            plan,
            vec![UnlockSlot::Sign(key), UnlockSlot::Reference(0), UnlockSlot::Alias(1)]
        );
        // The holder has to come first.
        assert!(unlock_plan(&[owned]).is_err());
    }

    #[test]
    fn debug_shows_only_kind() {
        let manager = SecretManager::from_seed(Zeroizing::new([3u8; 64]));
        assert_eq!(format!("{:?}", manager), "SecretManager(Seed)");
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&SecretManagerKind::Vault).unwrap(),
            "\"vault\""
        );
    }
}
