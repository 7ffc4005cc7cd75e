use std::ops::Range;

use async_trait::async_trait;
use tessera_crypto::{derive_keypair, ed25519_address, mnemonic_to_seed, signature_unlock};
use tessera_types::{
    Address, Bip44, InputSigningData, SignedTransaction, TransactionEssence, Unlock,
};
use zeroize::Zeroizing;

use super::{assemble, unlock_plan, SecretManage, UnlockSlot};
use crate::error::WalletError;

/// Signs with a seed held in memory for the lifetime of the wallet.
pub struct SeedSecretManager {
    seed: Zeroizing<[u8; 64]>,
}

impl SeedSecretManager {
    pub fn from_mnemonic(mnemonic: &str) -> Result<Self, WalletError> {
        Ok(Self {
            seed: mnemonic_to_seed(mnemonic)?,
        })
    }

    pub fn from_seed(seed: Zeroizing<[u8; 64]>) -> Self {
        Self { seed }
    }

    pub(crate) fn seed(&self) -> Zeroizing<[u8; 64]> {
        self.seed.clone()
    }
}

pub(crate) fn derive_addresses(
    seed: &[u8; 64],
    coin_type: u32,
    account_index: u32,
    range: Range<u32>,
    internal: bool,
) -> Result<Vec<Address>, WalletError> {
    range
        .map(|index| {
            let chain = Bip44::new(coin_type, account_index, internal, index);
            let keypair = derive_keypair(seed, &chain)?;
            Ok(ed25519_address(&keypair.public))
        })
        .collect()
}

pub(crate) fn sign_with_seed(
    seed: &[u8; 64],
    essence: &TransactionEssence,
    inputs: &[InputSigningData],
) -> Result<SignedTransaction, WalletError> {
    let hash = essence.hash()?;
    let unlocks = unlock_plan(inputs)?
        .into_iter()
        .map(|slot| match slot {
            UnlockSlot::Sign(chain) => {
                let keypair = derive_keypair(seed, &chain)?;
                Ok(Unlock::Signature(signature_unlock(
                    &hash,
                    &keypair.private,
                    keypair.public,
                )))
            }
            other => other
                .without_signature()
                .ok_or_else(|| WalletError::Secret("unlock slot needs a signature".into())),
        })
        .collect::<Result<Vec<_>, WalletError>>()?;
    Ok(assemble(essence, unlocks))
}

#[async_trait]
impl SecretManage for SeedSecretManager {
    async fn generate_addresses(
        &self,
        coin_type: u32,
        account_index: u32,
        range: Range<u32>,
        internal: bool,
    ) -> Result<Vec<Address>, WalletError> {
        derive_addresses(&self.seed, coin_type, account_index, range, internal)
    }

    async fn sign_transaction_essence(
        &self,
        essence: &TransactionEssence,
        inputs: &[InputSigningData],
    ) -> Result<SignedTransaction, WalletError> {
        sign_with_seed(&self.seed, essence, inputs)
    }
}
