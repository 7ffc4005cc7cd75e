//! External signing devices.
//!
//! The device holds the keys; the wallet only asks for public keys and
//! signatures. Every request is bounded by the signing timeout so a device
//! left unattended cannot stall the account forever.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tessera_crypto::ed25519_address;
use tessera_types::{
    Address, Bip44, InputSigningData, PublicKey, Signature, SignatureUnlock, SignedTransaction,
    TransactionEssence, Unlock,
};
use thiserror::Error;

use super::{assemble, unlock_plan, SecretManage, UnlockSlot};
use crate::error::WalletError;

#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("rejected on device: {0}")]
    Rejected(String),
    #[error("device unavailable: {0}")]
    Unavailable(String),
}

impl From<DeviceError> for WalletError {
    fn from(e: DeviceError) -> Self {
        match e {
            DeviceError::Rejected(reason) => WalletError::SigningRejected(reason),
            DeviceError::Unavailable(reason) => WalletError::Secret(reason),
        }
    }
}

#[async_trait]
pub trait SigningDevice: Send + Sync {
    async fn public_key(&self, chain: &Bip44) -> Result<PublicKey, DeviceError>;

    /// Sign a 32-byte essence hash with the key at `chain`. May wait for the
    /// user to confirm on the device.
    async fn sign(&self, chain: &Bip44, message: &[u8; 32]) -> Result<Signature, DeviceError>;
}

pub struct HardwareSecretManager {
    device: Arc<dyn SigningDevice>,
    signing_timeout: Duration,
}

impl HardwareSecretManager {
    pub fn new(device: Arc<dyn SigningDevice>, signing_timeout: Duration) -> Self {
        Self {
            device,
            signing_timeout,
        }
    }

    async fn bounded<T>(
        &self,
        request: impl std::future::Future<Output = Result<T, DeviceError>>,
    ) -> Result<T, WalletError> {
        match tokio::time::timeout(self.signing_timeout, request).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.signing_timeout.as_secs(),
                    "signing device did not answer"
                );
                Err(WalletError::SigningTimeout(self.signing_timeout.as_secs()))
            }
        }
    }
}

#[async_trait]
impl SecretManage for HardwareSecretManager {
    async fn generate_addresses(
        &self,
        coin_type: u32,
        account_index: u32,
        range: Range<u32>,
        internal: bool,
    ) -> Result<Vec<Address>, WalletError> {
        let mut addresses = Vec::with_capacity(range.len());
        for index in range {
            let chain = Bip44::new(coin_type, account_index, internal, index);
            let public_key = self.bounded(self.device.public_key(&chain)).await?;
            addresses.push(ed25519_address(&public_key));
        }
        Ok(addresses)
    }

    async fn sign_transaction_essence(
        &self,
        essence: &TransactionEssence,
        inputs: &[InputSigningData],
    ) -> Result<SignedTransaction, WalletError> {
        let hash = essence.hash()?;
        let mut unlocks = Vec::with_capacity(inputs.len());
        for slot in unlock_plan(inputs)? {
            if let UnlockSlot::Sign(chain) = slot {
                let public_key = self.bounded(self.device.public_key(&chain)).await?;
                let signature = self.bounded(self.device.sign(&chain, &hash)).await?;
                unlocks.push(Unlock::Signature(SignatureUnlock {
                    public_key,
                    signature,
                }));
            } else if let Some(unlock) = slot.without_signature() {
                unlocks.push(unlock);
            }
        }
        Ok(assemble(essence, unlocks))
    }
}
