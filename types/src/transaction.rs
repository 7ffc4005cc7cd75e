//! Transaction essence, unlocks and signed transactions.

use blake2::digest::consts::U32;
use blake2::{Blake2b, Digest};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::address::Address;
use crate::error::TypesError;
use crate::ids::{OutputId, TransactionId};
use crate::keys::{Bip44, PublicKey, Signature};
use crate::output::Output;
use crate::params::{INPUT_COUNT_MAX, OUTPUT_COUNT_MAX};

type Blake2b256 = Blake2b<U32>;

pub(crate) fn blake2b_256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// The part of a transaction that is signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionEssence {
    pub network_id: u64,
    pub inputs: Vec<OutputId>,
    /// Hash over the consumed outputs, binding the signature to their content.
    pub inputs_commitment: [u8; 32],
    pub outputs: Vec<Output>,
    pub tag: Option<Vec<u8>>,
}

impl TransactionEssence {
    pub fn new(network_id: u64, inputs: &[InputSigningData], outputs: Vec<Output>) -> Result<Self, TypesError> {
        let consumed: Vec<&Output> = inputs.iter().map(|i| &i.output).collect();
        Ok(Self {
            network_id,
            inputs: inputs.iter().map(|i| i.output_id).collect(),
            inputs_commitment: blake2b_256(&bincode::serialize(&consumed)?),
            outputs,
            tag: None,
        })
    }

    /// The message signed by every signature unlock.
    pub fn hash(&self) -> Result<[u8; 32], TypesError> {
        Ok(blake2b_256(&bincode::serialize(self)?))
    }

    /// Check input and output counts and reject duplicate inputs.
    pub fn validate_counts(&self) -> Result<(), TypesError> {
        if self.inputs.is_empty() || self.inputs.len() > INPUT_COUNT_MAX {
            return Err(TypesError::Serialization(format!(
                "input count {} outside 1..={}",
                self.inputs.len(),
                INPUT_COUNT_MAX
            )));
        }
        if self.outputs.is_empty() || self.outputs.len() > OUTPUT_COUNT_MAX {
            return Err(TypesError::Serialization(format!(
                "output count {} outside 1..={}",
                self.outputs.len(),
                OUTPUT_COUNT_MAX
            )));
        }
        let unique: HashSet<&OutputId> = self.inputs.iter().collect();
        if unique.len() != self.inputs.len() {
            return Err(TypesError::InvalidOutputId("duplicate input".to_string()));
        }
        Ok(())
    }
}

/// A signature over the essence hash together with the signing public key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureUnlock {
    pub public_key: PublicKey,
    pub signature: Signature,
}

/// Unlocks one input of a transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unlock {
    Signature(SignatureUnlock),
    /// Reuses the signature unlock at the given input index (same address).
    Reference(u16),
    /// The input is owned by the alias consumed at the given input index.
    Alias(u16),
    /// The input is owned by the NFT consumed at the given input index.
    Nft(u16),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub essence: TransactionEssence,
    pub unlocks: Vec<Unlock>,
}

impl SignedTransaction {
    pub fn id(&self) -> Result<TransactionId, TypesError> {
        Ok(TransactionId::new(blake2b_256(&bincode::serialize(self)?)))
    }

    /// The output id the `index`-th created output will have.
    pub fn output_id(&self, index: u16) -> Result<OutputId, TypesError> {
        Ok(OutputId::new(self.id()?, index))
    }
}

/// An input together with what the signer needs to unlock it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSigningData {
    pub output_id: OutputId,
    pub output: Output,
    /// Derivation chain of the key owning the input, or of the key
    /// ultimately controlling it when `via_chain` is set.
    pub chain: Bip44,
    /// Alias or NFT address owning the input. Such an input is unlocked by
    /// the input that consumes that chain.
    #[serde(default)]
    pub via_chain: Option<Address>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::BasicOutput;

    fn input(n: u8) -> InputSigningData {
        InputSigningData {
            output_id: OutputId::new(TransactionId::new([n; 32]), 0),
            output: Output::Basic(BasicOutput::new(100, Address::Ed25519([n; 32]))),
            chain: Bip44::new(1, 0, false, 0),
            via_chain: None,
        }
    }

    #[test]
    fn essence_hash_is_deterministic() {
        let outputs = vec![Output::Basic(BasicOutput::new(100, Address::Ed25519([9; 32])))];
        let a = TransactionEssence::new(1, &[input(1)], outputs.clone()).unwrap();
        let b = TransactionEssence::new(1, &[input(1)], outputs).unwrap();
        assert_eq!(a.hash().unwrap(), b.hash().unwrap());
    }

    #[test]
    fn commitment_depends_on_input_content() {
        let outputs = vec![Output::Basic(BasicOutput::new(100, Address::Ed25519([9; 32])))];
        let mut changed = input(1);
        changed.output.set_amount(101);
        let a = TransactionEssence::new(1, &[input(1)], outputs.clone()).unwrap();
        let b = TransactionEssence::new(1, &[changed], outputs).unwrap();
        assert_ne!(a.inputs_commitment, b.inputs_commitment);
    }

    #[test]
    fn duplicate_inputs_rejected() {
        let outputs = vec![Output::Basic(BasicOutput::new(200, Address::Ed25519([9; 32])))];
        let essence = TransactionEssence::new(1, &[input(1), input(1)], outputs).unwrap();
        assert!(essence.validate_counts().is_err());
    }

    #[test]
    fn empty_outputs_rejected() {
        let essence = TransactionEssence::new(1, &[input(1)], Vec::new()).unwrap();
        assert!(essence.validate_counts().is_err());
    }
}
