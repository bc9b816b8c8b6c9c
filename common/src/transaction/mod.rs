mod builder;
mod command;
mod status;

pub use builder::TransactionBuilder;
pub use command::{Command, MAX_DESCRIPTION_LENGTH};
pub use status::{StatusReport, TxStatus};

use serde::{Deserialize, Serialize};

use crate::{
    account::AccountId,
    crypto::{Ed25519Error, Hash, Hashable, KeyPair, PublicKey, Signature},
    time::TimestampMillis,
};

/// Signed part of a transaction. Its hash identifies the transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionPayload {
    pub creator_account_id: AccountId,
    pub created_time: TimestampMillis,
    pub quorum: u32,
    pub commands: Vec<Command>,
}

impl Hashable for TransactionPayload {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignaturePair {
    pub public_key: PublicKey,
    pub signature: Signature,
}

impl SignaturePair {
    pub fn create(keypair: &KeyPair, hash: &Hash) -> Self {
        Self {
            public_key: keypair.public_key(),
            signature: keypair.sign_hash(hash),
        }
    }

    pub fn verify(&self, hash: &Hash) -> Result<(), Ed25519Error> {
        self.public_key.verify_hash(hash, &self.signature)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub payload: TransactionPayload,
    #[serde(default)]
    pub signatures: Vec<SignaturePair>,
}

impl Transaction {
    pub fn unsigned(payload: TransactionPayload) -> Self {
        Self {
            payload,
            signatures: Vec::new(),
        }
    }

    pub fn hash(&self) -> Hash {
        self.payload.hash()
    }

    pub fn creator(&self) -> &AccountId {
        &self.payload.creator_account_id
    }

    /// Add a signature by `keypair`. Signing twice with the same key
    /// replaces the earlier signature.
    pub fn sign(mut self, keypair: &KeyPair) -> Self {
        let pair = SignaturePair::create(keypair, &self.hash());
        self.signatures
            .retain(|existing| existing.public_key != pair.public_key);
        self.signatures.push(pair);
        self
    }

    pub fn verify_signatures(&self) -> Result<(), Ed25519Error> {
        let hash = self.hash();
        self.signatures.iter().try_for_each(|pair| pair.verify(&hash))
    }

    pub fn signers(&self) -> impl Iterator<Item = &PublicKey> {
        self.signatures.iter().map(|pair| &pair.public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::Amount;

    fn sample(keypair: &KeyPair) -> Transaction {
        let creator: AccountId = "user_b@probe".parse().unwrap();
        let dest: AccountId = "user_c@probe".parse().unwrap();
        TransactionBuilder::new(creator.clone())
            .created_time(1_000)
            .command(Command::transfer(
                &creator,
                &dest,
                &"coin#probe".parse().unwrap(),
                "",
                Amount::from_integer(10),
            ))
            .build()
            .sign(keypair)
    }

    #[test]
    fn test_signed_transaction_verifies() {
        let keypair = KeyPair::generate();
        let tx = sample(&keypair);
        assert_eq!(tx.signatures.len(), 1);
        assert!(tx.verify_signatures().is_ok());
    }

    #[test]
    fn test_tampered_payload_fails_verification() {
        let keypair = KeyPair::generate();
        let mut tx = sample(&keypair);
        tx.payload.created_time += 1;
        assert!(tx.verify_signatures().is_err());
    }

    #[test]
    fn test_hash_ignores_signatures() {
        let tx = sample(&KeyPair::generate());
        let resigned = tx.clone().sign(&KeyPair::generate());
        assert_eq!(tx.hash(), resigned.hash());
        assert_eq!(resigned.signatures.len(), 2);
    }

    #[test]
    fn test_json_roundtrip_keeps_hash() {
        let tx = sample(&KeyPair::generate());
        let json = serde_json::to_string(&tx).unwrap();
        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.hash(), tx.hash());
        assert!(back.verify_signatures().is_ok());
    }
}
