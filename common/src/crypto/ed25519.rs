//! Ed25519 keys identifying account signatories.
//!
//! Every transaction and query carries one or more `(public key, signature)`
//! pairs over its payload hash. Keys and signatures travel as lowercase hex.

use ed25519_dalek::{
    Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH,
    SECRET_KEY_LENGTH, SIGNATURE_LENGTH,
};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::Hash;

pub const PRIVATE_KEY_SIZE: usize = SECRET_KEY_LENGTH;
pub const PUBLIC_KEY_SIZE: usize = PUBLIC_KEY_LENGTH;
pub const SIGNATURE_SIZE: usize = SIGNATURE_LENGTH;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Ed25519Error {
    #[error("Invalid key length: expected {expected}, got {got}")]
    InvalidKeyLength { expected: usize, got: usize },

    #[error("Invalid signature length: expected {}, got {}", SIGNATURE_SIZE, _0)]
    InvalidSignatureLength(usize),

    #[error("Public key is not a valid curve point")]
    InvalidPublicKey,

    #[error("Signature verification failed")]
    VerificationFailed,

    #[error("Invalid hex string: {0}")]
    HexError(String),
}

fn decode_fixed<const N: usize>(hex: &str) -> Result<[u8; N], Ed25519Error> {
    let bytes = hex::decode(hex).map_err(|e| Ed25519Error::HexError(e.to_string()))?;
    let got = bytes.len();
    bytes
        .try_into()
        .map_err(|_| Ed25519Error::InvalidKeyLength { expected: N, got })
}

/// Private signing key. Wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivateKey([u8; PRIVATE_KEY_SIZE]);

impl PrivateKey {
    pub fn from_bytes(bytes: [u8; PRIVATE_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(hex: &str) -> Result<Self, Ed25519Error> {
        decode_fixed(hex.trim()).map(Self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for PrivateKey {
    type Err = Ed25519Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

// Never print key material, not even in debug output
impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey([REDACTED])")
    }
}

impl Serialize for PrivateKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PrivateKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; PUBLIC_KEY_SIZE]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(hex: &str) -> Result<Self, Ed25519Error> {
        decode_fixed(hex).map(Self)
    }

    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), Ed25519Error> {
        let verifying_key =
            VerifyingKey::from_bytes(&self.0).map_err(|_| Ed25519Error::InvalidPublicKey)?;
        verifying_key
            .verify(message, &DalekSignature::from_bytes(&signature.0))
            .map_err(|_| Ed25519Error::VerificationFailed)
    }

    /// Verify a signature made over a payload hash.
    pub fn verify_hash(&self, hash: &Hash, signature: &Signature) -> Result<(), Ed25519Error> {
        self.verify(hash.as_bytes(), signature)
    }
}

impl FromStr for PublicKey {
    type Err = Ed25519Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
    pub fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_hex(hex: &str) -> Result<Self, Ed25519Error> {
        decode_fixed::<SIGNATURE_SIZE>(hex)
            .map(Self)
            .map_err(|e| match e {
                Ed25519Error::InvalidKeyLength { got, .. } => {
                    Ed25519Error::InvalidSignatureLength(got)
                }
                other => other,
            })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({}...)", &self.to_hex()[..16])
    }
}

impl Serialize for Signature {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[derive(Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    pub fn generate() -> Self {
        Self {
            signing_key: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_private_key(key: &PrivateKey) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(&key.0),
        }
    }

    pub fn from_hex(hex: &str) -> Result<Self, Ed25519Error> {
        Ok(Self::from_private_key(&PrivateKey::from_hex(hex)?))
    }

    pub fn private_key(&self) -> PrivateKey {
        PrivateKey(self.signing_key.to_bytes())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.signing_key.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.signing_key.sign(message).to_bytes())
    }

    pub fn sign_hash(&self, hash: &Hash) -> Signature {
        self.sign(hash.as_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .field("private_key", &"[REDACTED]")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::hash;

    #[test]
    fn test_sign_and_verify_hash() {
        let keypair = KeyPair::generate();
        let digest = hash(b"transfer 10 coin#probe");
        let signature = keypair.sign_hash(&digest);
        assert!(keypair.public_key().verify_hash(&digest, &signature).is_ok());

        let other = hash(b"transfer 11 coin#probe");
        assert_eq!(
            keypair.public_key().verify_hash(&other, &signature),
            Err(Ed25519Error::VerificationFailed)
        );
    }

    #[test]
    fn test_verify_wrong_key() {
        let signer = KeyPair::generate();
        let stranger = KeyPair::generate();
        let signature = signer.sign(b"payload");
        assert!(stranger.public_key().verify(b"payload", &signature).is_err());
    }

    #[test]
    fn test_private_key_hex_restores_same_identity() {
        let keypair = KeyPair::generate();
        let restored = KeyPair::from_hex(&keypair.private_key().to_hex()).unwrap();
        assert_eq!(keypair.public_key(), restored.public_key());
    }

    #[test]
    fn test_debug_redacts_private_key() {
        let keypair = KeyPair::generate();
        let hex = keypair.private_key().to_hex();
        assert!(!format!("{:?}", keypair).contains(&hex));
        assert!(!format!("{:?}", keypair.private_key()).contains(&hex));
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            PrivateKey::from_hex("abcd"),
            Err(Ed25519Error::InvalidKeyLength { expected: 32, got: 2 })
        ));
        assert!(matches!(
            PublicKey::from_hex("zz"),
            Err(Ed25519Error::HexError(_))
        ));
        assert_eq!(
            Signature::from_hex(&"00".repeat(32)),
            Err(Ed25519Error::InvalidSignatureLength(32))
        );
    }
}
