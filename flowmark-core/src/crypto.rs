use crate::BenchError;
use p256::ecdsa::signature::{DigestSigner, DigestVerifier};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use sha3::{Digest, Sha3_256};
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignatureAlgorithm {
    #[serde(rename = "ECDSA_P256")]
    EcdsaP256,
    #[default]
    #[serde(rename = "ECDSA_secp256k1")]
    EcdsaSecp256k1,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HashAlgorithm {
    #[serde(rename = "SHA2_256")]
    Sha2_256,
    #[default]
    #[serde(rename = "SHA3_256")]
    Sha3_256,
}

impl HashAlgorithm {
    pub fn digest(&self, message: &[u8]) -> [u8; 32] {
        match self {
            Self::Sha2_256 => Sha256::digest(message).into(),
            Self::Sha3_256 => Sha3_256::digest(message).into(),
        }
    }
}

#[derive(Clone)]
enum Secret {
    P256(p256::ecdsa::SigningKey),
    Secp256k1(libsecp256k1::SecretKey),
}

/// In-memory private key for one signature algorithm.
#[derive(Clone)]
pub struct PrivateKey {
    secret: Secret,
}

impl PrivateKey {
    pub fn from_hex(algorithm: SignatureAlgorithm, encoded: &str) -> Result<Self, BenchError> {
        let trimmed = encoded.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        let bytes = hex::decode(trimmed)
            .map_err(|e| BenchError::configuration(format!("private key is not valid hex: {e}")))?;
        Self::from_bytes(algorithm, &bytes)
    }

    pub fn from_bytes(algorithm: SignatureAlgorithm, bytes: &[u8]) -> Result<Self, BenchError> {
        let secret = match algorithm {
            SignatureAlgorithm::EcdsaP256 => p256::ecdsa::SigningKey::from_slice(bytes)
                .map(Secret::P256)
                .map_err(|e| {
                    BenchError::configuration(format!("invalid P-256 private key: {e}"))
                })?,
            SignatureAlgorithm::EcdsaSecp256k1 => libsecp256k1::SecretKey::parse_slice(bytes)
                .map(Secret::Secp256k1)
                .map_err(|e| {
                    BenchError::configuration(format!("invalid secp256k1 private key: {e:?}"))
                })?,
        };
        Ok(Self { secret })
    }

    pub fn algorithm(&self) -> SignatureAlgorithm {
        match self.secret {
            Secret::P256(_) => SignatureAlgorithm::EcdsaP256,
            Secret::Secp256k1(_) => SignatureAlgorithm::EcdsaSecp256k1,
        }
    }

    /// Raw 64-byte public key (uncompressed point without the format prefix).
    pub fn public_key(&self) -> Vec<u8> {
        match &self.secret {
            Secret::P256(key) => {
                let point = key.verifying_key().to_encoded_point(false);
                point.as_bytes()[1..].to_vec()
            }
            Secret::Secp256k1(secret) => {
                libsecp256k1::PublicKey::from_secret_key(secret).serialize()[1..].to_vec()
            }
        }
    }

    /// Hashes `message` with `hash` and signs the digest, returning a 64-byte `r || s` signature.
    pub fn sign(&self, hash: HashAlgorithm, message: &[u8]) -> Vec<u8> {
        match &self.secret {
            Secret::P256(key) => {
                let signature: p256::ecdsa::Signature = match hash {
                    HashAlgorithm::Sha2_256 => key.sign_digest(Sha256::new_with_prefix(message)),
                    HashAlgorithm::Sha3_256 => key.sign_digest(Sha3_256::new_with_prefix(message)),
                };
                signature.to_bytes().to_vec()
            }
            Secret::Secp256k1(secret) => {
                let digest = libsecp256k1::Message::parse(&hash.digest(message));
                let (signature, _) = libsecp256k1::sign(&digest, secret);
                signature.serialize().to_vec()
            }
        }
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm())
            .finish_non_exhaustive()
    }
}

/// Checks `signature` over `message` against a raw public key.
pub fn verify_signature(
    algorithm: SignatureAlgorithm,
    hash: HashAlgorithm,
    public_key: &[u8],
    message: &[u8],
    signature: &[u8],
) -> bool {
    match algorithm {
        SignatureAlgorithm::EcdsaP256 => {
            let mut point = Vec::with_capacity(public_key.len() + 1);
            point.push(0x04);
            point.extend_from_slice(public_key);
            let Ok(public) = p256::ecdsa::VerifyingKey::from_sec1_bytes(&point) else {
                return false;
            };
            let Ok(signature) = p256::ecdsa::Signature::from_slice(signature) else {
                return false;
            };
            match hash {
                HashAlgorithm::Sha2_256 => public
                    .verify_digest(Sha256::new_with_prefix(message), &signature)
                    .is_ok(),
                HashAlgorithm::Sha3_256 => public
                    .verify_digest(Sha3_256::new_with_prefix(message), &signature)
                    .is_ok(),
            }
        }
        SignatureAlgorithm::EcdsaSecp256k1 => {
            let Ok(public) = libsecp256k1::PublicKey::parse_slice(public_key, None) else {
                return false;
            };
            let Ok(signature) = libsecp256k1::Signature::parse_standard_slice(signature) else {
                return false;
            };
            let digest = libsecp256k1::Message::parse(&hash.digest(message));
            libsecp256k1::verify(&digest, &signature, &public)
        }
    }
}
