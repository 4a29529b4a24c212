//! Ledger-side data model and the access-client seam.
//!
//! The engine never talks to a network directly. Everything it needs from the ledger goes through
//! [`LedgerClient`], which the runtime implements over HTTP and the mock ledger implements
//! in-process.
use crate::{
    ArgumentError, HashAlgorithm, LedgerError, SignatureAlgorithm, SignedTransaction,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DeserializeFromStr, SerializeDisplay};
use std::fmt;
use std::str::FromStr;

pub const ADDRESS_LENGTH: usize = 8;
pub const IDENTIFIER_LENGTH: usize = 32;

/// Weight of a key that can authorize a transaction on its own.
pub const FULL_KEY_WEIGHT: u32 = 1000;

/// Ledger account address, rendered as `0x`-prefixed hex.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, SerializeDisplay, DeserializeFromStr)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Hex without the `0x` prefix, as used in URL paths.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl FromStr for Address {
    type Err = ArgumentError;

    /// Parses a hex address. Short addresses are left-padded with zeros, so `0x01` is the
    /// address `0x0000000000000001`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);

        if digits.is_empty() {
            return Err(ArgumentError::invalid("Address", s, "empty address"));
        }

        let padded = if digits.len() % 2 == 1 {
            format!("0{digits}")
        } else {
            digits.to_string()
        };

        let decoded = hex::decode(&padded).map_err(|e| ArgumentError::invalid("Address", s, e))?;
        if decoded.len() > ADDRESS_LENGTH {
            return Err(ArgumentError::invalid(
                "Address",
                s,
                format!("longer than {ADDRESS_LENGTH} bytes"),
            ));
        }

        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes[ADDRESS_LENGTH - decoded.len()..].copy_from_slice(&decoded);
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({self})")
    }
}

/// 32-byte identifier of a block or transaction, rendered as plain hex.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct Identifier([u8; IDENTIFIER_LENGTH]);

impl Identifier {
    pub const fn new(bytes: [u8; IDENTIFIER_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; IDENTIFIER_LENGTH] {
        &self.0
    }
}

impl FromStr for Identifier {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = hex::decode(s.trim()).map_err(|e| LedgerError::Decode(e.to_string()))?;
        let bytes: [u8; IDENTIFIER_LENGTH] = decoded.try_into().map_err(|_| {
            LedgerError::Decode(format!("identifier must be {IDENTIFIER_LENGTH} bytes"))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({self})")
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountKey {
    pub index: u32,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub public_key: Vec<u8>,
    pub signing_algorithm: SignatureAlgorithm,
    pub hashing_algorithm: HashAlgorithm,
    pub weight: u32,
    pub sequence_number: u64,
    pub revoked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub address: Address,
    pub balance: u64,
    pub keys: Vec<AccountKey>,
}

impl Account {
    /// Keys that can still propose transactions.
    pub fn usable_keys(&self) -> impl Iterator<Item = &AccountKey> {
        self.keys.iter().filter(|key| !key.revoked)
    }

    pub fn key(&self, index: u32) -> Option<&AccountKey> {
        self.keys.iter().find(|key| key.index == index)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockHeader {
    pub id: Identifier,
    pub height: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Unknown,
    Pending,
    Finalized,
    Executed,
    Sealed,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResult {
    pub status: TransactionStatus,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl TransactionResult {
    pub fn pending() -> Self {
        Self {
            status: TransactionStatus::Pending,
            error_message: None,
        }
    }

    pub fn sealed() -> Self {
        Self {
            status: TransactionStatus::Sealed,
            error_message: None,
        }
    }

    pub fn sealed_with_error(msg: impl Into<String>) -> Self {
        Self {
            status: TransactionStatus::Sealed,
            error_message: Some(msg.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub id: Identifier,
}

/// Narrow access interface to the ledger.
///
/// Use the generated [`LedgerClient`] variant whose futures are `Send`; the engine spawns them on
/// a multi-threaded runtime.
#[trait_variant::make(LedgerClient: Send)]
pub trait LocalLedgerClient {
    async fn get_account(&self, address: &Address) -> Result<Account, LedgerError>;

    async fn latest_block_header(&self) -> Result<BlockHeader, LedgerError>;

    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<Identifier, LedgerError>;

    async fn transaction_result(&self, id: &Identifier) -> Result<TransactionResult, LedgerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_address_is_left_padded() {
        let address: Address = "0x01".parse().unwrap();
        assert_eq!(address.as_bytes(), &[0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(address.to_string(), "0x0000000000000001");
    }

    #[test]
    fn address_without_prefix_and_odd_length() {
        let address: Address = "f8d6e0586b0a20c".parse().unwrap();
        assert_eq!(address.to_string(), "0x0f8d6e0586b0a20c");
    }

    #[test]
    fn oversized_address_is_rejected() {
        let res = "0x0102030405060708ff".parse::<Address>();
        assert!(matches!(res, Err(ArgumentError::InvalidValue { kind: "Address", .. })));
    }

    #[test]
    fn identifier_roundtrips_through_json() {
        let id = Identifier::new([7u8; IDENTIFIER_LENGTH]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", "07".repeat(IDENTIFIER_LENGTH)));
        assert_eq!(serde_json::from_str::<Identifier>(&json).unwrap(), id);
    }

    #[test]
    fn identifier_with_wrong_length_fails() {
        assert!("abcd".parse::<Identifier>().is_err());
    }
}
