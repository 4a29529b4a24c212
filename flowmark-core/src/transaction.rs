use crate::{Address, Identifier, Value, IDENTIFIER_LENGTH, TRANSACTION_DOMAIN_TAG};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use sha3::{Digest, Sha3_256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalKey {
    pub address: Address,
    pub key_index: u32,
    pub sequence_number: u64,
}

/// Unsigned transaction body.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPayload {
    #[serde_as(as = "serde_with::base64::Base64")]
    pub script: Vec<u8>,
    pub arguments: Vec<Value>,
    pub reference_block_id: Identifier,
    pub gas_limit: u64,
    pub proposal_key: ProposalKey,
    pub payer: Address,
    pub authorizers: Vec<Address>,
}

impl TransactionPayload {
    /// Bytes covered by envelope signatures: the domain tag right-padded to 32 bytes followed by
    /// the canonical encoding of the payload.
    pub fn envelope_message(&self) -> Vec<u8> {
        let mut message = vec![0u8; IDENTIFIER_LENGTH];
        message[..TRANSACTION_DOMAIN_TAG.len()].copy_from_slice(TRANSACTION_DOMAIN_TAG);
        message.extend(canonical_bytes(self));
        message
    }
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSignature {
    pub address: Address,
    pub key_index: u32,
    #[serde_as(as = "serde_with::hex::Hex")]
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedTransaction {
    pub payload: TransactionPayload,
    pub envelope_signatures: Vec<TransactionSignature>,
}

impl SignedTransaction {
    /// Transaction identifier: SHA3-256 of the canonical encoding of the signed envelope.
    pub fn id(&self) -> Identifier {
        Identifier::new(Sha3_256::digest(canonical_bytes(self)).into())
    }
}

fn canonical_bytes<T: Serialize>(value: &T) -> Vec<u8> {
    // NOTE: Every type reachable from a transaction is plain data, so bincode cannot fail here.
    bincode::serialize(value).expect("Transaction types always encode")
}
