//! Transaction assembly and signing.
use crate::cancellable;
use crate::key_pool::KeyLease;
use flowmark_core::{
    Address, ArgumentSpec, BenchError, Identifier, LedgerClient, PrivateKey, ProposalKey,
    ResolvedRole, RetrySettings, SignedTransaction, TransactionConfig, TransactionPayload,
    TransactionSignature, Value, ADD_KEYS_SCRIPT,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

mod signer;

pub use signer::{InMemorySigner, Signer};

struct RoleSigner {
    address: Address,
    key_index: u32,
    signer: Arc<dyn Signer>,
}

impl RoleSigner {
    fn new(config: &TransactionConfig, role: ResolvedRole) -> Result<Self, BenchError> {
        let key = PrivateKey::from_hex(config.signature_algorithm, &role.private_key)?;
        Ok(Self {
            address: role.address,
            key_index: role.key_index,
            signer: Arc::new(InMemorySigner::new(key, config.hash_algorithm)),
        })
    }
}

/// Builds signed benchmark transactions from the configured template.
pub struct TransactionBuilder<C> {
    client: Arc<C>,
    script: Vec<u8>,
    gas_limit: u64,
    arguments: Vec<ArgumentSpec>,
    payer: RoleSigner,
    proposer: RoleSigner,
    authorizer: RoleSigner,
    fetch_attempts: u32,
    fetch_backoff: Duration,
}

impl<C> TransactionBuilder<C>
where
    C: LedgerClient + Sync,
{
    /// Decodes every configured private key up front; a malformed key is a configuration error.
    pub fn new(
        client: Arc<C>,
        config: &TransactionConfig,
        retry: &RetrySettings,
    ) -> Result<Self, BenchError> {
        Ok(Self {
            client,
            script: config.script.clone(),
            gas_limit: config.gas_limit,
            arguments: config.script_arguments.clone(),
            payer: RoleSigner::new(config, config.payer())?,
            proposer: RoleSigner::new(config, config.proposer())?,
            authorizer: RoleSigner::new(config, config.authorizer())?,
            fetch_attempts: retry.attempts(),
            fetch_backoff: retry.retry_interval,
        })
    }

    /// Account whose keys propose benchmark transactions.
    pub fn proposer_address(&self) -> Address {
        self.proposer.address
    }

    /// Builds one benchmark transaction proposed with the leased key.
    #[instrument(name = "build", skip_all, fields(key = lease.key_index(), seq = lease.sequence_number()))]
    pub async fn build(
        &self,
        lease: &KeyLease,
        cancel: &CancellationToken,
    ) -> Result<SignedTransaction, BenchError> {
        let reference_block_id = self.reference_block(cancel).await?;
        let arguments = self
            .arguments
            .iter()
            .map(|arg| Value::parse(&arg.kind, &arg.value))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(self.sign(self.script.clone(), arguments, reference_block_id, lease))
    }

    /// Builds a transaction adding `count` keys to the proposer account. New keys reuse the
    /// proposer's public key.
    pub async fn build_add_keys(
        &self,
        lease: &KeyLease,
        count: u32,
        cancel: &CancellationToken,
    ) -> Result<SignedTransaction, BenchError> {
        let reference_block_id = self.reference_block(cancel).await?;
        let arguments = vec![
            Value::String(hex::encode(self.proposer.signer.public_key())),
            Value::UInt32(count),
        ];

        Ok(self.sign(
            ADD_KEYS_SCRIPT.as_bytes().to_vec(),
            arguments,
            reference_block_id,
            lease,
        ))
    }

    /// Fetches the latest block id, retrying with a fixed backoff.
    async fn reference_block(&self, cancel: &CancellationToken) -> Result<Identifier, BenchError> {
        let mut attempt = 1;
        loop {
            match cancellable(cancel, self.client.latest_block_header()).await? {
                Ok(header) => return Ok(header.id),
                Err(err) if attempt < self.fetch_attempts => {
                    warn!(
                        "Reference block fetch failed (attempt {attempt}/{}): {err}",
                        self.fetch_attempts
                    );
                    attempt += 1;
                    cancellable(cancel, tokio::time::sleep(self.fetch_backoff)).await?;
                }
                Err(err) => {
                    error!("Reference block fetch failed after {attempt} attempts: {err}");
                    return Err(err.into());
                }
            }
        }
    }

    fn sign(
        &self,
        script: Vec<u8>,
        arguments: Vec<Value>,
        reference_block_id: Identifier,
        lease: &KeyLease,
    ) -> SignedTransaction {
        let payload = TransactionPayload {
            script,
            arguments,
            reference_block_id,
            gas_limit: self.gas_limit,
            proposal_key: ProposalKey {
                address: self.proposer.address,
                key_index: lease.key_index(),
                sequence_number: lease.sequence_number(),
            },
            payer: self.payer.address,
            authorizers: vec![self.authorizer.address],
        };

        let signers = [
            (self.proposer.address, lease.key_index(), &self.proposer.signer),
            (self.payer.address, self.payer.key_index, &self.payer.signer),
            (self.authorizer.address, self.authorizer.key_index, &self.authorizer.signer),
        ];

        let message = payload.envelope_message();
        let mut envelope_signatures: Vec<TransactionSignature> = vec![];
        for (address, key_index, signer) in signers {
            // NOTE: An account key signs the envelope once, whatever roles it holds.
            if envelope_signatures
                .iter()
                .any(|sig| sig.address == address && sig.key_index == key_index)
            {
                continue;
            }
            envelope_signatures.push(TransactionSignature {
                address,
                key_index,
                signature: signer.sign(&message),
            });
        }

        SignedTransaction {
            payload,
            envelope_signatures,
        }
    }
}
