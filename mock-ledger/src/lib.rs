//! A small in-memory ledger for exercising the benchmark end to end.
//!
//! It enforces the rules a benchmark depends on: per-key sequence numbers, envelope signatures
//! and signing weight, and known reference blocks. Accepted transactions seal after a configurable
//! delay. Scripts calling `panic(` unconditionally seal with an execution error, and the
//! key-adding script grows the signer's account.
use flowmark_core::{
    verify_signature, Account, AccountKey, Address, BlockHeader, HashAlgorithm, Identifier,
    LedgerClient, LedgerError, SignatureAlgorithm, SignedTransaction, TransactionResult,
    TransactionStatus, Value, ADD_KEYS_SCRIPT, FULL_KEY_WEIGHT,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
#[allow(unused)]
use metrics::{counter, gauge, histogram};
use rand::Rng;
use sha3::{Digest, Sha3_256};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

mod http;

pub use http::{router, run, serve};

#[derive(Debug, Clone)]
pub struct MockSettings {
    /// Time from acceptance until a transaction reports as sealed.
    pub seal_after: Duration,
    /// Upper bound of a random extra delay added to `seal_after`.
    pub seal_jitter: Duration,
    pub block_interval: Duration,
    /// Artificial latency of every submission.
    pub submit_delay: Duration,
    /// Submissions above this rate are rejected.
    pub max_tps: Option<NonZeroU32>,
}

impl Default for MockSettings {
    fn default() -> Self {
        Self {
            seal_after: Duration::from_millis(200),
            seal_jitter: Duration::ZERO,
            block_interval: Duration::from_secs(1),
            submit_delay: Duration::ZERO,
            max_tps: None,
        }
    }
}

struct Submitted {
    executed_at: Instant,
    sealed_at: Instant,
    error: Option<String>,
}

#[derive(Default)]
struct State {
    accounts: HashMap<Address, Account>,
    next_address: u64,
    blocks: HashMap<Identifier, u64>,
    transactions: HashMap<Identifier, Submitted>,
    failing_block_fetches: u32,
    failing_submissions: u32,
}

struct Inner {
    settings: MockSettings,
    started: Instant,
    limiter: Option<DefaultDirectRateLimiter>,
    state: Mutex<State>,
}

#[derive(Clone)]
pub struct MockLedger {
    inner: Arc<Inner>,
}

impl MockLedger {
    pub fn new(settings: MockSettings) -> Self {
        let limiter = settings
            .max_tps
            .map(|tps| RateLimiter::direct(Quota::per_second(tps)));
        Self {
            inner: Arc::new(Inner {
                settings,
                started: Instant::now(),
                limiter,
                state: Mutex::new(State {
                    next_address: 1,
                    ..Default::default()
                }),
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        // NOTE: State is only mutated under the lock without awaits, a poisoned lock still holds
        // consistent data.
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Creates an account with `key_count` full-weight keys sharing `public_key`.
    pub fn create_account(&self, public_key: &[u8], key_count: u32) -> Address {
        let mut state = self.state();
        let address = Address::new(state.next_address.to_be_bytes());
        state.next_address += 1;
        drop(state);

        self.create_account_at(address, public_key, key_count, HashAlgorithm::default());
        address
    }

    pub fn create_account_at(
        &self,
        address: Address,
        public_key: &[u8],
        key_count: u32,
        hashing_algorithm: HashAlgorithm,
    ) {
        let keys = (0..key_count)
            .map(|index| AccountKey {
                index,
                public_key: public_key.to_vec(),
                signing_algorithm: SignatureAlgorithm::EcdsaSecp256k1,
                hashing_algorithm,
                weight: FULL_KEY_WEIGHT,
                sequence_number: 0,
                revoked: false,
            })
            .collect();

        info!("Created account {address} with {key_count} keys");
        self.state().accounts.insert(
            address,
            Account {
                address,
                balance: 1_000 * flowmark_core::FIX64_SCALE,
                keys,
            },
        );
    }

    pub fn account(&self, address: &Address) -> Option<Account> {
        self.state().accounts.get(address).cloned()
    }

    pub fn transaction_count(&self) -> usize {
        self.state().transactions.len()
    }

    /// Makes the next `n` latest-block requests fail with a transport error.
    pub fn fail_next_block_fetches(&self, n: u32) {
        self.state().failing_block_fetches = n;
    }

    /// Makes the next `n` submissions fail with a transport error.
    pub fn fail_next_submissions(&self, n: u32) {
        self.state().failing_submissions = n;
    }

    fn current_height(&self) -> u64 {
        let interval = self.inner.settings.block_interval.as_nanos().max(1);
        1 + (self.inner.started.elapsed().as_nanos() / interval) as u64
    }

    fn seal_delay(&self) -> Duration {
        let settings = &self.inner.settings;
        if settings.seal_jitter.is_zero() {
            return settings.seal_after;
        }
        let jitter = rand::thread_rng().gen_range(Duration::ZERO..=settings.seal_jitter);
        settings.seal_after + jitter
    }
}

fn block_id(height: u64) -> Identifier {
    Identifier::new(Sha3_256::digest(height.to_be_bytes()).into())
}

fn rejected(reason: impl Into<String>) -> LedgerError {
    counter!("mock-ledger.rejected").increment(1);
    LedgerError::Rejected(reason.into())
}

fn check_envelope(state: &State, tx: &SignedTransaction) -> Result<(), LedgerError> {
    let payload = &tx.payload;
    if payload.gas_limit == 0 {
        return Err(rejected("gas limit must be positive"));
    }
    if !state.blocks.contains_key(&payload.reference_block_id) {
        return Err(rejected(format!(
            "unknown reference block {}",
            payload.reference_block_id
        )));
    }

    let message = payload.envelope_message();
    let mut weights: HashMap<Address, u32> = HashMap::new();
    for sig in &tx.envelope_signatures {
        let key = state
            .accounts
            .get(&sig.address)
            .and_then(|account| account.key(sig.key_index))
            .filter(|key| !key.revoked)
            .ok_or_else(|| rejected(format!("unknown key {}#{}", sig.address, sig.key_index)))?;

        if !verify_signature(
            key.signing_algorithm,
            key.hashing_algorithm,
            &key.public_key,
            &message,
            &sig.signature,
        ) {
            return Err(rejected(format!(
                "invalid signature from {}#{}",
                sig.address, sig.key_index
            )));
        }
        *weights.entry(sig.address).or_default() += key.weight;
    }

    let proposal = payload.proposal_key;
    if !tx
        .envelope_signatures
        .iter()
        .any(|sig| sig.address == proposal.address && sig.key_index == proposal.key_index)
    {
        return Err(rejected("proposal key did not sign the envelope"));
    }

    for signer in std::iter::once(&payload.payer).chain(&payload.authorizers) {
        if weights.get(signer).copied().unwrap_or_default() < FULL_KEY_WEIGHT {
            return Err(rejected(format!("insufficient signing weight for {signer}")));
        }
    }

    let key = state
        .accounts
        .get(&proposal.address)
        .and_then(|account| account.key(proposal.key_index))
        .ok_or_else(|| rejected("unknown proposal key"))?;
    if key.sequence_number != proposal.sequence_number {
        return Err(rejected(format!(
            "invalid proposal key: {}#{} expected sequence number {}, got {}",
            proposal.address, proposal.key_index, key.sequence_number, proposal.sequence_number
        )));
    }

    Ok(())
}

/// Applies the effects of an accepted transaction and returns its execution error, if any.
/// Unconditional `panic(` calls fail execution. `?? panic(` fallbacks never fire.
fn panics(script: &str) -> bool {
    script
        .match_indices("panic(")
        .any(|(at, _)| !script[..at].trim_end().ends_with("??"))
}

fn execute(state: &mut State, tx: &SignedTransaction) -> Option<String> {
    let payload = &tx.payload;
    let proposal = payload.proposal_key;
    if let Some(key) = state
        .accounts
        .get_mut(&proposal.address)
        .and_then(|account| account.keys.iter_mut().find(|k| k.index == proposal.key_index))
    {
        key.sequence_number += 1;
    }

    if panics(&String::from_utf8_lossy(&payload.script)) {
        return Some("execution reverted: panic".into());
    }

    if payload.script == ADD_KEYS_SCRIPT.as_bytes() {
        let (Some(Value::String(public_key)), Some(Value::UInt32(count))) =
            (payload.arguments.first(), payload.arguments.get(1))
        else {
            return Some("invalid arguments for key addition".into());
        };
        let Ok(public_key) = hex::decode(public_key) else {
            return Some("public key is not valid hex".into());
        };
        let Some(account) = payload
            .authorizers
            .first()
            .and_then(|address| state.accounts.get_mut(address))
        else {
            return Some("authorizer account not found".into());
        };
        let Some(template) = account.keys.first().cloned() else {
            return Some("authorizer account has no keys".into());
        };

        let next = account.keys.len() as u32;
        for index in next..next + count {
            account.keys.push(AccountKey {
                index,
                public_key: public_key.clone(),
                weight: 0,
                sequence_number: 0,
                revoked: false,
                ..template.clone()
            });
        }
        debug!("Added {count} keys to {}", account.address);
    }

    None
}

impl LedgerClient for MockLedger {
    async fn get_account(&self, address: &Address) -> Result<Account, LedgerError> {
        self.account(address)
            .ok_or_else(|| LedgerError::NotFound(format!("account {address}")))
    }

    async fn latest_block_header(&self) -> Result<BlockHeader, LedgerError> {
        let height = self.current_height();
        let mut state = self.state();
        if state.failing_block_fetches > 0 {
            state.failing_block_fetches -= 1;
            return Err(LedgerError::Transport("block service unavailable".into()));
        }

        let id = block_id(height);
        state.blocks.insert(id, height);
        Ok(BlockHeader { id, height })
    }

    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<Identifier, LedgerError> {
        let delay = self.inner.settings.submit_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if let Some(limiter) = &self.inner.limiter {
            if limiter.check().is_err() {
                return Err(rejected("rate limited"));
            }
        }

        let seal_delay = self.seal_delay();
        let mut state = self.state();
        if state.failing_submissions > 0 {
            state.failing_submissions -= 1;
            return Err(LedgerError::Transport("connection reset".into()));
        }

        check_envelope(&state, tx)?;
        let error = execute(&mut state, tx);

        let id = tx.id();
        let now = Instant::now();
        state.transactions.insert(
            id,
            Submitted {
                executed_at: now + seal_delay / 2,
                sealed_at: now + seal_delay,
                error,
            },
        );
        counter!("mock-ledger.submitted").increment(1);
        trace!("Accepted {id}");

        Ok(id)
    }

    async fn transaction_result(&self, id: &Identifier) -> Result<TransactionResult, LedgerError> {
        let state = self.state();
        let submitted = state
            .transactions
            .get(id)
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {id}")))?;

        let now = Instant::now();
        let status = if now >= submitted.sealed_at {
            TransactionStatus::Sealed
        } else if now >= submitted.executed_at {
            TransactionStatus::Executed
        } else {
            TransactionStatus::Pending
        };

        Ok(TransactionResult {
            status,
            error_message: match status {
                TransactionStatus::Sealed | TransactionStatus::Executed => {
                    submitted.error.clone()
                }
                _ => None,
            },
        })
    }
}
