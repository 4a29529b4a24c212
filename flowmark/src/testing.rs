//! In-memory ledger used by the unit tests.
use flowmark_core::{
    Account, AccountKey, Address, BenchmarkConfig, BlockHeader, HashAlgorithm, Identifier,
    LedgerClient, LedgerError, PayerConfig, PrivateKey, Round, RunConfig, SignatureAlgorithm,
    SignedTransaction, TestConfig, TransactionConfig, TransactionResult, Value, ADD_KEYS_SCRIPT,
    FULL_KEY_WEIGHT,
};
use std::collections::{HashMap, VecDeque};
use std::num::NonZeroU32;
use std::sync::Mutex;
use std::time::Duration;

pub const PRIVATE_KEY: &str = "dd4ccf9ef501eee0ee0690550342e7c09e0e9d997d926f7a959e6f3b05b1c81a";
pub const ADDRESS: Address = Address::new([0xf8, 0xd6, 0xe0, 0x58, 0x6b, 0x0a, 0x20, 0xc7]);

fn account_key(index: u32, public_key: Vec<u8>) -> AccountKey {
    AccountKey {
        index,
        public_key,
        signing_algorithm: SignatureAlgorithm::EcdsaSecp256k1,
        hashing_algorithm: HashAlgorithm::Sha3_256,
        weight: FULL_KEY_WEIGHT,
        sequence_number: 0,
        revoked: false,
    }
}

/// Account at [`ADDRESS`] whose `keys` keys all share the public key of [`PRIVATE_KEY`].
pub fn account_with_keys(keys: u32) -> Account {
    let public_key = PrivateKey::from_hex(SignatureAlgorithm::EcdsaSecp256k1, PRIVATE_KEY)
        .unwrap()
        .public_key();
    Account {
        address: ADDRESS,
        balance: 1_000,
        keys: (0..keys)
            .map(|index| account_key(index, public_key.clone()))
            .collect(),
    }
}

pub fn run_config() -> RunConfig {
    let mut transaction: TransactionConfig = transaction_config();
    transaction.script = b"transaction(amount: UInt64) {}".to_vec();

    RunConfig {
        benchmark: BenchmarkConfig {
            test: TestConfig {
                name: "unit".into(),
                description: String::new(),
                network: "emulator".into(),
                rounds: vec![
                    Round::new("first", 4, NonZeroU32::new(50).unwrap()),
                    Round::new("second", 6, NonZeroU32::new(50).unwrap()),
                ],
            },
            key_generation: Default::default(),
            concurrency: Default::default(),
            retry_settings: Default::default(),
            settlement: flowmark_core::SettlementConfig {
                poll_interval: Duration::from_millis(10),
                timeout: Duration::from_secs(5),
            },
            reporting_and_output: Default::default(),
        },
        transaction,
    }
}

fn transaction_config() -> TransactionConfig {
    TransactionConfig {
        script_path: "transfer.cdc".into(),
        script: vec![],
        gas_limit: 100,
        script_arguments: vec![flowmark_core::ArgumentSpec {
            name: "amount".into(),
            kind: "UInt64".into(),
            value: "42".into(),
        }],
        payer: PayerConfig {
            address: ADDRESS,
            private_key: PRIVATE_KEY.into(),
            key_index: 0,
        },
        proposer: Default::default(),
        authorizer: Default::default(),
        signature_algorithm: SignatureAlgorithm::EcdsaSecp256k1,
        hash_algorithm: HashAlgorithm::Sha3_256,
    }
}

#[derive(Default)]
struct StubState {
    account: Option<Account>,
    block_height: u64,
    block_fetches: u32,
    failing_block_fetches: u32,
    fail_submissions: bool,
    submit_delay: Duration,
    execution_error: Option<String>,
    submitted: Vec<SignedTransaction>,
    results: HashMap<Identifier, VecDeque<TransactionResult>>,
    lookups: HashMap<Identifier, u32>,
}

/// Ledger double that checks proposal sequence numbers and seals accepted transactions on the
/// first lookup unless results were scripted.
pub struct StubLedger {
    state: Mutex<StubState>,
}

impl StubLedger {
    pub fn new(account: Account) -> Self {
        Self {
            state: Mutex::new(StubState {
                account: Some(account),
                block_height: 1,
                ..Default::default()
            }),
        }
    }

    pub fn fail_block_fetches(&self, n: u32) {
        self.state.lock().unwrap().failing_block_fetches = n;
    }

    pub fn block_fetches(&self) -> u32 {
        self.state.lock().unwrap().block_fetches
    }

    pub fn latest_block_id(&self) -> Identifier {
        block_id(self.state.lock().unwrap().block_height)
    }

    pub fn fail_submissions(&self, fail: bool) {
        self.state.lock().unwrap().fail_submissions = fail;
    }

    pub fn set_submit_delay(&self, delay: Duration) {
        self.state.lock().unwrap().submit_delay = delay;
    }

    pub fn set_execution_error(&self, error: Option<String>) {
        self.state.lock().unwrap().execution_error = error;
    }

    /// Results returned, in order, by lookups of `id`. The last one repeats.
    pub fn script_results(&self, id: Identifier, results: Vec<TransactionResult>) {
        self.state.lock().unwrap().results.insert(id, results.into());
    }

    pub fn result_lookups(&self, id: &Identifier) -> u32 {
        self.state
            .lock()
            .unwrap()
            .lookups
            .get(id)
            .copied()
            .unwrap_or_default()
    }

    pub fn submitted(&self) -> Vec<SignedTransaction> {
        self.state.lock().unwrap().submitted.clone()
    }

    pub fn key_sequence_numbers(&self) -> Vec<u64> {
        let state = self.state.lock().unwrap();
        state
            .account
            .iter()
            .flat_map(|account| account.keys.iter().map(|key| key.sequence_number))
            .collect()
    }

    fn accept(state: &mut StubState, tx: &SignedTransaction) -> Result<Identifier, LedgerError> {
        let proposal = tx.payload.proposal_key;
        let account = state
            .account
            .as_mut()
            .filter(|account| account.address == proposal.address)
            .ok_or_else(|| LedgerError::NotFound(proposal.address.to_string()))?;
        let key = account
            .keys
            .iter_mut()
            .find(|key| key.index == proposal.key_index)
            .ok_or_else(|| LedgerError::Rejected(format!("unknown key {}", proposal.key_index)))?;

        if key.sequence_number != proposal.sequence_number {
            return Err(LedgerError::Rejected(format!(
                "key {} expected sequence {}, got {}",
                key.index, key.sequence_number, proposal.sequence_number
            )));
        }
        key.sequence_number += 1;

        if tx.payload.script == ADD_KEYS_SCRIPT.as_bytes() {
            if let Some(Value::UInt32(count)) = tx.payload.arguments.get(1) {
                let template = account.keys[0].clone();
                let next = account.keys.len() as u32;
                for index in next..next + count {
                    account.keys.push(AccountKey {
                        index,
                        sequence_number: 0,
                        weight: 0,
                        ..template.clone()
                    });
                }
            }
        }

        let id = tx.id();
        state.submitted.push(tx.clone());
        if !state.results.contains_key(&id) {
            let result = match &state.execution_error {
                Some(err) => TransactionResult::sealed_with_error(err.clone()),
                None => TransactionResult::sealed(),
            };
            state.results.insert(id, VecDeque::from([result]));
        }
        Ok(id)
    }
}

fn block_id(height: u64) -> Identifier {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&height.to_be_bytes());
    Identifier::new(bytes)
}

impl LedgerClient for StubLedger {
    async fn get_account(&self, address: &Address) -> Result<Account, LedgerError> {
        let state = self.state.lock().unwrap();
        state
            .account
            .clone()
            .filter(|account| account.address == *address)
            .ok_or_else(|| LedgerError::NotFound(address.to_string()))
    }

    async fn latest_block_header(&self) -> Result<BlockHeader, LedgerError> {
        let mut state = self.state.lock().unwrap();
        state.block_fetches += 1;
        if state.failing_block_fetches > 0 {
            state.failing_block_fetches -= 1;
            return Err(LedgerError::Transport("connection refused".into()));
        }
        Ok(BlockHeader {
            id: block_id(state.block_height),
            height: state.block_height,
        })
    }

    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<Identifier, LedgerError> {
        let delay = self.state.lock().unwrap().submit_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state.lock().unwrap();
        if state.fail_submissions {
            return Err(LedgerError::Transport("connection reset".into()));
        }
        Self::accept(&mut state, tx)
    }

    async fn transaction_result(&self, id: &Identifier) -> Result<TransactionResult, LedgerError> {
        let mut state = self.state.lock().unwrap();
        *state.lookups.entry(*id).or_default() += 1;
        let results = state
            .results
            .get_mut(id)
            .ok_or_else(|| LedgerError::NotFound(id.to_string()))?;

        let result = if results.len() > 1 {
            results.pop_front()
        } else {
            results.front().cloned()
        };
        result.ok_or_else(|| LedgerError::NotFound(id.to_string()))
    }
}
