use crate::{
    Address, BenchError, HashAlgorithm, SignatureAlgorithm, DEFAULT_BATCH_PAUSE,
    DEFAULT_BLOCK_FETCH_ATTEMPTS, DEFAULT_BLOCK_FETCH_BACKOFF, DEFAULT_GAS_LIMIT,
    DEFAULT_POLL_INTERVAL, DEFAULT_SETTLEMENT_TIMEOUT, EMULATOR_HOST, MAINNET_HOST, TESTNET_HOST,
};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

const REDACTED: &str = "<redacted>";

/// Fully resolved configuration of a benchmark run.
///
/// Built once at process start and handed to the engine by value. Nothing downstream reads
/// configuration from anywhere else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    pub benchmark: BenchmarkConfig,
    pub transaction: TransactionConfig,
}

impl RunConfig {
    pub fn validate(&self) -> Result<(), BenchError> {
        self.benchmark.validate()?;
        self.transaction.validate()?;
        Ok(())
    }

    /// Copy of the configuration with every private key masked, suitable for printing.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        let tx = &mut config.transaction;
        tx.payer.private_key = REDACTED.to_string();
        for role in [&mut tx.proposer, &mut tx.authorizer] {
            if role.private_key.is_some() {
                role.private_key = Some(REDACTED.to_string());
            }
        }
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkConfig {
    pub test: TestConfig,
    #[serde(default)]
    pub key_generation: KeyGenerationConfig,
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,
    #[serde(default)]
    pub retry_settings: RetrySettings,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub reporting_and_output: ReportingConfig,
}

impl BenchmarkConfig {
    pub fn validate(&self) -> Result<(), BenchError> {
        self.test.access_url()?;

        if self.test.rounds.is_empty() {
            return Err(BenchError::configuration("at least one round is required"));
        }

        for (idx, round) in self.test.rounds.iter().enumerate() {
            if round.label.trim().is_empty() {
                return Err(BenchError::configuration(format!(
                    "round #{idx} has an empty label"
                )));
            }
            if round.rate_control.tx_number == 0 {
                return Err(BenchError::configuration(format!(
                    "round `{}` must send at least one transaction",
                    round.label
                )));
            }
        }

        if self.retry_settings.max_retry_attempts == 0 {
            return Err(BenchError::configuration(
                "retrySettings.maxRetryAttempts must be at least 1",
            ));
        }

        if self.settlement.poll_interval.is_zero() {
            return Err(BenchError::configuration(
                "settlement.pollInterval must be greater than zero",
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `emulator` or the base URL of a ledger access service.
    pub network: String,
    pub rounds: Vec<Round>,
}

impl TestConfig {
    pub fn access_url(&self) -> Result<String, BenchError> {
        let network = self.network.trim();
        match network {
            "emulator" => Ok(EMULATOR_HOST.to_string()),
            "testnet" => Ok(TESTNET_HOST.to_string()),
            "mainnet" => Ok(MAINNET_HOST.to_string()),
            url if url.starts_with("http://") || url.starts_with("https://") => {
                Ok(url.trim_end_matches('/').to_string())
            }
            other => Err(BenchError::configuration(format!(
                "unknown network `{other}`; use `emulator`, `testnet`, `mainnet` or an http(s) URL"
            ))),
        }
    }
}

/// One benchmark phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub rate_control: RateControl,
}

impl Round {
    pub fn new(label: &str, tx_number: u32, tps: NonZeroU32) -> Self {
        Self {
            label: label.to_string(),
            description: String::new(),
            rate_control: RateControl { tx_number, tps },
        }
    }

    pub fn tx_count(&self) -> u32 {
        self.rate_control.tx_number
    }

    pub fn tps(&self) -> NonZeroU32 {
        self.rate_control.tps
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateControl {
    pub tx_number: u32,
    pub tps: NonZeroU32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyGenerationConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Upper bound on the number of proposal keys the account is grown to.
    #[serde(default)]
    pub max_keys: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DispatchStrategyKind {
    #[default]
    FixedInterval,
    Batched,
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConcurrencyConfig {
    #[serde(default)]
    pub strategy: DispatchStrategyKind,
    /// Tasks admitted per batch. Defaults to the round's target rate.
    #[serde(default)]
    pub batch_size: Option<NonZeroU32>,
    #[serde(default = "default_batch_pause")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub batch_pause: Duration,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            strategy: DispatchStrategyKind::default(),
            batch_size: None,
            batch_pause: DEFAULT_BATCH_PAUSE,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrySettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "default_retry_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub retry_interval: Duration,
}

impl RetrySettings {
    /// Number of reference block fetch attempts per transaction.
    pub fn attempts(&self) -> u32 {
        if self.enabled {
            self.max_retry_attempts.max(1)
        } else {
            1
        }
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            max_retry_attempts: DEFAULT_BLOCK_FETCH_ATTEMPTS,
            retry_interval: DEFAULT_BLOCK_FETCH_BACKOFF,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementConfig {
    #[serde(default = "default_poll_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub poll_interval: Duration,
    /// Zero disables the bound.
    #[serde(default = "default_settlement_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub timeout: Duration,
}

impl SettlementConfig {
    pub fn bound(&self) -> Option<Duration> {
        (!self.timeout.is_zero()).then_some(self.timeout)
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_SETTLEMENT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportingConfig {
    #[serde(default = "default_true")]
    pub print_stats_table: bool,
    #[serde(default = "default_true")]
    pub generate_report: bool,
    #[serde(default = "default_report_path")]
    pub report_path: PathBuf,
}

impl Default for ReportingConfig {
    fn default() -> Self {
        Self {
            print_stats_table: true,
            generate_report: true,
            report_path: default_report_path(),
        }
    }
}

/// Template every benchmark transaction is built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionConfig {
    pub script_path: PathBuf,
    /// Script source, loaded from `script_path` by the configuration loader.
    #[serde(skip)]
    pub script: Vec<u8>,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default)]
    pub script_arguments: Vec<ArgumentSpec>,
    pub payer: PayerConfig,
    #[serde(default)]
    pub proposer: RoleConfig,
    #[serde(default)]
    pub authorizer: RoleConfig,
    #[serde(default)]
    pub signature_algorithm: SignatureAlgorithm,
    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
}

impl TransactionConfig {
    pub fn validate(&self) -> Result<(), BenchError> {
        if self.script.is_empty() {
            return Err(BenchError::configuration(format!(
                "script `{}` is empty",
                self.script_path.display()
            )));
        }
        if self.gas_limit == 0 {
            return Err(BenchError::configuration("gasLimit must be greater than zero"));
        }
        for (name, role) in [("proposer", &self.proposer), ("authorizer", &self.authorizer)] {
            if !role.use_same_account && (role.address.is_none() || role.private_key.is_none()) {
                return Err(BenchError::configuration(format!(
                    "{name} needs an address and a private key unless `useSameAccount` is set"
                )));
            }
        }
        Ok(())
    }

    pub fn payer(&self) -> ResolvedRole {
        ResolvedRole {
            address: self.payer.address,
            private_key: self.payer.private_key.clone(),
            key_index: self.payer.key_index,
        }
    }

    /// The proposer's key index is chosen per transaction by the key pool; the value resolved
    /// here is only used for the account.
    pub fn proposer(&self) -> ResolvedRole {
        self.resolve(&self.proposer)
    }

    pub fn authorizer(&self) -> ResolvedRole {
        self.resolve(&self.authorizer)
    }

    fn resolve(&self, role: &RoleConfig) -> ResolvedRole {
        if role.use_same_account {
            return self.payer();
        }
        ResolvedRole {
            address: role.address.unwrap_or(self.payer.address),
            private_key: role
                .private_key
                .clone()
                .unwrap_or_else(|| self.payer.private_key.clone()),
            key_index: role.key_index.unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArgumentSpec {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayerConfig {
    pub address: Address,
    pub private_key: String,
    #[serde(default)]
    pub key_index: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleConfig {
    #[serde(default = "default_true")]
    pub use_same_account: bool,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub private_key: Option<String>,
    #[serde(default)]
    pub key_index: Option<u32>,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            use_same_account: true,
            address: None,
            private_key: None,
            key_index: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedRole {
    pub address: Address,
    pub private_key: String,
    pub key_index: u32,
}

fn default_true() -> bool {
    true
}

fn default_batch_pause() -> Duration {
    DEFAULT_BATCH_PAUSE
}

fn default_retry_attempts() -> u32 {
    DEFAULT_BLOCK_FETCH_ATTEMPTS
}

fn default_retry_interval() -> Duration {
    DEFAULT_BLOCK_FETCH_BACKOFF
}

fn default_poll_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

fn default_settlement_timeout() -> Duration {
    DEFAULT_SETTLEMENT_TIMEOUT
}

fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}

fn default_report_path() -> PathBuf {
    PathBuf::from("report.json")
}
