//! Loading of the two YAML configuration files into a validated [`RunConfig`].
use crate::error::RuntimeError;
use flowmark::{Address, BenchmarkConfig, RunConfig, TransactionConfig};
use serde::de::DeserializeOwned;
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, info, warn};

pub const DEFAULT_BENCHMARK_CONFIG: &str = "benchmark.yaml";
pub const DEFAULT_TRANSACTION_CONFIG: &str = "transaction.yaml";

const PRIVATE_KEY_FIELD: &str = "privateKey";
const REDACTED: &str = "<redacted>";

/// Locations of the configuration files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSources {
    pub benchmark: PathBuf,
    pub transaction: PathBuf,
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self {
            benchmark: PathBuf::from(DEFAULT_BENCHMARK_CONFIG),
            transaction: PathBuf::from(DEFAULT_TRANSACTION_CONFIG),
        }
    }
}

/// Command line values that take precedence over the files.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub network: Option<String>,
    pub payer_address: Option<Address>,
    pub private_key: Option<String>,
    pub settlement_timeout: Option<Duration>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(network) = &self.network {
            config.benchmark.test.network = network.clone();
        }
        if let Some(address) = self.payer_address {
            config.transaction.payer.address = address;
        }
        if let Some(key) = &self.private_key {
            config.transaction.payer.private_key = key.clone();
        }
        if let Some(timeout) = self.settlement_timeout {
            config.benchmark.settlement.timeout = timeout;
        }
    }
}

/// Configuration files as they were read, embedded in the JSON report. Private keys are masked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawConfig {
    pub benchmark: String,
    pub transaction: String,
}

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub run: RunConfig,
    pub raw: RawConfig,
}

/// Reads both files, loads the transaction script, applies `overrides` and validates the result.
///
/// A relative `scriptPath` is resolved against the directory of the transaction file.
pub fn load(
    sources: &ConfigSources,
    overrides: &ConfigOverrides,
) -> Result<LoadedConfig, RuntimeError> {
    let (benchmark, raw_benchmark) = read_yaml::<BenchmarkConfig>(&sources.benchmark)?;
    let (mut transaction, raw_transaction) = read_yaml::<TransactionConfig>(&sources.transaction)?;

    let script_path = resolve_script(&sources.transaction, &transaction.script_path);
    debug!("Loading transaction script from {}", script_path.display());
    transaction.script = fs::read(&script_path).map_err(|source| RuntimeError::Read {
        path: script_path,
        source,
    })?;

    let mut run = RunConfig {
        benchmark,
        transaction,
    };
    overrides.apply(&mut run);
    run.validate()?;

    info!(
        "Loaded benchmark `{}` with {} rounds",
        run.benchmark.test.name,
        run.benchmark.test.rounds.len()
    );

    Ok(LoadedConfig {
        run,
        raw: RawConfig {
            benchmark: raw_benchmark,
            transaction: redact_private_keys(&raw_transaction).map_err(|source| {
                RuntimeError::Yaml {
                    path: sources.transaction.clone(),
                    source,
                }
            })?,
        },
    })
}

fn read_yaml<T: DeserializeOwned>(path: &Path) -> Result<(T, String), RuntimeError> {
    let raw = fs::read_to_string(path).map_err(|source| RuntimeError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let parsed = serde_yaml::from_str(&raw).map_err(|source| RuntimeError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    Ok((parsed, raw))
}

fn redact_private_keys(raw: &str) -> Result<String, serde_yaml::Error> {
    fn mask(value: &mut Value) {
        match value {
            Value::Mapping(map) => {
                for (key, value) in map.iter_mut() {
                    if key.as_str() == Some(PRIVATE_KEY_FIELD) {
                        *value = Value::String(REDACTED.to_string());
                    } else {
                        mask(value);
                    }
                }
            }
            Value::Sequence(items) => items.iter_mut().for_each(mask),
            _ => {}
        }
    }

    let mut value: Value = serde_yaml::from_str(raw)?;
    mask(&mut value);
    serde_yaml::to_string(&value)
}

fn resolve_script(transaction_config: &Path, script: &Path) -> PathBuf {
    if script.is_absolute() {
        return script.to_path_buf();
    }
    match transaction_config.parent() {
        Some(dir) => dir.join(script),
        None => script.to_path_buf(),
    }
}
