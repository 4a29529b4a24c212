use crate::config::{
    ConfigOverrides, ConfigSources, DEFAULT_BENCHMARK_CONFIG, DEFAULT_TRANSACTION_CONFIG,
};
use clap::{Args, Parser, Subcommand};
use flowmark::Address;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "flowmark", version, about = "Transaction throughput benchmarks for ledgers")]
pub struct FlowmarkCli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run every configured round and report the results.
    Start(ConfigArgs),

    /// Print the resolved configuration with private keys masked.
    Config(ConfigArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Benchmark configuration file.
    #[arg(short, long, default_value = DEFAULT_BENCHMARK_CONFIG)]
    pub config: PathBuf,

    /// Transaction configuration file.
    #[arg(short, long, default_value = DEFAULT_TRANSACTION_CONFIG)]
    pub transaction: PathBuf,

    /// `emulator`, `testnet`, `mainnet` or the base URL of a ledger access service.
    #[arg(short, long)]
    pub network: Option<String>,

    #[arg(long)]
    pub payer_address: Option<Address>,

    /// Hex encoded private key of the payer.
    #[arg(long)]
    pub private_key: Option<String>,

    /// How long a transaction is polled before it counts as timed out; `0s` waits forever.
    #[arg(long, value_parser = humantime::parse_duration)]
    pub settlement_timeout: Option<Duration>,
}

impl ConfigArgs {
    pub fn sources(&self) -> ConfigSources {
        ConfigSources {
            benchmark: self.config.clone(),
            transaction: self.transaction.clone(),
        }
    }

    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            network: self.network.clone(),
            payer_address: self.payer_address,
            private_key: self.private_key.clone(),
            settlement_timeout: self.settlement_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_uses_default_files() {
        let cli = FlowmarkCli::try_parse_from(["flowmark", "start"]).unwrap();
        let Command::Start(args) = cli.command else {
            panic!("expected start");
        };
        assert_eq!(args.sources(), ConfigSources::default());
        assert!(args.overrides().network.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let cli = FlowmarkCli::try_parse_from([
            "flowmark",
            "start",
            "--config",
            "bench/b.yaml",
            "-t",
            "bench/t.yaml",
            "--network",
            "http://10.0.0.2:8888",
            "--payer-address",
            "0x01",
            "--settlement-timeout",
            "1m 30s",
        ])
        .unwrap();
        let Command::Start(args) = cli.command else {
            panic!("expected start");
        };

        assert_eq!(args.sources().benchmark, PathBuf::from("bench/b.yaml"));
        let overrides = args.overrides();
        assert_eq!(overrides.network.as_deref(), Some("http://10.0.0.2:8888"));
        assert_eq!(
            overrides.payer_address.map(|a| a.to_string()).as_deref(),
            Some("0x0000000000000001")
        );
        assert_eq!(overrides.settlement_timeout, Some(Duration::from_secs(90)));
    }

    #[test]
    fn malformed_address_is_rejected() {
        let res = FlowmarkCli::try_parse_from(["flowmark", "config", "--payer-address", "0xzz"]);
        assert!(res.is_err());
    }
}
