use anyhow::Context;
use clap::Parser;
use flowmark_core::{Address, HashAlgorithm, PrivateKey, SignatureAlgorithm};
use mock_ledger::{MockLedger, MockSettings};
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Local ledger double speaking the ledger access API.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    #[arg(long, default_value = "127.0.0.1:8888")]
    listen: SocketAddr,

    /// Address of the service account.
    #[arg(long, default_value = "0xf8d6e0586b0a20c7")]
    address: Address,

    /// Hex private key whose public key is installed on the service account.
    #[arg(long)]
    private_key: String,

    /// Number of keys the service account starts with.
    #[arg(long, default_value_t = 1)]
    keys: u32,

    #[arg(long, default_value = "200ms", value_parser = humantime::parse_duration)]
    seal_after: Duration,

    #[arg(long, default_value = "0s", value_parser = humantime::parse_duration)]
    seal_jitter: Duration,

    /// Reject submissions above this rate.
    #[arg(long)]
    max_tps: Option<NonZeroU32>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("mock_ledger=info,tower_http=warn")),
        )
        .init();

    let args = Args::parse();
    let key = PrivateKey::from_hex(SignatureAlgorithm::EcdsaSecp256k1, &args.private_key)
        .context("invalid --private-key")?;

    let ledger = MockLedger::new(MockSettings {
        seal_after: args.seal_after,
        seal_jitter: args.seal_jitter,
        max_tps: args.max_tps,
        ..Default::default()
    });
    ledger.create_account_at(
        args.address,
        &key.public_key(),
        args.keys,
        HashAlgorithm::default(),
    );

    mock_ledger::run(ledger, args.listen).await
}
