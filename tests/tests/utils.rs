use anyhow::Context;
use flowmark::{Address, HashAlgorithm, PrivateKey, SignatureAlgorithm};
use flowmark_runtime::cli::ConfigArgs;
use mock_ledger::{MockLedger, MockSettings};
use std::path::Path;
use std::sync::OnceLock;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tracing::error;
use tracing_subscriber::EnvFilter;

pub const PRIVATE_KEY: &str = "dd4ccf9ef501eee0ee0690550342e7c09e0e9d997d926f7a959e6f3b05b1c81a";
pub const ADDRESS: &str = "0xf8d6e0586b0a20c7";

pub const TRANSFER_SCRIPT: &str = r#"
transaction(amount: UFix64, to: Address) {
    prepare(signer: AuthAccount) {}
}
"#;

#[allow(unused)]
pub fn init() {
    static ONCE_LOCK: OnceLock<()> = OnceLock::new();

    ONCE_LOCK.get_or_init(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            default_panic(info);
            error!("Panic occurred: {info:?}");
        }));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new("flowmark=debug,mock_ledger=info"))
            .with_test_writer()
            .try_init();
    });
}

/// Mock ledger served over HTTP on an ephemeral port, with the benchmark account installed.
pub async fn spawn_ledger(settings: MockSettings, keys: u32) -> anyhow::Result<(MockLedger, String)> {
    let key = PrivateKey::from_hex(SignatureAlgorithm::EcdsaSecp256k1, PRIVATE_KEY)?;
    let address: Address = ADDRESS.parse()?;

    let ledger = MockLedger::new(settings);
    ledger.create_account_at(address, &key.public_key(), keys, HashAlgorithm::default());

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let url = format!("http://{}", listener.local_addr()?);
    tokio::spawn(mock_ledger::serve(ledger.clone(), listener));

    Ok((ledger, url))
}

/// Writes a benchmark, transaction and script file set into a fresh directory.
pub fn write_configs(benchmark: &str) -> anyhow::Result<(TempDir, ConfigArgs)> {
    let dir = tempfile::tempdir()?;
    write(dir.path(), "benchmark.yaml", benchmark)?;
    write(dir.path(), "scripts/transfer.cdc", TRANSFER_SCRIPT)?;
    write(
        dir.path(),
        "transaction.yaml",
        &format!(
            r#"
scriptPath: scripts/transfer.cdc
gasLimit: 9999
scriptArguments:
  - name: amount
    type: UFix64
    value: "0.5"
  - name: to
    type: Address
    value: "0x01"
payer:
  address: "{ADDRESS}"
  privateKey: "{PRIVATE_KEY}"
"#
        ),
    )?;

    let args = ConfigArgs {
        config: dir.path().join("benchmark.yaml"),
        transaction: dir.path().join("transaction.yaml"),
        network: None,
        payer_address: None,
        private_key: None,
        settlement_timeout: None,
    };
    Ok((dir, args))
}

fn write(dir: &Path, name: &str, contents: &str) -> anyhow::Result<()> {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))
}
