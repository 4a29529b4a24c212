//! Default FlowMark runtime.
//!
//! Resolves the configuration, connects to the ledger over HTTP, runs the benchmark and hands the
//! results to the configured reporters.
use crate::cli::{Command, ConfigArgs, FlowmarkCli};
use crate::client::HttpLedgerClient;
use crate::config::{self, LoadedConfig};
use crate::error::RuntimeError;
use crate::report::reporters;
use clap::Parser;
use flowmark::{Benchmark, BenchmarkReport};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, instrument, warn, Instrument};

/// # Example
///
/// ```no_run
/// use flowmark_runtime::FlowmarkRuntime;
///
/// #[tokio::main]
/// async fn main() {
///     FlowmarkRuntime::with_args().run().await.unwrap();
/// }
/// ```
pub struct FlowmarkRuntime {
    command: Command,
}

impl FlowmarkRuntime {
    pub fn new(command: Command) -> Self {
        Self { command }
    }

    /// Parse the command from the process arguments.
    pub fn with_args() -> Self {
        Self::new(FlowmarkCli::parse().command)
    }

    #[instrument(name = "flowmark", skip_all)]
    pub async fn run(self) -> Result<(), RuntimeError> {
        match self.command {
            Command::Start(args) => start(&args).await.map(|_| ()),
            Command::Config(args) => {
                print!("{}", render_config(&args)?);
                Ok(())
            }
        }
    }
}

/// Runs the benchmark described by `args` and reports it.
///
/// Ctrl-C cancels the run; the rounds finished so far are still reported.
pub async fn start(args: &ConfigArgs) -> Result<BenchmarkReport, RuntimeError> {
    let LoadedConfig { run, raw } = config::load(&args.sources(), &args.overrides())?;

    let url = run.benchmark.test.access_url()?;
    info!("Benchmarking {url}");
    let client = HttpLedgerClient::new(url)?;
    let reporters = reporters(&run);

    let benchmark = Benchmark::new(run, Arc::new(client))?;
    let interrupt = tokio::spawn(cancel_on_ctrl_c(benchmark.cancellation_token()).in_current_span());
    let report = benchmark.run().await;
    interrupt.abort();
    let report = report?;

    for reporter in reporters {
        reporter.report(&report, &raw)?;
    }

    Ok(report)
}

/// The resolved configuration as YAML, private keys masked.
pub fn render_config(args: &ConfigArgs) -> Result<String, RuntimeError> {
    let LoadedConfig { run, .. } = config::load(&args.sources(), &args.overrides())?;
    Ok(serde_yaml::to_string(&run.redacted())?)
}

async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    if tokio::signal::ctrl_c().await.is_ok() {
        warn!("Interrupted, cancelling the run");
        cancel.cancel();
    }
}
