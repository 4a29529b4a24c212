#![cfg_attr(docsrs, feature(doc_cfg))]
//! Rate-controlled transaction benchmarking against an account-based ledger.
//!
//! A [`Benchmark`] runs a sequence of rounds. Each round sends a fixed number of signed
//! transactions at a target rate, tracks every one of them to settlement, and reduces the
//! outcomes into [`RoundStats`](flowmark_core::RoundStats).
//!
//! ```no_run
//! # use flowmark::{Benchmark, LedgerClient, RunConfig};
//! # use std::sync::Arc;
//! # async fn run<C: LedgerClient + Sync + 'static>(config: RunConfig, client: C) {
//! let benchmark = Benchmark::new(config, Arc::new(client)).unwrap();
//! let report = benchmark.run().await.unwrap();
//! for row in report.summary().rows {
//!     println!("{}: {:.2} tx/s", row.label, row.send_rate);
//! }
//! # }
//! ```
use std::future::Future;
use tokio_util::sync::CancellationToken;

pub mod aggregator;
pub mod benchmark;
pub mod builder;
pub mod dispatcher;
pub mod key_pool;
pub mod settlement;

#[cfg(test)]
pub(crate) mod testing;

pub use benchmark::{Benchmark, BenchmarkReport};
pub use flowmark_core::*;

/// Drives `fut` to completion unless `cancel` fires first.
pub(crate) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, BenchError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(BenchError::Cancelled),
        out = fut => Ok(out),
    }
}
