//! Command line runtime for FlowMark: configuration loading, the HTTP ledger client and reporting.
pub mod cli;
pub mod client;
pub mod config;
pub mod report;
pub mod runtime;

mod error;

pub use crate::client::HttpLedgerClient;
pub use crate::error::RuntimeError;
pub use crate::runtime::FlowmarkRuntime;

/// Log filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "flowmark=info";
