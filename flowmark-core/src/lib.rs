mod api;
mod config;
mod constants;
mod crypto;
mod error;
mod ledger;
mod stats;
mod transaction;
mod value;

pub use api::*;
pub use config::*;
pub use constants::*;
pub use crypto::*;
pub use error::*;
pub use ledger::*;
pub use stats::*;
pub use transaction::*;
pub use value::*;
