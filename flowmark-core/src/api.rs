//! Wire format of the ledger access API.
//!
//! All bodies are JSON. Failed requests answer with a non-2xx status and an [`ApiError`] body.
use crate::{Address, Identifier};
use serde::{Deserialize, Serialize};

pub const ACCOUNTS_PATH: &str = "/v1/accounts";
pub const LATEST_BLOCK_PATH: &str = "/v1/blocks/latest";
pub const TRANSACTIONS_PATH: &str = "/v1/transactions";
pub const TRANSACTION_RESULTS_PATH: &str = "/v1/transaction_results";

pub fn account_path(address: &Address) -> String {
    format!("{ACCOUNTS_PATH}/{address}")
}

pub fn transaction_result_path(id: &Identifier) -> String {
    format!("{TRANSACTION_RESULTS_PATH}/{id}")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}
