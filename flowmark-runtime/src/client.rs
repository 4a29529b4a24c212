//! [`LedgerClient`] over the ledger access REST API.
use crate::error::RuntimeError;
use flowmark::{
    account_path, transaction_result_path, Account, Address, ApiError, BlockHeader, Identifier,
    LedgerClient, LedgerError, SignedTransaction, SubmitResponse, TransactionResult,
    LATEST_BLOCK_PATH, TRANSACTIONS_PATH,
};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
#[allow(unused)]
use tracing::{debug, trace, warn};

/// Upper bound on a single request, connection setup included.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpLedgerClient {
    base_url: String,
    http: Client,
}

impl HttpLedgerClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, RuntimeError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, LedgerError> {
        trace!("GET {path}");
        let res = self
            .http
            .get(self.url(path))
            .send()
            .await
            .map_err(transport)?;
        decode(res).await
    }
}

impl LedgerClient for HttpLedgerClient {
    async fn get_account(&self, address: &Address) -> Result<Account, LedgerError> {
        self.get(&account_path(address)).await
    }

    async fn latest_block_header(&self) -> Result<BlockHeader, LedgerError> {
        self.get(LATEST_BLOCK_PATH).await
    }

    async fn submit_transaction(&self, tx: &SignedTransaction) -> Result<Identifier, LedgerError> {
        let res = self
            .http
            .post(self.url(TRANSACTIONS_PATH))
            .json(tx)
            .send()
            .await
            .map_err(transport)?;
        let SubmitResponse { id } = decode(res).await?;
        debug!("Submitted transaction {id}");
        Ok(id)
    }

    async fn transaction_result(&self, id: &Identifier) -> Result<TransactionResult, LedgerError> {
        self.get(&transaction_result_path(id)).await
    }
}

fn transport(err: reqwest::Error) -> LedgerError {
    LedgerError::Transport(err.to_string())
}

/// Maps the response to the body on success, or to a [`LedgerError`] by status class.
async fn decode<T: DeserializeOwned>(res: Response) -> Result<T, LedgerError> {
    let status = res.status();
    if status.is_success() {
        return res
            .json()
            .await
            .map_err(|err| LedgerError::Decode(err.to_string()));
    }

    let message = match res.json::<ApiError>().await {
        Ok(body) => body.message,
        Err(_) => status.to_string(),
    };

    Err(match status {
        StatusCode::NOT_FOUND => LedgerError::NotFound(message),
        StatusCode::REQUEST_TIMEOUT | StatusCode::TOO_MANY_REQUESTS => {
            LedgerError::Transport(message)
        }
        s if s.is_client_error() => LedgerError::Rejected(message),
        _ => LedgerError::Transport(message),
    })
}
