use crate::MockLedger;
use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use flowmark_core::{
    Account, Address, ApiError, BlockHeader, Identifier, LedgerClient, LedgerError,
    SignedTransaction, SubmitResponse, TransactionResult, ACCOUNTS_PATH, LATEST_BLOCK_PATH,
    TRANSACTIONS_PATH, TRANSACTION_RESULTS_PATH,
};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

pub fn router(ledger: MockLedger) -> Router {
    Router::new()
        .route(&format!("{ACCOUNTS_PATH}/:address"), get(get_account))
        .route(LATEST_BLOCK_PATH, get(latest_block))
        .route(TRANSACTIONS_PATH, post(submit_transaction))
        .route(
            &format!("{TRANSACTION_RESULTS_PATH}/:id"),
            get(transaction_result),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(ledger)
}

/// Serves `ledger` on an already bound listener until the task is dropped.
pub async fn serve(ledger: MockLedger, listener: TcpListener) -> anyhow::Result<()> {
    info!("Mock ledger listening on {}", listener.local_addr()?);
    axum::serve(listener, router(ledger)).await?;
    Ok(())
}

pub async fn run(ledger: MockLedger, addr: SocketAddr) -> anyhow::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    serve(ledger, listener).await
}

struct ApiFailure(LedgerError);

impl From<LedgerError> for ApiFailure {
    fn from(err: LedgerError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiFailure {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Rejected(_) | LedgerError::Decode(_) => StatusCode::BAD_REQUEST,
            LedgerError::Transport(_) => StatusCode::SERVICE_UNAVAILABLE,
        };
        let body = ApiError {
            message: self.0.message().to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[debug_handler]
async fn get_account(
    State(ledger): State<MockLedger>,
    Path(address): Path<Address>,
) -> Result<Json<Account>, ApiFailure> {
    Ok(Json(ledger.get_account(&address).await?))
}

#[debug_handler]
async fn latest_block(State(ledger): State<MockLedger>) -> Result<Json<BlockHeader>, ApiFailure> {
    Ok(Json(ledger.latest_block_header().await?))
}

#[debug_handler]
async fn submit_transaction(
    State(ledger): State<MockLedger>,
    Json(tx): Json<SignedTransaction>,
) -> Result<Json<SubmitResponse>, ApiFailure> {
    let id = ledger.submit_transaction(&tx).await?;
    Ok(Json(SubmitResponse { id }))
}

#[debug_handler]
async fn transaction_result(
    State(ledger): State<MockLedger>,
    Path(id): Path<Identifier>,
) -> Result<Json<TransactionResult>, ApiFailure> {
    Ok(Json(ledger.transaction_result(&id).await?))
}
