use flowmark_runtime::{FlowmarkRuntime, DEFAULT_LOG_FILTER};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    match FlowmarkRuntime::with_args().run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is_configuration() => {
            error!("Configuration error, no transactions were sent: {err}");
            ExitCode::FAILURE
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
