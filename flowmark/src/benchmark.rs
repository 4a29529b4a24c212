//! Round orchestration.
use crate::aggregator::StatsAggregator;
use crate::builder::TransactionBuilder;
use crate::dispatcher::{DispatchStrategy, Dispatcher};
use crate::key_pool::KeyPool;
use crate::settlement::SettlementTracker;
use flowmark_core::{
    BenchError, LedgerClient, Round, RoundStats, RunConfig, RunSummary, TransactionRecord,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn};

/// Results of a whole benchmark run.
#[derive(Debug, Clone)]
pub struct BenchmarkReport {
    pub rounds: Vec<RoundStats>,
    pub elapsed: Duration,
}

impl BenchmarkReport {
    pub fn summary(&self) -> RunSummary {
        RunSummary::new(&self.rounds)
    }
}

/// Runs the configured rounds in declaration order against one ledger.
pub struct Benchmark<C> {
    config: RunConfig,
    client: Arc<C>,
    builder: Arc<TransactionBuilder<C>>,
    tracker: Arc<SettlementTracker<C>>,
    cancel: CancellationToken,
}

impl<C> Benchmark<C>
where
    C: LedgerClient + Sync + 'static,
{
    /// Validates `config` and decodes its keys. Any error here is a configuration error.
    pub fn new(config: RunConfig, client: Arc<C>) -> Result<Self, BenchError> {
        config.validate()?;

        let builder = TransactionBuilder::new(
            client.clone(),
            &config.transaction,
            &config.benchmark.retry_settings,
        )?;
        let tracker = SettlementTracker::new(client.clone(), &config.benchmark.settlement);

        Ok(Self {
            config,
            client,
            builder: Arc::new(builder),
            tracker: Arc::new(tracker),
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    /// Token that aborts the run. In-flight transactions report as failed or cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs every round. Only configuration errors abort the run; any other round failure is
    /// reported as a round whose transactions all failed.
    #[instrument(name = "benchmark", skip_all, fields(name = self.config.benchmark.test.name))]
    pub async fn run(&self) -> Result<BenchmarkReport, BenchError> {
        let start = Instant::now();
        let rounds = &self.config.benchmark.test.rounds;
        info!("Running {} rounds", rounds.len());

        let mut stats = Vec::with_capacity(rounds.len());
        for round in rounds {
            if self.cancel.is_cancelled() {
                warn!("Run cancelled before round `{}`", round.label);
                break;
            }

            match self.run_round(round).await {
                Ok(round_stats) => stats.push(round_stats),
                Err(err) if err.is_fatal() => {
                    error!("Aborting run: {err}");
                    return Err(err);
                }
                Err(err) => {
                    error!("Round `{}` failed: {err}", round.label);
                    stats.push(failed_round(round, &err));
                }
            }
        }

        info!("Benchmark complete");
        Ok(BenchmarkReport {
            rounds: stats,
            elapsed: start.elapsed(),
        })
    }

    /// Snapshots the proposer account, optionally provisions keys, dispatches every transaction
    /// of `round` and folds the records into statistics.
    #[instrument(name = "round", skip_all, fields(label = round.label))]
    pub async fn run_round(&self, round: &Round) -> Result<RoundStats, BenchError> {
        info!(
            "Starting round `{}`: {} transactions at {} tps",
            round.label,
            round.tx_count(),
            round.tps()
        );

        let address = self.builder.proposer_address();
        let snapshot = self.client.get_account(&address).await?;
        let pool = Arc::new(KeyPool::new(&snapshot)?);
        let strategy = DispatchStrategy::new(&self.config.benchmark.concurrency, round);

        let key_generation = &self.config.benchmark.key_generation;
        if key_generation.enabled {
            let mut requested = strategy.concurrency(round);
            if let Some(max_keys) = key_generation.max_keys {
                requested = requested.min(max_keys as usize);
            }

            // NOTE: Provisioning is an optimization; the round still runs on the keys it has.
            if let Err(err) = pool
                .provision(
                    self.client.as_ref(),
                    &self.builder,
                    &self.tracker,
                    requested,
                    &self.cancel,
                )
                .await
            {
                warn!("Key provisioning failed, continuing with {} keys: {err}", pool.available());
            }
        }

        let dispatcher = Dispatcher::new(
            self.client.clone(),
            pool,
            self.builder.clone(),
            self.tracker.clone(),
            strategy,
            self.cancel.child_token(),
        );
        let dispatched = dispatcher.dispatch(round).await;

        let mut aggregator = StatsAggregator::new(round);
        for record in dispatched.records {
            aggregator.record(record);
        }
        let ended = aggregator.last_ended().unwrap_or_else(Instant::now);
        let stats = aggregator.finalize(dispatched.started, ended);

        info!(
            "Round `{}` finished in {}: {} sealed, {} failed",
            stats.label,
            humantime::format_duration(round_duration(stats.duration)),
            stats.successful_tx,
            stats.failed_tx
        );

        Ok(stats)
    }
}

/// Statistics of a round that could not be dispatched at all.
fn failed_round(round: &Round, err: &BenchError) -> RoundStats {
    let now = Instant::now();
    let mut aggregator = StatsAggregator::new(round);
    for slot in 0..round.tx_count() as usize {
        aggregator.record(TransactionRecord::failed(slot, err));
    }
    aggregator.finalize(now, now)
}

fn round_duration(duration: Duration) -> Duration {
    Duration::from_millis(duration.as_millis() as u64)
}
