//! Rate-controlled dispatch of one round.
//!
//! Every logical transaction slot becomes its own task: lease a proposal key, build and sign,
//! submit, release the key, then wait for settlement. The dispatcher only controls when tasks
//! start. Each task reports exactly one [`TransactionRecord`], so a round always yields one record
//! per slot.
use crate::builder::TransactionBuilder;
use crate::cancellable;
use crate::key_pool::KeyPool;
use crate::settlement::SettlementTracker;
use flowmark_core::{
    ConcurrencyConfig, DispatchStrategyKind, LedgerClient, Round, TransactionRecord,
};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, instrument, trace, warn, Instrument};

/// How task starts are paced within a round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStrategy {
    /// One task every `1 / tps` seconds.
    FixedInterval,
    /// Up to `batch_size` tasks in flight; a pause separates consecutive batches.
    Batched {
        batch_size: NonZeroU32,
        pause: Duration,
    },
}

impl DispatchStrategy {
    pub fn new(config: &ConcurrencyConfig, round: &Round) -> Self {
        match config.strategy {
            DispatchStrategyKind::FixedInterval => Self::FixedInterval,
            DispatchStrategyKind::Batched => Self::Batched {
                batch_size: config.batch_size.unwrap_or(round.tps()),
                pause: config.batch_pause,
            },
        }
    }

    /// Upper bound on the number of simultaneously in-flight transactions of `round`.
    pub fn concurrency(&self, round: &Round) -> usize {
        let tx_count = round.tx_count() as usize;
        match self {
            Self::FixedInterval => tx_count,
            Self::Batched { batch_size, .. } => tx_count.min(batch_size.get() as usize),
        }
    }
}

/// Everything a send task needs, shared by all tasks of a round.
struct SendContext<C> {
    client: Arc<C>,
    pool: Arc<KeyPool>,
    builder: Arc<TransactionBuilder<C>>,
    tracker: Arc<SettlementTracker<C>>,
    cancel: CancellationToken,
}

pub struct Dispatcher<C> {
    ctx: Arc<SendContext<C>>,
    strategy: DispatchStrategy,
}

/// Records of a dispatched round, ordered by slot, plus the instant dispatch began.
pub struct Dispatched {
    pub started: Instant,
    pub records: Vec<TransactionRecord>,
}

impl<C> Dispatcher<C>
where
    C: LedgerClient + Sync + 'static,
{
    pub fn new(
        client: Arc<C>,
        pool: Arc<KeyPool>,
        builder: Arc<TransactionBuilder<C>>,
        tracker: Arc<SettlementTracker<C>>,
        strategy: DispatchStrategy,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            ctx: Arc::new(SendContext {
                client,
                pool,
                builder,
                tracker,
                cancel,
            }),
            strategy,
        }
    }

    /// Launches one task per transaction slot of `round` and waits for all of them to report.
    ///
    /// Slots that were never started because the dispatch was cancelled are reported as failed.
    #[instrument(name = "dispatch", skip_all, fields(round = round.label))]
    pub async fn dispatch(&self, round: &Round) -> Dispatched {
        let tx_count = round.tx_count() as usize;
        info!(
            "Dispatching {tx_count} transactions at {} tps ({:?})",
            round.tps(),
            self.strategy
        );

        let started = Instant::now();
        let mut tasks = JoinSet::new();
        let launched = match self.strategy {
            DispatchStrategy::FixedInterval => {
                self.launch_fixed_interval(&mut tasks, tx_count, round.tps())
                    .await
            }
            DispatchStrategy::Batched { batch_size, pause } => {
                self.launch_batched(&mut tasks, tx_count, batch_size, pause)
                    .await
            }
        };

        let mut records = Vec::with_capacity(tx_count);
        while let Some(res) = tasks.join_next().await {
            match res {
                Ok(record) => records.push(record),
                Err(err) => error!("Send supervisor failed: {err}"),
            }
        }

        if launched < tx_count {
            warn!("Dispatch cancelled after {launched} of {tx_count} transactions");
            records.extend(
                (launched..tx_count)
                    .map(|slot| TransactionRecord::failed(slot, "cancelled before launch")),
            );
        }

        records.sort_by_key(|record| record.slot);
        debug!("All {} transactions reported", records.len());

        Dispatched { started, records }
    }

    async fn launch_fixed_interval(
        &self,
        tasks: &mut JoinSet<TransactionRecord>,
        tx_count: usize,
        tps: NonZeroU32,
    ) -> usize {
        let limiter = rate_limiter(tps);
        for slot in 0..tx_count {
            if cancellable(&self.ctx.cancel, limiter.until_ready())
                .await
                .is_err()
            {
                return slot;
            }
            self.spawn(tasks, slot, None);
        }
        tx_count
    }

    async fn launch_batched(
        &self,
        tasks: &mut JoinSet<TransactionRecord>,
        tx_count: usize,
        batch_size: NonZeroU32,
        pause: Duration,
    ) -> usize {
        let batch_size = batch_size.get() as usize;
        let permits = Arc::new(Semaphore::new(batch_size));

        let mut slot = 0;
        while slot < tx_count {
            let batch_end = tx_count.min(slot + batch_size);
            trace!("Admitting slots {slot}..{batch_end}");

            while slot < batch_end {
                let Ok(Ok(permit)) =
                    cancellable(&self.ctx.cancel, permits.clone().acquire_owned()).await
                else {
                    return slot;
                };
                self.spawn(tasks, slot, Some(permit));
                slot += 1;
            }

            if slot < tx_count
                && cancellable(&self.ctx.cancel, tokio::time::sleep(pause))
                    .await
                    .is_err()
            {
                return slot;
            }
        }
        tx_count
    }

    /// Spawns the send task for `slot` under a supervisor that turns a panic or abort of the
    /// task into a failed record.
    fn spawn(
        &self,
        tasks: &mut JoinSet<TransactionRecord>,
        slot: usize,
        permit: Option<OwnedSemaphorePermit>,
    ) {
        let ctx = self.ctx.clone();
        let span = tracing::debug_span!("transaction", slot);
        tasks.spawn(async move {
            let handle = tokio::spawn(send_transaction(ctx, slot).instrument(span));
            let record = match handle.await {
                Ok(record) => record,
                Err(err) => {
                    error!("Send task for slot {slot} did not complete: {err}");
                    TransactionRecord::failed(slot, format!("send task aborted: {err}"))
                }
            };
            drop(permit);
            record
        });
    }
}

async fn send_transaction<C>(ctx: Arc<SendContext<C>>, slot: usize) -> TransactionRecord
where
    C: LedgerClient + Sync,
{
    trace!("Pending");
    let Ok(lease) = cancellable(&ctx.cancel, ctx.pool.acquire(slot)).await else {
        return TransactionRecord::failed(slot, "cancelled while waiting for a proposal key");
    };

    let tx = match ctx.builder.build(&lease, &ctx.cancel).await {
        Ok(tx) => tx,
        Err(err) => {
            warn!("Unable to build transaction: {err}");
            lease.release(false);
            return failed(slot, err);
        }
    };
    trace!("Built and signed");

    let submitted_at = Instant::now();
    let submitted = cancellable(&ctx.cancel, ctx.client.submit_transaction(&tx)).await;
    let send_latency = submitted_at.elapsed();
    let id = match submitted {
        Ok(Ok(id)) => {
            lease.release(true);
            id
        }
        Ok(Err(err)) => {
            warn!("Submission failed: {err}");
            lease.release(false);
            return failed(slot, err);
        }
        Err(err) => {
            lease.release(false);
            return failed(slot, err);
        }
    };
    debug!("Submitted {id}");

    let settlement = ctx.tracker.await_settlement(&id, &ctx.cancel).await;
    let record = TransactionRecord {
        slot,
        id: Some(id),
        send_latency,
        settlement_latency: settlement.settled_at.saturating_duration_since(submitted_at),
        outcome: settlement.status.into(),
        ended_at: settlement.settled_at,
    };
    debug!("Finished: {}", record.outcome);

    #[cfg(feature = "metrics")]
    {
        metrics::histogram!("flowmark_send_latency").record(record.send_latency.as_secs_f64());
        metrics::histogram!("flowmark_settlement_latency")
            .record(record.settlement_latency.as_secs_f64());
    }

    record
}

fn failed(slot: usize, reason: impl ToString) -> TransactionRecord {
    #[cfg(feature = "metrics")]
    metrics::counter!("flowmark_tx_failed").increment(1);

    TransactionRecord::failed(slot, reason)
}

fn rate_limiter(tps: NonZeroU32) -> DefaultDirectRateLimiter {
    RateLimiter::direct(Quota::per_second(tps).allow_burst(NonZeroU32::MIN))
}
