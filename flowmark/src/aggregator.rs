use flowmark_core::{
    Identifier, LatencyQuantiles, LatencySummary, Round, RoundStats, TransactionRecord,
};
use pdatastructs::tdigest::{TDigest, K1};
use std::time::Duration;
use tokio::time::Instant;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

const TDIGEST_BACKLOG_SIZE: usize = 100;

/// Running min/max/sum over latency samples.
#[derive(Debug, Clone, Copy, Default)]
struct LatencyTracker {
    min: Option<Duration>,
    max: Duration,
    sum: Duration,
}

impl LatencyTracker {
    fn push(&mut self, latency: Duration) {
        self.min = Some(self.min.map_or(latency, |min| min.min(latency)));
        self.max = self.max.max(latency);
        self.sum += latency;
    }

    fn summary(&self, count: u64) -> LatencySummary {
        let avg = if count == 0 {
            Duration::ZERO
        } else {
            Duration::from_nanos((self.sum.as_nanos() / u128::from(count)) as u64)
        };
        LatencySummary {
            min: self.min.unwrap_or_default(),
            max: self.max,
            avg,
        }
    }
}

/// Folds the records of one round into [`RoundStats`].
///
/// Latency statistics only consider successful records. Failed records carry zero latency and
/// would otherwise drag the minimum and average down. The seal rate divides every attempt by the
/// settlement time of every attempt, so settled errors and timeouts still count.
pub struct StatsAggregator {
    label: String,
    description: String,
    target_tps: u32,
    total: u64,
    successful: u64,
    send: LatencyTracker,
    settlement: LatencyTracker,
    total_settlement: Duration,
    digest: TDigest<K1>,
    tx_ids: Vec<Identifier>,
    last_ended: Option<Instant>,
}

impl StatsAggregator {
    pub fn new(round: &Round) -> Self {
        Self {
            label: round.label.clone(),
            description: round.description.clone(),
            target_tps: round.tps().get(),
            total: 0,
            successful: 0,
            send: LatencyTracker::default(),
            settlement: LatencyTracker::default(),
            total_settlement: Duration::ZERO,
            digest: TDigest::new(K1::new(10.), TDIGEST_BACKLOG_SIZE),
            tx_ids: vec![],
            last_ended: None,
        }
    }

    pub fn record(&mut self, record: TransactionRecord) {
        self.total += 1;
        self.last_ended = Some(match self.last_ended {
            Some(last) => last.max(record.ended_at),
            None => record.ended_at,
        });

        if let Some(id) = record.id {
            self.tx_ids.push(id);
        }
        self.total_settlement += record.settlement_latency;

        if !record.is_success() {
            trace!("Slot {} failed: {}", record.slot, record.outcome);
            return;
        }

        self.successful += 1;
        self.send.push(record.send_latency);
        self.settlement.push(record.settlement_latency);
        self.digest.insert(record.settlement_latency.as_secs_f64());
    }

    /// Latest completion instant seen so far.
    pub fn last_ended(&self) -> Option<Instant> {
        self.last_ended
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    /// Computes the round statistics. Does not mutate the aggregator; calling it twice yields
    /// the same result.
    pub fn finalize(&self, started: Instant, ended: Instant) -> RoundStats {
        let duration = ended.saturating_duration_since(started);
        let failed = self.total - self.successful;

        let send_rate = per_second(self.total, duration);
        let throughput = per_second(self.successful, duration);
        let seal_rate = per_second(self.total, self.total_settlement);

        RoundStats {
            label: self.label.clone(),
            description: self.description.clone(),
            target_tps: self.target_tps,
            total_tx: self.total,
            successful_tx: self.successful,
            failed_tx: failed,
            send_rate,
            seal_rate,
            throughput,
            duration,
            send_latency: self.send.summary(self.successful),
            settlement_latency: self.settlement.summary(self.successful),
            settlement_quantiles: LatencyQuantiles {
                p50: self.quantile(0.5),
                p90: self.quantile(0.9),
                p99: self.quantile(0.99),
            },
            tx_ids: self.tx_ids.clone(),
        }
    }

    fn quantile(&self, q: f64) -> Duration {
        if self.successful == 0 {
            return Duration::ZERO;
        }

        let secs = self.digest.quantile(q);
        if secs.is_nan() {
            error!("Latency quantile {q} is NaN over {} samples", self.successful);
            return Duration::ZERO;
        }
        Duration::from_secs_f64(secs.max(0.))
            .clamp(self.settlement.min.unwrap_or_default(), self.settlement.max)
    }
}

fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0. {
        count as f64 / secs
    } else {
        0.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowmark_core::TxOutcome;
    use std::num::NonZeroU32;

    fn round() -> Round {
        Round::new("warmup", 10, NonZeroU32::new(5).unwrap())
    }

    fn sealed(slot: usize, send_ms: u64, settle_ms: u64, ended_at: Instant) -> TransactionRecord {
        TransactionRecord {
            slot,
            id: Some(Identifier::new([slot as u8; 32])),
            send_latency: Duration::from_millis(send_ms),
            settlement_latency: Duration::from_millis(settle_ms),
            outcome: TxOutcome::Sealed,
            ended_at,
        }
    }

    #[test]
    fn latency_bounds_hold() {
        let start = Instant::now();
        let mut aggregator = StatsAggregator::new(&round());
        aggregator.record(sealed(0, 5, 100, start + Duration::from_millis(500)));
        aggregator.record(sealed(1, 7, 300, start + Duration::from_millis(900)));
        aggregator.record(sealed(2, 6, 200, start + Duration::from_millis(1_000)));
        aggregator.record(TransactionRecord::failed(3, "rejected"));

        let stats = aggregator.finalize(start, start + Duration::from_secs(2));

        assert_eq!(stats.total_tx, 4);
        assert_eq!(stats.successful_tx + stats.failed_tx, stats.total_tx);
        assert_eq!(stats.failed_tx, 1);
        assert_eq!(stats.min_latency(), Duration::from_millis(100));
        assert_eq!(stats.max_latency(), Duration::from_millis(300));
        assert_eq!(stats.average_latency(), Duration::from_millis(200));
        assert!(stats.min_latency() <= stats.average_latency());
        assert!(stats.average_latency() <= stats.max_latency());
        assert_eq!(stats.send_latency.min, Duration::from_millis(5));
        assert_eq!(stats.send_rate, 2.);
        assert_eq!(stats.throughput, 1.5);
        assert!((stats.seal_rate - 4. / 0.6).abs() < 1e-9);
        assert_eq!(stats.tx_ids.len(), 3);

        let q = stats.settlement_quantiles;
        assert!(q.p50 <= q.p90 && q.p90 <= q.p99);
        assert!(q.p99 <= stats.max_latency());
        assert!(q.p50 >= stats.min_latency());
    }

    #[test]
    fn finalize_is_idempotent() {
        let start = Instant::now();
        let mut aggregator = StatsAggregator::new(&round());
        aggregator.record(sealed(0, 5, 100, start));
        aggregator.record(sealed(1, 5, 150, start));

        let end = start + Duration::from_secs(1);
        assert_eq!(aggregator.finalize(start, end), aggregator.finalize(start, end));
    }

    #[test]
    fn no_successes_yields_zero_latencies() {
        let start = Instant::now();
        let mut aggregator = StatsAggregator::new(&round());
        for slot in 0..3 {
            aggregator.record(TransactionRecord::failed(slot, "boom"));
        }

        let stats = aggregator.finalize(start, start);
        assert_eq!(stats.successful_tx, 0);
        assert_eq!(stats.failed_tx, 3);
        assert_eq!(stats.min_latency(), Duration::ZERO);
        assert_eq!(stats.average_latency(), Duration::ZERO);
        assert_eq!(stats.send_rate, 0.);
        assert_eq!(stats.seal_rate, 0.);
        assert_eq!(stats.settlement_quantiles, LatencyQuantiles::default());
    }

    #[test]
    fn seal_rate_counts_settled_errors_and_timeouts() {
        let start = Instant::now();
        let mut aggregator = StatsAggregator::new(&round());
        for slot in 0..3 {
            aggregator.record(TransactionRecord {
                outcome: TxOutcome::SealedWithError("assertion failed".to_string()),
                ..sealed(slot, 5, 1_000, start)
            });
        }
        aggregator.record(TransactionRecord {
            outcome: TxOutcome::TimedOut,
            ..sealed(3, 5, 1_000, start)
        });

        let stats = aggregator.finalize(start, start + Duration::from_secs(2));

        assert_eq!(stats.successful_tx, 0);
        assert_eq!(stats.failed_tx, 4);
        assert_eq!(stats.send_rate, 2.);
        assert_eq!(stats.seal_rate, 1.);
        assert_eq!(stats.average_latency(), Duration::ZERO);
    }

    #[test]
    fn mixed_outcomes_share_the_seal_rate() {
        let start = Instant::now();
        let mut aggregator = StatsAggregator::new(&round());
        aggregator.record(sealed(0, 5, 500, start));
        aggregator.record(TransactionRecord {
            outcome: TxOutcome::SealedWithError("panic".to_string()),
            ..sealed(1, 5, 1_500, start)
        });

        let stats = aggregator.finalize(start, start + Duration::from_secs(1));

        assert_eq!(stats.seal_rate, 1.);
        assert_eq!(stats.max_latency(), Duration::from_millis(500));
    }

    #[test]
    fn last_ended_tracks_latest_record() {
        let start = Instant::now();
        let mut aggregator = StatsAggregator::new(&round());
        aggregator.record(sealed(0, 1, 1, start + Duration::from_millis(30)));
        aggregator.record(sealed(1, 1, 1, start + Duration::from_millis(10)));
        assert_eq!(aggregator.last_ended(), Some(start + Duration::from_millis(30)));
    }
}
