use crate::Identifier;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSecondsWithFrac};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// Terminal outcome of one send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxOutcome {
    Sealed,
    SealedWithError(String),
    TimedOut,
    /// The attempt never reached the ledger (build, signing or submission failure).
    Failed(String),
}

impl TxOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Sealed)
    }
}

impl fmt::Display for TxOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sealed => write!(f, "sealed"),
            Self::SealedWithError(err) => write!(f, "sealed with error: {err}"),
            Self::TimedOut => write!(f, "timed out"),
            Self::Failed(err) => write!(f, "failed: {err}"),
        }
    }
}

/// Outcome and timing of one send attempt.
#[derive(Debug, Clone)]
pub struct TransactionRecord {
    /// Logical index of the attempt within its round.
    pub slot: usize,
    pub id: Option<Identifier>,
    pub send_latency: Duration,
    pub settlement_latency: Duration,
    pub outcome: TxOutcome,
    pub ended_at: Instant,
}

impl TransactionRecord {
    pub fn failed(slot: usize, reason: impl ToString) -> Self {
        Self {
            slot,
            id: None,
            send_latency: Duration::ZERO,
            settlement_latency: Duration::ZERO,
            outcome: TxOutcome::Failed(reason.to_string()),
            ended_at: Instant::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

#[serde_as]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencySummary {
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub min: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub max: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub avg: Duration,
}

#[serde_as]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyQuantiles {
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub p50: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub p90: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub p99: Duration,
}

/// Finalized statistics of one round.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundStats {
    pub label: String,
    pub description: String,
    pub target_tps: u32,
    pub total_tx: u64,
    pub successful_tx: u64,
    pub failed_tx: u64,
    /// Attempts per second of wall-clock round time.
    pub send_rate: f64,
    /// Attempts per second of accumulated settlement time.
    pub seal_rate: f64,
    /// Successful transactions per second of wall-clock round time.
    pub throughput: f64,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub duration: Duration,
    pub send_latency: LatencySummary,
    pub settlement_latency: LatencySummary,
    pub settlement_quantiles: LatencyQuantiles,
    pub tx_ids: Vec<Identifier>,
}

impl RoundStats {
    pub fn min_latency(&self) -> Duration {
        self.settlement_latency.min
    }

    pub fn max_latency(&self) -> Duration {
        self.settlement_latency.max
    }

    pub fn average_latency(&self) -> Duration {
        self.settlement_latency.avg
    }
}

/// One row of the cross-round summary.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    pub label: String,
    pub send_rate: f64,
    pub seal_rate: f64,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub max_latency: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub min_latency: Duration,
    #[serde_as(as = "DurationMilliSecondsWithFrac<f64>")]
    pub avg_latency: Duration,
    pub successful_tx: u64,
    pub failed_tx: u64,
}

/// Tabular summary across rounds, one row per round in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub rows: Vec<SummaryRow>,
}

impl RunSummary {
    pub fn new(rounds: &[RoundStats]) -> Self {
        let rows = rounds
            .iter()
            .map(|stats| SummaryRow {
                label: stats.label.clone(),
                send_rate: stats.send_rate,
                seal_rate: stats.seal_rate,
                max_latency: stats.max_latency(),
                min_latency: stats.min_latency(),
                avg_latency: stats.average_latency(),
                successful_tx: stats.successful_tx,
                failed_tx: stats.failed_tx,
            })
            .collect();
        Self { rows }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(label: &str, successful_tx: u64) -> RoundStats {
        RoundStats {
            label: label.to_string(),
            description: String::new(),
            target_tps: 5,
            total_tx: 10,
            successful_tx,
            failed_tx: 10 - successful_tx,
            send_rate: 5.,
            seal_rate: 1.,
            throughput: 4.,
            duration: Duration::from_secs(2),
            send_latency: LatencySummary::default(),
            settlement_latency: LatencySummary {
                min: Duration::from_millis(10),
                max: Duration::from_millis(30),
                avg: Duration::from_millis(20),
            },
            settlement_quantiles: LatencyQuantiles::default(),
            tx_ids: vec![],
        }
    }

    #[test]
    fn summary_keeps_round_order() {
        let summary = RunSummary::new(&[stats("warmup", 10), stats("burst", 7), stats("cool", 9)]);
        let labels: Vec<_> = summary.rows.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, ["warmup", "burst", "cool"]);
        assert_eq!(summary.rows[1].failed_tx, 3);
        assert_eq!(summary.rows[0].avg_latency, Duration::from_millis(20));
    }

    #[test]
    fn failed_record_has_zero_latency() {
        let record = TransactionRecord::failed(3, "boom");
        assert_eq!(record.send_latency, Duration::ZERO);
        assert_eq!(record.settlement_latency, Duration::ZERO);
        assert!(!record.is_success());
        assert_eq!(record.outcome.to_string(), "failed: boom");
    }

    #[test]
    fn durations_serialize_as_milliseconds() {
        let json = serde_json::to_value(stats("warmup", 10)).unwrap();
        assert_eq!(json["settlementLatency"]["max"], 30.0);
        assert_eq!(json["duration"], 2000.0);
    }
}
