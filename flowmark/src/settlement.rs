use flowmark_core::{Identifier, LedgerClient, SettlementConfig, TransactionStatus, TxOutcome};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementStatus {
    Sealed,
    SealedWithError(String),
    TimedOut,
    Cancelled,
}

impl From<SettlementStatus> for TxOutcome {
    fn from(status: SettlementStatus) -> Self {
        match status {
            SettlementStatus::Sealed => TxOutcome::Sealed,
            SettlementStatus::SealedWithError(err) => TxOutcome::SealedWithError(err),
            SettlementStatus::TimedOut => TxOutcome::TimedOut,
            SettlementStatus::Cancelled => TxOutcome::Failed("cancelled while settling".into()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settlement {
    pub status: SettlementStatus,
    /// Instant at which the terminal status was observed.
    pub settled_at: Instant,
    pub polls: u32,
}

/// Polls the ledger until a submitted transaction reaches a terminal status.
pub struct SettlementTracker<C> {
    client: Arc<C>,
    poll_interval: Duration,
    timeout: Option<Duration>,
}

impl<C> SettlementTracker<C>
where
    C: LedgerClient + Sync,
{
    pub fn new(client: Arc<C>, config: &SettlementConfig) -> Self {
        Self {
            client,
            poll_interval: config.poll_interval,
            timeout: config.bound(),
        }
    }

    /// Polls every poll interval, starting immediately. Lookup failures are treated as
    /// transient; the transaction keeps being polled until it seals, expires, the timeout elapses
    /// or `cancel` fires.
    pub async fn await_settlement(&self, id: &Identifier, cancel: &CancellationToken) -> Settlement {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let deadline = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);

        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut polls = 0;

        loop {
            let status = tokio::select! {
                _ = cancel.cancelled() => SettlementStatus::Cancelled,
                _ = &mut deadline => SettlementStatus::TimedOut,
                status = self.poll_once(id, &mut ticker, &mut polls) => match status {
                    Some(status) => status,
                    None => continue,
                },
            };

            if status == SettlementStatus::TimedOut {
                warn!("Transaction {id} not sealed after {polls} polls");
            }

            return Settlement {
                status,
                settled_at: Instant::now(),
                polls,
            };
        }
    }

    async fn poll_once(
        &self,
        id: &Identifier,
        ticker: &mut tokio::time::Interval,
        polls: &mut u32,
    ) -> Option<SettlementStatus> {
        ticker.tick().await;
        *polls += 1;

        match self.client.transaction_result(id).await {
            Ok(result) => match result.status {
                TransactionStatus::Sealed => match result.error_message {
                    Some(err) => {
                        debug!("Transaction {id} sealed with error: {err}");
                        Some(SettlementStatus::SealedWithError(err))
                    }
                    None => {
                        trace!("Transaction {id} sealed");
                        Some(SettlementStatus::Sealed)
                    }
                },
                TransactionStatus::Expired => {
                    debug!("Transaction {id} expired");
                    Some(SettlementStatus::SealedWithError("transaction expired".into()))
                }
                status => {
                    trace!("Transaction {id} is {status:?}");
                    None
                }
            },
            Err(err) => {
                debug!("Result lookup for {id} failed: {err}");
                None
            }
        }
    }
}
