//! Proposal key bookkeeping.
//!
//! Every key of the benchmark account carries its own sequence number. A transaction proposed
//! with key `k` must carry the current sequence number of `k`, and a key may only be used by one
//! in-flight submission at a time. The pool hands out exclusive leases over keys and advances the
//! sequence number once the ledger accepted a submission.
use crate::builder::TransactionBuilder;
use crate::settlement::{SettlementStatus, SettlementTracker};
use arc_swap::ArcSwap;
use flowmark_core::{Account, Address, BenchError, LedgerClient};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;
#[allow(unused)]
use tracing::{debug, error, info, trace, warn};

struct KeySlot {
    key_index: u32,
    // NOTE: tokio's mutex is fair, so waiters are served in the order they arrived.
    sequence_number: Arc<Mutex<u64>>,
}

pub struct KeyPool {
    address: Address,
    slots: ArcSwap<Vec<KeySlot>>,
}

impl KeyPool {
    /// Builds the pool from a snapshot of the benchmark account.
    pub fn new(account: &Account) -> Result<Self, BenchError> {
        Ok(Self {
            address: account.address,
            slots: ArcSwap::from_pointee(slots_for(account)?),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Number of keys currently usable as proposal keys.
    pub fn available(&self) -> usize {
        self.slots.load().len()
    }

    /// Waits until the key assigned to `slot` is free and leases it.
    ///
    /// Slots map onto keys round-robin: slot `i` uses the `(i mod K)`-th usable key, where `K`
    /// counts the keys that are not revoked.
    pub async fn acquire(&self, slot: usize) -> KeyLease {
        let (key_index, sequence_number) = {
            let slots = self.slots.load();
            let key = &slots[slot % slots.len()];
            (key.key_index, key.sequence_number.clone())
        };

        let guard = sequence_number.lock_owned().await;
        trace!("Slot {slot} leased key {key_index} at sequence {}", *guard);
        KeyLease { key_index, guard }
    }

    /// Replaces the key table with the keys of a fresh account snapshot.
    ///
    /// Must not be called while leases are outstanding.
    pub fn refresh(&self, account: &Account) -> Result<(), BenchError> {
        if account.address != self.address {
            return Err(BenchError::configuration(format!(
                "account {} does not own key pool {}",
                account.address, self.address
            )));
        }
        self.slots.store(Arc::new(slots_for(account)?));
        Ok(())
    }

    /// Grows the account to `requested` proposal keys by submitting one key-adding transaction
    /// and waiting for it to seal. Returns how many keys were added.
    pub async fn provision<C>(
        &self,
        client: &C,
        builder: &TransactionBuilder<C>,
        tracker: &SettlementTracker<C>,
        requested: usize,
        cancel: &CancellationToken,
    ) -> Result<usize, BenchError>
    where
        C: LedgerClient + Sync,
    {
        let available = self.available();
        if requested <= available {
            debug!("{available} keys available, {requested} requested. Nothing to provision.");
            return Ok(0);
        }

        let missing = requested - available;
        info!("Adding {missing} proposal keys to {}", self.address);

        let lease = self.acquire(0).await;
        let tx = match builder.build_add_keys(&lease, missing as u32, cancel).await {
            Ok(tx) => tx,
            Err(err) => {
                lease.release(false);
                return Err(err);
            }
        };
        let id = match client.submit_transaction(&tx).await {
            Ok(id) => {
                lease.release(true);
                id
            }
            Err(err) => {
                lease.release(false);
                return Err(err.into());
            }
        };

        let settlement = tracker.await_settlement(&id, cancel).await;
        match settlement.status {
            SettlementStatus::Sealed => {}
            SettlementStatus::SealedWithError(err) => return Err(BenchError::Execution(err)),
            SettlementStatus::TimedOut => {
                return Err(BenchError::Execution(format!(
                    "key provisioning transaction {id} did not seal in time"
                )))
            }
            SettlementStatus::Cancelled => return Err(BenchError::Cancelled),
        }

        let account = client.get_account(&self.address).await?;
        self.refresh(&account)?;
        info!("Account {} now has {} usable keys", self.address, self.available());

        Ok(missing)
    }
}

fn slots_for(account: &Account) -> Result<Vec<KeySlot>, BenchError> {
    let slots: Vec<_> = account
        .usable_keys()
        .map(|key| KeySlot {
            key_index: key.index,
            sequence_number: Arc::new(Mutex::new(key.sequence_number)),
        })
        .collect();

    if slots.is_empty() {
        return Err(BenchError::configuration(format!(
            "account {} has no usable proposal keys",
            account.address
        )));
    }
    Ok(slots)
}

/// Exclusive use of one proposal key.
///
/// Dropping a lease without calling [`KeyLease::release`] counts as an unconsumed use.
pub struct KeyLease {
    key_index: u32,
    guard: OwnedMutexGuard<u64>,
}

impl KeyLease {
    pub fn key_index(&self) -> u32 {
        self.key_index
    }

    pub fn sequence_number(&self) -> u64 {
        *self.guard
    }

    /// Returns the key to the pool. `consumed` must be true iff the ledger accepted a
    /// transaction carrying this sequence number.
    pub fn release(mut self, consumed: bool) {
        if consumed {
            *self.guard += 1;
        }
    }
}
