//! Bounded, priority-ordered pool of ready-to-include transactions (§4.3).

use std::collections::BTreeMap;

use chronx_core::{ChronxError, ChronxEvent, EventBus, Transaction, TxId};

pub struct Mempool {
    entries: BTreeMap<TxId, Transaction>,
    max_size: usize,
    events: EventBus,
}

impl Mempool {
    pub fn new(max_size: usize, events: EventBus) -> Self {
        Self {
            entries: BTreeMap::new(),
            max_size,
            events,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, tx_id: &str) -> bool {
        self.entries.contains_key(tx_id)
    }

    /// Insert `tx`. Rejects exact duplicates by `tx_id`. When at capacity,
    /// evicts the current lowest-priority entry if `tx` outranks it;
    /// otherwise rejects `tx`.
    pub fn add(&mut self, tx: Transaction) -> Result<(), ChronxError> {
        if self.entries.contains_key(&tx.tx_id) {
            return Err(ChronxError::Duplicate(tx.tx_id));
        }

        if self.entries.len() >= self.max_size {
            let lowest = self
                .entries
                .values()
                .min_by(|a, b| priority_key(a).cmp(&priority_key(b)))
                .cloned();
            match lowest {
                Some(lowest_tx) if priority_key(&tx) > priority_key(&lowest_tx) => {
                    self.entries.remove(&lowest_tx.tx_id);
                }
                _ => {
                    return Err(ChronxError::Other("mempool at capacity".to_string()));
                }
            }
        }

        let tx_id = tx.tx_id.clone();
        self.entries.insert(tx_id, tx.clone());
        self.events.publish(ChronxEvent::TransactionAdded(tx));
        Ok(())
    }

    /// Up to `n` transactions, highest priority first: fee descending,
    /// ties broken by timestamp ascending.
    pub fn top(&self, n: usize) -> Vec<Transaction> {
        let mut all: Vec<&Transaction> = self.entries.values().collect();
        all.sort_by(|a, b| priority_key(b).cmp(&priority_key(a)));
        all.into_iter().take(n).cloned().collect()
    }

    pub fn remove(&mut self, tx_id: &str) -> Option<Transaction> {
        self.entries.remove(tx_id)
    }

    /// Evict every transaction whose `valid_until_ms` has passed. A missing
    /// `valid_until_ms` means no expiry (§9 open question 4).
    pub fn clear_expired(&mut self, now_ms: i64) -> Vec<TxId> {
        let expired: Vec<TxId> = self
            .entries
            .values()
            .filter(|tx| tx.valid_until_ms.is_some_and(|v| now_ms > v))
            .map(|tx| tx.tx_id.clone())
            .collect();
        for id in &expired {
            self.entries.remove(id);
        }
        expired
    }
}

/// `(fee, Reverse-ish timestamp)` ordered so that higher fee sorts greater,
/// and for equal fee, the earlier timestamp sorts greater (ties broken by
/// timestamp ascending, i.e. "first come" wins the tie among equal fees).
fn priority_key(tx: &Transaction) -> (u128, std::cmp::Reverse<i64>) {
    (tx.fee, std::cmp::Reverse(tx.timestamp_ms))
}
