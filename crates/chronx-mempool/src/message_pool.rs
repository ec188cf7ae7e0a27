//! Time-batched pool for low-fee inner transactions (§4.4). FAST-fee
//! transactions never enter this pool — the caller routes them straight to
//! the mempool. NORMAL and LOW transactions accumulate in a batch window
//! keyed by `(tier, category)` and surface as a synthetic `BATCH` (or
//! `CONVERSATION_BATCH` for the MESSAGE category) transaction once the
//! window's deadline passes.

use std::collections::HashMap;

use chronx_core::{Payload, Transaction, TxType};

const FAST_FEE_THRESHOLD: u128 = chronx_core::FAST_FEE_THRESHOLD;
const NORMAL_WINDOW_MS: i64 = 10 * 60 * 1_000;
const LOW_WINDOW_MS: i64 = 60 * 60 * 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeeTier {
    Fast,
    Normal,
    Low,
}

impl FeeTier {
    pub fn for_fee(fee: u128) -> Self {
        if fee >= FAST_FEE_THRESHOLD {
            FeeTier::Fast
        } else if fee >= chronx_core::STANDARD_FEE_THRESHOLD {
            FeeTier::Normal
        } else {
            FeeTier::Low
        }
    }

    fn window_ms(self) -> i64 {
        match self {
            FeeTier::Fast => 0,
            FeeTier::Normal => NORMAL_WINDOW_MS,
            FeeTier::Low => LOW_WINDOW_MS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Social,
    Message,
    None,
}

impl Category {
    pub fn for_type(tx_type: TxType) -> Self {
        match tx_type {
            TxType::Like | TxType::Comment | TxType::Follow | TxType::Unfollow | TxType::Share => {
                Category::Social
            }
            TxType::MessagePayment | TxType::PrivateMessage => Category::Message,
            _ => Category::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BatchKey {
    tier: FeeTier,
    category: Category,
}

struct Window {
    deadline_ms: i64,
    pending: Vec<Transaction>,
}

#[derive(Default)]
pub struct MessagePool {
    windows: HashMap<BatchKey, Window>,
}

impl MessagePool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `tx`. Returns `false` (and does nothing) for FAST-fee
    /// transactions — the caller is responsible for routing those straight
    /// to the mempool instead.
    pub fn add(&mut self, tx: Transaction, now_ms: i64) -> bool {
        let tier = FeeTier::for_fee(tx.fee);
        if matches!(tier, FeeTier::Fast) {
            return false;
        }
        let key = BatchKey {
            tier,
            category: Category::for_type(tx.tx_type),
        };
        let window = self.windows.entry(key).or_insert_with(|| Window {
            deadline_ms: now_ms + tier.window_ms(),
            pending: Vec::new(),
        });
        window.pending.push(tx);
        true
    }

    /// Close and return every window whose deadline has passed, as
    /// synthetic batch transactions ready to be signed by a relayer and
    /// included in a block.
    pub fn top(&mut self, now_ms: i64) -> Vec<Transaction> {
        let closing: Vec<BatchKey> = self
            .windows
            .iter()
            .filter(|(_, w)| now_ms >= w.deadline_ms && !w.pending.is_empty())
            .map(|(k, _)| *k)
            .collect();

        let mut out = Vec::with_capacity(closing.len());
        for key in closing {
            if let Some(window) = self.windows.remove(&key) {
                out.push(build_batch_transaction(key, window.pending, now_ms));
            }
        }
        out
    }

    pub fn open_window_count(&self) -> usize {
        self.windows.len()
    }
}

fn build_batch_transaction(key: BatchKey, inner: Vec<Transaction>, now_ms: i64) -> Transaction {
    let tx_type = if matches!(key.category, Category::Message) {
        TxType::ConversationBatch
    } else {
        TxType::Batch
    };
    let total_fee: u128 = inner.iter().map(|t| t.fee).sum();
    let mut tx = Transaction {
        tx_id: String::new(),
        tx_type,
        from: "MESSAGE_POOL".to_string(),
        to: "MESSAGE_POOL".to_string(),
        amount: 0,
        fee: total_fee,
        nonce: 0,
        timestamp_ms: now_ms,
        valid_until_ms: None,
        payload: Payload::Batch { inner },
        sender_public_key: String::new(),
        sender_signature: String::new(),
    };
    tx.tx_id = tx.compute_tx_id();
    tx
}
