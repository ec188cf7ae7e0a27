//! Typed event bus replacing the untyped, stringly-typed emitters the core
//! used to extend. Components publish an enumerated [`ChronxEvent`] variant
//! through [`EventBus::publish`]; subscribers register with
//! [`EventBus::subscribe`]. Delivery order matches publish order, matching
//! the ordering guarantee in the concurrency model (§5) — there is exactly
//! one logical thread driving the loop, so no publish can interleave with
//! another.

use std::sync::{Arc, Mutex};

use crate::block::Block;
use crate::transaction::Transaction;
use crate::types::ValidatorId;

#[derive(Debug, Clone)]
pub enum ChronxEvent {
    BlockAdded(Block),
    BlockProposed(Block),
    NewBlock {
        block: Block,
        producer: ValidatorId,
        tx_count: usize,
    },
    TransactionAdded(Transaction),
    BackupCreated { path: String },
    BackupRestored { path: String },
    Slashed { validator_id: ValidatorId, evidence: String },
}

pub type EventHandler = Box<dyn Fn(&ChronxEvent) + Send + Sync>;

/// A minimal in-process publish/subscribe bus. Subscribers see every event
/// regardless of variant — components filter by matching on the variant
/// they care about, which keeps the bus itself free of per-kind routing
/// tables.
#[derive(Default, Clone)]
pub struct EventBus {
    handlers: Arc<Mutex<Vec<EventHandler>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, handler: F)
    where
        F: Fn(&ChronxEvent) + Send + Sync + 'static,
    {
        self.handlers.lock().expect("event bus mutex poisoned").push(Box::new(handler));
    }

    pub fn publish(&self, event: ChronxEvent) {
        let handlers = self.handlers.lock().expect("event bus mutex poisoned");
        for handler in handlers.iter() {
            handler(&event);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EventBus")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn subscribers_receive_published_events() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        bus.subscribe(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        bus.publish(ChronxEvent::TransactionAdded(Transaction {
            tx_id: "t1".into(),
            tx_type: crate::transaction::TxType::Transfer,
            from: "a".into(),
            to: "b".into(),
            amount: 1,
            fee: 1,
            nonce: 1,
            timestamp_ms: 0,
            valid_until_ms: None,
            payload: crate::transaction::Payload::None,
            sender_public_key: "pk".into(),
            sender_signature: String::new(),
        }));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delivery_order_matches_publish_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        let order_clone = order.clone();
        bus.subscribe(move |event| {
            let label = match event {
                ChronxEvent::Slashed { validator_id, .. } => validator_id.clone(),
                _ => "other".into(),
            };
            order_clone.lock().unwrap().push(label);
        });
        bus.publish(ChronxEvent::Slashed { validator_id: "v1".into(), evidence: "e".into() });
        bus.publish(ChronxEvent::Slashed { validator_id: "v2".into(), evidence: "e".into() });
        assert_eq!(*order.lock().unwrap(), vec!["v1".to_string(), "v2".to_string()]);
    }
}
