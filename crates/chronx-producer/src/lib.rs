pub mod producer;

pub use producer::{BlockProducer, ProduceOutcome};
