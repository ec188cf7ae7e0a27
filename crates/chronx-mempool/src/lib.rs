pub mod mempool;
pub mod message_pool;

pub use mempool::Mempool;
pub use message_pool::{Category, FeeTier, MessagePool};
