pub mod account;
pub mod block;
pub mod constants;
pub mod error;
pub mod events;
pub mod transaction;
pub mod types;
pub mod validator;

pub use account::Account;
pub use block::{Block, WitnessSignature};
pub use constants::*;
pub use error::{ChronxError, ChronxResult};
pub use events::{ChronxEvent, EventBus};
pub use transaction::{Payload, Priority, Transaction, TxType};
pub use types::*;
pub use validator::Validator;
