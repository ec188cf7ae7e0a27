use serde::{Deserialize, Serialize};

use crate::types::{Address, Balance, Nonce, TimestampMs, TxId};

/// The full set of transaction types the state machine dispatches on.
/// Unknown values fail to deserialize, which the ledger treats as
/// `InvalidStructure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxType {
    Transfer,
    MessagePayment,
    PrivateMessage,
    PostContent,
    PostAction,
    Like,
    Comment,
    Share,
    Follow,
    Unfollow,
    ProfileUpdate,
    Reward,
    Batch,
    ConversationBatch,
}

impl TxType {
    /// Social-action types route their fee's primary share to the target
    /// account rather than the block's node-wallet (§4.8.1).
    pub fn is_social_action(self) -> bool {
        matches!(
            self,
            TxType::Like
                | TxType::Comment
                | TxType::Follow
                | TxType::Unfollow
                | TxType::Share
                | TxType::PostContent
        )
    }

    /// Types exempt from the time-weighted low-fee wait gate (§4.6 step 7).
    pub fn is_wait_exempt(self) -> bool {
        matches!(
            self,
            TxType::Like
                | TxType::Comment
                | TxType::Follow
                | TxType::Unfollow
                | TxType::Share
                | TxType::PostContent
                | TxType::PostAction
                | TxType::ProfileUpdate
                | TxType::Batch
                | TxType::ConversationBatch
                | TxType::Reward
        )
    }
}

/// Priority surcharge requested for a TRANSFER (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Standard,
    Low,
    Medium,
    High,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Standard
    }
}

/// Type-specific structured payload. Transactions outside these shapes
/// (e.g. plain TRANSFER with no extra data) carry `Payload::None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Payload {
    None,
    TransferOptions { priority: Priority },
    ContentRef { content_id: String },
    Message { ciphertext: String },
    ProfileFields { nickname: Option<String>, encryption_public_key: Option<String> },
    Batch { inner: Vec<Transaction> },
}

impl Default for Payload {
    fn default() -> Self {
        Payload::None
    }
}

/// A signed, account-mutating transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub tx_id: TxId,
    #[serde(rename = "type")]
    pub tx_type: TxType,
    pub from: Address,
    pub to: Address,
    pub amount: Balance,
    pub fee: Balance,
    pub nonce: Nonce,
    pub timestamp_ms: TimestampMs,
    #[serde(default)]
    pub valid_until_ms: Option<TimestampMs>,
    #[serde(default)]
    pub payload: Payload,
    pub sender_public_key: String,
    #[serde(default)]
    pub sender_signature: String,
}

impl Transaction {
    /// Fields that participate in the signable/hashable canonical form.
    /// `sender_signature` never does; `sender_public_key` is excluded too
    /// since §4.1 only requires the signature to verify against *either*
    /// the embedded key or the account-stored key — excluding it keeps the
    /// signable form independent of which key ends up verifying it.
    pub const EXCLUDED_FIELDS: [&'static str; 3] = ["tx_id", "sender_signature", "sender_public_key"];

    /// Compute this transaction's `tx_id` from its canonical signable form.
    pub fn compute_tx_id(&self) -> TxId {
        let canonical = chronx_crypto::canonical_form(self, &Self::EXCLUDED_FIELDS);
        chronx_crypto::sha256_of_canonical(&canonical)
    }

    /// Bytes that are signed and whose hash becomes `tx_id`.
    pub fn signable_bytes(&self) -> Vec<u8> {
        chronx_crypto::canonical_form(self, &Self::EXCLUDED_FIELDS).into_bytes()
    }

    pub fn is_batch(&self) -> bool {
        matches!(self.tx_type, TxType::Batch | TxType::ConversationBatch)
    }
}
