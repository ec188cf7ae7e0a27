use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::{Address, Balance, LikedContentIds, Nonce, TimestampMs};

/// An account balance/nonce record. `balance ≥ 0` is an invariant enforced
/// by every mutation path in the state machine — this type itself does not
/// prevent negative values at construction, but nothing in the workspace
/// ever constructs one that way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub address: Address,
    pub balance: Balance,
    pub nonce: Nonce,

    #[serde(default)]
    pub public_key: Option<String>,
    #[serde(default)]
    pub encryption_public_key: Option<String>,
    #[serde(default)]
    pub nickname: Option<String>,

    #[serde(default)]
    pub incoming_transfer_count: u64,
    #[serde(default)]
    pub last_year_reset_ms: Option<TimestampMs>,

    #[serde(default)]
    pub liked_content_ids: LikedContentIds,
}

impl Account {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            balance: 0,
            nonce: 0,
            public_key: None,
            encryption_public_key: None,
            nickname: None,
            incoming_transfer_count: 0,
            last_year_reset_ms: None,
            liked_content_ids: BTreeSet::new(),
        }
    }

    pub fn with_balance(address: Address, balance: Balance) -> Self {
        let mut account = Self::new(address);
        account.balance = balance;
        account
    }

    /// The canonical, lexicographically-ordered state-root entry for this
    /// account: `address:balance:nonce:sorted(liked_ids).join(',')`.
    pub fn state_root_entry(&self) -> String {
        let liked: Vec<&str> = self.liked_content_ids.iter().map(String::as_str).collect();
        format!(
            "{}:{}:{}:{}",
            self.address,
            self.balance,
            self.nonce,
            liked.join(",")
        )
    }

    pub fn has_liked(&self, content_id: &str) -> bool {
        self.liked_content_ids.contains(content_id)
    }
}
