use serde::{Deserialize, Serialize};

use crate::transaction::Transaction;
use crate::types::{BlockHash, TimestampMs, ValidatorId};

/// A witness signature collected during the two-phase finalization round,
/// including the proposer's own signature (recorded first).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WitnessSignature {
    pub validator_id: ValidatorId,
    pub signature: String,
}

/// A hash-linked block. `hash` and `signature`/`signatures` are excluded
/// from the canonical form used to compute `hash` itself (§4.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub previous_hash: BlockHash,
    pub timestamp_ms: TimestampMs,
    pub validator_id: ValidatorId,
    pub state_root: String,
    pub transactions: Vec<Transaction>,
    #[serde(default)]
    pub hash: BlockHash,
    #[serde(default)]
    pub signature: String,
    #[serde(default)]
    pub signatures: Vec<WitnessSignature>,
}

impl Block {
    pub const EXCLUDED_FIELDS: [&'static str; 3] = ["hash", "signature", "signatures"];

    pub fn compute_hash(&self) -> BlockHash {
        let canonical = chronx_crypto::canonical_form(self, &Self::EXCLUDED_FIELDS);
        chronx_crypto::sha256_of_canonical(&canonical)
    }

    pub fn signable_bytes(&self) -> Vec<u8> {
        chronx_crypto::canonical_form(self, &Self::EXCLUDED_FIELDS).into_bytes()
    }

    pub fn is_genesis(&self) -> bool {
        self.index == 0
    }

    pub fn total_fees(&self) -> u128 {
        self.transactions.iter().map(|t| t.fee).sum()
    }
}
