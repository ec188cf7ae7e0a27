//! Core scalar aliases shared across the workspace.

use std::collections::BTreeSet;

/// Account/validator/treasury key. Addresses are opaque strings — the
/// state store makes no assumption about how they were derived.
pub type Address = String;

/// Smallest-unit balances and fees. Never negative after a committed
/// transaction.
pub type Balance = u128;

/// Per-account replay counter, starts at 0, increments by 1 per accepted
/// outbound transaction.
pub type Nonce = u64;

/// Milliseconds since the Unix epoch.
pub type TimestampMs = i64;

/// Hex-encoded SHA-256 digest of a transaction's canonical signable form.
pub type TxId = String;

/// Hex-encoded SHA-256 digest of a block's canonical form.
pub type BlockHash = String;

pub type ValidatorId = String;

/// A set of opaque content ids a sender has already liked; used only to
/// reject duplicate LIKE transactions.
pub type LikedContentIds = BTreeSet<String>;
