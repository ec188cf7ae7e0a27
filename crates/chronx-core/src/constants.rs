//! Immutable consensus parameters. These are compile-time constants, never
//! overridable at runtime — node-level deployment configuration (data dir,
//! log level, CLI flags) lives in the node binary instead.

use crate::types::Address;

/// Target time between blocks.
pub const BLOCK_TIME_MS: i64 = 5_000;

/// Maximum serialized block size in bytes.
pub const MAX_BLOCK_SIZE: usize = 1_000_000;

/// Maximum number of transactions a single block may carry.
pub const MAX_TRANSACTIONS_PER_BLOCK: usize = 1_000;

/// Target validator-set participation, expressed as a percentage. This is a
/// declared liveness target, not a hard commit gate — see the producer's
/// weak-block policy.
pub const MIN_VALIDATOR_THRESHOLD_PCT: u64 = 66;

/// Deepest fork reorganization the ledger will accept.
pub const MAX_REORG_DEPTH: u64 = 100;

pub const PROOF_TYPE: &str = "DPoA";
pub const NETWORK_VERSION: &str = "2.5";

/// Fixed network identifier; peers on a different chain id are incompatible.
pub const CHAIN_ID: &str = "chronx-mainnet-1";

/// Span of blocks between validator-pool epoch payouts.
pub const EPOCH_LENGTH: u64 = 200;

/// Span of blocks per mining-reward window.
pub const MINING_WINDOW_LENGTH: u64 = 100;

/// Share of a mining window's collected fees reserved for active-node payout.
pub const MINING_WINDOW_NODE_SHARE_NUM: u128 = 25;
pub const MINING_WINDOW_NODE_SHARE_DEN: u128 = 100;

/// Dedup cache capacity for recently committed transaction ids.
pub const TX_DEDUP_CACHE_SIZE: usize = 1_000;

/// Bound on clock skew tolerated for an incoming block's timestamp.
pub const MAX_FUTURE_BLOCK_SKEW_MS: i64 = 15_000;

/// Default timeout for the proposal phase of block production.
pub const PROPOSAL_TIMEOUT_MS: u64 = 2_000;

/// Validator liveness sweep: mark offline after this much silence.
pub const OFFLINE_TIMEOUT_MS: i64 = 60_000;

/// Startup chain-restore deadline; the node proceeds with whatever height
/// was loaded once this elapses.
pub const CHAIN_RESTORE_DEADLINE_MS: u64 = 5_000;

/// Maximum signature length, in bytes, accepted anywhere in the protocol.
pub const MAX_SIGNATURE_BYTES: usize = 128;

/// Slash penalty applied to a validator's reputation on proven equivocation.
pub const SLASH_REPUTATION_PENALTY: i32 = 50;

// ── Per-transaction-type minimum fees ───────────────────────────────────────

pub const MIN_FEE_LIKE: u128 = 1_000;
pub const MIN_FEE_FOLLOW: u128 = 1_000;
pub const MIN_FEE_UNFOLLOW: u128 = 1_000;
pub const MIN_FEE_COMMENT: u128 = 2_000;

// ── Transfer fee tiering ────────────────────────────────────────────────────

/// `incoming_transfer_count` thresholds selecting the base rate tier.
pub const TRANSFER_TIER_THRESHOLDS: [u64; 4] = [0, 50, 100, 200];

/// Base rate per tier, in basis-points-of-basis-points (parts per 1_000_000)
/// so that 0.01% == 100, 0.10% == 1_000, matching integer-only fee math.
pub const TRANSFER_TIER_RATES_PPM: [u128; 4] = [100, 250, 500, 1_000];

/// Priority surcharge, same fixed-point scale as the base rate.
pub const PRIORITY_SURCHARGE_STANDARD_PPM: u128 = 0;
pub const PRIORITY_SURCHARGE_LOW_PPM: u128 = 2_000;
pub const PRIORITY_SURCHARGE_MEDIUM_PPM: u128 = 6_000;
pub const PRIORITY_SURCHARGE_HIGH_PPM: u128 = 10_000;

/// Scale denominator for the per-million fee rates above.
pub const FEE_RATE_SCALE: u128 = 1_000_000;

// ── Time-weighted fee gating (§4.6 step 7) ──────────────────────────────────

/// Fee at/above which a transaction is fast-tracked (no wait required).
pub const FAST_FEE_THRESHOLD: u128 = 5_000;

/// Fee at/above which a STANDARD wait applies.
pub const STANDARD_FEE_THRESHOLD: u128 = 2_000;

/// Fee at/above which a LOW wait applies (below this, the tx is rejected
/// outright as InvalidFee).
pub const LOW_FEE_THRESHOLD: u128 = 500;

pub const WAIT_STANDARD_MS: i64 = 10 * 60 * 1_000;
pub const WAIT_LOW_MS: i64 = 60 * 60 * 1_000;

// ── Fee-split scheme (§9 open question 1: fixed at 45/30/20/5) ──────────────

pub const FEE_SPLIT_PRIMARY_PCT: u128 = 45;
pub const FEE_SPLIT_POOL_PCT: u128 = 30;
pub const FEE_SPLIT_RECYCLE_PCT: u128 = 20;
pub const FEE_SPLIT_DEV_PCT: u128 = 5;

// ── Treasury addresses ───────────────────────────────────────────────────────
// Modeled as ordinary accounts in state, not process-wide singletons.

pub fn validator_pool_address() -> Address {
    "VALIDATOR_POOL".to_string()
}

pub fn treasury_recycle_address() -> Address {
    "TREASURY_RECYCLE".to_string()
}

pub fn treasury_dev_address() -> Address {
    "TREASURY_DEV".to_string()
}

pub fn main_treasury_address() -> Address {
    "TREASURY_MAIN".to_string()
}
