//! Fixed genesis block construction and startup integrity pinning.
//!
//! Genesis is not a transaction — it seeds the account map directly,
//! bypassing nonce, signature, and fee checks entirely. A deployment's
//! genesis is defined once by its [`GenesisSpec`] (loaded from config) and
//! is expected to never change; [`verify_persisted_genesis`] is the pinned
//! invariant the node checks on every restart.

use std::sync::Arc;

use chronx_core::{Account, Block, ChronxError, TimestampMs};
use chronx_state::{StateDb, StateStore};
use tracing::{info, warn};

/// Fixed network launch instant. Every deployment of this chain id shares
/// this genesis timestamp.
pub const GENESIS_TIMESTAMP_MS: TimestampMs = 1_798_761_600_000;

pub const GENESIS_VALIDATOR_ID: &str = "genesis";

/// The account set a deployment opens with, seeded directly into state
/// outside the normal apply path. Loaded from the node's configuration file
/// (§4.12) rather than hardcoded, since different deployments of the same
/// protocol version fund different initial accounts.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct GenesisSpec {
    pub accounts: Vec<Account>,
}

impl GenesisSpec {
    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }
}

/// Build the genesis block for `spec`. Deterministic: the same accounts,
/// in any order, always produce the same hash, since the state root sorts
/// by address before hashing.
pub fn build_genesis_block(spec: &GenesisSpec) -> Result<Block, ChronxError> {
    let mut state = StateStore::new();
    for account in &spec.accounts {
        state.seed(account.clone())?;
    }

    let mut block = Block {
        index: 0,
        previous_hash: String::new(),
        timestamp_ms: GENESIS_TIMESTAMP_MS,
        validator_id: GENESIS_VALIDATOR_ID.to_string(),
        state_root: state.state_root(),
        transactions: vec![],
        hash: String::new(),
        signature: String::new(),
        signatures: vec![],
    };
    block.hash = block.compute_hash();
    Ok(block)
}

/// Compare a persisted block 0 against the hash `spec` would produce.
pub fn verify_persisted_genesis(persisted: &Block, spec: &GenesisSpec) -> Result<(), ChronxError> {
    let expected = build_genesis_block(spec)?;
    if persisted.hash != expected.hash {
        return Err(ChronxError::GenesisMismatch {
            expected: expected.hash,
            found: persisted.hash.clone(),
        });
    }
    Ok(())
}

/// Startup integrity check: if a persisted chain exists and its block 0
/// doesn't match the embedded genesis, wipe the data store and start fresh
/// from genesis rather than run on a foreign chain (§7 `GenesisMismatch`).
pub fn load_or_init(db: Option<&Arc<StateDb>>, spec: &GenesisSpec) -> Result<Block, ChronxError> {
    let genesis = build_genesis_block(spec)?;
    if let Some(db) = db {
        if let Some(persisted) = db.get_block(0)? {
            if persisted.hash != genesis.hash {
                warn!(
                    expected = %genesis.hash,
                    found = %persisted.hash,
                    "persisted genesis does not match embedded genesis, wiping data store"
                );
                db.wipe()?;
            } else {
                info!(hash = %genesis.hash, "persisted genesis verified");
            }
        }
    }
    Ok(genesis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronx_core::Account;

    #[test]
    fn genesis_hash_is_deterministic() {
        let spec = GenesisSpec { accounts: vec![Account::with_balance("alice".to_string(), 1_000)] };
        assert_eq!(build_genesis_block(&spec).unwrap().hash, build_genesis_block(&spec).unwrap().hash);
    }

    #[test]
    fn genesis_hash_is_order_independent() {
        let a = GenesisSpec {
            accounts: vec![Account::with_balance("alice".into(), 10), Account::with_balance("bob".into(), 20)],
        };
        let b = GenesisSpec {
            accounts: vec![Account::with_balance("bob".into(), 20), Account::with_balance("alice".into(), 10)],
        };
        assert_eq!(build_genesis_block(&a).unwrap().hash, build_genesis_block(&b).unwrap().hash);
    }

    #[test]
    fn genesis_hash_changes_with_balances() {
        let a = GenesisSpec { accounts: vec![Account::with_balance("alice".into(), 10)] };
        let b = GenesisSpec { accounts: vec![Account::with_balance("alice".into(), 11)] };
        assert_ne!(build_genesis_block(&a).unwrap().hash, build_genesis_block(&b).unwrap().hash);
    }

    #[test]
    fn matching_persisted_genesis_passes() {
        let spec = GenesisSpec::default();
        let block = build_genesis_block(&spec).unwrap();
        assert!(verify_persisted_genesis(&block, &spec).is_ok());
    }

    #[test]
    fn mismatched_persisted_genesis_is_rejected() {
        let spec = GenesisSpec::default();
        let mut block = build_genesis_block(&spec).unwrap();
        block.hash = "tampered".to_string();
        let err = verify_persisted_genesis(&block, &spec).unwrap_err();
        assert!(matches!(err, ChronxError::GenesisMismatch { .. }));
    }

    #[test]
    fn load_or_init_wipes_mismatched_db() {
        let db = Arc::new(StateDb::temporary().unwrap());
        let spec = GenesisSpec { accounts: vec![Account::with_balance("alice".into(), 5)] };
        let mut foreign_block = build_genesis_block(&GenesisSpec::default()).unwrap();
        foreign_block.hash = "foreign-genesis".to_string();
        db.put_block(&foreign_block).unwrap();
        db.put_account(&Account::with_balance("stray".into(), 999)).unwrap();

        let genesis = load_or_init(Some(&db), &spec).unwrap();
        assert_eq!(genesis, build_genesis_block(&spec).unwrap());
        assert!(db.get_account("stray").unwrap().is_none());
    }
}
