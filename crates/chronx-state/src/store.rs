//! Account state store: a keyed account map with snapshot/commit semantics
//! and a deterministic state root (§4.2).
//!
//! The committed map is the single, exclusively-owned source of truth
//! (§5). Every mutating path — block application, dry-run validation,
//! state-root recomputation — goes through a [`StateSnapshot`] deep-copied
//! from the committed map; nothing ever mutates `committed` directly
//! except [`StateStore::commit`].

use std::collections::BTreeMap;
use std::sync::Arc;

use chronx_core::{Account, ChronxError};

use crate::db::StateDb;

/// A deep-copied working copy of the account map. Dry-run validation and
/// `state_root()` computation operate entirely on a snapshot — they never
/// touch committed state.
#[derive(Debug, Clone, Default)]
pub struct StateSnapshot {
    accounts: BTreeMap<String, Account>,
}

impl StateSnapshot {
    pub fn get(&self, address: &str) -> Option<&Account> {
        self.accounts.get(address)
    }

    /// Load the account, defaulting to a fresh zero-balance account if it
    /// doesn't exist yet (§4.6 step 3/5: "load or default").
    pub fn get_or_default(&mut self, address: &str) -> &mut Account {
        self.accounts
            .entry(address.to_string())
            .or_insert_with(|| Account::new(address.to_string()))
    }

    pub fn set(&mut self, account: Account) {
        self.accounts.insert(account.address.clone(), account);
    }

    pub fn contains(&self, address: &str) -> bool {
        self.accounts.contains_key(address)
    }

    /// Deterministic state root: SHA-256 over accounts in lexicographic
    /// address order, each rendered `address:balance:nonce:liked_ids`,
    /// joined by `|` (§4.2).
    pub fn state_root(&self) -> String {
        let joined = self
            .accounts
            .values()
            .map(Account::state_root_entry)
            .collect::<Vec<_>>()
            .join("|");
        chronx_crypto::sha256_hex(joined.as_bytes())
    }

    pub fn into_accounts(self) -> BTreeMap<String, Account> {
        self.accounts
    }
}

/// The committed account state, plus optional sled-backed persistence for
/// fast restart. The canonical rebuild path remains replaying blocks from
/// genesis (§4.5.4); the persisted account snapshot is only an
/// optimization the ledger may choose to skip.
pub struct StateStore {
    committed: BTreeMap<String, Account>,
    db: Option<Arc<StateDb>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self {
            committed: BTreeMap::new(),
            db: None,
        }
    }

    /// Load committed accounts from persistence, if any were saved.
    pub fn with_db(db: Arc<StateDb>) -> Result<Self, ChronxError> {
        let mut committed = BTreeMap::new();
        for account in db.all_accounts()? {
            committed.insert(account.address.clone(), account);
        }
        Ok(Self {
            committed,
            db: Some(db),
        })
    }

    pub fn get(&self, address: &str) -> Option<Account> {
        self.committed.get(address).cloned()
    }

    /// Directly seed an account outside the snapshot/commit path. Used only
    /// by genesis construction.
    pub fn seed(&mut self, account: Account) -> Result<(), ChronxError> {
        if let Some(db) = &self.db {
            db.put_account(&account)?;
        }
        self.committed.insert(account.address.clone(), account);
        Ok(())
    }

    /// Deep-copy the committed map into a working snapshot. Cloning a
    /// `BTreeMap<String, Account>` clones every `Account` by value,
    /// including its `liked_content_ids` set, satisfying the no-aliasing
    /// requirement in §5.
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            accounts: self.committed.clone(),
        }
    }

    /// Atomically replace the committed map with a validated snapshot's
    /// contents and persist every touched account.
    pub fn commit(&mut self, snapshot: StateSnapshot) -> Result<(), ChronxError> {
        if let Some(db) = &self.db {
            for account in snapshot.accounts.values() {
                db.put_account(account)?;
            }
        }
        self.committed = snapshot.accounts;
        Ok(())
    }

    pub fn state_root(&self) -> String {
        let joined = self
            .committed
            .values()
            .map(Account::state_root_entry)
            .collect::<Vec<_>>()
            .join("|");
        chronx_crypto::sha256_hex(joined.as_bytes())
    }

    /// Reset to empty. Used by `restore_chain` before replaying from
    /// genesis (§4.5.4).
    pub fn reset(&mut self) -> Result<(), ChronxError> {
        if let Some(db) = &self.db {
            for account in self.committed.values() {
                // leave historical rows; they'll be overwritten on replay.
                let _ = account;
            }
            db.wipe()?;
        }
        self.committed.clear();
        Ok(())
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_is_independent_of_committed_state() {
        let mut store = StateStore::new();
        store.seed(Account::with_balance("alice".into(), 100)).unwrap();

        let mut snap = store.snapshot();
        snap.get_or_default("alice").balance = 999;

        assert_eq!(store.get("alice").unwrap().balance, 100);
        assert_eq!(snap.get("alice").unwrap().balance, 999);
    }

    #[test]
    fn commit_replaces_committed_state() {
        let mut store = StateStore::new();
        store.seed(Account::with_balance("alice".into(), 100)).unwrap();

        let mut snap = store.snapshot();
        snap.get_or_default("alice").balance = 50;
        store.commit(snap).unwrap();

        assert_eq!(store.get("alice").unwrap().balance, 50);
    }

    #[test]
    fn state_root_is_deterministic_and_order_independent() {
        let mut a = StateStore::new();
        a.seed(Account::with_balance("bob".into(), 10)).unwrap();
        a.seed(Account::with_balance("alice".into(), 20)).unwrap();

        let mut b = StateStore::new();
        b.seed(Account::with_balance("alice".into(), 20)).unwrap();
        b.seed(Account::with_balance("bob".into(), 10)).unwrap();

        assert_eq!(a.state_root(), b.state_root());
    }

    #[test]
    fn state_root_changes_with_balance() {
        let mut a = StateStore::new();
        a.seed(Account::with_balance("alice".into(), 20)).unwrap();
        let root_before = a.state_root();

        let mut snap = a.snapshot();
        snap.get_or_default("alice").balance = 21;
        a.commit(snap).unwrap();

        assert_ne!(a.state_root(), root_before);
    }

    #[test]
    fn persists_across_store_reload_with_db() {
        let db = Arc::new(StateDb::temporary().unwrap());
        {
            let mut store = StateStore::with_db(db.clone()).unwrap();
            store.seed(Account::with_balance("alice".into(), 77)).unwrap();
        }
        let reloaded = StateStore::with_db(db).unwrap();
        assert_eq!(reloaded.get("alice").unwrap().balance, 77);
    }
}
