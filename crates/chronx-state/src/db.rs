//! sled-backed persistence. One `sled::Tree` per entity, following the
//! teacher's tree-per-entity layout: `accounts`, `blocks`, `validators`,
//! `meta` (tip height/hash, dedup cache, window/epoch counters).

use chronx_core::{Account, Block, ChronxError, Validator};
use std::path::Path;

pub struct StateDb {
    pub(crate) accounts: sled::Tree,
    pub(crate) blocks: sled::Tree,
    pub(crate) validators: sled::Tree,
    pub(crate) meta: sled::Tree,
    db: sled::Db,
}

const TIP_HEIGHT_KEY: &[u8] = b"tip_height";
const TIP_HASH_KEY: &[u8] = b"tip_hash";
const DEDUP_CACHE_KEY: &[u8] = b"dedup_cache";

impl StateDb {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChronxError> {
        let db = sled::open(path).map_err(|e| ChronxError::Storage(e.to_string()))?;
        Self::from_sled(db)
    }

    pub fn temporary() -> Result<Self, ChronxError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(|e| ChronxError::Storage(e.to_string()))?;
        Self::from_sled(db)
    }

    fn from_sled(db: sled::Db) -> Result<Self, ChronxError> {
        let open_tree = |name: &str| db.open_tree(name).map_err(|e| ChronxError::Storage(e.to_string()));
        Ok(Self {
            accounts: open_tree("accounts")?,
            blocks: open_tree("blocks")?,
            validators: open_tree("validators")?,
            meta: open_tree("meta")?,
            db,
        })
    }

    pub fn flush(&self) -> Result<(), ChronxError> {
        self.db.flush().map_err(|e| ChronxError::Storage(e.to_string()))?;
        Ok(())
    }

    // ── Accounts ─────────────────────────────────────────────────────────

    pub fn get_account(&self, address: &str) -> Result<Option<Account>, ChronxError> {
        get_typed(&self.accounts, address.as_bytes())
    }

    pub fn put_account(&self, account: &Account) -> Result<(), ChronxError> {
        put_typed(&self.accounts, account.address.as_bytes(), account)
    }

    pub fn all_accounts(&self) -> Result<Vec<Account>, ChronxError> {
        let mut out = Vec::new();
        for item in self.accounts.iter() {
            let (_, value) = item.map_err(|e| ChronxError::Storage(e.to_string()))?;
            out.push(bincode::deserialize(&value).map_err(|e| ChronxError::Serialization(e.to_string()))?);
        }
        Ok(out)
    }

    // ── Blocks ───────────────────────────────────────────────────────────

    pub fn get_block(&self, index: u64) -> Result<Option<Block>, ChronxError> {
        get_typed(&self.blocks, &index.to_be_bytes())
    }

    pub fn put_block(&self, block: &Block) -> Result<(), ChronxError> {
        put_typed(&self.blocks, &block.index.to_be_bytes(), block)
    }

    pub fn remove_block(&self, index: u64) -> Result<(), ChronxError> {
        self.blocks
            .remove(index.to_be_bytes())
            .map_err(|e| ChronxError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    // ── Validators ───────────────────────────────────────────────────────

    pub fn get_validator(&self, validator_id: &str) -> Result<Option<Validator>, ChronxError> {
        get_typed(&self.validators, validator_id.as_bytes())
    }

    pub fn put_validator(&self, validator: &Validator) -> Result<(), ChronxError> {
        put_typed(&self.validators, validator.validator_id.as_bytes(), validator)
    }

    pub fn all_validators(&self) -> Result<Vec<Validator>, ChronxError> {
        let mut out = Vec::new();
        for item in self.validators.iter() {
            let (_, value) = item.map_err(|e| ChronxError::Storage(e.to_string()))?;
            out.push(bincode::deserialize(&value).map_err(|e| ChronxError::Serialization(e.to_string()))?);
        }
        Ok(out)
    }

    // ── Meta / tip ───────────────────────────────────────────────────────

    pub fn get_tip_height(&self) -> Result<Option<u64>, ChronxError> {
        match self.meta.get(TIP_HEIGHT_KEY).map_err(|e| ChronxError::Storage(e.to_string()))? {
            Some(bytes) => Ok(Some(u64::from_be_bytes(
                bytes.as_ref().try_into().map_err(|_| ChronxError::Storage("corrupt tip height".into()))?,
            ))),
            None => Ok(None),
        }
    }

    pub fn set_tip_height(&self, height: u64) -> Result<(), ChronxError> {
        self.meta
            .insert(TIP_HEIGHT_KEY, &height.to_be_bytes())
            .map_err(|e| ChronxError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_tip_hash(&self) -> Result<Option<String>, ChronxError> {
        match self.meta.get(TIP_HASH_KEY).map_err(|e| ChronxError::Storage(e.to_string()))? {
            Some(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).to_string())),
            None => Ok(None),
        }
    }

    pub fn set_tip_hash(&self, hash: &str) -> Result<(), ChronxError> {
        self.meta
            .insert(TIP_HASH_KEY, hash.as_bytes())
            .map_err(|e| ChronxError::Storage(e.to_string()))?;
        Ok(())
    }

    pub fn get_dedup_cache(&self) -> Result<Vec<String>, ChronxError> {
        match self.meta.get(DEDUP_CACHE_KEY).map_err(|e| ChronxError::Storage(e.to_string()))? {
            Some(bytes) => bincode::deserialize(&bytes).map_err(|e| ChronxError::Serialization(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    pub fn set_dedup_cache(&self, cache: &[String]) -> Result<(), ChronxError> {
        let bytes = bincode::serialize(cache).map_err(|e| ChronxError::Serialization(e.to_string()))?;
        self.meta
            .insert(DEDUP_CACHE_KEY, bytes)
            .map_err(|e| ChronxError::Storage(e.to_string()))?;
        Ok(())
    }

    /// Wipe every tree. Used when the persisted genesis block doesn't match
    /// the embedded one (`GenesisMismatch`, §7).
    pub fn wipe(&self) -> Result<(), ChronxError> {
        for tree in [&self.accounts, &self.blocks, &self.validators, &self.meta] {
            tree.clear().map_err(|e| ChronxError::Storage(e.to_string()))?;
        }
        Ok(())
    }
}

fn get_typed<T: serde::de::DeserializeOwned>(tree: &sled::Tree, key: &[u8]) -> Result<Option<T>, ChronxError> {
    match tree.get(key).map_err(|e| ChronxError::Storage(e.to_string()))? {
        Some(bytes) => {
            let value = bincode::deserialize(&bytes).map_err(|e| ChronxError::Serialization(e.to_string()))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn put_typed<T: serde::Serialize>(tree: &sled::Tree, key: &[u8], value: &T) -> Result<(), ChronxError> {
    let bytes = bincode::serialize(value).map_err(|e| ChronxError::Serialization(e.to_string()))?;
    tree.insert(key, bytes).map_err(|e| ChronxError::Storage(e.to_string()))?;
    Ok(())
}
