//! Chain storage, block validation, fork-less append, segment processing
//! with reorg, and full chain restore (§4.5).

use std::sync::Arc;

use chronx_consensus::ValidatorPool;
use chronx_core::{
    Account, Block, ChronxError, TimestampMs, MAX_FUTURE_BLOCK_SKEW_MS, MAX_REORG_DEPTH,
    MAX_SIGNATURE_BYTES, MINING_WINDOW_LENGTH, MINING_WINDOW_NODE_SHARE_DEN,
    MINING_WINDOW_NODE_SHARE_NUM,
};
use chronx_rewards::RewardRouter;
use chronx_state::{StateDb, StateStore};
use tracing::{error, info, warn};

use crate::apply::apply_transaction;
use crate::dedup::DedupCache;

pub struct Ledger {
    state: StateStore,
    chain: Vec<Block>,
    dedup: DedupCache,
    mining_router: RewardRouter,
    genesis_accounts: Vec<Account>,
    db: Option<Arc<StateDb>>,
}

impl Ledger {
    /// Construct a ledger anchored at `genesis`, seeding `genesis_accounts`
    /// directly into state (outside the normal snapshot/commit path, as
    /// genesis construction is permitted to).
    pub fn new(genesis: Block, genesis_accounts: Vec<Account>, db: Option<Arc<StateDb>>) -> Result<Self, ChronxError> {
        if !genesis.is_genesis() {
            return Err(ChronxError::GenesisMismatch {
                expected: "index 0".to_string(),
                found: genesis.index.to_string(),
            });
        }
        let recomputed = genesis.compute_hash();
        if recomputed != genesis.hash {
            return Err(ChronxError::GenesisMismatch { expected: recomputed, found: genesis.hash.clone() });
        }

        let mut state = match &db {
            Some(db) => StateStore::with_db(db.clone())?,
            None => StateStore::new(),
        };
        for account in &genesis_accounts {
            state.seed(account.clone())?;
        }
        if let Some(db) = &db {
            db.put_block(&genesis)?;
            db.set_tip_height(0)?;
            db.set_tip_hash(&genesis.hash)?;
        }

        Ok(Self {
            state,
            chain: vec![genesis],
            dedup: DedupCache::new(),
            mining_router: RewardRouter::new(MINING_WINDOW_LENGTH, MINING_WINDOW_NODE_SHARE_NUM, MINING_WINDOW_NODE_SHARE_DEN),
            genesis_accounts,
            db,
        })
    }

    pub fn tip(&self) -> &Block {
        self.chain.last().expect("chain always has at least genesis")
    }

    pub fn height(&self) -> u64 {
        self.tip().index
    }

    pub fn get_block(&self, index: u64) -> Option<&Block> {
        self.chain.get(index as usize)
    }

    pub fn state_root(&self) -> String {
        self.state.state_root()
    }

    pub fn account(&self, address: &str) -> Option<Account> {
        self.state.get(address)
    }

    /// Register a node as an active participant of the in-flight mining
    /// window (§4.8.3), to be credited when the window closes.
    pub fn register_active_node(&mut self, node_id: String, ip: String, wallet: String) {
        self.mining_router.add_active_node(node_id, ip, wallet);
    }

    /// A deep-copied working snapshot of committed state, for dry-run
    /// validation by the block producer. Never committed directly.
    pub fn snapshot(&self) -> chronx_state::StateSnapshot {
        self.state.snapshot()
    }

    /// Ids currently held in the dedup cache, so a dry run can seed its own
    /// scratch cache without risking a mutable borrow of the ledger.
    pub fn dedup_ids(&self) -> Vec<chronx_core::TxId> {
        self.dedup.as_ids()
    }

    /// Structural and link validation against the current tip (§4.5.1).
    fn validate_block(&self, block: &Block, validator_pool: &ValidatorPool, now_ms: TimestampMs) -> Result<(), ChronxError> {
        if block.signature.len() / 2 > MAX_SIGNATURE_BYTES {
            return Err(ChronxError::InvalidStructure(format!("block {} signature too long", block.index)));
        }

        let tip = self.tip();
        if block.index != tip.index + 1 {
            return Err(ChronxError::ChainLinkError(format!(
                "expected index {}, got {}",
                tip.index + 1,
                block.index
            )));
        }
        if block.previous_hash != tip.hash {
            return Err(ChronxError::ChainLinkError("previous_hash does not match tip".to_string()));
        }
        if !(tip.timestamp_ms < block.timestamp_ms && block.timestamp_ms <= now_ms + MAX_FUTURE_BLOCK_SKEW_MS) {
            return Err(ChronxError::ChainLinkError(format!("block {} timestamp out of bounds", block.index)));
        }

        let validator = validator_pool
            .get(&block.validator_id)
            .ok_or_else(|| ChronxError::UnknownValidator(block.validator_id.clone()))?;
        if !chronx_crypto::verify(&validator.public_key, &block.signable_bytes(), &block.signature) {
            return Err(ChronxError::InvalidSignature { subject: block.hash.clone() });
        }

        Ok(())
    }

    /// Validate and apply `block` atop the current tip (§4.5 steps 1-6).
    pub fn add_block(&mut self, block: Block, validator_pool: &ValidatorPool, now_ms: TimestampMs) -> Result<(), ChronxError> {
        self.validate_block(&block, validator_pool, now_ms)?;

        let mut snapshot = self.state.snapshot();
        let node_wallet = validator_pool.get(&block.validator_id).map(|v| &v.wallet_address);
        for tx in &block.transactions {
            apply_transaction(&mut snapshot, tx, block.timestamp_ms, node_wallet, &mut self.dedup)?;
        }

        let computed_root = snapshot.state_root();
        if computed_root != block.state_root {
            return Err(ChronxError::ChainLinkError(format!(
                "block {} state root mismatch: expected {}, computed {}",
                block.index, block.state_root, computed_root
            )));
        }

        self.mining_router.accumulate_fee(block.total_fees());
        if self.mining_router.closes_at(block.index) {
            let distributed = self.mining_router.close_window(&mut snapshot);
            info!(height = %block.index, distributed, "mining window closed");
        }

        self.state.commit(snapshot)?;
        self.chain.push(block.clone());
        if let Some(db) = &self.db {
            db.put_block(&block)?;
            db.set_tip_height(block.index)?;
            db.set_tip_hash(&block.hash)?;
            db.set_dedup_cache(&self.dedup.as_ids())?;
        }

        info!(height = %block.index, hash = %block.hash, validator = %block.validator_id, "block committed");
        Ok(())
    }

    /// Fork-less append (§4.5.2): accept a direct child of the tip, detect
    /// and slash double-signing at an existing height, otherwise ignore.
    pub fn receive_block(&mut self, block: Block, validator_pool: &mut ValidatorPool, now_ms: TimestampMs) -> Result<(), ChronxError> {
        let tip = self.tip();
        if block.index == tip.index + 1 && block.previous_hash == tip.hash {
            return self.add_block(block, validator_pool, now_ms);
        }

        if let Some(existing) = self.get_block(block.index) {
            if existing.hash != block.hash && existing.validator_id == block.validator_id {
                let evidence = format!("conflicting blocks at height {} from {}", block.index, block.validator_id);
                validator_pool.slash(&block.validator_id, evidence)?;
                return Err(ChronxError::DoubleSign { validator_id: block.validator_id.clone(), height: block.index });
            }
        }
        Ok(())
    }

    /// Process an ordered run of blocks from a peer, handling no-op,
    /// simple-append, and reorg cases (§4.5.3).
    pub fn process_segment(
        &mut self,
        segment: Vec<Block>,
        validator_pool: &ValidatorPool,
        now_ms: TimestampMs,
    ) -> Result<(), ChronxError> {
        if segment.is_empty() {
            return Ok(());
        }
        for pair in segment.windows(2) {
            if pair[1].index != pair[0].index + 1 || pair[1].previous_hash != pair[0].hash {
                return Err(ChronxError::ChainLinkError("segment is not internally hash-linked".to_string()));
            }
        }

        let tip = self.tip();
        if segment[0].index > tip.index + 1 {
            return Err(ChronxError::ChainLinkError("segment has a gap from the local tip".to_string()));
        }

        let divergence = segment
            .iter()
            .position(|b| self.get_block(b.index).map(|local| local.hash != b.hash).unwrap_or(true));

        let Some(divergence) = divergence else {
            return Ok(()); // fully matches local chain already
        };

        if segment[divergence].index > tip.index {
            // Simple append: everything from divergence is new.
            for block in &segment[divergence..] {
                self.add_block(block.clone(), validator_pool, now_ms)?;
            }
            return Ok(());
        }

        // Fork below the tip: reorg.
        let divergence_index = segment[divergence].index;
        let depth = tip.index.saturating_sub(divergence_index);
        if depth > MAX_REORG_DEPTH {
            return Err(ChronxError::ReorgInvalid(format!("reorg depth {depth} exceeds MAX_REORG_DEPTH")));
        }

        let incoming_tip_index = segment.last().unwrap().index;
        if incoming_tip_index <= tip.index {
            return Err(ChronxError::ReorgInvalid("competing fork is not longer than the current chain".to_string()));
        }

        let mut rebuilt_chain: Vec<Block> = self.chain[..divergence_index as usize].to_vec();
        rebuilt_chain.extend(segment[divergence..].iter().cloned());

        // `restore_chain` only assigns to `self` after the full replay
        // succeeds, so a failed reorg attempt leaves the current chain and
        // state untouched — no explicit backup/restore needed here.
        self.restore_chain(rebuilt_chain, validator_pool, now_ms).map_err(|e| {
            error!(error = %e, "reorg replay failed, keeping prior chain");
            ChronxError::ReorgInvalid(format!("rebuilt chain failed validation: {e}"))
        })
    }

    /// Reset state and tip, then replay `blocks` from genesis (§4.5.4). On
    /// any failure, no partial mutation is visible — the caller's own
    /// ledger fields are only touched by `process_segment`'s backup/restore
    /// dance or by a fresh `Ledger` construction.
    pub fn restore_chain(&mut self, blocks: Vec<Block>, validator_pool: &ValidatorPool, now_ms: TimestampMs) -> Result<(), ChronxError> {
        let Some(genesis) = blocks.first() else {
            return Err(ChronxError::InvalidStructure("restore_chain requires at least a genesis block".to_string()));
        };
        if genesis.index != 0 {
            return Err(ChronxError::GenesisMismatch { expected: "0".to_string(), found: genesis.index.to_string() });
        }

        let mut state = StateStore::new();
        for account in &self.genesis_accounts {
            state.seed(account.clone())?;
        }
        let mut dedup = DedupCache::new();
        let mut mining_router = RewardRouter::new(MINING_WINDOW_LENGTH, MINING_WINDOW_NODE_SHARE_NUM, MINING_WINDOW_NODE_SHARE_DEN);
        let mut chain = vec![genesis.clone()];

        for block in &blocks[1..] {
            let expected_index = chain.last().unwrap().index + 1;
            if block.index != expected_index {
                return Err(ChronxError::ChainLinkError(format!("expected index {expected_index}, got {}", block.index)));
            }
            if block.previous_hash != chain.last().unwrap().hash {
                return Err(ChronxError::ChainLinkError("previous_hash mismatch during restore".to_string()));
            }

            let mut snapshot = state.snapshot();
            let node_wallet = validator_pool.get(&block.validator_id).map(|v| &v.wallet_address);
            for tx in &block.transactions {
                apply_transaction(&mut snapshot, tx, block.timestamp_ms, node_wallet, &mut dedup)?;
            }
            if snapshot.state_root() != block.state_root {
                return Err(ChronxError::ChainLinkError(format!("block {} state root mismatch on replay", block.index)));
            }
            mining_router.accumulate_fee(block.total_fees());
            if mining_router.closes_at(block.index) {
                mining_router.close_window(&mut snapshot);
            }
            state.commit(snapshot)?;
            chain.push(block.clone());
        }

        if let Some(db) = &self.db {
            db.wipe()?;
            for block in &chain {
                db.put_block(block)?;
            }
            db.set_tip_height(chain.last().unwrap().index)?;
            db.set_tip_hash(&chain.last().unwrap().hash)?;
            db.set_dedup_cache(&dedup.as_ids())?;
        }

        self.state = state;
        self.chain = chain;
        self.dedup = dedup;
        self.mining_router = mining_router;
        warn!(height = %self.height(), "chain restored from replay");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronx_core::events::EventBus;
    use chronx_core::{Payload, Transaction, TxType};

    fn genesis_block() -> Block {
        let mut block = Block {
            index: 0,
            previous_hash: String::new(),
            timestamp_ms: 0,
            validator_id: "genesis".to_string(),
            state_root: StateStore::new().state_root(),
            transactions: vec![],
            hash: String::new(),
            signature: String::new(),
            signatures: vec![],
        };
        block.hash = block.compute_hash();
        block
    }

    fn validator_pool_with_one(kp: &chronx_crypto::KeyPair) -> ValidatorPool {
        let mut pool = ValidatorPool::new(EventBus::new());
        pool.register("v1".into(), "node-wallet".into(), kp.public_key_hex(), 0);
        pool
    }

    fn signed_block(kp: &chronx_crypto::KeyPair, index: u64, previous: &Block, state_root: String, transactions: Vec<Transaction>, timestamp_ms: TimestampMs) -> Block {
        let mut block = Block {
            index,
            previous_hash: previous.hash.clone(),
            timestamp_ms,
            validator_id: "v1".to_string(),
            state_root,
            transactions,
            hash: String::new(),
            signature: String::new(),
            signatures: vec![],
        };
        block.hash = block.compute_hash();
        block.signature = kp.sign(&block.signable_bytes());
        block
    }

    #[test]
    fn genesis_with_wrong_hash_is_rejected() {
        let mut block = genesis_block();
        block.hash = "wrong".to_string();
        assert!(Ledger::new(block, vec![], None).is_err());
    }

    #[test]
    fn add_block_extends_tip_and_commits_state() {
        let kp = chronx_crypto::KeyPair::generate();
        let genesis = genesis_block();
        let mut ledger = Ledger::new(genesis.clone(), vec![], None).unwrap();
        let pool = validator_pool_with_one(&kp);

        let empty_root = ledger.state_root();
        let block = signed_block(&kp, 1, &genesis, empty_root, vec![], 1_000);

        ledger.add_block(block, &pool, 2_000).unwrap();
        assert_eq!(ledger.height(), 1);
    }

    #[test]
    fn add_block_rejects_wrong_index() {
        let kp = chronx_crypto::KeyPair::generate();
        let genesis = genesis_block();
        let mut ledger = Ledger::new(genesis.clone(), vec![], None).unwrap();
        let pool = validator_pool_with_one(&kp);

        let root = ledger.state_root();
        let mut block = signed_block(&kp, 2, &genesis, root, vec![], 1_000);
        block.hash = block.compute_hash();
        block.signature = kp.sign(&block.signable_bytes());

        let err = ledger.add_block(block, &pool, 2_000).unwrap_err();
        assert!(matches!(err, ChronxError::ChainLinkError(_)));
    }

    #[test]
    fn receive_block_ignores_unrelated_height() {
        let kp = chronx_crypto::KeyPair::generate();
        let genesis = genesis_block();
        let mut ledger = Ledger::new(genesis.clone(), vec![], None).unwrap();
        let mut pool = validator_pool_with_one(&kp);

        let far_future = signed_block(&kp, 99, &genesis, ledger.state_root(), vec![], 1_000);
        assert!(ledger.receive_block(far_future, &mut pool, 2_000).is_ok());
        assert_eq!(ledger.height(), 0);
    }

    #[test]
    fn process_segment_simple_append() {
        let kp = chronx_crypto::KeyPair::generate();
        let genesis = genesis_block();
        let mut ledger = Ledger::new(genesis.clone(), vec![], None).unwrap();
        let pool = validator_pool_with_one(&kp);

        let root = ledger.state_root();
        let block1 = signed_block(&kp, 1, &genesis, root.clone(), vec![], 1_000);
        let block2 = signed_block(&kp, 2, &block1, root, vec![], 2_000);

        ledger.process_segment(vec![block1, block2], &pool, 3_000).unwrap();
        assert_eq!(ledger.height(), 2);
    }

    #[test]
    fn batch_transaction_applies_inner_effects() {
        let kp = chronx_crypto::KeyPair::generate();
        let genesis_account = Account::with_balance("alice".to_string(), 10_000);
        let genesis = genesis_block();
        let mut ledger = Ledger::new(genesis, vec![genesis_account], None).unwrap();
        let pool = validator_pool_with_one(&kp);

        let inner = Transaction {
            tx_id: "inner-1".to_string(),
            tx_type: TxType::Like,
            from: "alice".to_string(),
            to: "owner".to_string(),
            amount: 0,
            fee: 1_000,
            nonce: 1,
            timestamp_ms: 0,
            valid_until_ms: None,
            payload: Payload::ContentRef { content_id: "post-1".to_string() },
            sender_public_key: String::new(),
            sender_signature: String::new(),
        };
        let mut batch_tx = Transaction {
            tx_id: String::new(),
            tx_type: TxType::Batch,
            from: "MESSAGE_POOL".to_string(),
            to: "MESSAGE_POOL".to_string(),
            amount: 0,
            fee: 1_000,
            nonce: 1,
            timestamp_ms: 0,
            valid_until_ms: None,
            payload: Payload::Batch { inner: vec![inner] },
            sender_public_key: String::new(),
            sender_signature: String::new(),
        };
        batch_tx.tx_id = batch_tx.compute_tx_id();

        let mut snapshot = ledger.state.snapshot();
        crate::apply::apply_transaction(&mut snapshot, &batch_tx, 0, None, &mut ledger.dedup).unwrap();
        assert!(snapshot.get("alice").unwrap().has_liked("post-1"));
    }
}
