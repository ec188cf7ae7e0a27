//! Two-phase block producer state machine (§4.9).

use chronx_consensus::ValidatorPool;
use chronx_core::{
    validator_pool_address, Account, Block, ChronxError, ChronxEvent, EventBus, TimestampMs, Transaction,
    ValidatorId, WitnessSignature, BLOCK_TIME_MS,
};
use chronx_crypto::KeyPair;
use chronx_ledger::{DedupCache, Ledger};
use chronx_mempool::Mempool;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProduceOutcome {
    NotSelected,
    AlreadyProposing,
    NothingToPropose,
    Proposed(String),
    Committed(String),
}

enum ProducerState {
    Idle,
    Proposing { block: Block, deadline_ms: TimestampMs, signatures: Vec<WitnessSignature> },
}

pub struct BlockProducer {
    validator_id: ValidatorId,
    keypair: KeyPair,
    max_tx_per_block: usize,
    proposal_timeout_ms: i64,
    state: ProducerState,
    blocks_produced: u64,
    events: EventBus,
}

impl BlockProducer {
    pub fn new(validator_id: ValidatorId, keypair: KeyPair, max_tx_per_block: usize, proposal_timeout_ms: i64, events: EventBus) -> Self {
        Self {
            validator_id,
            keypair,
            max_tx_per_block,
            proposal_timeout_ms,
            state: ProducerState::Idle,
            blocks_produced: 0,
            events,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self.state, ProducerState::Idle)
    }

    pub fn blocks_produced(&self) -> u64 {
        self.blocks_produced
    }

    /// Stop the producer, discarding any in-flight proposal and its
    /// pending timeout.
    pub fn cancel(&mut self) {
        self.state = ProducerState::Idle;
    }

    pub fn produce(
        &mut self,
        ledger: &mut Ledger,
        mempool: &mut Mempool,
        validator_pool: &mut ValidatorPool,
        now_ms: TimestampMs,
    ) -> Result<ProduceOutcome, ChronxError> {
        if !self.is_idle() {
            return Ok(ProduceOutcome::AlreadyProposing);
        }

        let tip = ledger.tip().clone();
        let next_index = tip.index + 1;
        let round = ((now_ms - tip.timestamp_ms).max(0) / BLOCK_TIME_MS) as u64;
        let selected = validator_pool.select_producer(next_index, &tip.hash, round);
        if selected.as_deref() != Some(self.validator_id.as_str()) {
            return Ok(ProduceOutcome::NotSelected);
        }

        let node_wallet = validator_pool.get(&self.validator_id).map(|v| v.wallet_address.clone());

        let mut candidates = mempool.top(self.max_tx_per_block);
        candidates.sort_by(|a, b| a.from.cmp(&b.from).then(a.nonce.cmp(&b.nonce)));

        let mut snapshot = ledger.snapshot();
        let mut scratch_dedup = DedupCache::from_ids(ledger.dedup_ids());
        let mut accepted: Vec<Transaction> = Vec::new();

        for tx in candidates {
            match chronx_ledger::apply_transaction(&mut snapshot, &tx, now_ms, node_wallet.as_ref(), &mut scratch_dedup) {
                Ok(()) => accepted.push(tx),
                Err(ChronxError::InvalidFee { .. }) => {
                    // Economically valid but not yet old enough (or the
                    // per-type minimum moved) — leave it for a later round.
                }
                Err(reason) => {
                    warn!(tx_id = %tx.tx_id, error = %reason, "dropping transaction from block candidate set");
                    mempool.remove(&tx.tx_id);
                }
            }
        }

        if chronx_rewards::is_epoch_boundary(next_index) {
            let pool_account = ledger.account(&validator_pool_address()).unwrap_or_else(|| Account::new(validator_pool_address()));
            let validators: Vec<_> = validator_pool.all().cloned().collect();
            let rewards = chronx_rewards::build_epoch_rewards(next_index, &pool_account, &validators, now_ms);
            for reward_tx in rewards {
                chronx_ledger::apply_transaction(&mut snapshot, &reward_tx, now_ms, node_wallet.as_ref(), &mut scratch_dedup)?;
                accepted.push(reward_tx);
            }
        }

        if accepted.is_empty() {
            return Ok(ProduceOutcome::NothingToPropose);
        }

        let mut block = Block {
            index: next_index,
            previous_hash: tip.hash.clone(),
            timestamp_ms: now_ms,
            validator_id: self.validator_id.clone(),
            state_root: snapshot.state_root(),
            transactions: accepted,
            hash: String::new(),
            signature: String::new(),
            signatures: vec![],
        };
        block.hash = block.compute_hash();
        block.signature = self.keypair.sign(&block.signable_bytes());

        let witness_signature = self.keypair.sign(block.hash.as_bytes());
        let first_witness = WitnessSignature { validator_id: self.validator_id.clone(), signature: witness_signature };

        if validator_pool.active_online_count() <= 1 {
            return self.commit(block, vec![first_witness], ledger, mempool, validator_pool, now_ms).map(ProduceOutcome::Committed);
        }

        self.events.publish(ChronxEvent::BlockProposed(block.clone()));
        let hash = block.hash.clone();
        self.state = ProducerState::Proposing {
            block,
            deadline_ms: now_ms + self.proposal_timeout_ms,
            signatures: vec![first_witness],
        };
        Ok(ProduceOutcome::Proposed(hash))
    }

    /// Incoming witness signature during `PROPOSING` (§4.9). Returns the
    /// committed block's hash once quorum is reached.
    pub fn add_signature(
        &mut self,
        validator_id: &str,
        signature: String,
        ledger: &mut Ledger,
        mempool: &mut Mempool,
        validator_pool: &mut ValidatorPool,
        now_ms: TimestampMs,
    ) -> Result<Option<String>, ChronxError> {
        let ProducerState::Proposing { block, signatures, .. } = &mut self.state else {
            return Ok(None);
        };

        if signatures.iter().any(|s| s.validator_id == validator_id) {
            return Ok(None);
        }
        let Some(validator) = validator_pool.get(validator_id) else {
            return Err(ChronxError::UnknownValidator(validator_id.to_string()));
        };
        if !chronx_crypto::verify(&validator.public_key, block.hash.as_bytes(), &signature) {
            return Err(ChronxError::InvalidSignature { subject: block.hash.clone() });
        }
        signatures.push(WitnessSignature { validator_id: validator_id.to_string(), signature });

        let threshold = validator_pool.active_online_count() / 2 + 1;
        if signatures.len() < threshold {
            return Ok(None);
        }

        let ProducerState::Proposing { block, signatures, .. } = std::mem::replace(&mut self.state, ProducerState::Idle) else {
            unreachable!("checked above");
        };
        let hash = self.commit(block, signatures, ledger, mempool, validator_pool, now_ms)?;
        Ok(Some(hash))
    }

    /// Timer-driven housekeeping: commit whatever signatures have arrived
    /// once the proposal deadline passes (weak-block policy).
    pub fn handle_timeout(
        &mut self,
        ledger: &mut Ledger,
        mempool: &mut Mempool,
        validator_pool: &mut ValidatorPool,
        now_ms: TimestampMs,
    ) -> Result<Option<String>, ChronxError> {
        let should_commit = matches!(&self.state, ProducerState::Proposing { deadline_ms, .. } if now_ms >= *deadline_ms);
        if !should_commit {
            return Ok(None);
        }
        let ProducerState::Proposing { block, signatures, .. } = std::mem::replace(&mut self.state, ProducerState::Idle) else {
            unreachable!("checked above");
        };

        let active_online = validator_pool.active_online_count();
        let wanted = active_online / 2 + 1;
        if signatures.len() < wanted {
            warn!(
                height = %block.index,
                got = signatures.len(),
                wanted,
                "committing weak block on proposal timeout"
            );
        }

        self.commit(block, signatures, ledger, mempool, validator_pool, now_ms).map(Some)
    }

    fn commit(
        &mut self,
        mut block: Block,
        signatures: Vec<WitnessSignature>,
        ledger: &mut Ledger,
        mempool: &mut Mempool,
        validator_pool: &mut ValidatorPool,
        now_ms: TimestampMs,
    ) -> Result<String, ChronxError> {
        block.signatures = signatures;
        ledger.add_block(block.clone(), validator_pool, now_ms)?;

        for tx in &block.transactions {
            mempool.remove(&tx.tx_id);
        }

        self.blocks_produced += 1;
        validator_pool.record_block_produced(&block.validator_id)?;
        for witness in &block.signatures {
            validator_pool.record_signature(&witness.validator_id)?;
        }

        self.events.publish(ChronxEvent::NewBlock {
            block: block.clone(),
            producer: block.validator_id.clone(),
            tx_count: block.transactions.len(),
        });
        info!(height = %block.index, hash = %block.hash, "block produced and committed");

        self.state = ProducerState::Idle;
        Ok(block.hash)
    }
}
