//! Validator registry, liveness tracking, deterministic proposer
//! selection, and slashing (§4.7).

use std::collections::BTreeMap;

use chronx_core::{
    BlockHash, ChronxError, ChronxEvent, EventBus, TimestampMs, Validator, ValidatorId,
    SLASH_REPUTATION_PENALTY,
};

pub struct ValidatorPool {
    validators: BTreeMap<ValidatorId, Validator>,
    events: EventBus,
}

impl ValidatorPool {
    pub fn new(events: EventBus) -> Self {
        Self {
            validators: BTreeMap::new(),
            events,
        }
    }

    pub fn register(
        &mut self,
        validator_id: ValidatorId,
        wallet_address: String,
        public_key: String,
        now_ms: TimestampMs,
    ) {
        let validator = Validator::new(validator_id.clone(), public_key, wallet_address, now_ms);
        self.validators.insert(validator_id, validator);
    }

    pub fn get(&self, validator_id: &str) -> Option<&Validator> {
        self.validators.get(validator_id)
    }

    pub fn set_online(&mut self, validator_id: &str) -> Result<(), ChronxError> {
        let v = self.require_mut(validator_id)?;
        v.is_online = true;
        Ok(())
    }

    pub fn set_offline(&mut self, validator_id: &str) -> Result<(), ChronxError> {
        let v = self.require_mut(validator_id)?;
        v.is_online = false;
        Ok(())
    }

    /// Monotone liveness update: `current_height` only ever moves forward.
    pub fn heartbeat(
        &mut self,
        validator_id: &str,
        current_height: u64,
        now_ms: TimestampMs,
    ) -> Result<(), ChronxError> {
        let v = self.require_mut(validator_id)?;
        v.last_active_ms = now_ms;
        v.is_online = true;
        if current_height > v.last_seen_block_height {
            v.last_seen_block_height = current_height;
        }
        Ok(())
    }

    /// Mark every validator offline whose last heartbeat is older than
    /// `offline_timeout_ms`.
    pub fn sweep_offline(&mut self, now_ms: TimestampMs, offline_timeout_ms: i64) {
        for v in self.validators.values_mut() {
            if v.is_online && now_ms - v.last_active_ms > offline_timeout_ms {
                v.is_online = false;
            }
        }
    }

    pub fn active_online_count(&self) -> usize {
        self.validators.values().filter(|v| v.is_online).count()
    }

    pub fn total_count(&self) -> usize {
        self.validators.len()
    }

    pub fn all(&self) -> impl Iterator<Item = &Validator> {
        self.validators.values()
    }

    /// Deterministic proposer selection (§4.7 steps 1-3). Returns `None` if
    /// no validator is online.
    pub fn select_producer(
        &self,
        next_index: u64,
        previous_hash: &BlockHash,
        round: u64,
    ) -> Option<ValidatorId> {
        let mut online: Vec<&ValidatorId> = self
            .validators
            .iter()
            .filter(|(_, v)| v.is_online)
            .map(|(id, _)| id)
            .collect();
        online.sort();
        let n = online.len();
        if n == 0 {
            return None;
        }

        let selector_input = format!("{previous_hash}{next_index}");
        let digest = chronx_crypto::sha256_hex(selector_input.as_bytes());
        let last_8 = &digest[digest.len() - 8..];
        let base_selector = u64::from_str_radix(last_8, 16).unwrap_or(0) % n as u64;
        let selector = (base_selector + round) % n as u64;
        Some(online[selector as usize].clone())
    }

    /// Apply the fixed reputation penalty, force offline, emit `Slashed`.
    pub fn slash(&mut self, validator_id: &str, evidence: String) -> Result<(), ChronxError> {
        let v = self.require_mut(validator_id)?;
        v.reputation -= SLASH_REPUTATION_PENALTY;
        v.clamp_reputation();
        v.is_online = false;
        self.events.publish(ChronxEvent::Slashed {
            validator_id: validator_id.to_string(),
            evidence,
        });
        Ok(())
    }

    pub fn record_block_produced(&mut self, validator_id: &str) -> Result<(), ChronxError> {
        let v = self.require_mut(validator_id)?;
        v.total_blocks_produced += 1;
        Ok(())
    }

    pub fn record_signature(&mut self, validator_id: &str) -> Result<(), ChronxError> {
        let v = self.require_mut(validator_id)?;
        v.total_signatures += 1;
        Ok(())
    }

    fn require_mut(&mut self, validator_id: &str) -> Result<&mut Validator, ChronxError> {
        self.validators
            .get_mut(validator_id)
            .ok_or_else(|| ChronxError::UnknownValidator(validator_id.to_string()))
    }
}
