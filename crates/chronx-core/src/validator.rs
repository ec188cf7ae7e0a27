use serde::{Deserialize, Serialize};

use crate::types::{Address, TimestampMs, ValidatorId};

/// A registered validator record. `reputation` is clamped to `[0, 100]` by
/// every mutation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validator {
    pub validator_id: ValidatorId,
    pub public_key: String,
    pub wallet_address: Address,
    pub is_online: bool,
    pub last_active_ms: TimestampMs,
    pub last_seen_block_height: u64,
    pub reputation: i32,
    pub total_blocks_produced: u64,
    pub total_signatures: u64,
}

impl Validator {
    pub fn new(validator_id: ValidatorId, public_key: String, wallet_address: Address, now_ms: TimestampMs) -> Self {
        Self {
            validator_id,
            public_key,
            wallet_address,
            is_online: true,
            last_active_ms: now_ms,
            last_seen_block_height: 0,
            reputation: 100,
            total_blocks_produced: 0,
            total_signatures: 0,
        }
    }

    /// Clamp reputation into `[0, 100]`; forces offline at the floor.
    pub fn clamp_reputation(&mut self) {
        if self.reputation < 0 {
            self.reputation = 0;
            self.is_online = false;
        } else if self.reputation > 100 {
            self.reputation = 100;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_validator_starts_online_with_full_reputation() {
        let v = Validator::new("v1".into(), "pk".into(), "wallet1".into(), 0);
        assert!(v.is_online);
        assert_eq!(v.reputation, 100);
    }

    #[test]
    fn reputation_clamps_and_forces_offline_at_floor() {
        let mut v = Validator::new("v1".into(), "pk".into(), "wallet1".into(), 0);
        v.reputation = -10;
        v.clamp_reputation();
        assert_eq!(v.reputation, 0);
        assert!(!v.is_online);
    }

    #[test]
    fn reputation_clamps_at_ceiling() {
        let mut v = Validator::new("v1".into(), "pk".into(), "wallet1".into(), 0);
        v.reputation = 150;
        v.clamp_reputation();
        assert_eq!(v.reputation, 100);
    }
}
