//! Per-transaction fee split (§4.8.1): four integer shares that sum exactly
//! to the fee, with the remainder folded into the primary share.

use chronx_core::{
    main_treasury_address, treasury_dev_address, treasury_recycle_address, validator_pool_address,
    Address, Balance, TxType, FEE_SPLIT_DEV_PCT, FEE_SPLIT_POOL_PCT, FEE_SPLIT_PRIMARY_PCT,
    FEE_SPLIT_RECYCLE_PCT,
};
use chronx_state::StateSnapshot;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeSplit {
    pub primary: Balance,
    pub pool: Balance,
    pub recycle: Balance,
    pub dev: Balance,
}

impl FeeSplit {
    pub fn total(&self) -> Balance {
        self.primary + self.pool + self.recycle + self.dev
    }
}

/// Floor-divide `fee` into the fixed 45/30/20/5 shares, folding whatever
/// the floor division drops on the floor back into `primary` so the four
/// shares sum exactly to `fee`.
pub fn split_fee(fee: Balance) -> FeeSplit {
    let pool = fee * FEE_SPLIT_POOL_PCT / 100;
    let recycle = fee * FEE_SPLIT_RECYCLE_PCT / 100;
    let dev = fee * FEE_SPLIT_DEV_PCT / 100;
    let primary = fee - pool - recycle - dev;
    FeeSplit { primary, pool, recycle, dev }
}

/// Destination for the primary share: the social target for social-action
/// types, otherwise the block's node wallet, falling back to the main
/// treasury when the producer has none registered.
pub fn primary_destination(tx_type: TxType, to_wallet: &Address, node_wallet: Option<&Address>) -> Address {
    if tx_type.is_social_action() {
        to_wallet.clone()
    } else {
        node_wallet.cloned().unwrap_or_else(main_treasury_address)
    }
}

/// Credit all four shares of `fee` into `snapshot`. `to_wallet` is the
/// transaction's own `to` address (used for the social-action primary
/// destination); `node_wallet` is the committing block's proposer payout
/// address.
pub fn apply_fee_split(
    snapshot: &mut StateSnapshot,
    fee: Balance,
    tx_type: TxType,
    to_wallet: &Address,
    node_wallet: Option<&Address>,
) {
    if fee == 0 {
        return;
    }
    let split = split_fee(fee);
    let primary_addr = primary_destination(tx_type, to_wallet, node_wallet);

    snapshot.get_or_default(&primary_addr).balance += split.primary;
    snapshot.get_or_default(&validator_pool_address()).balance += split.pool;
    snapshot.get_or_default(&treasury_recycle_address()).balance += split.recycle;
    snapshot.get_or_default(&treasury_dev_address()).balance += split.dev;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_sum_exactly_to_fee() {
        for fee in [1u128, 3, 7, 10, 999, 1_000_003] {
            let split = split_fee(fee);
            assert_eq!(split.total(), fee);
        }
    }

    #[test]
    fn remainder_folds_into_primary() {
        let split = split_fee(7);
        // pool=2, recycle=1, dev=0 -> primary takes the rest = 4
        assert_eq!(split.pool, 2);
        assert_eq!(split.recycle, 1);
        assert_eq!(split.dev, 0);
        assert_eq!(split.primary, 4);
    }

    #[test]
    fn social_action_primary_goes_to_target() {
        let dest = primary_destination(TxType::Like, &"alice".to_string(), Some(&"node1".to_string()));
        assert_eq!(dest, "alice");
    }

    #[test]
    fn non_social_primary_goes_to_node_wallet() {
        let dest = primary_destination(TxType::Transfer, &"alice".to_string(), Some(&"node1".to_string()));
        assert_eq!(dest, "node1");
    }

    #[test]
    fn missing_node_wallet_falls_back_to_main_treasury() {
        let dest = primary_destination(TxType::Transfer, &"alice".to_string(), None);
        assert_eq!(dest, main_treasury_address());
    }

    #[test]
    fn apply_fee_split_credits_all_four_destinations() {
        let mut snapshot = StateSnapshot::default();
        apply_fee_split(&mut snapshot, 100, TxType::Transfer, &"alice".to_string(), Some(&"node1".to_string()));
        assert_eq!(snapshot.get("node1").unwrap().balance, 45);
        assert_eq!(snapshot.get(&validator_pool_address()).unwrap().balance, 30);
        assert_eq!(snapshot.get(&treasury_recycle_address()).unwrap().balance, 20);
        assert_eq!(snapshot.get(&treasury_dev_address()).unwrap().balance, 5);
    }

    #[test]
    fn zero_fee_credits_nothing() {
        let mut snapshot = StateSnapshot::default();
        apply_fee_split(&mut snapshot, 0, TxType::Transfer, &"alice".to_string(), Some(&"node1".to_string()));
        assert!(!snapshot.contains("node1"));
    }
}
