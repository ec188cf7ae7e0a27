//! Validator epoch distribution (§4.8.2): every `EPOCH_LENGTH` blocks the
//! `VALIDATOR_POOL` balance is split equally among validators who have kept
//! up with the chain, as a batch of `REWARD` transactions the producer
//! folds into the closing block.

use chronx_core::{
    validator_pool_address, Account, Balance, Payload, TimestampMs, Transaction, TxType, Validator,
    EPOCH_LENGTH,
};

pub fn is_epoch_boundary(next_index: u64) -> bool {
    next_index > 0 && next_index % EPOCH_LENGTH == 0
}

/// Validators eligible for this epoch's payout: those that have seen a
/// block within the trailing `EPOCH_LENGTH` window.
pub fn eligible_validators<'a>(next_index: u64, validators: &'a [Validator]) -> Vec<&'a Validator> {
    let floor = next_index.saturating_sub(EPOCH_LENGTH);
    validators
        .iter()
        .filter(|v| v.last_seen_block_height >= floor)
        .collect()
}

/// Build one `REWARD` transaction per eligible validator, splitting
/// `pool_account`'s balance equally. Dust left by integer division stays in
/// the pool. Sequential nonces are assigned starting at `pool_account.nonce
/// + 1` since each reward transaction still debits the pool's nonce like
/// any other sender.
pub fn build_epoch_rewards(
    next_index: u64,
    pool_account: &Account,
    validators: &[Validator],
    now_ms: TimestampMs,
) -> Vec<Transaction> {
    let recipients = eligible_validators(next_index, validators);
    if recipients.is_empty() || pool_account.balance == 0 {
        return Vec::new();
    }

    let share: Balance = pool_account.balance / recipients.len() as u128;
    if share == 0 {
        return Vec::new();
    }

    recipients
        .into_iter()
        .enumerate()
        .map(|(i, validator)| {
            let mut tx = Transaction {
                tx_id: String::new(),
                tx_type: TxType::Reward,
                from: validator_pool_address(),
                to: validator.wallet_address.clone(),
                amount: share,
                fee: 0,
                nonce: pool_account.nonce + 1 + i as u64,
                timestamp_ms: now_ms,
                valid_until_ms: None,
                payload: Payload::None,
                sender_public_key: String::new(),
                sender_signature: String::new(),
            };
            tx.tx_id = tx.compute_tx_id();
            tx
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(id: &str, wallet: &str, last_seen: u64) -> Validator {
        let mut v = Validator::new(id.into(), "pk".into(), wallet.into(), 0);
        v.last_seen_block_height = last_seen;
        v
    }

    #[test]
    fn epoch_boundary_divides_evenly() {
        assert!(is_epoch_boundary(200));
        assert!(!is_epoch_boundary(199));
        assert!(!is_epoch_boundary(0));
    }

    #[test]
    fn stale_validator_is_excluded_from_payout() {
        let validators = vec![validator("v1", "w1", 199), validator("v2", "w2", 0)];
        let eligible = eligible_validators(200, &validators);
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].validator_id, "v1");
    }

    #[test]
    fn pool_balance_splits_evenly_with_dust_retained() {
        let pool = Account::with_balance(validator_pool_address(), 101);
        let validators = vec![validator("v1", "w1", 200), validator("v2", "w2", 200)];
        let rewards = build_epoch_rewards(200, &pool, &validators, 0);
        assert_eq!(rewards.len(), 2);
        assert_eq!(rewards[0].amount, 50);
        assert_eq!(rewards[1].amount, 50);
    }

    #[test]
    fn empty_pool_yields_no_rewards() {
        let pool = Account::with_balance(validator_pool_address(), 0);
        let validators = vec![validator("v1", "w1", 200)];
        assert!(build_epoch_rewards(200, &pool, &validators, 0).is_empty());
    }

    #[test]
    fn reward_nonces_are_sequential() {
        let mut pool = Account::with_balance(validator_pool_address(), 100);
        pool.nonce = 4;
        let validators = vec![validator("v1", "w1", 200), validator("v2", "w2", 200)];
        let rewards = build_epoch_rewards(200, &pool, &validators, 0);
        assert_eq!(rewards[0].nonce, 5);
        assert_eq!(rewards[1].nonce, 6);
    }
}
