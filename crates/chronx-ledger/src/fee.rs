//! Minimum-fee and time-weighted fee-gate validation (§4.6 step 7, §6).

use chronx_core::{
    Balance, ChronxError, Payload, Priority, TimestampMs, Transaction, TxType,
    FAST_FEE_THRESHOLD, FEE_RATE_SCALE, LOW_FEE_THRESHOLD, MIN_FEE_COMMENT, MIN_FEE_FOLLOW,
    MIN_FEE_LIKE, MIN_FEE_UNFOLLOW, PRIORITY_SURCHARGE_HIGH_PPM, PRIORITY_SURCHARGE_LOW_PPM,
    PRIORITY_SURCHARGE_MEDIUM_PPM, PRIORITY_SURCHARGE_STANDARD_PPM, STANDARD_FEE_THRESHOLD,
    TRANSFER_TIER_RATES_PPM, TRANSFER_TIER_THRESHOLDS, WAIT_LOW_MS, WAIT_STANDARD_MS,
};

/// Highest tier whose threshold the recipient's `incoming_transfer_count`
/// has reached.
fn transfer_tier(incoming_transfer_count: u64) -> usize {
    TRANSFER_TIER_THRESHOLDS
        .iter()
        .rposition(|&threshold| incoming_transfer_count >= threshold)
        .unwrap_or(0)
}

fn priority_surcharge_ppm(priority: Priority) -> u128 {
    match priority {
        Priority::Standard => PRIORITY_SURCHARGE_STANDARD_PPM,
        Priority::Low => PRIORITY_SURCHARGE_LOW_PPM,
        Priority::Medium => PRIORITY_SURCHARGE_MEDIUM_PPM,
        Priority::High => PRIORITY_SURCHARGE_HIGH_PPM,
    }
}

/// Minimum TRANSFER fee: `amount * (base_rate[tier] + priority_surcharge) /
/// FEE_RATE_SCALE`, floor-rounded.
pub fn min_transfer_fee(amount: Balance, recipient_incoming_transfer_count: u64, priority: Priority) -> Balance {
    let tier = transfer_tier(recipient_incoming_transfer_count);
    let rate_ppm = TRANSFER_TIER_RATES_PPM[tier] + priority_surcharge_ppm(priority);
    amount * rate_ppm / FEE_RATE_SCALE
}

fn transfer_priority(tx: &Transaction) -> Priority {
    match &tx.payload {
        Payload::TransferOptions { priority } => *priority,
        _ => Priority::Standard,
    }
}

/// Per-type minimum fee (§6). Types with no declared minimum beyond the
/// time-weighted gate return `0`.
pub fn validate_minimum_fee(tx: &Transaction, recipient_incoming_transfer_count: u64) -> Result<(), ChronxError> {
    let required = match tx.tx_type {
        TxType::Like => MIN_FEE_LIKE,
        TxType::Follow => MIN_FEE_FOLLOW,
        TxType::Unfollow => MIN_FEE_UNFOLLOW,
        TxType::Comment => MIN_FEE_COMMENT,
        TxType::Transfer => min_transfer_fee(tx.amount, recipient_incoming_transfer_count, transfer_priority(tx)),
        _ => 0,
    };
    if tx.fee < required {
        return Err(ChronxError::InvalidFee {
            tx_id: tx.tx_id.clone(),
            reason: format!("fee {} below minimum {}", tx.fee, required),
        });
    }
    Ok(())
}

/// Time-weighted low-fee wait gate (§4.6 step 7): transactions paying below
/// the FAST threshold must have aged in proportion to how low their fee is.
/// Wait-exempt types (social actions, batches, profile updates, rewards)
/// skip this gate entirely.
pub fn validate_time_weighted_fee(tx: &Transaction, now_ms: TimestampMs) -> Result<(), ChronxError> {
    if tx.tx_type.is_wait_exempt() || tx.fee >= FAST_FEE_THRESHOLD {
        return Ok(());
    }

    let age_ms = now_ms - tx.timestamp_ms;
    let required_wait = if tx.fee >= STANDARD_FEE_THRESHOLD {
        WAIT_STANDARD_MS
    } else if tx.fee >= LOW_FEE_THRESHOLD {
        WAIT_LOW_MS
    } else {
        return Err(ChronxError::InvalidFee {
            tx_id: tx.tx_id.clone(),
            reason: format!("fee {} below low-fee floor {}", tx.fee, LOW_FEE_THRESHOLD),
        });
    };

    if age_ms < required_wait {
        return Err(ChronxError::InvalidFee {
            tx_id: tx.tx_id.clone(),
            reason: format!("low-fee transaction must age {required_wait}ms, has aged {age_ms}ms"),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronx_core::Payload;

    fn transfer_tx(amount: Balance, fee: Balance, priority: Priority) -> Transaction {
        Transaction {
            tx_id: "t1".into(),
            tx_type: TxType::Transfer,
            from: "alice".into(),
            to: "bob".into(),
            amount,
            fee,
            nonce: 1,
            timestamp_ms: 0,
            valid_until_ms: None,
            payload: Payload::TransferOptions { priority },
            sender_public_key: "pk".into(),
            sender_signature: String::new(),
        }
    }

    #[test]
    fn transfer_fee_uses_lowest_tier_for_new_recipient() {
        let min = min_transfer_fee(10_000, 0, Priority::Standard);
        assert_eq!(min, 10_000 * 100 / FEE_RATE_SCALE);
    }

    #[test]
    fn transfer_fee_rate_increases_with_recipient_popularity() {
        let low = min_transfer_fee(10_000, 0, Priority::Standard);
        let high = min_transfer_fee(10_000, 200, Priority::Standard);
        assert!(high > low);
    }

    #[test]
    fn priority_surcharge_increases_required_fee() {
        let standard = min_transfer_fee(10_000, 0, Priority::Standard);
        let high_priority = min_transfer_fee(10_000, 0, Priority::High);
        assert!(high_priority > standard);
    }

    #[test]
    fn like_below_minimum_fee_rejected() {
        let mut tx = transfer_tx(0, 500, Priority::Standard);
        tx.tx_type = TxType::Like;
        assert!(validate_minimum_fee(&tx, 0).is_err());
    }

    #[test]
    fn social_actions_are_exempt_from_time_weighted_gate() {
        let mut tx = transfer_tx(0, 1, Priority::Standard);
        tx.tx_type = TxType::Like;
        assert!(validate_time_weighted_fee(&tx, 0).is_ok());
    }

    #[test]
    fn low_fee_transfer_must_age_before_acceptance() {
        let tx = transfer_tx(1_000, 600, Priority::Standard);
        assert!(validate_time_weighted_fee(&tx, 100).is_err());
        assert!(validate_time_weighted_fee(&tx, WAIT_STANDARD_MS + 100).is_ok());
    }

    #[test]
    fn fee_below_low_floor_is_rejected_outright() {
        let tx = transfer_tx(1_000, 10, Priority::Standard);
        assert!(validate_time_weighted_fee(&tx, i64::MAX).is_err());
    }
}
