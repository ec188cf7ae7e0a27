//! Transaction application state machine (§4.6). One function dispatches
//! for block application, dry-run validation, and state-root recomputation
//! alike — callers differ only in whether the resulting snapshot is
//! ultimately committed.

use chronx_core::{
    Address, Balance, ChronxError, Payload, TimestampMs, Transaction, TxType, MAX_SIGNATURE_BYTES,
};
use chronx_state::StateSnapshot;
use tracing::warn;

use crate::dedup::DedupCache;
use crate::fee;

/// Apply `tx` against `snapshot`, mutating it in place. On any error the
/// snapshot may be partially mutated — callers must discard it, never
/// commit it, on `Err`.
pub fn apply_transaction(
    snapshot: &mut StateSnapshot,
    tx: &Transaction,
    now_ms: TimestampMs,
    node_wallet: Option<&Address>,
    dedup: &mut DedupCache,
) -> Result<(), ChronxError> {
    // 1. Structural checks.
    if tx.sender_signature.len() / 2 > MAX_SIGNATURE_BYTES {
        return Err(ChronxError::InvalidStructure(format!("signature too long on {}", tx.tx_id)));
    }
    if let Some(valid_until) = tx.valid_until_ms {
        if now_ms > valid_until {
            return Err(ChronxError::Expired(tx.tx_id.clone()));
        }
    }

    // 2. Dedup.
    if dedup.contains(&tx.tx_id) {
        return Err(ChronxError::Duplicate(tx.tx_id.clone()));
    }

    // 4. Signature (skipped only for REWARD, which the producer synthesizes
    // rather than a wallet signing directly). BATCH/CONVERSATION_BATCH
    // wrappers are still verified here, against the relayer/validator key
    // that submitted them (§4.4); their inner transactions are each
    // verified again individually in `batch`.
    if tx.tx_type != TxType::Reward {
        verify_signature(snapshot, tx)?;
    }

    // 3/5. Load-or-default both sides (aliases naturally if from == to, since
    // the two lookups run sequentially against the same map key).
    snapshot.get_or_default(&tx.from);
    snapshot.get_or_default(&tx.to);

    // 6. Nonce.
    {
        let from = snapshot.get_or_default(&tx.from);
        let expected = from.nonce + 1;
        if tx.nonce != expected {
            return Err(ChronxError::InvalidNonce {
                address: tx.from.clone(),
                expected,
                got: tx.nonce,
            });
        }
    }

    // 7. Time-weighted low-fee gate, and per-type minimum fee.
    fee::validate_time_weighted_fee(tx, now_ms)?;
    let recipient_incoming_transfers = snapshot.get(&tx.to).map(|a| a.incoming_transfer_count).unwrap_or(0);
    fee::validate_minimum_fee(tx, recipient_incoming_transfers)?;

    // 8. Dispatch by type.
    match tx.tx_type {
        TxType::Batch | TxType::ConversationBatch => batch(snapshot, tx, now_ms, dedup)?,
        _ => dispatch(snapshot, tx)?,
    }

    // 9. Fee split, nonce bump, dedup record.
    chronx_rewards::apply_fee_split(snapshot, tx.fee, tx.tx_type, &tx.to, node_wallet);
    snapshot.get_or_default(&tx.from).nonce = tx.nonce;
    dedup.insert(tx.tx_id.clone());

    Ok(())
}

fn verify_signature(snapshot: &StateSnapshot, tx: &Transaction) -> Result<(), ChronxError> {
    let public_key = if !tx.sender_public_key.is_empty() {
        Some(tx.sender_public_key.clone())
    } else {
        snapshot.get(&tx.from).and_then(|a| a.public_key.clone())
    };
    let Some(public_key) = public_key else {
        return Err(ChronxError::InvalidSignature { subject: tx.tx_id.clone() });
    };
    if !chronx_crypto::verify(&public_key, &tx.signable_bytes(), &tx.sender_signature) {
        return Err(ChronxError::InvalidSignature { subject: tx.tx_id.clone() });
    }
    Ok(())
}

fn dispatch(snapshot: &mut StateSnapshot, tx: &Transaction) -> Result<(), ChronxError> {
    match tx.tx_type {
        TxType::Transfer | TxType::MessagePayment | TxType::PrivateMessage => move_value(snapshot, tx),
        TxType::Reward => reward(snapshot, tx),
        TxType::Like => like(snapshot, tx),
        TxType::ProfileUpdate => profile_update(snapshot, tx),
        TxType::Batch | TxType::ConversationBatch => {
            unreachable!("batch types are dispatched to `batch` directly in apply_transaction")
        }
        TxType::Comment | TxType::Share | TxType::Follow | TxType::Unfollow | TxType::PostContent | TxType::PostAction => {
            fee_only(snapshot, tx)
        }
    }
}

fn debit(snapshot: &mut StateSnapshot, address: &str, amount: Balance) -> Result<(), ChronxError> {
    let account = snapshot.get_or_default(address);
    if account.balance < amount {
        return Err(ChronxError::InsufficientBalance {
            address: address.to_string(),
            need: amount,
            have: account.balance,
        });
    }
    account.balance -= amount;
    Ok(())
}

fn credit(snapshot: &mut StateSnapshot, address: &str, amount: Balance) {
    snapshot.get_or_default(address).balance += amount;
}

fn move_value(snapshot: &mut StateSnapshot, tx: &Transaction) -> Result<(), ChronxError> {
    debit(snapshot, &tx.from, tx.amount + tx.fee)?;
    credit(snapshot, &tx.to, tx.amount);
    if tx.tx_type == TxType::Transfer {
        snapshot.get_or_default(&tx.to).incoming_transfer_count += 1;
    }
    Ok(())
}

fn reward(snapshot: &mut StateSnapshot, tx: &Transaction) -> Result<(), ChronxError> {
    debit(snapshot, &tx.from, tx.amount)?;
    credit(snapshot, &tx.to, tx.amount);
    Ok(())
}

fn like(snapshot: &mut StateSnapshot, tx: &Transaction) -> Result<(), ChronxError> {
    let Payload::ContentRef { content_id } = &tx.payload else {
        return Err(ChronxError::InvalidStructure(format!("LIKE {} missing content_id", tx.tx_id)));
    };
    if snapshot.get_or_default(&tx.from).has_liked(content_id) {
        return Err(ChronxError::Duplicate(format!("{} already liked {content_id}", tx.from)));
    }
    debit(snapshot, &tx.from, tx.fee)?;
    snapshot.get_or_default(&tx.from).liked_content_ids.insert(content_id.clone());
    Ok(())
}

fn profile_update(snapshot: &mut StateSnapshot, tx: &Transaction) -> Result<(), ChronxError> {
    debit(snapshot, &tx.from, tx.fee)?;
    if let Payload::ProfileFields { nickname, encryption_public_key } = &tx.payload {
        let account = snapshot.get_or_default(&tx.from);
        if let Some(nickname) = nickname {
            account.nickname = Some(nickname.clone());
        }
        if let Some(key) = encryption_public_key {
            account.encryption_public_key = Some(key.clone());
        }
    }
    Ok(())
}

fn fee_only(snapshot: &mut StateSnapshot, tx: &Transaction) -> Result<(), ChronxError> {
    debit(snapshot, &tx.from, tx.fee)
}

/// Each inner member of a BATCH/CONVERSATION_BATCH transaction runs through
/// the full `apply_transaction` pipeline on its own — signature, nonce, fee
/// gating, dispatch, fee split, dedup — exactly as if it had arrived as a
/// standalone transaction. A failing inner transaction is skipped with a
/// warning rather than failing the enclosing wrapper (§7).
fn batch(snapshot: &mut StateSnapshot, tx: &Transaction, now_ms: TimestampMs, dedup: &mut DedupCache) -> Result<(), ChronxError> {
    let Payload::Batch { inner } = &tx.payload else {
        return Err(ChronxError::InvalidStructure(format!("{} missing batch payload", tx.tx_id)));
    };
    for inner_tx in inner {
        if let Err(reason) = apply_transaction(snapshot, inner_tx, now_ms, None, dedup) {
            warn!(tx_id = %inner_tx.tx_id, error = %reason, "skipping batch inner transaction");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronx_core::{Account, Priority};

    fn signed_transfer(kp: &chronx_crypto::KeyPair, from: &str, to: &str, amount: Balance, fee: Balance, nonce: u64) -> Transaction {
        let mut tx = Transaction {
            tx_id: String::new(),
            tx_type: TxType::Transfer,
            from: from.to_string(),
            to: to.to_string(),
            amount,
            fee,
            nonce,
            timestamp_ms: 0,
            valid_until_ms: None,
            payload: Payload::TransferOptions { priority: Priority::Standard },
            sender_public_key: kp.public_key_hex(),
            sender_signature: String::new(),
        };
        tx.tx_id = tx.compute_tx_id();
        tx.sender_signature = kp.sign(&tx.signable_bytes());
        tx
    }

    fn seeded_snapshot(address: &str, balance: Balance, public_key: &str) -> StateSnapshot {
        let mut snapshot = StateSnapshot::default();
        let mut account = Account::with_balance(address.to_string(), balance);
        account.public_key = Some(public_key.to_string());
        snapshot.set(account);
        snapshot
    }

    #[test]
    fn transfer_moves_amount_and_fee() {
        let kp = chronx_crypto::KeyPair::generate();
        let mut snapshot = seeded_snapshot("alice", 1_000, &kp.public_key_hex());
        let tx = signed_transfer(&kp, "alice", "bob", 100, 10, 1);
        let mut dedup = DedupCache::new();

        apply_transaction(&mut snapshot, &tx, 0, Some(&"node1".to_string()), &mut dedup).unwrap();

        assert_eq!(snapshot.get("alice").unwrap().balance, 890);
        assert_eq!(snapshot.get("bob").unwrap().balance, 100);
        assert_eq!(snapshot.get("alice").unwrap().nonce, 1);
    }

    #[test]
    fn bad_nonce_is_rejected() {
        let kp = chronx_crypto::KeyPair::generate();
        let mut snapshot = seeded_snapshot("alice", 1_000, &kp.public_key_hex());
        let tx = signed_transfer(&kp, "alice", "bob", 100, 10, 5);
        let mut dedup = DedupCache::new();

        let err = apply_transaction(&mut snapshot, &tx, 0, None, &mut dedup).unwrap_err();
        assert!(matches!(err, ChronxError::InvalidNonce { .. }));
    }

    #[test]
    fn insufficient_balance_is_rejected() {
        let kp = chronx_crypto::KeyPair::generate();
        let mut snapshot = seeded_snapshot("alice", 50, &kp.public_key_hex());
        let tx = signed_transfer(&kp, "alice", "bob", 100, 10, 1);
        let mut dedup = DedupCache::new();

        let err = apply_transaction(&mut snapshot, &tx, 0, None, &mut dedup).unwrap_err();
        assert!(matches!(err, ChronxError::InsufficientBalance { .. }));
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let kp = chronx_crypto::KeyPair::generate();
        let mut snapshot = seeded_snapshot("alice", 1_000, &kp.public_key_hex());
        let mut tx = signed_transfer(&kp, "alice", "bob", 100, 10, 1);
        tx.amount = 999;
        let mut dedup = DedupCache::new();

        let err = apply_transaction(&mut snapshot, &tx, 0, None, &mut dedup).unwrap_err();
        assert!(matches!(err, ChronxError::InvalidSignature { .. }));
    }

    #[test]
    fn duplicate_like_is_rejected() {
        let kp = chronx_crypto::KeyPair::generate();
        let mut snapshot = seeded_snapshot("alice", 10_000, &kp.public_key_hex());
        let mut dedup = DedupCache::new();

        let make_like = |nonce: u64| {
            let mut tx = Transaction {
                tx_id: String::new(),
                tx_type: TxType::Like,
                from: "alice".to_string(),
                to: "content-owner".to_string(),
                amount: 0,
                fee: 1_000,
                nonce,
                timestamp_ms: 0,
                valid_until_ms: None,
                payload: Payload::ContentRef { content_id: "post-1".to_string() },
                sender_public_key: kp.public_key_hex(),
                sender_signature: String::new(),
            };
            tx.tx_id = tx.compute_tx_id();
            tx.sender_signature = kp.sign(&tx.signable_bytes());
            tx
        };

        apply_transaction(&mut snapshot, &make_like(1), 0, None, &mut dedup).unwrap();
        let err = apply_transaction(&mut snapshot, &make_like(2), 0, None, &mut dedup).unwrap_err();
        assert!(matches!(err, ChronxError::Duplicate(_)));
    }

    #[test]
    fn duplicate_tx_id_is_rejected() {
        let kp = chronx_crypto::KeyPair::generate();
        let mut snapshot = seeded_snapshot("alice", 10_000, &kp.public_key_hex());
        let tx = signed_transfer(&kp, "alice", "bob", 10, 10, 1);
        let mut dedup = DedupCache::new();

        apply_transaction(&mut snapshot, &tx, 0, None, &mut dedup).unwrap();
        snapshot.get_or_default("alice").nonce = 0; // simulate replay attempt before nonce would catch it
        let err = apply_transaction(&mut snapshot, &tx, 0, None, &mut dedup).unwrap_err();
        assert!(matches!(err, ChronxError::Duplicate(_)));
    }

    #[test]
    fn expired_transaction_is_rejected() {
        let kp = chronx_crypto::KeyPair::generate();
        let mut snapshot = seeded_snapshot("alice", 1_000, &kp.public_key_hex());
        let mut tx = signed_transfer(&kp, "alice", "bob", 10, 10, 1);
        tx.valid_until_ms = Some(5);
        tx.tx_id = tx.compute_tx_id();
        tx.sender_signature = kp.sign(&tx.signable_bytes());
        let mut dedup = DedupCache::new();

        let err = apply_transaction(&mut snapshot, &tx, 100, None, &mut dedup).unwrap_err();
        assert!(matches!(err, ChronxError::Expired(_)));
    }
}
