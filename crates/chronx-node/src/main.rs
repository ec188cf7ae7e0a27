//! chronx-node — the ChronX validator node binary.
//!
//! Startup sequence:
//!   1. Open (or initialise) the state database
//!   2. Verify the persisted genesis against the deployment's genesis spec
//!   3. Build the ledger, mempool and validator pool from the node config
//!   4. Run the cooperative event loop (§5): producer tick, housekeeping
//!      tick, and structured inputs read from stdin
//!
//! Peer transport, gossip and the JSON-RPC surface are external
//! collaborators this binary does not implement (§6) — `--input` is a
//! stand-in admin/gossip feed: newline-delimited JSON commands that would,
//! in a full deployment, arrive over the network instead.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use chronx_consensus::ValidatorPool;
use chronx_core::events::EventBus;
use chronx_core::{
    ChronxEvent, Transaction, MAX_TRANSACTIONS_PER_BLOCK, OFFLINE_TIMEOUT_MS, PROPOSAL_TIMEOUT_MS,
};
use chronx_crypto::KeyPair;
use chronx_genesis::GenesisSpec;
use chronx_ledger::Ledger;
use chronx_mempool::{MessagePool, Mempool};
use chronx_producer::{BlockProducer, ProduceOutcome};
use chronx_state::StateDb;

#[derive(Parser, Debug)]
#[command(name = "chronx-node", version, about = "ChronX validator node")]
struct Args {
    /// Directory for the persistent state database.
    #[arg(long, default_value = "~/.chronx/data")]
    data_dir: PathBuf,

    /// Path to this node's deployment config (identity, peer validator set, genesis accounts).
    #[arg(long, default_value = "~/.chronx/node.json")]
    config: PathBuf,

    /// Override the proposal-phase signature-collection timeout, in milliseconds. Test hook.
    #[arg(long, default_value_t = PROPOSAL_TIMEOUT_MS as i64)]
    proposal_timeout_ms: i64,

    /// Maximum number of transactions packed into a single produced block.
    #[arg(long, default_value_t = MAX_TRANSACTIONS_PER_BLOCK)]
    max_tx_per_block: usize,

    /// Log filter used when RUST_LOG is unset.
    #[arg(long, default_value = "info,chronx=debug")]
    log_level: String,
}

/// A node's identity and its view of the validator set and genesis
/// allocation, loaded once at startup (§4.12). Unlike the consensus
/// constants in `chronx_core::constants`, this is deployment-specific and
/// lives outside the binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct NodeConfig {
    validator_id: String,
    /// Hex-encoded 32-byte Ed25519 seed.
    secret_key: String,
    wallet_address: String,
    validators: Vec<ValidatorEntry>,
    genesis: GenesisSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ValidatorEntry {
    validator_id: String,
    wallet_address: String,
    public_key: String,
}

/// Structured input accepted over stdin in place of the peer/admin
/// channels a full deployment would wire in (§6).
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Command {
    Transaction { tx: Transaction },
    Signature { validator_id: String, signature: String },
    Heartbeat { validator_id: String },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.parse().unwrap()),
        )
        .init();

    info!("chronx node starting");

    let data_dir = expand_tilde(&args.data_dir);
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("creating data dir {}", data_dir.display()))?;
    let db = Arc::new(StateDb::open(&data_dir).context("opening state database")?);

    let config_path = expand_tilde(&args.config);
    let config: NodeConfig = {
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading node config from {}", config_path.display()))?;
        serde_json::from_str(&raw).context("parsing node config JSON")?
    };

    let genesis = chronx_genesis::load_or_init(Some(&db), &config.genesis).context("verifying genesis")?;
    let now_ms = chrono::Utc::now().timestamp_millis();

    let mut ledger = Ledger::new(genesis, config.genesis.accounts().to_vec(), Some(Arc::clone(&db)))
        .context("constructing ledger")?;

    let events = EventBus::new();
    events.subscribe(Box::new(|event: &ChronxEvent| {
        if let ChronxEvent::NewBlock { block, producer, tx_count } = event {
            info!(height = block.index, %producer, tx_count, "block applied");
        }
    }));

    let mut validator_pool = ValidatorPool::new(events.clone());
    for entry in &config.validators {
        validator_pool.register(entry.validator_id.clone(), entry.wallet_address.clone(), entry.public_key.clone(), now_ms);
    }
    if validator_pool.get(&config.validator_id).is_none() {
        return Err(anyhow::anyhow!("node's own validator_id {} is not present in its validator set", config.validator_id));
    }

    let secret_bytes: [u8; 32] = hex::decode(&config.secret_key)
        .context("decoding secret_key hex")?
        .try_into()
        .map_err(|_| anyhow::anyhow!("secret_key must decode to exactly 32 bytes"))?;
    let keypair = KeyPair::from_raw(secret_bytes);

    let mut mempool = Mempool::new(10_000, events.clone());
    let mut message_pool = MessagePool::new();
    let mut producer = BlockProducer::new(
        config.validator_id.clone(),
        keypair,
        args.max_tx_per_block,
        args.proposal_timeout_ms,
        events.clone(),
    );

    let (cmd_tx, mut cmd_rx) = tokio::sync::mpsc::channel::<Command>(512);
    tokio::spawn(async move {
        let stdin = tokio::io::stdin();
        let mut lines = BufReader::new(stdin).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Command>(line) {
                        Ok(cmd) => {
                            if cmd_tx.send(cmd).await.is_err() {
                                break;
                            }
                        }
                        Err(e) => warn!(error = %e, "malformed input command, ignoring"),
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "stdin read error");
                    break;
                }
            }
        }
    });

    let mut producer_tick = tokio::time::interval(std::time::Duration::from_millis(chronx_core::BLOCK_TIME_MS as u64));
    let mut housekeeping_tick = tokio::time::interval(std::time::Duration::from_secs(5));

    info!(validator_id = %config.validator_id, height = ledger.height(), "node ready");
    loop {
        tokio::select! {
            _ = producer_tick.tick() => {
                let now_ms = chrono::Utc::now().timestamp_millis();
                for batch_tx in message_pool.top(now_ms) {
                    if let Err(e) = mempool.add(batch_tx) {
                        warn!(error = %e, "matured message-pool batch rejected by mempool");
                    }
                }
                match producer.produce(&mut ledger, &mut mempool, &mut validator_pool, now_ms) {
                    Ok(ProduceOutcome::Committed(hash)) => info!(%hash, "produced and committed block"),
                    Ok(ProduceOutcome::Proposed(hash)) => info!(%hash, "proposed block, awaiting witness signatures"),
                    Ok(ProduceOutcome::NotSelected | ProduceOutcome::AlreadyProposing | ProduceOutcome::NothingToPropose) => {}
                    Err(e) => warn!(error = %e, "block production failed"),
                }
                if let Err(e) = producer.handle_timeout(&mut ledger, &mut mempool, &mut validator_pool, now_ms) {
                    warn!(error = %e, "proposal timeout handling failed");
                }
            }
            _ = housekeeping_tick.tick() => {
                let now_ms = chrono::Utc::now().timestamp_millis();
                mempool.clear_expired(now_ms);
                validator_pool.sweep_offline(now_ms, OFFLINE_TIMEOUT_MS);
            }
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                let now_ms = chrono::Utc::now().timestamp_millis();
                handle_command(cmd, &mut mempool, &mut message_pool, &mut producer, &mut ledger, &mut validator_pool, now_ms);
            }
        }
    }

    Ok(())
}

fn handle_command(
    cmd: Command,
    mempool: &mut Mempool,
    message_pool: &mut MessagePool,
    producer: &mut BlockProducer,
    ledger: &mut Ledger,
    validator_pool: &mut ValidatorPool,
    now_ms: chronx_core::TimestampMs,
) {
    match cmd {
        Command::Transaction { tx } => {
            // FAST-fee transactions skip the message pool's batching window
            // entirely (§4.4); `MessagePool::add` reports that by returning
            // `false` rather than queuing them.
            if !message_pool.add(tx.clone(), now_ms) {
                if let Err(e) = mempool.add(tx) {
                    warn!(error = %e, "transaction rejected");
                }
            }
        }
        Command::Signature { validator_id, signature } => {
            match producer.add_signature(&validator_id, signature, ledger, mempool, validator_pool, now_ms) {
                Ok(Some(hash)) => info!(%hash, "block committed on quorum"),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "witness signature rejected"),
            }
        }
        Command::Heartbeat { validator_id } => {
            if let Err(e) = validator_pool.heartbeat(&validator_id, ledger.height(), now_ms) {
                warn!(error = %e, "heartbeat from unknown validator");
            }
        }
    }
}

/// Expand a leading `~` to the user's home directory (`HOME` or `USERPROFILE`).
fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Ok(home) = std::env::var("HOME").or_else(|_| std::env::var("USERPROFILE")) {
            return PathBuf::from(home).join(stripped);
        }
    }
    path.to_path_buf()
}
