//! Mining-window node-share distribution (§4.8.3). Non-overlapping windows
//! of `MINING_WINDOW_LENGTH` blocks; fees collected during the window are
//! taxed 25% for active nodes, split equally, and credited directly when
//! the window closes.

use std::collections::HashMap;

use chronx_core::{Address, Balance};
use chronx_state::StateSnapshot;

struct ActiveNode {
    #[allow(dead_code)]
    node_id: String,
    wallet: Address,
}

/// Tracks one open mining window's collected fees and registered
/// participants. The caller resets/advances windows by block height — this
/// type only knows about the window currently accumulating.
pub struct RewardRouter {
    window_length: u64,
    node_share_num: u128,
    node_share_den: u128,
    collected_fees: Balance,
    active_nodes: HashMap<String, ActiveNode>,
}

impl RewardRouter {
    pub fn new(window_length: u64, node_share_num: u128, node_share_den: u128) -> Self {
        Self {
            window_length,
            node_share_num,
            node_share_den,
            collected_fees: 0,
            active_nodes: HashMap::new(),
        }
    }

    pub fn accumulate_fee(&mut self, fee: Balance) {
        self.collected_fees += fee;
    }

    /// Register a node as active in the current window. Dedup by `ip` — the
    /// first registrant for a given IP wins, matching the caller's stated
    /// one-per-IP invariant.
    pub fn add_active_node(&mut self, node_id: String, ip: String, wallet: Address) {
        self.active_nodes.entry(ip).or_insert(ActiveNode { node_id, wallet });
    }

    pub fn closes_at(&self, block_height: u64) -> bool {
        block_height > 0 && block_height % self.window_length == 0
    }

    /// Credit the 25% node share equally across this window's participants,
    /// then reset for the next window. Dust left by integer division stays
    /// uncredited, same as the epoch payout.
    pub fn close_window(&mut self, snapshot: &mut StateSnapshot) -> Balance {
        let node_share = self.collected_fees * self.node_share_num / self.node_share_den;
        let distributed = if self.active_nodes.is_empty() || node_share == 0 {
            0
        } else {
            let share_each = node_share / self.active_nodes.len() as u128;
            for node in self.active_nodes.values() {
                snapshot.get_or_default(&node.wallet).balance += share_each;
            }
            share_each * self.active_nodes.len() as u128
        };

        self.collected_fees = 0;
        self.active_nodes.clear();
        distributed
    }

    pub fn collected_fees(&self) -> Balance {
        self.collected_fees
    }

    pub fn active_node_count(&self) -> usize {
        self.active_nodes.len()
    }
}
