//! Vote Aggregator - sliding window tally and election
//!
//! Buckets incoming votes by block window, finalizes each window exactly once
//! when a block tick proves its last block is in the past, and elects the
//! winning action with a deterministic hash-based tie-break.
//!
//! `add_vote` and `on_block` are not thread-safe by design: the supervisor
//! funnels both through a single task so the aggregator stays single-writer.

use alloy_primitives::{keccak256, B256};
use indexer_types::{Action, BlockTick, Vote, VoteKey, WindowResult};
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::mpsc;

/// Windows kept after finalization before their dedup keys are evicted.
const TRAILING_WINDOW_MARGIN: u64 = 2;

/// Sliding-window vote aggregator.
///
/// Emits one [`WindowResult`] per non-empty finalized window on the sink
/// channel handed in at construction. Empty windows are skipped silently.
pub struct VoteAggregator {
    window_size: u64,
    current_window: Option<u64>,
    window_votes: HashMap<u64, Vec<Vote>>,
    seen: HashSet<VoteKey>,
    /// Most recently observed block hash, first observation wins per height.
    last_hash: Option<(u64, B256)>,
    results: mpsc::UnboundedSender<WindowResult>,
}

impl VoteAggregator {
    /// Create an aggregator for windows of `window_size` blocks (>= 1).
    pub fn new(window_size: u64, results: mpsc::UnboundedSender<WindowResult>) -> Self {
        assert!(window_size >= 1, "window size must be at least 1");
        Self {
            window_size,
            current_window: None,
            window_votes: HashMap::new(),
            seen: HashSet::new(),
            last_hash: None,
            results,
        }
    }

    /// Window id containing `block`.
    pub fn window_of(&self, block: u64) -> u64 {
        block / self.window_size
    }

    /// Record a vote. Returns whether it was accepted.
    ///
    /// Duplicates (same block/tx/logIndex) and votes for already-finalized
    /// windows are rejected; neither re-emits a result.
    pub fn add_vote(&mut self, vote: Vote) -> bool {
        if self.seen.contains(&vote.key()) {
            tracing::debug!(
                "Duplicate vote dropped: block {} tx {} log {}",
                vote.block,
                vote.tx_hash,
                vote.log_index
            );
            return false;
        }

        let window_id = self.window_of(vote.block);
        match self.current_window {
            None => self.current_window = Some(window_id),
            Some(current) if window_id < current => {
                tracing::warn!(
                    "Late vote for window {} rejected (current window {})",
                    window_id,
                    current
                );
                return false;
            }
            Some(current) if window_id > current => {
                self.advance_to(window_id);
            }
            Some(_) => {}
        }

        self.seen.insert(vote.key());
        self.window_votes.entry(window_id).or_default().push(vote);
        true
    }

    /// Advance the window clock with an observed block.
    pub fn on_block(&mut self, tick: BlockTick) {
        if let Some(hash) = tick.hash {
            // First observation wins for a given height; a later path never
            // overwrites the hash it reported.
            let newer = self.last_hash.map_or(true, |(n, _)| tick.number > n);
            if newer {
                self.last_hash = Some((tick.number, hash));
            }
        }

        let window_id = self.window_of(tick.number);
        match self.current_window {
            None => self.current_window = Some(window_id),
            Some(current) if window_id > current => self.advance_to(window_id),
            // Re-observations and stale ticks are no-ops for the clock.
            Some(_) => {}
        }
    }

    /// Current window id, if any input has been observed yet.
    pub fn current_window(&self) -> Option<u64> {
        self.current_window
    }

    /// Number of dedup keys currently retained.
    pub fn seen_len(&self) -> usize {
        self.seen.len()
    }

    /// Finalize every window in `[current, new_window)` and move the clock.
    fn advance_to(&mut self, new_window: u64) {
        let current = self.current_window.unwrap_or(new_window);
        for window_id in current..new_window {
            self.finalize(window_id);
        }
        self.current_window = Some(new_window);
        self.evict_old_keys(new_window);
    }

    fn finalize(&mut self, window_id: u64) {
        let votes = match self.window_votes.remove(&window_id) {
            Some(votes) if !votes.is_empty() => votes,
            _ => {
                tracing::debug!("Window {} empty, skipped", window_id);
                return;
            }
        };

        let result = self.elect(window_id, votes);
        tracing::info!(
            "Window {} finalized: {} wins with {} of {} votes",
            result.window_id,
            result.winner,
            result.tallies[&result.winner],
            result.total_votes
        );
        let _ = self.results.send(result);
    }

    fn elect(&self, window_id: u64, votes: Vec<Vote>) -> WindowResult {
        let mut tallies: BTreeMap<Action, u32> = Action::ALL.iter().map(|a| (*a, 0)).collect();
        for vote in &votes {
            *tallies.get_mut(&vote.action).expect("all actions present") += 1;
        }

        let top = *tallies.values().max().expect("tallies never empty");
        let tied: Vec<Action> = Action::ALL
            .iter()
            .copied()
            .filter(|a| tallies[a] == top)
            .collect();

        let (winner, seed_hash) = if tied.len() == 1 {
            (tied[0], None)
        } else {
            self.break_tie(window_id, &tied)
        };

        let winner_tx_hash = votes
            .iter()
            .find(|v| v.action == winner)
            .map(|v| v.tx_hash);

        WindowResult {
            window_id,
            start_block: window_id * self.window_size,
            end_block: (window_id + 1) * self.window_size - 1,
            tallies,
            winner,
            winner_tx_hash,
            total_votes: votes.len() as u32,
            seed_hash,
        }
    }

    /// Deterministic tie-break: keccak of the prior block hash and the window
    /// id, reduced mod the tie count over canonical action order. Without any
    /// observed hash the first tied action in canonical order wins.
    fn break_tie(&self, window_id: u64, tied: &[Action]) -> (Action, Option<B256>) {
        match self.last_hash {
            Some((_, hash)) => {
                let mut preimage = [0u8; 40];
                preimage[..32].copy_from_slice(hash.as_slice());
                preimage[32..].copy_from_slice(&window_id.to_be_bytes());
                let seed = keccak256(preimage);
                let word = u64::from_be_bytes(seed[..8].try_into().expect("8 bytes"));
                let index = (word % tied.len() as u64) as usize;
                (tied[index], Some(seed))
            }
            None => (tied[0], None),
        }
    }

    fn evict_old_keys(&mut self, current_window: u64) {
        let cutoff_window = current_window.saturating_sub(TRAILING_WINDOW_MARGIN);
        let cutoff_block = cutoff_window * self.window_size;
        self.seen.retain(|key| key.block >= cutoff_block);
        self.window_votes.retain(|id, _| *id >= cutoff_window);
    }
}
