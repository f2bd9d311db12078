//! Core types shared across the indexer pipeline
//!
//! Every value that crosses a component boundary lives here: chain events
//! produced by ingestion, window results produced by the aggregator, and the
//! broadcast-shaped records the hub caches for spectator hydration.

use alloy_primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The eight console buttons a vote can name, wire-encoded as 0..7.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Up,
    Down,
    Left,
    Right,
    A,
    B,
    Start,
    Select,
}

impl Action {
    /// All actions in canonical order (used for tie-breaking).
    pub const ALL: [Action; 8] = [
        Action::Up,
        Action::Down,
        Action::Left,
        Action::Right,
        Action::A,
        Action::B,
        Action::Start,
        Action::Select,
    ];

    /// Decode a wire code (0..7). Anything else is rejected at the boundary.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    /// Wire code of this action.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Up => "UP",
            Action::Down => "DOWN",
            Action::Left => "LEFT",
            Action::Right => "RIGHT",
            Action::A => "A",
            Action::B => "B",
            Action::Start => "START",
            Action::Select => "SELECT",
        };
        f.write_str(name)
    }
}

/// Identity of a vote log for deduplication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VoteKey {
    pub block: u64,
    pub tx_hash: B256,
    pub log_index: u32,
}

/// A single on-chain vote, constructed once at the ingestion boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vote {
    pub player: Address,
    pub action: Action,
    pub block: u64,
    pub tx_hash: B256,
    pub log_index: u32,
    pub observed_at: DateTime<Utc>,
}

impl Vote {
    /// Dedup identity: `(block, txHash, logIndex)`.
    pub fn key(&self) -> VoteKey {
        VoteKey {
            block: self.block,
            tx_hash: self.tx_hash,
            log_index: self.log_index,
        }
    }
}

/// Signal that some block has been observed by either ingestion path.
///
/// The subscription path carries the authoritative hash; the poll path only
/// knows the number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockTick {
    pub number: u64,
    pub hash: Option<B256>,
}

/// Outcome of a finalized voting window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowResult {
    pub window_id: u64,
    pub start_block: u64,
    pub end_block: u64,
    pub tallies: BTreeMap<Action, u32>,
    pub winner: Action,
    pub winner_tx_hash: Option<B256>,
    pub total_votes: u32,
    pub seed_hash: Option<B256>,
}

/// One party slot as read from console memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartyMember {
    /// Canonical species id (pokedex number), already mapped from the
    /// cartridge-internal id.
    pub species: u16,
    pub current_hp: u16,
    pub max_hp: u16,
    pub level: u8,
}

/// Derived game snapshot read from well-known console memory offsets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub location: String,
    pub badges: u8,
    pub badge_count: u8,
    pub player_x: u8,
    pub player_y: u8,
    pub party_count: u8,
    pub party: Vec<PartyMember>,
    pub money: u32,
}

impl GameState {
    /// Whether two snapshots differ in any field spectators care about.
    ///
    /// Location, badge count, party size, money, or any per-slot HP counts
    /// as a semantic change; everything else (e.g. walking one tile) does not
    /// retrigger a broadcast on its own.
    pub fn semantically_differs(&self, other: &GameState) -> bool {
        if self.location != other.location
            || self.badge_count != other.badge_count
            || self.party_count != other.party_count
            || self.money != other.money
        {
            return true;
        }
        if self.party.len() != other.party.len() {
            return true;
        }
        self.party
            .iter()
            .zip(other.party.iter())
            .any(|(a, b)| a.current_hp != b.current_hp || a.max_hp != b.max_hp)
    }
}

/// Broadcast-shaped vote kept in the hub's circular buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedVote {
    pub player: Address,
    pub action: Action,
    pub block: u64,
    pub tx_hash: B256,
    pub observed_at: DateTime<Utc>,
}

impl From<&Vote> for CachedVote {
    fn from(vote: &Vote) -> Self {
        Self {
            player: vote.player,
            action: vote.action,
            block: vote.block,
            tx_hash: vote.tx_hash,
            observed_at: vote.observed_at,
        }
    }
}

/// Broadcast-shaped window result kept in the hub's circular buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedAction {
    pub window_id: u64,
    pub start_block: u64,
    pub end_block: u64,
    pub winner: Action,
    pub tallies: BTreeMap<Action, u32>,
    pub total_votes: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_tx_hash: Option<B256>,
}

impl From<&WindowResult> for CachedAction {
    fn from(result: &WindowResult) -> Self {
        Self {
            window_id: result.window_id,
            start_block: result.start_block,
            end_block: result.end_block,
            winner: result.winner,
            tallies: result.tallies.clone(),
            total_votes: result.total_votes,
            winner_tx_hash: result.winner_tx_hash,
        }
    }
}
