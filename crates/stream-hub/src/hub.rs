//! Connection registry, history caches, and broadcast paths

use crate::cache::RecentCache;
use crate::messages::WireMessage;
use axum::extract::ws::Message;
use dashmap::DashMap;
use frame_pipeline::CompressedFrame;
use indexer_types::{CachedAction, CachedVote, GameState, Vote, WindowResult};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
pub struct HubConfig {
    pub screen_width: u32,
    pub screen_height: u32,
    pub max_cached_votes: usize,
    pub max_cached_actions: usize,
    /// Per-connection writer queue depth; a full queue marks the spectator
    /// as stuck and the connection is closed.
    pub writer_queue: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            screen_width: 160,
            screen_height: 144,
            max_cached_votes: 100,
            max_cached_actions: 50,
            writer_queue: 64,
        }
    }
}

type ConnId = u64;
type Registry = DashMap<ConnId, mpsc::Sender<Message>>;

/// The spectator hub. Owns every connection and the recent-history caches.
pub struct StreamHub {
    config: HubConfig,
    frame_conns: Registry,
    event_conns: Registry,
    votes: RwLock<RecentCache<CachedVote>>,
    actions: RwLock<RecentCache<CachedAction>>,
    game_state: RwLock<Option<GameState>>,
    next_id: AtomicU64,
}

impl StreamHub {
    pub fn new(config: HubConfig) -> Self {
        Self {
            frame_conns: DashMap::new(),
            event_conns: DashMap::new(),
            votes: RwLock::new(RecentCache::new(config.max_cached_votes)),
            actions: RwLock::new(RecentCache::new(config.max_cached_actions)),
            game_state: RwLock::new(None),
            next_id: AtomicU64::new(1),
            config,
        }
    }

    /// Spectators currently on the frame channel.
    pub fn viewer_count(&self) -> usize {
        self.frame_conns.len()
    }

    fn screen_info(&self) -> WireMessage {
        WireMessage::ScreenInfo {
            width: self.config.screen_width,
            height: self.config.screen_height,
        }
    }

    /// Register a frame spectator: greet it with screen info and the current
    /// viewer count, then announce the new count to everyone.
    pub fn register_frame(&self) -> (ConnId, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(self.config.writer_queue);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        // A fresh channel has room for the greeting.
        let _ = tx.try_send(text(&self.screen_info()));
        self.frame_conns.insert(id, tx);
        tracing::info!("Frame spectator {} connected ({} viewers)", id, self.viewer_count());
        self.broadcast_viewer_count();
        (id, rx)
    }

    pub fn unregister_frame(&self, id: ConnId) {
        if self.frame_conns.remove(&id).is_some() {
            tracing::info!("Frame spectator {} disconnected ({} viewers)", id, self.viewer_count());
            self.broadcast_viewer_count();
        }
    }

    /// Register an event spectator and hydrate it: screen info, recent
    /// history, current game state if known.
    pub fn register_event(&self) -> (ConnId, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(self.config.writer_queue);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let _ = tx.try_send(text(&self.screen_info()));
        let history = WireMessage::RecentHistory {
            votes: self.votes.read().snapshot(),
            actions: self.actions.read().snapshot(),
        };
        let _ = tx.try_send(text(&history));
        if let Some(state) = self.game_state.read().clone() {
            let _ = tx.try_send(text(&WireMessage::GameState { state }));
        }
        let _ = tx.try_send(text(&WireMessage::ViewerCount {
            count: self.viewer_count(),
        }));

        self.event_conns.insert(id, tx);
        tracing::debug!("Event spectator {} connected", id);
        (id, rx)
    }

    pub fn unregister_event(&self, id: ConnId) {
        self.event_conns.remove(&id);
        tracing::debug!("Event spectator {} disconnected", id);
    }

    /// Ship a compressed frame to every frame spectator.
    pub fn broadcast_frame(&self, frame: &CompressedFrame) {
        let msg = Message::Binary(frame.0.clone().into());
        let dropped = fanout(&self.frame_conns, &msg);
        if dropped > 0 {
            self.broadcast_viewer_count();
        }
    }

    /// Live echo of a chain vote plus cache upkeep.
    pub fn publish_vote(&self, vote: &Vote) {
        let cached = CachedVote::from(vote);
        self.votes.write().push(cached.clone());
        self.broadcast_event(&WireMessage::Vote { vote: cached });
    }

    pub fn publish_result(&self, result: &WindowResult) {
        let cached = CachedAction::from(result);
        self.actions.write().push(cached.clone());
        self.broadcast_event(&WireMessage::WindowResult { result: cached });
    }

    pub fn publish_game_state(&self, state: GameState) {
        *self.game_state.write() = Some(state.clone());
        self.broadcast_event(&WireMessage::GameState { state });
    }

    /// Latest known game state (hydration source).
    pub fn current_game_state(&self) -> Option<GameState> {
        self.game_state.read().clone()
    }

    pub fn cached_votes(&self) -> Vec<CachedVote> {
        self.votes.read().snapshot()
    }

    pub fn cached_actions(&self) -> Vec<CachedAction> {
        self.actions.read().snapshot()
    }

    fn broadcast_event(&self, message: &WireMessage) {
        fanout(&self.event_conns, &text(message));
    }

    fn broadcast_viewer_count(&self) {
        let message = text(&WireMessage::ViewerCount {
            count: self.viewer_count(),
        });
        // Frame spectators see the count natively; event spectators get the
        // same echo for UI purposes.
        fanout(&self.frame_conns, &message);
        fanout(&self.event_conns, &message);
    }
}

fn text(message: &WireMessage) -> Message {
    Message::Text(message.to_json().into())
}

/// Best-effort send to every connection. A spectator whose writer queue is
/// full (or gone) is removed; closing its channel ends its writer task.
/// Returns how many connections were dropped.
fn fanout(conns: &Registry, message: &Message) -> usize {
    let mut dead = Vec::new();
    for entry in conns.iter() {
        if entry.value().try_send(message.clone()).is_err() {
            dead.push(*entry.key());
        }
    }
    for id in &dead {
        conns.remove(id);
        tracing::warn!("Spectator {} stuck or gone, connection dropped", id);
    }
    dead.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};
    use chrono::Utc;
    use indexer_types::Action;
    use std::collections::BTreeMap;

    fn test_hub() -> StreamHub {
        StreamHub::new(HubConfig {
            writer_queue: 8,
            max_cached_votes: 3,
            max_cached_actions: 2,
            ..HubConfig::default()
        })
    }

    fn sample_vote(block: u64) -> Vote {
        Vote {
            player: Address::repeat_byte(0x22),
            action: Action::A,
            block,
            tx_hash: B256::repeat_byte(block as u8),
            log_index: 0,
            observed_at: Utc::now(),
        }
    }

    fn sample_result(window_id: u64) -> WindowResult {
        let mut tallies: BTreeMap<Action, u32> = Action::ALL.iter().map(|a| (*a, 0)).collect();
        tallies.insert(Action::A, 1);
        WindowResult {
            window_id,
            start_block: window_id * 5,
            end_block: window_id * 5 + 4,
            tallies,
            winner: Action::A,
            winner_tx_hash: None,
            total_votes: 1,
            seed_hash: None,
        }
    }

    fn drain_texts(rx: &mut mpsc::Receiver<Message>) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            if let Message::Text(body) = msg {
                out.push(serde_json::from_str(&body).unwrap());
            }
        }
        out
    }

    #[tokio::test]
    async fn test_frame_connect_greeting_and_count() {
        let hub = test_hub();
        let (_id, mut rx) = hub.register_frame();

        let messages = drain_texts(&mut rx);
        assert_eq!(messages[0]["type"], "screenInfo");
        assert_eq!(messages[1]["type"], "viewerCount");
        assert_eq!(messages[1]["count"], 1);
    }

    #[tokio::test]
    async fn test_viewer_count_broadcast_on_connect_and_disconnect() {
        let hub = test_hub();
        let (id_a, mut rx_a) = hub.register_frame();
        let (id_b, _rx_b) = hub.register_frame();
        assert_eq!(hub.viewer_count(), 2);

        let counts: Vec<_> = drain_texts(&mut rx_a)
            .into_iter()
            .filter(|m| m["type"] == "viewerCount")
            .map(|m| m["count"].as_u64().unwrap())
            .collect();
        assert_eq!(counts, vec![1, 2]);

        hub.unregister_frame(id_b);
        assert_eq!(hub.viewer_count(), 1);
        let counts: Vec<_> = drain_texts(&mut rx_a)
            .into_iter()
            .filter(|m| m["type"] == "viewerCount")
            .map(|m| m["count"].as_u64().unwrap())
            .collect();
        assert_eq!(counts, vec![1]);
        let _ = id_a;
    }

    #[tokio::test]
    async fn test_event_hydration_includes_history_and_state() {
        let hub = test_hub();
        hub.publish_vote(&sample_vote(1));
        hub.publish_result(&sample_result(0));
        hub.publish_game_state(GameState {
            location: "Pallet Town".into(),
            badges: 0,
            badge_count: 0,
            player_x: 0,
            player_y: 0,
            party_count: 0,
            party: vec![],
            money: 3000,
        });

        let (_id, mut rx) = hub.register_event();
        let messages = drain_texts(&mut rx);
        assert_eq!(messages[0]["type"], "screenInfo");
        assert_eq!(messages[1]["type"], "recentHistory");
        assert_eq!(messages[1]["votes"].as_array().unwrap().len(), 1);
        assert_eq!(messages[1]["actions"].as_array().unwrap().len(), 1);
        assert_eq!(messages[2]["type"], "gameState");
        assert_eq!(messages[2]["state"]["money"], 3000);
    }

    #[tokio::test]
    async fn test_vote_cache_bounded() {
        let hub = test_hub();
        for block in 0..10 {
            hub.publish_vote(&sample_vote(block));
        }
        let cached = hub.cached_votes();
        assert_eq!(cached.len(), 3);
        assert_eq!(cached[0].block, 7);
        assert_eq!(cached[2].block, 9);
    }

    #[tokio::test]
    async fn test_event_broadcast_reaches_connected_spectator() {
        let hub = test_hub();
        let (_id, mut rx) = hub.register_event();
        drain_texts(&mut rx);

        hub.publish_vote(&sample_vote(4));
        let messages = drain_texts(&mut rx);
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["type"], "vote");
        assert_eq!(messages[0]["vote"]["block"], 4);
        assert_eq!(messages[0]["vote"]["action"], "A");
    }

    #[tokio::test]
    async fn test_stuck_spectator_is_dropped() {
        let hub = StreamHub::new(HubConfig {
            writer_queue: 2,
            ..HubConfig::default()
        });
        let (_id, rx) = hub.register_frame();
        // Never drained: the greeting already fills the writer queue.
        std::mem::forget(rx);
        assert_eq!(hub.viewer_count(), 1);

        hub.broadcast_frame(&CompressedFrame(vec![0xff, 0xd8]));
        assert_eq!(hub.viewer_count(), 0);
    }
}
