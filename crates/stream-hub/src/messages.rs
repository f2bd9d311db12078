//! Spectator wire messages
//!
//! Everything on the event channel is a tagged JSON object; the frame
//! channel interleaves the same JSON for metadata with raw binary frames.

use indexer_types::{CachedAction, CachedVote, GameState};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum WireMessage {
    ScreenInfo {
        width: u32,
        height: u32,
    },
    ViewerCount {
        count: usize,
    },
    RecentHistory {
        votes: Vec<CachedVote>,
        actions: Vec<CachedAction>,
    },
    Vote {
        vote: CachedVote,
    },
    WindowResult {
        result: CachedAction,
    },
    GameState {
        state: GameState,
    },
}

impl WireMessage {
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("wire messages always serialize")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tagging_shape() {
        let json = WireMessage::ScreenInfo {
            width: 160,
            height: 144,
        }
        .to_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "screenInfo");
        assert_eq!(value["width"], 160);
        assert_eq!(value["height"], 144);
    }

    #[test]
    fn test_viewer_count_shape() {
        let json = WireMessage::ViewerCount { count: 3 }.to_json();
        assert_eq!(json, r#"{"type":"viewerCount","count":3}"#);
    }
}
