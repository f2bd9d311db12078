//! Socket-level tests for the spectator surface
//!
//! Serve the real router on an ephemeral port and connect with a plain
//! tungstenite client, the way a browser-side spectator would.

use crate::hub::{HubConfig, StreamHub};
use alloy_primitives::{Address, B256};
use chrono::Utc;
use frame_pipeline::CompressedFrame;
use futures_util::StreamExt;
use indexer_types::{Action, Vote};
use serde_json::Value;
use std::sync::Arc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

async fn serve_hub() -> (Arc<StreamHub>, String) {
    let hub = Arc::new(StreamHub::new(HubConfig::default()));
    let app = crate::router(hub.clone(), None);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (hub, format!("ws://{addr}"))
}

fn as_json(msg: &Message) -> Value {
    serde_json::from_str(msg.to_text().unwrap()).unwrap()
}

#[tokio::test]
async fn test_frame_channel_over_real_socket() {
    let (hub, base) = serve_hub().await;
    let (mut ws, _) = connect_async(format!("{base}/stream")).await.unwrap();

    let greeting = ws.next().await.unwrap().unwrap();
    assert_eq!(as_json(&greeting)["type"], "screenInfo");
    assert_eq!(as_json(&greeting)["width"], 160);

    let count = ws.next().await.unwrap().unwrap();
    assert_eq!(as_json(&count)["type"], "viewerCount");
    assert_eq!(as_json(&count)["count"], 1);
    assert_eq!(hub.viewer_count(), 1);

    hub.broadcast_frame(&CompressedFrame(vec![0xff, 0xd8, 0x00, 0xff, 0xd9]));
    let frame = ws.next().await.unwrap().unwrap();
    match frame {
        Message::Binary(payload) => assert_eq!(payload, vec![0xff, 0xd8, 0x00, 0xff, 0xd9]),
        other => panic!("expected binary frame, got {other:?}"),
    }

    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn test_event_channel_hydrates_and_streams() {
    let (hub, base) = serve_hub().await;

    hub.publish_vote(&Vote {
        player: Address::repeat_byte(0x22),
        action: Action::Start,
        block: 9,
        tx_hash: B256::repeat_byte(0x77),
        log_index: 0,
        observed_at: Utc::now(),
    });

    let (mut ws, _) = connect_async(format!("{base}/ws")).await.unwrap();

    let screen = ws.next().await.unwrap().unwrap();
    assert_eq!(as_json(&screen)["type"], "screenInfo");

    let history = ws.next().await.unwrap().unwrap();
    let history = as_json(&history);
    assert_eq!(history["type"], "recentHistory");
    assert_eq!(history["votes"][0]["action"], "START");
    assert_eq!(history["votes"][0]["block"], 9);

    // Live event after hydration.
    hub.publish_vote(&Vote {
        player: Address::repeat_byte(0x23),
        action: Action::B,
        block: 10,
        tx_hash: B256::repeat_byte(0x78),
        log_index: 1,
        observed_at: Utc::now(),
    });
    let live = loop {
        let msg = as_json(&ws.next().await.unwrap().unwrap());
        if msg["type"] == "vote" {
            break msg;
        }
    };
    assert_eq!(live["vote"]["action"], "B");

    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn test_disconnect_updates_viewer_count() {
    let (hub, base) = serve_hub().await;
    let (mut ws, _) = connect_async(format!("{base}/stream")).await.unwrap();
    ws.next().await.unwrap().unwrap();
    assert_eq!(hub.viewer_count(), 1);

    ws.close(None).await.unwrap();
    drop(ws);

    // The reader task observes the close and unregisters.
    for _ in 0..50 {
        if hub.viewer_count() == 0 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    assert_eq!(hub.viewer_count(), 0);
}
