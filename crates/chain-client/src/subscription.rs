//! WebSocket subscription reader
//!
//! Holds two `eth_subscribe` subscriptions on the streaming endpoint: new
//! block heads and VoteCast logs. The connection is re-established after a
//! fixed delay on any error; subscription ids are discarded on reconnect and
//! no replay is attempted on this path (the poller covers gaps).

use crate::client::ChainIngest;
use crate::rpc::{parse_quantity_u64, LogEntry};
use crate::VOTE_CAST_TOPIC;
use alloy_primitives::{Address, B256};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::str::FromStr;
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Delay before re-dialing after a dropped connection.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct SubscriptionConfig {
    pub ws_url: String,
    pub contract: Address,
}

/// Run the subscription loop forever. Never returns; the supervisor aborts
/// the task on shutdown.
pub async fn run_subscription(config: SubscriptionConfig, ingest: ChainIngest) {
    loop {
        match run_session(&config, &ingest).await {
            Ok(()) => tracing::warn!("Subscription closed by upstream, reconnecting"),
            Err(e) => tracing::warn!("Subscription error: {}, reconnecting", e),
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn run_session(config: &SubscriptionConfig, ingest: &ChainIngest) -> anyhow::Result<()> {
    let (ws_stream, _) = connect_async(config.ws_url.as_str()).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    tracing::info!("Subscribed endpoint connected: {}", config.ws_url);

    let heads = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "method": "eth_subscribe",
        "params": ["newHeads"],
    });
    let logs = json!({
        "jsonrpc": "2.0",
        "id": 2,
        "method": "eth_subscribe",
        "params": ["logs", {
            "address": config.contract,
            "topics": [*VOTE_CAST_TOPIC],
        }],
    });
    ws_sender.send(Message::Text(heads.to_string())).await?;
    ws_sender.send(Message::Text(logs.to_string())).await?;

    while let Some(msg) = ws_receiver.next().await {
        match msg? {
            Message::Text(text) => handle_notification(&text, ingest).await,
            Message::Ping(payload) => ws_sender.send(Message::Pong(payload)).await?,
            Message::Close(_) => break,
            _ => {}
        }
    }

    Ok(())
}

async fn handle_notification(text: &str, ingest: &ChainIngest) {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Unparseable upstream message: {}", e);
            return;
        }
    };

    // Subscription confirmations ({id, result}) are not interesting.
    if value.get("method").and_then(Value::as_str) != Some("eth_subscription") {
        return;
    }
    let Some(result) = value.pointer("/params/result") else {
        tracing::warn!("eth_subscription notification without result");
        return;
    };

    if result.get("topics").is_some() {
        match serde_json::from_value::<LogEntry>(result.clone()) {
            Ok(log) => ingest.ingest_log(&log).await,
            Err(e) => tracing::warn!("Unparseable log notification: {}", e),
        }
    } else if let Some(head) = parse_head(result) {
        ingest.ingest_tick(head.0, Some(head.1)).await;
    } else {
        tracing::warn!("Unrecognized subscription payload");
    }
}

fn parse_head(result: &Value) -> Option<(u64, B256)> {
    let number = parse_quantity_u64(result.get("number")?).ok()?;
    let hash = B256::from_str(result.get("hash")?.as_str()?).ok()?;
    Some((number, hash))
}
