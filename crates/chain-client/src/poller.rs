//! HTTP log poller
//!
//! Queries the HTTP endpoint on a window-length cadence for the current head
//! and any VoteCast logs since the last poll. Ranges are clamped so a long
//! outage never produces an unbounded `eth_getLogs` query; far behind the
//! head, the poller skips ahead and lets old windows go.

use crate::client::ChainIngest;
use crate::rpc::EvmRpcClient;
use crate::VOTE_CAST_TOPIC;
use alloy_primitives::Address;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub contract: Address,
    pub poll_interval: Duration,
    /// Largest block range per eth_getLogs query.
    pub max_range: u64,
    /// Lag beyond which the poller jumps to the head instead of catching up.
    pub skip_ahead_threshold: u64,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            contract: Address::ZERO,
            poll_interval: Duration::from_secs(2),
            max_range: 100,
            skip_ahead_threshold: 1000,
        }
    }
}

/// Run the poll loop forever. Errors are logged and retried next tick.
pub async fn run_poller(rpc: Arc<EvmRpcClient>, config: PollerConfig, ingest: ChainIngest) {
    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut last_polled: Option<u64> = None;

    loop {
        interval.tick().await;
        if let Err(e) = poll_once(&rpc, &config, &ingest, &mut last_polled).await {
            tracing::warn!("Poll failed: {}", e);
        }
    }
}

async fn poll_once(
    rpc: &EvmRpcClient,
    config: &PollerConfig,
    ingest: &ChainIngest,
    last_polled: &mut Option<u64>,
) -> anyhow::Result<()> {
    let head = rpc.block_number().await?;

    let last = match *last_polled {
        // First sight of the chain: anchor at the head, history is not replayed.
        None => {
            *last_polled = Some(head);
            ingest.ingest_tick(head, None).await;
            return Ok(());
        }
        Some(last) => last,
    };

    let Some((from, to)) = next_range(last, head, config) else {
        return Ok(());
    };
    if from > last + 1 {
        tracing::warn!(
            "Poller {} blocks behind head {}, skipping ahead to {}",
            head - last,
            head,
            from
        );
    }

    let logs = rpc
        .get_logs(config.contract, *VOTE_CAST_TOPIC, from, to)
        .await?;
    let count = logs.len();
    for log in &logs {
        ingest.ingest_log(log).await;
    }
    if count > 0 {
        tracing::debug!("Polled {} logs in blocks {}..={}", count, from, to);
    }

    // The tick only covers blocks whose logs we actually fetched, so the
    // aggregator never finalizes a window ahead of its votes.
    ingest.ingest_tick(to, None).await;
    *last_polled = Some(to);
    Ok(())
}

/// Next block range to query, clamped to `max_range`. Far behind the head
/// the poller jumps forward instead of paging through stale windows.
fn next_range(last: u64, head: u64, config: &PollerConfig) -> Option<(u64, u64)> {
    if head <= last {
        return None;
    }
    let from = if head - last > config.skip_ahead_threshold {
        head.saturating_sub(config.max_range) + 1
    } else {
        last + 1
    };
    let to = head.min(from + config.max_range - 1);
    Some((from, to))
}
