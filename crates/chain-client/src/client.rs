//! Chain client orchestration and the ingestion boundary
//!
//! Raw upstream material (subscription notifications, polled logs) is turned
//! into typed `Vote` / `BlockTick` values here, behind the shared dedup set.

use crate::dedup::SeenEvents;
use crate::poller::{self, PollerConfig};
use crate::rpc::{EvmRpcClient, LogEntry};
use crate::subscription::{self, SubscriptionConfig};
use alloy_primitives::{Address, B256};
use chrono::Utc;
use indexer_types::{Action, BlockTick, Vote, VoteKey};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// How often stale dedup entries are collected.
const DEDUP_GC_INTERVAL: Duration = Duration::from_secs(60);

/// Events emitted downstream to the aggregator funnel.
#[derive(Debug, Clone)]
pub enum ChainEvent {
    Vote(Vote),
    Tick(BlockTick),
}

#[derive(Debug, Clone)]
pub struct ChainClientConfig {
    /// Streaming endpoint (subscriptions).
    pub ws_url: String,
    /// HTTP endpoint (polling).
    pub http_url: String,
    /// Vote contract address the log filter is pinned to.
    pub contract: Address,
    /// Window size in blocks; sets the poll cadence and dedup retention.
    pub window_size: u64,
    /// Expected chain block time.
    pub block_time_ms: u64,
}

/// Shared ingestion handle used by both upstream paths.
#[derive(Clone)]
pub struct ChainIngest {
    seen: SeenEvents,
    events: mpsc::Sender<ChainEvent>,
    latest_block: Arc<AtomicU64>,
}

impl ChainIngest {
    pub fn new(seen: SeenEvents, events: mpsc::Sender<ChainEvent>) -> Self {
        Self {
            seen,
            events,
            latest_block: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Highest block number observed by any path.
    pub fn latest_block(&self) -> u64 {
        self.latest_block.load(Ordering::Relaxed)
    }

    /// Ingest one raw log. Duplicates between paths are absorbed here.
    pub async fn ingest_log(&self, log: &LogEntry) {
        if log.removed {
            tracing::debug!("Reorged log dropped: tx {}", log.transaction_hash);
            return;
        }
        let key = VoteKey {
            block: log.block_number,
            tx_hash: log.transaction_hash,
            log_index: log.log_index as u32,
        };
        if !self.seen.insert(key) {
            return;
        }
        match vote_from_log(log) {
            Some(vote) => {
                tracing::debug!(
                    "Vote: {} pressed {} at block {}",
                    vote.player,
                    vote.action,
                    vote.block
                );
                if self.events.send(ChainEvent::Vote(vote)).await.is_err() {
                    tracing::warn!("Event channel closed, vote dropped");
                }
            }
            None => {
                tracing::warn!(
                    "Unparseable VoteCast log at block {} tx {}",
                    log.block_number,
                    log.transaction_hash
                );
            }
        }
    }

    /// Ingest an observed block from either path.
    pub async fn ingest_tick(&self, number: u64, hash: Option<B256>) {
        self.latest_block.fetch_max(number, Ordering::Relaxed);
        let tick = BlockTick { number, hash };
        if self.events.send(ChainEvent::Tick(tick)).await.is_err() {
            tracing::warn!("Event channel closed, tick dropped");
        }
    }
}

/// Decode a `VoteCast(address indexed player, uint8 action)` log.
///
/// topic1 carries the left-padded player address; data is one ABI word whose
/// low byte is the action code. Unknown codes are rejected.
pub fn vote_from_log(log: &LogEntry) -> Option<Vote> {
    if log.topics.len() < 2 {
        return None;
    }
    let player = Address::from_slice(&log.topics[1].as_slice()[12..]);

    let data = log.data.as_ref();
    if data.is_empty() {
        return None;
    }
    let action = Action::from_code(data[data.len() - 1])?;
    // All higher bytes of the word must be zero for a valid uint8.
    if data[..data.len() - 1].iter().any(|b| *b != 0) {
        return None;
    }

    Some(Vote {
        player,
        action,
        block: log.block_number,
        tx_hash: log.transaction_hash,
        log_index: log.log_index as u32,
        observed_at: Utc::now(),
    })
}

/// Owner of the two upstream connections and the dedup set.
pub struct ChainClient {
    rpc: Arc<EvmRpcClient>,
    config: ChainClientConfig,
    seen: SeenEvents,
    ingest: ChainIngest,
}

impl ChainClient {
    /// Build the client and its downstream event channel.
    pub fn new(config: ChainClientConfig) -> (Self, mpsc::Receiver<ChainEvent>) {
        let (events_tx, events_rx) = mpsc::channel(1024);
        let seen = SeenEvents::new();
        let ingest = ChainIngest::new(seen.clone(), events_tx);
        let rpc = Arc::new(EvmRpcClient::new(config.http_url.clone()));
        (
            Self {
                rpc,
                config,
                seen,
                ingest,
            },
            events_rx,
        )
    }

    pub fn rpc(&self) -> Arc<EvmRpcClient> {
        self.rpc.clone()
    }

    /// Spawn the subscription reader, the poller, and the dedup GC.
    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        let sub_config = SubscriptionConfig {
            ws_url: self.config.ws_url.clone(),
            contract: self.config.contract,
        };
        let sub_ingest = self.ingest.clone();
        let sub_handle = tokio::spawn(async move {
            subscription::run_subscription(sub_config, sub_ingest).await;
        });

        let poll_config = PollerConfig {
            contract: self.config.contract,
            poll_interval: Duration::from_millis(
                self.config.window_size * self.config.block_time_ms,
            ),
            ..PollerConfig::default()
        };
        let poll_rpc = self.rpc.clone();
        let poll_ingest = self.ingest.clone();
        let poll_handle = tokio::spawn(async move {
            poller::run_poller(poll_rpc, poll_config, poll_ingest).await;
        });

        let gc_handle = tokio::spawn(run_dedup_gc(
            self.seen,
            self.ingest.clone(),
            self.config.window_size,
        ));

        vec![sub_handle, poll_handle, gc_handle]
    }
}

/// Periodically drop dedup entries older than two windows behind the head.
async fn run_dedup_gc(seen: SeenEvents, ingest: ChainIngest, window_size: u64) {
    let mut interval = tokio::time::interval(DEDUP_GC_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let current_window = ingest.latest_block() / window_size;
        let cutoff_block = current_window.saturating_sub(2) * window_size;
        seen.evict_before(cutoff_block);
    }
}
