//! Chain Client - dual-path vote ingestion
//!
//! Produces a single deduplicated stream of `Vote` events plus `BlockTick`
//! events from two upstreams: a WebSocket subscription (new heads + filtered
//! logs) and an HTTP log poller. Either path may drop out; the other keeps
//! the window clock advancing.

pub mod client;
pub mod dedup;
pub mod poller;
pub mod rpc;
pub mod subscription;

pub use client::{ChainClient, ChainClientConfig, ChainEvent, ChainIngest};
pub use dedup::SeenEvents;
pub use rpc::{EvmRpcClient, LogEntry, RpcClientError};

use alloy_primitives::{keccak256, B256};
use std::sync::LazyLock;

/// topic0 of `VoteCast(address indexed player, uint8 action)`.
pub static VOTE_CAST_TOPIC: LazyLock<B256> =
    LazyLock::new(|| keccak256(b"VoteCast(address,uint8)"));
