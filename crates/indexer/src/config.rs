//! Indexer configuration

use alloy_primitives::Address;
use clap::Parser;
use std::path::PathBuf;

/// Chainplays indexer: aggregates on-chain votes, drives the console, and
/// streams frames and game state to spectators.
#[derive(Parser, Debug)]
#[command(name = "chainplays-indexer")]
#[command(about = "Off-chain indexer for the collaborative on-chain console", long_about = None)]
pub struct Args {
    /// HTTP + WebSocket port
    #[arg(long, default_value = "3001")]
    pub port: u16,

    /// Blocks per voting window
    #[arg(long, default_value = "5")]
    pub window_size: u64,

    /// Chain block time in milliseconds
    #[arg(long, default_value = "400")]
    pub block_time_ms: u64,

    /// Streaming JSON-RPC endpoint (subscriptions)
    #[arg(long, default_value = "ws://127.0.0.1:8546")]
    pub ws_rpc_url: String,

    /// HTTP JSON-RPC endpoint (polling, relay)
    #[arg(long, default_value = "http://127.0.0.1:8545")]
    pub http_rpc_url: String,

    /// Vote contract address
    #[arg(long)]
    pub vote_contract: Address,

    /// Emulator frame rate
    #[arg(long, default_value = "60")]
    pub fps: u32,

    /// Directory for save files
    #[arg(long, default_value = "./saves")]
    pub save_dir: PathBuf,

    /// ROM location on disk
    #[arg(long, default_value = "./saves/pokemon-red.gb")]
    pub rom_path: PathBuf,

    /// URL to fetch the ROM from when missing on disk
    #[arg(long, env = "ROM_URL")]
    pub rom_url: Option<String>,

    /// Directory of static spectator assets served at /
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// Recent votes kept for hydration
    #[arg(long, default_value = "100")]
    pub max_cached_votes: usize,

    /// Recent window results kept for hydration
    #[arg(long, default_value = "50")]
    pub max_cached_actions: usize,

    /// Production mode: wait out the startup barrier before touching saves
    #[arg(long)]
    pub production: bool,

    /// Startup barrier length in milliseconds (production only)
    #[arg(long, default_value = "5000")]
    pub startup_delay_ms: u64,

    /// Enable the gasless relay endpoints
    #[arg(long)]
    pub relay_enabled: bool,

    /// Delegation contract address (required with --relay-enabled)
    #[arg(long)]
    pub delegation_contract: Option<Address>,

    /// Relay wallet private key
    #[arg(long, env = "RELAY_PRIVATE_KEY", hide_env_values = true)]
    pub relay_private_key: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,
}
