//! Chainplays Indexer
//!
//! Supervisor for the whole pipeline: boots components in dependency order
//! (assets, console, servers, ingestion), wires their channels, and owns
//! graceful shutdown. Emulator init failure is fatal; everything else
//! degrades locally and retries.

use anyhow::{Context, Result};
use axum::http::{header, Method};
use chain_client::{ChainClient, ChainClientConfig};
use clap::Parser;
use console_stub::StubConsole;
use emulator::{rom, DriverConfig, EmulatorDriver, SaveManager};
use frame_pipeline::{FrameConfig, FramePipeline};
use relay::{RelayConfig, RelayContext, RelaySigner};
use std::sync::Arc;
use std::time::Duration;
use stream_hub::{HubConfig, StreamHub};
use tokio::sync::mpsc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vote_aggregator::VoteAggregator;

mod config;
mod pipeline;
#[cfg(test)]
mod tests;

use config::Args;
use pipeline::PipelineSink;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    run(args).await
}

async fn run(args: Args) -> Result<()> {
    tracing::info!("Starting chainplays indexer");
    tracing::info!("  Port: {}", args.port);
    tracing::info!("  Window size: {} blocks", args.window_size);
    tracing::info!("  Vote contract: {}", args.vote_contract);
    tracing::info!("  Save dir: {:?}", args.save_dir);

    // Asset acquisition.
    let rom_bytes = match &args.rom_url {
        Some(url) => rom::ensure_rom(&args.rom_path, url).await?,
        None => tokio::fs::read(&args.rom_path)
            .await
            .with_context(|| format!("ROM missing at {:?} and no --rom-url given", args.rom_path))?,
    };

    // In production a replaced instance may still be flushing its save.
    if args.production {
        tracing::info!("Startup barrier: waiting {}ms", args.startup_delay_ms);
        tokio::time::sleep(Duration::from_millis(args.startup_delay_ms)).await;
    }

    // Console boot is the one fatal step.
    let saves = SaveManager::new(&args.save_dir)?;
    let mut console = StubConsole::new();
    let outcome = saves
        .restore(&mut console, &rom_bytes)
        .context("console init failed")?;
    tracing::info!("Console booted ({:?})", outcome);

    // Hub and fan-out.
    let hub = Arc::new(StreamHub::new(HubConfig {
        max_cached_votes: args.max_cached_votes,
        max_cached_actions: args.max_cached_actions,
        ..HubConfig::default()
    }));

    // Frame pipeline and driver.
    let (frame_pipeline, frames_rx) = FramePipeline::new(FrameConfig::default());
    let (states_tx, states_rx) = mpsc::unbounded_channel();
    let driver = EmulatorDriver::new(
        console,
        saves,
        DriverConfig {
            fps: args.fps,
            ..DriverConfig::default()
        },
        Arc::new(PipelineSink(frame_pipeline)),
        states_tx,
    );

    // Aggregator and chain ingestion.
    let (results_tx, results_rx) = mpsc::unbounded_channel();
    let aggregator = VoteAggregator::new(args.window_size, results_tx);
    let (chain_client, events_rx) = ChainClient::new(ChainClientConfig {
        ws_url: args.ws_rpc_url.clone(),
        http_url: args.http_rpc_url.clone(),
        contract: args.vote_contract,
        window_size: args.window_size,
        block_time_ms: args.block_time_ms,
    });
    let rpc = chain_client.rpc();

    // Wire everything.
    let mut handles = vec![
        pipeline::spawn_aggregator_funnel(events_rx, aggregator, hub.clone()),
        pipeline::spawn_result_consumer(results_rx, hub.clone(), driver.clone()),
        pipeline::spawn_frame_forwarder(frames_rx, hub.clone()),
        pipeline::spawn_state_forwarder(states_rx, hub.clone()),
        driver.spawn_clock(),
        driver.spawn_state_sampler(),
        driver.spawn_autosave(),
    ];
    handles.extend(chain_client.spawn());

    // HTTP surface: spectator routes, optional relay, optional static UI.
    let mut app = stream_hub::router(hub.clone(), args.static_dir.clone());
    if args.relay_enabled {
        app = app.merge(relay_router(&args, rpc.clone()).await?);
        tracing::info!("Relay enabled");
    }
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT]);
    let app = app.layer(cors);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("cannot bind port {}", args.port))?;
    tracing::info!("Listening on port {}", args.port);
    handles.push(tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    }));

    tracing::info!("Indexer running. Press Ctrl+C to stop.");
    shutdown_signal().await;

    tracing::info!("Shutting down...");
    match driver.save_now() {
        Ok(()) => tracing::info!("Final save complete"),
        Err(e) => tracing::error!("Final save failed: {}", e),
    }
    for handle in &handles {
        handle.abort();
    }
    tracing::info!("Indexer stopped");

    Ok(())
}

async fn relay_router(
    args: &Args,
    rpc: Arc<chain_client::EvmRpcClient>,
) -> Result<axum::Router> {
    let delegation_contract = args
        .delegation_contract
        .context("--delegation-contract is required with --relay-enabled")?;
    let private_key = args
        .relay_private_key
        .as_deref()
        .context("RELAY_PRIVATE_KEY is required with --relay-enabled")?;

    let signer = RelaySigner::from_hex(private_key)
        .map_err(|e| anyhow::anyhow!("relay key: {e}"))?;
    let chain_id = rpc.chain_id().await.context("cannot read chain id")?;
    tracing::info!("Relay wallet: {} (chain {})", signer.address(), chain_id);

    let context = Arc::new(RelayContext::new(
        rpc,
        signer,
        RelayConfig::new(chain_id, args.vote_contract, delegation_contract),
    ));
    Ok(relay::router(context))
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut term = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("cannot install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = term.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
