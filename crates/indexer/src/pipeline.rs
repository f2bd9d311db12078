//! Channel wiring between components
//!
//! Each function spawns one long-lived forwarding task. The aggregator
//! funnel is the single writer for both `add_vote` and `on_block`; everyone
//! else only moves values between channels and the hub.

use chain_client::ChainEvent;
use emulator::{Console, EmulatorDriver, FrameSink};
use frame_pipeline::{CompressedFrame, FramePipeline};
use indexer_types::{GameState, WindowResult};
use std::sync::Arc;
use stream_hub::StreamHub;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use vote_aggregator::VoteAggregator;

/// Adapter: the driver's frame sink is the compression pipeline.
pub struct PipelineSink(pub FramePipeline);

impl FrameSink for PipelineSink {
    fn push_frame(&self, rgba: Vec<u8>) {
        self.0.submit(rgba);
    }
}

/// Single-writer funnel: chain events feed the hub's live echo and the
/// aggregator, in arrival order.
pub fn spawn_aggregator_funnel(
    mut events_rx: mpsc::Receiver<ChainEvent>,
    mut aggregator: VoteAggregator,
    hub: Arc<StreamHub>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                ChainEvent::Vote(vote) => {
                    hub.publish_vote(&vote);
                    aggregator.add_vote(vote);
                }
                ChainEvent::Tick(tick) => aggregator.on_block(tick),
            }
        }
        tracing::warn!("Chain event channel closed");
    })
}

/// Window results press the winning button and go out to spectators.
pub fn spawn_result_consumer<C: Console + 'static>(
    mut results_rx: mpsc::UnboundedReceiver<WindowResult>,
    hub: Arc<StreamHub>,
    driver: EmulatorDriver<C>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(result) = results_rx.recv().await {
            driver.press_button(result.winner, None);
            hub.publish_result(&result);
        }
    })
}

/// Compressed frames fan out to every frame spectator.
pub fn spawn_frame_forwarder(
    mut frames_rx: mpsc::Receiver<CompressedFrame>,
    hub: Arc<StreamHub>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(frame) = frames_rx.recv().await {
            hub.broadcast_frame(&frame);
        }
    })
}

/// Game-state snapshots fan out to event spectators.
pub fn spawn_state_forwarder(
    mut states_rx: mpsc::UnboundedReceiver<GameState>,
    hub: Arc<StreamHub>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(state) = states_rx.recv().await {
            hub.publish_game_state(state);
        }
    })
}
