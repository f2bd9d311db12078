//! Frame Pipeline - bounded JPEG compression with latest-wins queuing
//!
//! Raw framebuffers come in at emulator speed; compressed frames go out at
//! whatever rate the CPU sustains. At most `max_concurrent` compressions run
//! at once, and exactly one raw frame may wait in the queue slot. A newer
//! frame replaces the waiting one: spectators only ever want the most recent
//! picture, so stale frames are worthless.

use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};

/// A wire-ready JPEG frame.
#[derive(Debug, Clone)]
pub struct CompressedFrame(pub Vec<u8>);

#[derive(Debug, Clone)]
pub struct FrameConfig {
    pub width: u32,
    pub height: u32,
    /// Compressions allowed in flight at once.
    pub max_concurrent: usize,
    pub jpeg_quality: u8,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            width: 160,
            height: 144,
            max_concurrent: 8,
            jpeg_quality: 75,
        }
    }
}

struct PipelineShared {
    semaphore: Arc<Semaphore>,
    /// Latest-wins slot: holds at most one raw frame.
    queued: Mutex<Option<Vec<u8>>>,
    out: mpsc::Sender<CompressedFrame>,
    config: FrameConfig,
    in_flight: AtomicUsize,
}

/// Compression pipeline handle. Cheap to clone.
#[derive(Clone)]
pub struct FramePipeline {
    shared: Arc<PipelineShared>,
}

impl FramePipeline {
    /// Build the pipeline and the channel its compressed frames drain into.
    pub fn new(config: FrameConfig) -> (Self, mpsc::Receiver<CompressedFrame>) {
        let (out_tx, out_rx) = mpsc::channel(16);
        let pipeline = Self {
            shared: Arc::new(PipelineShared {
                semaphore: Arc::new(Semaphore::new(config.max_concurrent)),
                queued: Mutex::new(None),
                out: out_tx,
                config,
                in_flight: AtomicUsize::new(0),
            }),
        };
        (pipeline, out_rx)
    }

    /// Hand a raw RGBA frame to the pipeline. Never blocks the caller.
    pub fn submit(&self, rgba: Vec<u8>) {
        let expected = (self.shared.config.width * self.shared.config.height * 4) as usize;
        if rgba.len() != expected {
            tracing::warn!(
                "Dropping malformed frame: {} bytes, expected {}",
                rgba.len(),
                expected
            );
            return;
        }

        match self.shared.semaphore.clone().try_acquire_owned() {
            Ok(permit) => self.spawn_worker(permit, rgba),
            Err(_) => {
                // All compressors busy: park the frame, replacing any older
                // one still waiting.
                let mut queued = self.shared.queued.lock();
                if queued.is_some() {
                    tracing::trace!("Replacing queued frame");
                }
                *queued = Some(rgba);
            }
        }
    }

    /// Compressions currently in flight.
    pub fn in_flight(&self) -> usize {
        self.shared.in_flight.load(Ordering::Relaxed)
    }

    /// Whether a frame is waiting in the queue slot.
    pub fn has_queued(&self) -> bool {
        self.shared.queued.lock().is_some()
    }

    fn spawn_worker(&self, permit: tokio::sync::OwnedSemaphorePermit, rgba: Vec<u8>) {
        let shared = self.shared.clone();
        tokio::spawn(async move {
            let mut current = Some(rgba);
            while let Some(frame) = current.take() {
                shared.in_flight.fetch_add(1, Ordering::Relaxed);
                let (width, height, quality) = (
                    shared.config.width,
                    shared.config.height,
                    shared.config.jpeg_quality,
                );
                let encoded =
                    tokio::task::spawn_blocking(move || encode_jpeg(&frame, width, height, quality))
                        .await;
                shared.in_flight.fetch_sub(1, Ordering::Relaxed);

                match encoded {
                    Ok(Ok(jpeg)) => {
                        if shared.out.try_send(CompressedFrame(jpeg)).is_err() {
                            tracing::warn!("Compressed-frame channel full, frame dropped");
                        }
                    }
                    Ok(Err(e)) => tracing::warn!("Compression failed, frame dropped: {}", e),
                    Err(e) => tracing::warn!("Compression task died: {}", e),
                }

                // Still holding the permit: drain the queue slot so a parked
                // frame never waits for a fresh submission.
                current = shared.queued.lock().take();
            }
            drop(permit);
        });
    }
}

/// Encode an RGBA buffer as JPEG. Alpha is stripped first; the codec has no
/// use for it.
pub(crate) fn encode_jpeg(
    rgba: &[u8],
    width: u32,
    height: u32,
    quality: u8,
) -> image::ImageResult<Vec<u8>> {
    let rgb: Vec<u8> = rgba
        .chunks_exact(4)
        .flat_map(|pixel| [pixel[0], pixel[1], pixel[2]])
        .collect();

    let mut out = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut out, quality);
    encoder.encode(&rgb, width, height, ExtendedColorType::Rgb8)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(fill: u8, config: &FrameConfig) -> Vec<u8> {
        vec![fill; (config.width * config.height * 4) as usize]
    }

    #[test]
    fn test_encode_produces_jpeg_magic() {
        let config = FrameConfig::default();
        let jpeg = encode_jpeg(&frame(0x40, &config), config.width, config.height, 75).unwrap();
        assert_eq!(&jpeg[..2], &[0xff, 0xd8]);
        assert_eq!(&jpeg[jpeg.len() - 2..], &[0xff, 0xd9]);
    }

    #[tokio::test]
    async fn test_frames_flow_through() {
        let (pipeline, mut rx) = FramePipeline::new(FrameConfig::default());
        let config = FrameConfig::default();

        pipeline.submit(frame(0x10, &config));
        let compressed = rx.recv().await.unwrap();
        assert_eq!(&compressed.0[..2], &[0xff, 0xd8]);
        assert_eq!(pipeline.in_flight(), 0);
        assert!(!pipeline.has_queued());
    }

    #[tokio::test]
    async fn test_malformed_frame_dropped() {
        let (pipeline, mut rx) = FramePipeline::new(FrameConfig::default());
        pipeline.submit(vec![0u8; 17]);
        assert!(rx.try_recv().is_err());
    }

    // Current-thread runtime: spawned workers cannot run until the first
    // await, so the queue slot is observable deterministically.
    #[tokio::test]
    async fn test_latest_wins_replaces_queued_frame() {
        let config = FrameConfig {
            max_concurrent: 1,
            ..FrameConfig::default()
        };
        let (pipeline, mut rx) = FramePipeline::new(config.clone());

        pipeline.submit(frame(0x01, &config)); // takes the only permit
        pipeline.submit(frame(0x02, &config)); // parked
        pipeline.submit(frame(0x03, &config)); // replaces 0x02
        assert!(pipeline.has_queued());

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert!(rx.try_recv().is_err());

        let expect = |fill: u8| {
            encode_jpeg(&frame(fill, &config), config.width, config.height, config.jpeg_quality)
                .unwrap()
        };
        assert_eq!(first.0, expect(0x01));
        // The middle frame was discarded, never compressed.
        assert_eq!(second.0, expect(0x03));
        assert!(!pipeline.has_queued());
    }

    #[tokio::test]
    async fn test_concurrency_bounded_with_single_spare_slot() {
        let config = FrameConfig {
            max_concurrent: 2,
            ..FrameConfig::default()
        };
        let (pipeline, mut rx) = FramePipeline::new(config.clone());

        for fill in 0..10u8 {
            pipeline.submit(frame(fill, &config));
        }

        // Two permits plus the one queue slot: exactly three frames survive
        // the burst.
        let mut outputs = Vec::new();
        for _ in 0..3 {
            outputs.push(rx.recv().await.unwrap());
        }
        assert!(rx.try_recv().is_err());
        assert_eq!(pipeline.in_flight(), 0);
    }
}
