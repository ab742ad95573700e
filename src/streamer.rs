//! The capture-encode-upload loop.
//!
//! One async task reads frames from the source, resizes and JPEG-encodes
//! them per the current configuration, and uploads each frame, pacing
//! itself to the configured frame rate. The configuration is re-read on
//! every iteration so hotkey adjustments take effect mid-stream.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::SharedConfig;
use crate::frame::{encode_jpeg, maybe_resize};
use crate::source::{SourceError, VideoSource};
use crate::uploader::UploadClient;

/// Pause after a failed upload before the next attempt.
const UPLOAD_RETRY_PAUSE: Duration = Duration::from_millis(250);

/// Print a status summary after every this many uploaded frames.
const STATUS_EVERY: u64 = 30;

/// Counters for the session, shared across the loop and status reporting.
#[derive(Debug, Default)]
pub struct SessionStats {
    frames: AtomicU64,
    bytes: AtomicU64,
    summaries: AtomicU64,
}

impl SessionStats {
    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    pub fn bytes(&self) -> u64 {
        self.bytes.load(Ordering::Relaxed)
    }

    pub fn summaries(&self) -> u64 {
        self.summaries.load(Ordering::Relaxed)
    }

    /// Record one uploaded frame; returns the new frame count.
    fn record_frame(&self, frame_bytes: u64) -> u64 {
        self.bytes.fetch_add(frame_bytes, Ordering::Relaxed);
        self.frames.fetch_add(1, Ordering::Relaxed) + 1
    }
}

pub struct Streamer {
    source: Box<dyn VideoSource>,
    client: UploadClient,
    config: SharedConfig,
    running: Arc<AtomicBool>,
    stats: Arc<SessionStats>,
}

impl Streamer {
    pub fn new(
        source: Box<dyn VideoSource>,
        client: UploadClient,
        config: SharedConfig,
        running: Arc<AtomicBool>,
        stats: Arc<SessionStats>,
    ) -> Self {
        Streamer {
            source,
            client,
            config,
            running,
            stats,
        }
    }

    /// Run the loop until quit, end of a live stream, or a source error.
    /// The source is released on every exit path.
    pub async fn run(mut self) -> Result<(), SourceError> {
        let result = self.stream_loop().await;
        self.source.release();
        result
    }

    async fn stream_loop(&mut self) -> Result<(), SourceError> {
        let mut next_at = Instant::now();

        while self.running.load(Ordering::Relaxed) {
            let cfg = self.config.snapshot();

            let frame = match self.source.read_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => {
                    if self.source.is_live() {
                        log::info!("live source ended, stopping");
                        break;
                    }
                    // End of file: loop back to the first frame.
                    if let Err(e) = self.source.rewind() {
                        log::error!("rewind failed: {}", e);
                        break;
                    }
                    continue;
                }
                Err(e) => {
                    log::error!("frame read failed: {}", e);
                    break;
                }
            };

            let frame = maybe_resize(frame, cfg.max_width);
            let jpeg = match encode_jpeg(&frame, cfg.jpeg_quality) {
                Ok(jpeg) => jpeg,
                Err(e) => {
                    // Skip this frame, no pacing penalty.
                    log::warn!("encode failed, skipping frame: {}", e);
                    continue;
                }
            };

            let jpeg_len = jpeg.len() as u64;
            if let Err(e) = self.client.upload(jpeg).await {
                log::warn!("upload failed: {}", e);
                tokio::time::sleep(UPLOAD_RETRY_PAUSE).await;
                next_at = Instant::now();
                continue;
            }

            let frames = self.stats.record_frame(jpeg_len);
            if frames % STATUS_EVERY == 0 {
                self.stats.summaries.fetch_add(1, Ordering::Relaxed);
                println!(
                    "{} frames (~{} KB) | fps={} quality={} max_width={}",
                    frames,
                    self.stats.bytes() / 1024,
                    cfg.fps,
                    cfg.jpeg_quality,
                    cfg.max_width
                );
            }

            // Pace to the configured rate; when behind schedule, restart
            // the clock instead of accumulating drift.
            let period = Duration::from_secs_f64(1.0 / f64::from(cfg.fps.max(0.1)));
            next_at += period;
            let now = Instant::now();
            if next_at > now {
                tokio::time::sleep(next_at - now).await;
            } else {
                next_at = now;
            }
        }

        Ok(())
    }
}
