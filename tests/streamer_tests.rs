//! End-to-end loop behavior against a scripted source and a mock backend.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use proctorcam::config::{Preset, SharedConfig, StreamConfig};
use proctorcam::frame::Frame;
use proctorcam::source::{SourceError, VideoSource};
use proctorcam::streamer::{SessionStats, Streamer};
use proctorcam::uploader::UploadClient;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn solid_frame(width: u32, height: u32) -> Frame {
    Frame {
        data: vec![96; (width * height * 3) as usize],
        width,
        height,
    }
}

/// A file-like source serving a fixed list of frames, with counters for the
/// loop behavior under test. `stop_after` clears the running flag once that
/// many frames have been served, ending the run at an exact frame count.
#[derive(Debug)]
struct ScriptedSource {
    frames: Vec<Frame>,
    pos: usize,
    live: bool,
    served: u64,
    stop_after: Option<(u64, Arc<AtomicBool>)>,
    rewinds: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

impl ScriptedSource {
    fn file(frames: Vec<Frame>) -> Self {
        ScriptedSource {
            frames,
            pos: 0,
            live: false,
            served: 0,
            stop_after: None,
            rewinds: Arc::new(AtomicUsize::new(0)),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn live(frames: Vec<Frame>) -> Self {
        ScriptedSource {
            live: true,
            ..ScriptedSource::file(frames)
        }
    }
}

impl VideoSource for ScriptedSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        if let Some((limit, running)) = &self.stop_after {
            if self.served >= *limit {
                running.store(false, Ordering::Relaxed);
                return Ok(None);
            }
        }
        match self.frames.get(self.pos) {
            Some(frame) => {
                self.pos += 1;
                self.served += 1;
                Ok(Some(frame.clone()))
            }
            None => Ok(None),
        }
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        if self.live {
            return Err(SourceError::NotSeekable);
        }
        self.rewinds.fetch_add(1, Ordering::Relaxed);
        self.pos = 0;
        Ok(())
    }

    fn release(&mut self) {
        self.releases.fetch_add(1, Ordering::Relaxed);
    }

    fn is_live(&self) -> bool {
        self.live
    }

    fn dimensions(&self) -> (u32, u32) {
        (16, 12)
    }
}

async fn accepting_backend() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    server
}

// High fps so scenario runs complete quickly.
fn fast_config() -> SharedConfig {
    SharedConfig::new(StreamConfig {
        fps: 120.0,
        jpeg_quality: 68,
        max_width: 720,
    })
}

#[tokio::test]
async fn test_file_source_loops_and_summarizes_at_thirty() {
    let server = accepting_backend().await;
    let running = Arc::new(AtomicBool::new(true));

    let mut source = ScriptedSource::file(vec![solid_frame(16, 12); 10]);
    source.stop_after = Some((35, running.clone()));
    let rewinds = source.rewinds.clone();

    let client = UploadClient::new(&server.uri(), "123COLBI").unwrap();
    let stats = Arc::new(SessionStats::default());
    let streamer = Streamer::new(
        Box::new(source),
        client,
        fast_config(),
        running,
        stats.clone(),
    );
    streamer.run().await.unwrap();

    assert_eq!(stats.frames(), 35);
    assert!(stats.bytes() > 0);
    // One summary, at frame 30.
    assert_eq!(stats.summaries(), 1);
    // The 10-frame file wrapped at frames 10, 20, and 30.
    assert!(rewinds.load(Ordering::Relaxed) >= 3);
    assert_eq!(server.received_requests().await.unwrap().len(), 35);
}

#[tokio::test]
async fn test_live_source_stops_at_end_of_stream() {
    let server = accepting_backend().await;
    let running = Arc::new(AtomicBool::new(true));

    let source = ScriptedSource::live(vec![solid_frame(16, 12); 7]);
    let rewinds = source.rewinds.clone();
    let releases = source.releases.clone();

    let client = UploadClient::new(&server.uri(), "key").unwrap();
    let stats = Arc::new(SessionStats::default());
    let streamer = Streamer::new(
        Box::new(source),
        client,
        fast_config(),
        running,
        stats.clone(),
    );
    streamer.run().await.unwrap();

    assert_eq!(stats.frames(), 7);
    assert_eq!(stats.summaries(), 0);
    assert_eq!(rewinds.load(Ordering::Relaxed), 0);
    assert_eq!(releases.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_upload_failure_pauses_and_skips_counters() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/upload"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let running = Arc::new(AtomicBool::new(true));
    let source = ScriptedSource::file(vec![solid_frame(16, 12); 10]);

    let client = UploadClient::new(&server.uri(), "key").unwrap();
    let stats = Arc::new(SessionStats::default());
    let streamer = Streamer::new(
        Box::new(source),
        client,
        fast_config(),
        running.clone(),
        stats.clone(),
    );
    let task = tokio::spawn(streamer.run());

    tokio::time::sleep(Duration::from_millis(600)).await;
    running.store(false, Ordering::Relaxed);
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    // No successful upload, so no counted frames or summaries.
    assert_eq!(stats.frames(), 0);
    assert_eq!(stats.bytes(), 0);
    assert_eq!(stats.summaries(), 0);

    // Each failure pauses 250 ms, so 600 ms admits only a few attempts.
    let attempts = server.received_requests().await.unwrap().len();
    assert!(attempts >= 1, "expected at least one attempt");
    assert!(attempts <= 5, "expected the failure pause, got {} attempts", attempts);
}

#[tokio::test]
async fn test_quit_flag_stops_loop_and_releases_once() {
    let server = accepting_backend().await;
    let running = Arc::new(AtomicBool::new(true));

    let source = ScriptedSource::file(vec![solid_frame(16, 12); 10]);
    let releases = source.releases.clone();

    let client = UploadClient::new(&server.uri(), "key").unwrap();
    let config = SharedConfig::new(Preset::Smooth.config());
    let stats = Arc::new(SessionStats::default());
    let streamer = Streamer::new(Box::new(source), client, config, running.clone(), stats);
    let task = tokio::spawn(streamer.run());

    tokio::time::sleep(Duration::from_millis(50)).await;
    running.store(false, Ordering::Relaxed);

    // Stops within one pacing interval (smooth preset: ~167 ms per frame).
    tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("loop did not stop after quit")
        .unwrap()
        .unwrap();

    assert_eq!(releases.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_malformed_frame_is_skipped_without_upload() {
    let server = accepting_backend().await;
    let running = Arc::new(AtomicBool::new(true));

    let bad_frame = Frame {
        data: vec![0; 5],
        width: 16,
        height: 12,
    };
    let mut source = ScriptedSource::file(vec![
        solid_frame(16, 12),
        bad_frame,
        solid_frame(16, 12),
    ]);
    source.stop_after = Some((3, running.clone()));

    let client = UploadClient::new(&server.uri(), "key").unwrap();
    let stats = Arc::new(SessionStats::default());
    let streamer = Streamer::new(
        Box::new(source),
        client,
        fast_config(),
        running,
        stats.clone(),
    );
    streamer.run().await.unwrap();

    // The malformed frame is read but never uploaded.
    assert_eq!(stats.frames(), 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}
