use std::io::IsTerminal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;

use proctorcam::config::{Preset, Settings, SharedConfig};
use proctorcam::hotkeys::{restore_terminal, HotkeyListener, KeyInput, LineKeys, RawKeys,
    HOTKEY_LEGEND};
use proctorcam::source::open_source;
use proctorcam::streamer::{SessionStats, Streamer};
use proctorcam::uploader::UploadClient;

/// proctorcam: simulated exam-proctoring webcam feed
#[derive(Parser)]
#[command(name = "proctorcam")]
#[command(version, about = "Streams JPEG frames from a video file or camera to a backend")]
struct Cli {
    /// Backend base URL (env: BACKEND)
    #[arg(long)]
    backend: Option<String>,

    /// Video file path or camera device index (env: SRC)
    #[arg(long)]
    src: Option<String>,

    /// Starting preset, "smooth" or "sharp" (env: MODE)
    #[arg(long)]
    mode: Option<String>,

    /// Stream token sent with every upload (env: STREAM_KEY)
    #[arg(long)]
    stream_key: Option<String>,

    /// Read hotkeys as lines instead of raw key presses
    #[arg(long)]
    line_input: bool,
}

fn load_env() {
    // dotenv::dotenv() returns Err if .env doesn't exist, which is fine
    let _ = dotenv::dotenv();
}

#[tokio::main]
async fn main() {
    load_env();
    env_logger::init();

    let cli = Cli::parse();
    let mut settings = Settings::from_env();
    if let Some(backend) = cli.backend {
        settings.backend = backend;
    }
    if let Some(src) = cli.src {
        settings.src = src;
    }
    if let Some(mode) = cli.mode {
        settings.mode = Preset::from_name(&mode);
    }
    if let Some(stream_key) = cli.stream_key {
        settings.stream_key = stream_key;
    }

    let config = SharedConfig::new(settings.mode.config());
    let running = Arc::new(AtomicBool::new(true));

    {
        let running = running.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            running.store(false, Ordering::Relaxed);
        }) {
            log::warn!("could not install Ctrl+C handler: {}", e);
        }
    }

    let source = match open_source(&settings.src) {
        Ok(source) => source,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let client = match UploadClient::new(&settings.backend, &settings.stream_key) {
        Ok(client) => client,
        Err(e) => {
            log::error!("{}", e);
            std::process::exit(1);
        }
    };

    let (width, height) = source.dimensions();
    println!(
        "Streaming -> {} | src={} ({}x{}) | preset={}",
        client.upload_url(),
        settings.src,
        width,
        height,
        settings.mode.name()
    );
    println!("Hotkeys: {}", HOTKEY_LEGEND);

    let input: Box<dyn KeyInput> = if !cli.line_input && std::io::stdin().is_terminal() {
        match RawKeys::new() {
            Ok(raw) => Box::new(raw),
            Err(e) => {
                log::warn!("raw mode unavailable ({}), falling back to line input", e);
                Box::new(LineKeys::new())
            }
        }
    } else {
        Box::new(LineKeys::new())
    };
    let listener = HotkeyListener::spawn(input, config.clone(), running.clone());

    let stats = Arc::new(SessionStats::default());
    let streamer = Streamer::new(source, client, config, running.clone(), stats.clone());
    let result = streamer.run().await;

    if listener.is_finished() {
        log::debug!("hotkey listener exited before the stream");
    }
    running.store(false, Ordering::Relaxed);
    restore_terminal();

    if let Err(e) = result {
        log::error!("stream failed: {}", e);
        std::process::exit(1);
    }

    println!(
        "Stream stopped. {} frames uploaded (~{} KB).",
        stats.frames(),
        stats.bytes() / 1024
    );
}
