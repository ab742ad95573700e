//! Stream configuration: presets, bounded runtime adjustments, and the
//! shared state read by the upload loop on every iteration.

use std::sync::{Arc, Mutex};

/// Frame rate bounds for `+`/`-` adjustments.
pub const FPS_MIN: f32 = 1.0;
pub const FPS_MAX: f32 = 30.0;

/// JPEG quality bounds for `]`/`[` adjustments.
pub const QUALITY_MIN: u8 = 40;
pub const QUALITY_MAX: u8 = 95;
pub const QUALITY_STEP: i16 = 2;

/// Max frame width bounds for `0`/`9` adjustments.
pub const WIDTH_MIN: u32 = 320;
pub const WIDTH_MAX: u32 = 1920;
pub const WIDTH_STEP: i64 = 160;

/// The tunable encoding parameters for the stream.
///
/// Mutated by the hotkey listener, read by the upload loop once per frame.
/// Fields are independent scalars; a reader may observe a mix of old and new
/// values across fields, which is acceptable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamConfig {
    /// Target frames per second.
    pub fps: f32,
    /// JPEG encode quality (0-100 scale).
    pub jpeg_quality: u8,
    /// Frames wider than this are downscaled, preserving aspect ratio.
    pub max_width: u32,
}

impl StreamConfig {
    /// Replace all fields at once from a preset.
    pub fn apply_preset(&mut self, preset: Preset) {
        *self = preset.config();
    }

    /// Adjust fps by `delta`, clamped to [1, 30].
    pub fn adjust_fps(&mut self, delta: f32) {
        self.fps = (self.fps + delta).clamp(FPS_MIN, FPS_MAX);
    }

    /// Adjust JPEG quality by `delta`, clamped to [40, 95].
    pub fn adjust_quality(&mut self, delta: i16) {
        let q = i16::from(self.jpeg_quality) + delta;
        self.jpeg_quality = q.clamp(i16::from(QUALITY_MIN), i16::from(QUALITY_MAX)) as u8;
    }

    /// Adjust max width by `delta`, clamped to [320, 1920].
    pub fn adjust_max_width(&mut self, delta: i64) {
        let w = i64::from(self.max_width) + delta;
        self.max_width = w.clamp(i64::from(WIDTH_MIN), i64::from(WIDTH_MAX)) as u32;
    }
}

/// Named configuration bundles toggled at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Balanced motion, smaller frames.
    Smooth,
    /// Best detail, fewer frames.
    Sharp,
}

impl Preset {
    /// Resolve a preset by name. Unrecognized names fall back to `Smooth`.
    pub fn from_name(name: &str) -> Self {
        match name {
            "sharp" => Preset::Sharp,
            _ => Preset::Smooth,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Preset::Smooth => "smooth",
            Preset::Sharp => "sharp",
        }
    }

    /// The configuration snapshot this preset stands for.
    pub fn config(self) -> StreamConfig {
        match self {
            Preset::Smooth => StreamConfig {
                fps: 6.0,
                jpeg_quality: 68,
                max_width: 720,
            },
            Preset::Sharp => StreamConfig {
                fps: 2.0,
                jpeg_quality: 82,
                max_width: 1280,
            },
        }
    }
}

/// Configuration shared between the hotkey listener and the upload loop.
///
/// A mutex-guarded record: preset application replaces the whole record
/// under a single lock acquisition, per-field adjustments touch one field.
#[derive(Clone)]
pub struct SharedConfig {
    inner: Arc<Mutex<StreamConfig>>,
}

impl SharedConfig {
    pub fn new(initial: StreamConfig) -> Self {
        SharedConfig {
            inner: Arc::new(Mutex::new(initial)),
        }
    }

    /// Read all three fields.
    pub fn snapshot(&self) -> StreamConfig {
        *self.inner.lock().unwrap()
    }

    /// Overwrite the whole record from a preset; returns the new snapshot.
    pub fn apply_preset(&self, preset: Preset) -> StreamConfig {
        let mut cfg = self.inner.lock().unwrap();
        cfg.apply_preset(preset);
        *cfg
    }

    pub fn adjust_fps(&self, delta: f32) -> f32 {
        let mut cfg = self.inner.lock().unwrap();
        cfg.adjust_fps(delta);
        cfg.fps
    }

    pub fn adjust_quality(&self, delta: i16) -> u8 {
        let mut cfg = self.inner.lock().unwrap();
        cfg.adjust_quality(delta);
        cfg.jpeg_quality
    }

    pub fn adjust_max_width(&self, delta: i64) -> u32 {
        let mut cfg = self.inner.lock().unwrap();
        cfg.adjust_max_width(delta);
        cfg.max_width
    }
}

/// Environment variable names and defaults, read once at startup.
pub const BACKEND_ENV: &str = "BACKEND";
pub const SRC_ENV: &str = "SRC";
pub const MODE_ENV: &str = "MODE";
pub const STREAM_KEY_ENV: &str = "STREAM_KEY";

pub const DEFAULT_BACKEND: &str = "http://127.0.0.1:8000";
pub const DEFAULT_SRC: &str = "study.mp4";
pub const DEFAULT_STREAM_KEY: &str = "123COLBI";

/// Startup settings resolved from the environment. CLI flags override these
/// in `main` (CLI > env > default precedence).
#[derive(Debug, Clone)]
pub struct Settings {
    /// Backend base URL; frames are POSTed to `<backend>/upload`.
    pub backend: String,
    /// Source identifier: camera index ("0") or video file path.
    pub src: String,
    /// Starting preset.
    pub mode: Preset,
    /// Static token identifying this stream to the backend.
    pub stream_key: String,
}

impl Settings {
    pub fn from_env() -> Self {
        Settings {
            backend: std::env::var(BACKEND_ENV).unwrap_or_else(|_| DEFAULT_BACKEND.to_string()),
            src: std::env::var(SRC_ENV).unwrap_or_else(|_| DEFAULT_SRC.to_string()),
            mode: Preset::from_name(&std::env::var(MODE_ENV).unwrap_or_default()),
            stream_key: std::env::var(STREAM_KEY_ENV)
                .unwrap_or_else(|_| DEFAULT_STREAM_KEY.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smooth_preset_values() {
        let cfg = Preset::Smooth.config();
        assert_eq!(cfg.fps, 6.0);
        assert_eq!(cfg.jpeg_quality, 68);
        assert_eq!(cfg.max_width, 720);
    }

    #[test]
    fn test_sharp_preset_values() {
        let cfg = Preset::Sharp.config();
        assert_eq!(cfg.fps, 2.0);
        assert_eq!(cfg.jpeg_quality, 82);
        assert_eq!(cfg.max_width, 1280);
    }

    #[test]
    fn test_preset_from_name() {
        assert_eq!(Preset::from_name("smooth"), Preset::Smooth);
        assert_eq!(Preset::from_name("sharp"), Preset::Sharp);
    }

    #[test]
    fn test_preset_from_name_falls_back_to_smooth() {
        assert_eq!(Preset::from_name(""), Preset::Smooth);
        assert_eq!(Preset::from_name("ultra"), Preset::Smooth);
        assert_eq!(Preset::from_name("SHARP"), Preset::Smooth);
    }

    #[test]
    fn test_adjust_fps_clamps_at_max() {
        let mut cfg = Preset::Smooth.config();
        for _ in 0..100 {
            cfg.adjust_fps(1.0);
        }
        assert_eq!(cfg.fps, FPS_MAX);
        // Idempotent at the boundary
        cfg.adjust_fps(1.0);
        assert_eq!(cfg.fps, FPS_MAX);
    }

    #[test]
    fn test_adjust_fps_clamps_at_min() {
        let mut cfg = Preset::Sharp.config();
        for _ in 0..100 {
            cfg.adjust_fps(-1.0);
        }
        assert_eq!(cfg.fps, FPS_MIN);
    }

    #[test]
    fn test_adjust_quality_clamps() {
        let mut cfg = Preset::Smooth.config();
        for _ in 0..100 {
            cfg.adjust_quality(QUALITY_STEP);
        }
        assert_eq!(cfg.jpeg_quality, QUALITY_MAX);
        for _ in 0..100 {
            cfg.adjust_quality(-QUALITY_STEP);
        }
        assert_eq!(cfg.jpeg_quality, QUALITY_MIN);
    }

    #[test]
    fn test_adjust_max_width_clamps() {
        let mut cfg = Preset::Smooth.config();
        for _ in 0..100 {
            cfg.adjust_max_width(WIDTH_STEP);
        }
        assert_eq!(cfg.max_width, WIDTH_MAX);
        for _ in 0..100 {
            cfg.adjust_max_width(-WIDTH_STEP);
        }
        assert_eq!(cfg.max_width, WIDTH_MIN);
    }

    #[test]
    fn test_apply_preset_replaces_all_fields() {
        let mut cfg = Preset::Smooth.config();
        cfg.adjust_fps(10.0);
        cfg.adjust_quality(-20);
        cfg.apply_preset(Preset::Sharp);
        assert_eq!(cfg, Preset::Sharp.config());
    }

    #[test]
    fn test_shared_config_snapshot_sees_writes() {
        let shared = SharedConfig::new(Preset::Smooth.config());
        let writer = shared.clone();

        writer.adjust_fps(2.0);
        assert_eq!(shared.snapshot().fps, 8.0);

        writer.apply_preset(Preset::Sharp);
        assert_eq!(shared.snapshot(), Preset::Sharp.config());
    }

    #[test]
    fn test_shared_config_adjust_returns_new_value() {
        let shared = SharedConfig::new(Preset::Smooth.config());
        assert_eq!(shared.adjust_quality(QUALITY_STEP), 70);
        assert_eq!(shared.adjust_max_width(WIDTH_STEP), 880);
        assert_eq!(shared.adjust_fps(-1.0), 5.0);
    }
}
