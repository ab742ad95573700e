//! proctorcam: simulates an exam-proctoring webcam feed.
//!
//! Frames are read from a video file or camera device, downscaled and
//! JPEG-encoded, and uploaded to a backend at a configurable rate. Frame
//! rate, JPEG quality, and maximum width are tunable live via hotkeys.

pub mod config;
pub mod frame;
pub mod hotkeys;
pub mod source;
pub mod streamer;
pub mod uploader;
