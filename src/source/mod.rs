//! Video source capability: open, read next frame, seek to start, release.
//!
//! Two adapters sit behind the [`VideoSource`] trait: a camera device
//! ([`CameraSource`]) and a video file decoded by an ffmpeg child process
//! ([`FileSource`]). A numeric source identifier selects a camera index,
//! anything else is treated as a file path.

mod camera;
mod file;

pub use camera::CameraSource;
pub use file::FileSource;

use crate::frame::Frame;

/// Errors from opening or reading a video source.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("cannot open source '{source_id}': {reason}")]
    OpenFailed { source_id: String, reason: String },

    #[error("cannot probe '{source_id}': {reason}")]
    ProbeFailed { source_id: String, reason: String },

    #[error("source is not seekable")]
    NotSeekable,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read-only capability over a frame-producing device or file.
pub trait VideoSource: Send + std::fmt::Debug {
    /// Read the next frame. `Ok(None)` means end of stream and is never an
    /// error: for files the caller rewinds, for live devices it stops.
    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError>;

    /// Seek back to the first frame. Live devices return
    /// [`SourceError::NotSeekable`].
    fn rewind(&mut self) -> Result<(), SourceError>;

    /// Release the underlying handle. Idempotent; also invoked on drop by
    /// the concrete adapters.
    fn release(&mut self);

    /// Whether this is a live device (true) or a seekable file (false).
    fn is_live(&self) -> bool;

    /// Native frame dimensions as opened.
    fn dimensions(&self) -> (u32, u32);
}

/// Open a source by identifier: an all-digit string is a camera device
/// index, anything else a video file path.
pub fn open_source(source_id: &str) -> Result<Box<dyn VideoSource>, SourceError> {
    if is_device_index(source_id) {
        let index = source_id
            .parse::<u32>()
            .map_err(|e| SourceError::OpenFailed {
                source_id: source_id.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(CameraSource::open(index)?))
    } else {
        Ok(Box::new(FileSource::open(source_id)?))
    }
}

fn is_device_index(source_id: &str) -> bool {
    !source_id.is_empty() && source_id.bytes().all(|b| b.is_ascii_digit())
}
