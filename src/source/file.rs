//! Video file source decoded by an ffmpeg child process.
//!
//! The child emits tightly packed rawvideo RGB24 on stdout; pipe
//! backpressure throttles decoding to the read rate. Rewinding respawns the
//! decoder from position zero, which is how loop playback is implemented.

use std::io::{BufRead, BufReader, Read};
use std::path::PathBuf;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use serde::Deserialize;

use super::{SourceError, VideoSource};
use crate::frame::Frame;

#[derive(Debug)]
pub struct FileSource {
    path: PathBuf,
    width: u32,
    height: u32,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr_thread: Option<JoinHandle<()>>,
}

impl FileSource {
    /// Probe the file's dimensions and spawn the first decoder.
    pub fn open(path: &str) -> Result<Self, SourceError> {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(SourceError::OpenFailed {
                source_id: path.display().to_string(),
                reason: "no such file".to_string(),
            });
        }

        let (width, height) = probe_dimensions(&path)?;
        let mut source = FileSource {
            path,
            width,
            height,
            child: None,
            stdout: None,
            stderr_thread: None,
        };
        source.spawn_decoder()?;
        Ok(source)
    }

    fn spawn_decoder(&mut self) -> Result<(), SourceError> {
        let mut cmd = Command::new("ffmpeg");
        cmd.arg("-v")
            .arg("error")
            .arg("-i")
            .arg(&self.path)
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| SourceError::OpenFailed {
            source_id: self.path.display().to_string(),
            reason: if e.kind() == std::io::ErrorKind::NotFound {
                "ffmpeg not found on PATH".to_string()
            } else {
                e.to_string()
            },
        })?;

        self.stdout = child.stdout.take();

        // Drain stderr so the decoder never blocks on a full pipe.
        let stderr = child.stderr.take();
        self.stderr_thread = stderr.map(|stderr| {
            thread::spawn(move || {
                let reader = BufReader::new(stderr);
                for line in reader.lines().map_while(Result::ok) {
                    log::debug!("[ffmpeg] {}", line);
                }
            })
        });

        self.child = Some(child);
        Ok(())
    }

    fn frame_len(&self) -> usize {
        self.width as usize * self.height as usize * Frame::BYTES_PER_PIXEL
    }
}

impl VideoSource for FileSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let frame_len = self.frame_len();
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let mut data = vec![0u8; frame_len];
        match stdout.read_exact(&mut data) {
            Ok(()) => Ok(Some(Frame {
                data,
                width: self.width,
                height: self.height,
            })),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(SourceError::Io(e)),
        }
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        self.release();
        self.spawn_decoder()
    }

    fn release(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        if let Some(handle) = self.stderr_thread.take() {
            let _ = handle.join();
        }
    }

    fn is_live(&self) -> bool {
        false
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for FileSource {
    fn drop(&mut self) {
        self.release();
    }
}

#[derive(Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Deserialize)]
struct ProbeStream {
    width: u32,
    height: u32,
}

/// Ask ffprobe for the dimensions of the first video stream.
fn probe_dimensions(path: &std::path::Path) -> Result<(u32, u32), SourceError> {
    let source_id = path.display().to_string();
    let probe_err = |reason: String| SourceError::ProbeFailed {
        source_id: source_id.clone(),
        reason,
    };

    let output = Command::new("ffprobe")
        .args(["-v", "error", "-select_streams", "v:0"])
        .args(["-show_entries", "stream=width,height", "-of", "json"])
        .arg(path)
        .stdin(Stdio::null())
        .output()
        .map_err(|e| {
            probe_err(if e.kind() == std::io::ErrorKind::NotFound {
                "ffprobe not found on PATH".to_string()
            } else {
                e.to_string()
            })
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(probe_err(stderr.trim().to_string()));
    }

    let probe: ProbeOutput = serde_json::from_slice(&output.stdout)
        .map_err(|e| probe_err(format!("unexpected ffprobe output: {}", e)))?;

    let stream = probe
        .streams
        .first()
        .ok_or_else(|| probe_err("no video stream".to_string()))?;

    if stream.width == 0 || stream.height == 0 {
        return Err(probe_err(format!(
            "invalid dimensions {}x{}",
            stream.width, stream.height
        )));
    }

    Ok((stream.width, stream.height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_open_missing_file_fails() {
        let err = FileSource::open("/definitely/not/here.mp4").unwrap_err();
        assert!(matches!(err, SourceError::OpenFailed { .. }));
    }

    #[test]
    fn test_open_non_video_file_fails_probe() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"this is not a video").unwrap();

        let err = FileSource::open(tmp.path().to_str().unwrap()).unwrap_err();
        assert!(matches!(err, SourceError::ProbeFailed { .. }));
    }

    #[test]
    fn test_probe_output_parses_ffprobe_json() {
        let json = r#"{"programs": [], "streams": [{"width": 1280, "height": 720}]}"#;
        let probe: ProbeOutput = serde_json::from_str(json).unwrap();
        assert_eq!(probe.streams[0].width, 1280);
        assert_eq!(probe.streams[0].height, 720);
    }

    #[test]
    fn test_probe_output_tolerates_missing_streams() {
        let probe: ProbeOutput = serde_json::from_str("{}").unwrap();
        assert!(probe.streams.is_empty());
    }
}
