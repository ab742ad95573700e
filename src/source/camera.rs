//! Camera device source backed by nokhwa.

use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;

use super::{SourceError, VideoSource};
use crate::frame::Frame;

const REQUESTED_WIDTH: u32 = 1280;
const REQUESTED_HEIGHT: u32 = 720;
const REQUESTED_FPS: u32 = 30;

/// Consecutive decode failures tolerated before the device is treated as
/// exhausted.
const MAX_DECODE_RETRIES: u32 = 5;

pub struct CameraSource {
    camera: Option<Camera>,
    width: u32,
    height: u32,
}

impl std::fmt::Debug for CameraSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSource")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

impl CameraSource {
    /// Open the camera at `index` and start its stream.
    pub fn open(index: u32) -> Result<Self, SourceError> {
        let mut camera = open_camera_with_fallback(index)?;

        camera.open_stream().map_err(|e| SourceError::OpenFailed {
            source_id: index.to_string(),
            reason: e.to_string(),
        })?;

        let res = camera.resolution();
        log::info!(
            "camera {} open at {}x{} ({} fps native)",
            index,
            res.width(),
            res.height(),
            camera.frame_rate()
        );

        Ok(CameraSource {
            width: res.width(),
            height: res.height(),
            camera: Some(camera),
        })
    }
}

impl VideoSource for CameraSource {
    fn read_frame(&mut self) -> Result<Option<Frame>, SourceError> {
        let Some(camera) = self.camera.as_mut() else {
            return Ok(None);
        };

        // A grab or decode failure on a live device means the device is
        // gone or unusable; after a few attempts report end of stream so
        // the caller stops cleanly.
        for attempt in 0..MAX_DECODE_RETRIES {
            let raw = match camera.frame() {
                Ok(raw) => raw,
                Err(e) => {
                    log::warn!("camera read failed: {}", e);
                    return Ok(None);
                }
            };

            match raw.decode_image::<RgbFormat>() {
                Ok(img) => {
                    let (width, height) = (img.width(), img.height());
                    return Ok(Some(Frame {
                        data: img.into_raw(),
                        width,
                        height,
                    }));
                }
                Err(e) => {
                    log::debug!("frame decode failed (attempt {}): {}", attempt + 1, e);
                }
            }
        }

        log::warn!("camera produced {} undecodable frames", MAX_DECODE_RETRIES);
        Ok(None)
    }

    fn rewind(&mut self) -> Result<(), SourceError> {
        Err(SourceError::NotSeekable)
    }

    fn release(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            if let Err(e) = camera.stop_stream() {
                log::debug!("stop_stream: {}", e);
            }
        }
    }

    fn is_live(&self) -> bool {
        true
    }

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}

/// Try format strategies in order of preference: NV12 and MJPEG at the
/// requested size, then whatever highest resolution the device offers.
fn open_camera_with_fallback(index: u32) -> Result<Camera, SourceError> {
    let camera_index = CameraIndex::Index(index);
    let requested_res = Resolution::new(REQUESTED_WIDTH, REQUESTED_HEIGHT);
    let format_attempts = [
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            requested_res,
            FrameFormat::NV12,
            REQUESTED_FPS,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(CameraFormat::new(
            requested_res,
            FrameFormat::MJPEG,
            REQUESTED_FPS,
        ))),
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::AbsoluteHighestResolution),
    ];

    let mut last_error = None;
    for requested in format_attempts {
        match Camera::new(camera_index.clone(), requested) {
            Ok(cam) => return Ok(cam),
            Err(e) => last_error = Some(e),
        }
    }

    let reason = last_error
        .map(|e| e.to_string())
        .unwrap_or_else(|| "no usable format".to_string());
    Err(SourceError::OpenFailed {
        source_id: index.to_string(),
        reason,
    })
}
