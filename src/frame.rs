//! Frame transformation utilities: aspect-preserving downscale and JPEG
//! encoding at a runtime-selected quality.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{ExtendedColorType, RgbImage};

/// A decoded video frame in tightly packed RGB24.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Raw pixel data, `width * height * 3` bytes.
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl Frame {
    /// Bytes per pixel (RGB24).
    pub const BYTES_PER_PIXEL: usize = 3;

    /// Expected buffer length for the frame dimensions.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * Self::BYTES_PER_PIXEL
    }
}

/// Errors from JPEG encoding.
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("JPEG encoding failed: {0}")]
    Jpeg(#[from] image::ImageError),

    #[error("frame buffer length {actual} does not match {width}x{height} RGB24")]
    MalformedFrame {
        actual: usize,
        width: u32,
        height: u32,
    },
}

/// Downscale the frame to `max_width` if it is wider, preserving aspect
/// ratio. Frames at or below `max_width` pass through unchanged.
pub fn maybe_resize(frame: Frame, max_width: u32) -> Frame {
    if frame.width <= max_width {
        return frame;
    }

    let scale = f64::from(max_width) / f64::from(frame.width);
    let new_height = ((f64::from(frame.height) * scale).round() as u32).max(1);

    // Sources produce tightly packed RGB24; a mismatched buffer cannot be
    // reinterpreted, so it is passed through for the encoder to reject.
    let (width, height) = (frame.width, frame.height);
    let Some(img) = RgbImage::from_raw(width, height, frame.data) else {
        log::warn!("skipping resize of malformed {}x{} frame", width, height);
        return Frame {
            data: Vec::new(),
            width,
            height,
        };
    };

    let resized = imageops::resize(&img, max_width, new_height, FilterType::Triangle);
    Frame {
        data: resized.into_raw(),
        width: max_width,
        height: new_height,
    }
}

/// Encode the frame as JPEG at the given quality (0-100).
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, EncodeError> {
    if frame.data.len() != frame.expected_len() {
        return Err(EncodeError::MalformedFrame {
            actual: frame.data.len(),
            width: frame.width,
            height: frame.height,
        });
    }

    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    encoder.encode(
        &frame.data,
        frame.width,
        frame.height,
        ExtendedColorType::Rgb8,
    )?;
    Ok(buf)
}
