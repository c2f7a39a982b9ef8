//! Raw frames and still-image capture.
//!
//! A `VideoFrame` is one RGB sample of the live feed. `capture_still`
//! rasterizes the source's current frame into an encoded PNG at the source's
//! native resolution, for attachment to a scan result.
//!
//! Capturing is side-effect-free with respect to the decode loop: it reads
//! the current frame and nothing else. When the source has no active frame
//! (not yet started, or already stopped) capture fails with
//! [`CaptureFailed`] and the caller must not advance the session.

use anyhow::{Context, Result};
use std::fmt;
use std::io::Cursor;

use crate::camera::VideoSource;

/// One RGB8 frame sampled from a video source.
#[derive(Clone, Debug)]
pub struct VideoFrame {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl VideoFrame {
    /// Wrap a raw RGB8 buffer. The buffer length must match the dimensions.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize * 3;
        if pixels.len() != expected {
            return Err(anyhow::anyhow!(
                "frame buffer is {} bytes; {}x{} rgb needs {}",
                pixels.len(),
                width,
                height,
                expected
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }
}

/// The video source had no active frame at the capture instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureFailed;

impl fmt::Display for CaptureFailed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "no active frame available to capture")
    }
}

impl std::error::Error for CaptureFailed {}

/// Rasterize the source's current frame into a PNG buffer.
///
/// Fails with [`CaptureFailed`] when the source cannot produce a frame.
pub fn capture_still<S: VideoSource + ?Sized>(source: &mut S) -> Result<Vec<u8>> {
    if !source.is_active() {
        return Err(CaptureFailed.into());
    }
    let frame = match source.current_frame() {
        Ok(frame) => frame,
        Err(err) => {
            log::debug!("frame unavailable at capture instant: {}", err);
            return Err(CaptureFailed.into());
        }
    };
    encode_png(frame)
}

fn encode_png(frame: VideoFrame) -> Result<Vec<u8>> {
    let (width, height) = (frame.width(), frame.height());
    let rgb = image::RgbImage::from_raw(width, height, frame.into_pixels())
        .context("frame buffer did not match its dimensions")?;
    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgb8(rgb)
        .write_to(&mut out, image::ImageFormat::Png)
        .context("encode still image as png")?;
    Ok(out.into_inner())
}
