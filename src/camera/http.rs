//! HTTP lobby camera source.
//!
//! Consumes the two stream shapes cheap lobby IP cameras expose:
//! - multipart MJPEG (`Content-Type: multipart/...`), parsed by scanning
//!   for JPEG start/end markers
//! - a plain JPEG snapshot endpoint, fetched once per frame
//!
//! Frames are decoded to RGB in memory. `target_fps` bounds how fast
//! `current_frame` consumes the stream; frames arriving faster are
//! discarded so a slow consumer does not read an ever-older backlog.

use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::time::{Duration, Instant};

use crate::frame::VideoFrame;

use super::VideoSource;

const MAX_JPEG_BYTES: usize = 5 * 1024 * 1024;

const JPEG_SOI: [u8; 2] = [0xFF, 0xD8];
const JPEG_EOI: [u8; 2] = [0xFF, 0xD9];

/// Configuration for an HTTP camera.
#[derive(Clone, Debug)]
pub struct HttpCameraConfig {
    /// Stream or snapshot URL (http/https).
    pub url: String,
    /// Upper bound on frames consumed per second.
    pub target_fps: u32,
}

/// HTTP MJPEG/snapshot video source.
pub struct HttpCamera {
    config: HttpCameraConfig,
    stream: Option<HttpStream>,
    frame_count: u64,
    last_frame_at: Option<Instant>,
}

enum HttpStream {
    Mjpeg(MjpegStream),
    Snapshot,
}

impl HttpCamera {
    pub fn new(config: HttpCameraConfig) -> Self {
        Self {
            config,
            stream: None,
            frame_count: 0,
            last_frame_at: None,
        }
    }

    pub fn frames_captured(&self) -> u64 {
        self.frame_count
    }

    fn min_interval(&self) -> Duration {
        if self.config.target_fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis((1000 / self.config.target_fps).max(1) as u64)
        }
    }
}

impl VideoSource for HttpCamera {
    fn start(&mut self) -> Result<()> {
        if self.stream.is_some() {
            return Ok(());
        }
        let response = ureq::get(&self.config.url)
            .call()
            .with_context(|| format!("connect to camera at {}", self.config.url))?;
        let content_type = response.header("Content-Type").unwrap_or("").to_lowercase();
        self.stream = Some(if content_type.contains("multipart") {
            HttpStream::Mjpeg(MjpegStream::new(response.into_reader()))
        } else {
            HttpStream::Snapshot
        });
        log::info!("camera feed open: {}", self.config.url);
        Ok(())
    }

    fn stop(&mut self) {
        if self.stream.take().is_some() {
            log::info!("camera feed closed: {}", self.config.url);
        }
        self.last_frame_at = None;
    }

    fn is_active(&self) -> bool {
        self.stream.is_some()
    }

    fn current_frame(&mut self) -> Result<VideoFrame> {
        let min_interval = self.min_interval();
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| anyhow!("camera feed not open; call start() first"))?;
        loop {
            let jpeg = match stream {
                HttpStream::Mjpeg(stream) => stream.read_next_jpeg()?,
                HttpStream::Snapshot => fetch_snapshot(&self.config.url)?,
            };

            let now = Instant::now();
            if let Some(last) = self.last_frame_at {
                if now.duration_since(last) < min_interval {
                    continue;
                }
            }
            self.last_frame_at = Some(now);
            self.frame_count += 1;
            return decode_jpeg(&jpeg);
        }
    }

    fn descriptor(&self) -> String {
        self.config.url.clone()
    }
}

struct MjpegStream {
    reader: Box<dyn Read + Send>,
    buffer: Vec<u8>,
}

impl MjpegStream {
    fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(64 * 1024),
        }
    }

    fn read_next_jpeg(&mut self) -> Result<Vec<u8>> {
        let mut chunk = vec![0u8; 8192];
        loop {
            if let Some((start, end)) = jpeg_bounds(&self.buffer) {
                let frame = self.buffer[start..end].to_vec();
                self.buffer.drain(..end);
                return Ok(frame);
            }

            let read = self.reader.read(&mut chunk).context("read mjpeg chunk")?;
            if read == 0 {
                return Err(anyhow!("mjpeg stream ended"));
            }
            self.buffer.extend_from_slice(&chunk[..read]);

            // A buffer with no complete frame this large is garbage; keep
            // only the tail so marker scanning stays bounded.
            if self.buffer.len() > MAX_JPEG_BYTES {
                let drain_len = self.buffer.len() - JPEG_SOI.len();
                self.buffer.drain(..drain_len);
            }
        }
    }
}

fn jpeg_bounds(buffer: &[u8]) -> Option<(usize, usize)> {
    let start = buffer.windows(2).position(|w| w == JPEG_SOI)?;
    let end = buffer[start + 2..]
        .windows(2)
        .position(|w| w == JPEG_EOI)
        .map(|p| start + 2 + p + 2)?;
    Some((start, end))
}

fn fetch_snapshot(url: &str) -> Result<Vec<u8>> {
    let response = ureq::get(url)
        .call()
        .with_context(|| format!("fetch snapshot from {}", url))?;
    let mut bytes = Vec::new();
    response
        .into_reader()
        .take(MAX_JPEG_BYTES as u64)
        .read_to_end(&mut bytes)
        .context("read snapshot body")?;
    if bytes.is_empty() {
        return Err(anyhow!("empty snapshot from {}", url));
    }
    Ok(bytes)
}

fn decode_jpeg(bytes: &[u8]) -> Result<VideoFrame> {
    let decoded = image::load_from_memory(bytes).context("decode camera jpeg")?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    VideoFrame::new(rgb.into_raw(), width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jpeg_bounds_finds_a_complete_frame() {
        let mut buf = vec![0x00, 0x01];
        buf.extend_from_slice(&JPEG_SOI);
        buf.extend_from_slice(b"frame-data");
        buf.extend_from_slice(&JPEG_EOI);
        buf.extend_from_slice(&[0x00]);

        let (start, end) = jpeg_bounds(&buf).unwrap();
        assert_eq!(start, 2);
        assert_eq!(&buf[start..start + 2], &JPEG_SOI);
        assert_eq!(&buf[end - 2..end], &JPEG_EOI);
    }

    #[test]
    fn jpeg_bounds_waits_for_the_end_marker() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&JPEG_SOI);
        buf.extend_from_slice(b"partial");
        assert!(jpeg_bounds(&buf).is_none());
        assert!(jpeg_bounds(b"no markers at all").is_none());
    }

    #[test]
    fn current_frame_requires_start() {
        let mut cam = HttpCamera::new(HttpCameraConfig {
            url: "http://127.0.0.1:1/stream".into(),
            target_fps: 10,
        });
        assert!(!cam.is_active());
        assert!(cam.current_frame().is_err());
        cam.stop(); // no-op when never started
    }
}
