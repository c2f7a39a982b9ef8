//! Synthetic video source for tests and demos.
//!
//! Frames are generated in memory. A shared [`FeedHandle`] scripts what the
//! camera is "seeing": plain noise, a frame carrying a decodable payload, a
//! dark feed (no frame available), or a cycle that flashes a payload every
//! N frames. Scripting mid-run is allowed; tests use it to line a code up
//! with a capture failure.

use anyhow::{anyhow, Result};
use std::sync::{Arc, Mutex};

use crate::decode::stub_payload::embed_payload;
use crate::frame::VideoFrame;

use super::VideoSource;

/// What the synthetic camera is pointed at.
#[derive(Clone, Debug)]
pub enum Feed {
    /// Deterministic noise; never decodes.
    Noise,
    /// No frame available. Sampling and capture both fail.
    Dark,
    /// Frames carrying `payload`. With `frames: Some(n)`, only the next `n`
    /// frames carry it, after which the feed goes dark (`then_dark`) or
    /// back to noise.
    Code {
        payload: String,
        frames: Option<u32>,
        then_dark: bool,
    },
    /// Noise, with every `period`-th frame carrying `payload`.
    Cycle { payload: String, period: u64 },
}

/// Shared script control for a [`SyntheticCamera`].
#[derive(Clone)]
pub struct FeedHandle {
    feed: Arc<Mutex<Feed>>,
}

impl FeedHandle {
    pub fn set(&self, feed: Feed) {
        if let Ok(mut guard) = self.feed.lock() {
            *guard = feed;
        }
    }

    pub fn set_noise(&self) {
        self.set(Feed::Noise);
    }

    pub fn set_dark(&self) {
        self.set(Feed::Dark);
    }

    /// Every frame carries `payload` until the script changes.
    pub fn present_code(&self, payload: &str) {
        self.set(Feed::Code {
            payload: payload.to_string(),
            frames: None,
            then_dark: false,
        });
    }

    /// Exactly one frame carries `payload`, then the feed goes dark.
    pub fn present_code_once_then_dark(&self, payload: &str) {
        self.set(Feed::Code {
            payload: payload.to_string(),
            frames: Some(1),
            then_dark: true,
        });
    }
}

/// In-memory video source with scripted content.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    active: bool,
    frame_count: u64,
    feed: Arc<Mutex<Feed>>,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32) -> (Self, FeedHandle) {
        let feed = Arc::new(Mutex::new(Feed::Noise));
        let handle = FeedHandle {
            feed: Arc::clone(&feed),
        };
        (
            Self {
                width,
                height,
                active: false,
                frame_count: 0,
                feed,
            },
            handle,
        )
    }

    fn noise_pixels(&self) -> Vec<u8> {
        let len = self.width as usize * self.height as usize * 3;
        let mut pixels = vec![0u8; len];
        for (i, px) in pixels.iter_mut().enumerate() {
            *px = ((i as u64 + self.frame_count) % 256) as u8;
        }
        pixels
    }

    fn code_frame(&self, payload: &str) -> Result<VideoFrame> {
        let mut pixels = self.noise_pixels();
        embed_payload(&mut pixels, payload)?;
        VideoFrame::new(pixels, self.width, self.height)
    }

    fn noise_frame(&self) -> Result<VideoFrame> {
        VideoFrame::new(self.noise_pixels(), self.width, self.height)
    }
}

impl VideoSource for SyntheticCamera {
    fn start(&mut self) -> Result<()> {
        self.active = true;
        log::debug!("synthetic camera started ({}x{})", self.width, self.height);
        Ok(())
    }

    fn stop(&mut self) {
        // No-op when never started.
        self.active = false;
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn current_frame(&mut self) -> Result<VideoFrame> {
        if !self.active {
            return Err(anyhow!("synthetic camera is not active"));
        }
        self.frame_count += 1;

        let mut feed = self
            .feed
            .lock()
            .map_err(|_| anyhow!("synthetic feed lock poisoned"))?;
        match &mut *feed {
            Feed::Noise => self.noise_frame(),
            Feed::Dark => Err(anyhow!("synthetic feed is dark")),
            Feed::Code {
                payload,
                frames,
                then_dark,
            } => {
                let frame = self.code_frame(payload)?;
                if let Some(remaining) = frames {
                    *remaining = remaining.saturating_sub(1);
                    if *remaining == 0 {
                        let next = if *then_dark { Feed::Dark } else { Feed::Noise };
                        *feed = next;
                    }
                }
                Ok(frame)
            }
            Feed::Cycle { payload, period } => {
                if self.frame_count % *period == 0 {
                    self.code_frame(payload)
                } else {
                    self.noise_frame()
                }
            }
        }
    }

    fn descriptor(&self) -> String {
        format!("stub://synthetic ({}x{})", self.width, self.height)
    }
}
