//! Video source boundary.
//!
//! This module provides the camera side of the scan pipeline:
//! - `VideoSource`: the platform capability (start/stop, current frame)
//! - `Camera` / `CameraLease`: exclusive binding of one source to one
//!   consumer at a time
//! - Sources: HTTP lobby cameras (MJPEG or JPEG snapshot) and a synthetic
//!   source for tests and demos
//!
//! The camera layer is responsible for:
//! - Producing `VideoFrame` instances on demand
//! - Enforcing single-binding: acquiring an already-bound camera fails with
//!   [`ResourceBusy`]
//! - Releasing the underlying device deterministically when a lease drops
//!
//! The camera layer MUST NOT decode codes or talk to the delivery store;
//! those concerns live in `decode` and `store`.

use anyhow::{anyhow, Result};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::frame::VideoFrame;

pub mod http;
pub mod synthetic;

pub use http::{HttpCamera, HttpCameraConfig};
pub use synthetic::{Feed, FeedHandle, SyntheticCamera};

/// Live video source capability.
///
/// Implementations are provided platform services; the pipeline consumes
/// them and never reimplements device access.
pub trait VideoSource: Send {
    /// Begin producing frames. Idempotent.
    fn start(&mut self) -> Result<()>;

    /// Stop producing frames and release the device. Stopping a source that
    /// was never started is a no-op.
    fn stop(&mut self);

    /// Whether the source currently has an active feed.
    fn is_active(&self) -> bool;

    /// The source's current frame. Fails when inactive or when the feed has
    /// no frame to give.
    fn current_frame(&mut self) -> Result<VideoFrame>;

    /// Human-readable identity for log lines.
    fn descriptor(&self) -> String;
}

/// The camera is already bound to an active consumer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceBusy;

impl fmt::Display for ResourceBusy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "camera resource is already bound")
    }
}

impl std::error::Error for ResourceBusy {}

struct CameraShared<S> {
    source: Mutex<S>,
    bound: AtomicBool,
    acquisitions: AtomicU64,
    releases: AtomicU64,
}

/// Shared handle to a video source with exclusive binding.
///
/// Cloning the handle is cheap; only `acquire` grants the right to drive
/// the source, and at most one [`CameraLease`] exists at a time.
pub struct Camera<S: VideoSource> {
    shared: Arc<CameraShared<S>>,
}

impl<S: VideoSource> Clone for Camera<S> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<S: VideoSource> Camera<S> {
    pub fn new(source: S) -> Self {
        Self {
            shared: Arc::new(CameraShared {
                source: Mutex::new(source),
                bound: AtomicBool::new(false),
                acquisitions: AtomicU64::new(0),
                releases: AtomicU64::new(0),
            }),
        }
    }

    /// Bind the camera exclusively. Fails with [`ResourceBusy`] while a
    /// previous lease is still alive.
    pub fn acquire(&self) -> Result<CameraLease<S>> {
        if self
            .shared
            .bound
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ResourceBusy.into());
        }
        self.shared.acquisitions.fetch_add(1, Ordering::AcqRel);
        Ok(CameraLease {
            camera: self.clone(),
            released: false,
        })
    }

    pub fn is_bound(&self) -> bool {
        self.shared.bound.load(Ordering::Acquire)
    }

    /// Lifetime acquire count. With [`Camera::releases`], lets tests verify
    /// that every binding was released.
    pub fn acquisitions(&self) -> u64 {
        self.shared.acquisitions.load(Ordering::Acquire)
    }

    /// Lifetime release count.
    pub fn releases(&self) -> u64 {
        self.shared.releases.load(Ordering::Acquire)
    }

    /// Transient access to the underlying source. Callers must hold (or act
    /// on behalf of) the active lease.
    pub fn with_source<R>(&self, f: impl FnOnce(&mut S) -> R) -> Result<R> {
        let mut guard = self
            .shared
            .source
            .lock()
            .map_err(|_| anyhow!("camera source lock poisoned"))?;
        Ok(f(&mut guard))
    }
}

/// Exclusive binding to a camera. Dropping the lease stops the source and
/// frees the binding; there is no path that leaks an active camera handle.
pub struct CameraLease<S: VideoSource> {
    camera: Camera<S>,
    released: bool,
}

impl<S: VideoSource> CameraLease<S> {
    /// The camera this lease binds.
    pub fn camera(&self) -> &Camera<S> {
        &self.camera
    }

    /// Release explicitly. Equivalent to dropping the lease.
    pub fn release(self) {}
}

impl<S: VideoSource> std::fmt::Debug for CameraLease<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraLease")
            .field("released", &self.released)
            .finish_non_exhaustive()
    }
}

impl<S: VideoSource> Drop for CameraLease<S> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Ok(mut guard) = self.camera.shared.source.lock() {
            guard.stop();
        }
        self.camera.shared.bound.store(false, Ordering::Release);
        self.camera.shared.releases.fetch_add(1, Ordering::AcqRel);
    }
}

// ----------------------------------------------------------------------------
// Lobby camera: scheme-dispatched source
// ----------------------------------------------------------------------------

/// Concrete camera for a concierge station, chosen by URL scheme.
///
/// - `http://` / `https://`: lobby IP camera (MJPEG stream or JPEG snapshot)
/// - `stub://`: synthetic frames; `?code=PAYLOAD&every=N` makes every Nth
///   frame carry a decodable payload, for demos
pub enum LobbyCamera {
    Http(HttpCamera),
    Synthetic(SyntheticCamera),
}

impl LobbyCamera {
    pub fn from_url(raw: &str, target_fps: u32) -> Result<Self> {
        let url = url::Url::parse(raw).map_err(|e| anyhow!("invalid camera url {}: {}", raw, e))?;
        match url.scheme() {
            "http" | "https" => Ok(LobbyCamera::Http(HttpCamera::new(HttpCameraConfig {
                url: raw.to_string(),
                target_fps,
            }))),
            "stub" => {
                let (source, feed) = SyntheticCamera::new(640, 480);
                let code = url
                    .query_pairs()
                    .find(|(k, _)| k == "code")
                    .map(|(_, v)| v.to_string());
                if let Some(payload) = code {
                    let every = url
                        .query_pairs()
                        .find(|(k, _)| k == "every")
                        .and_then(|(_, v)| v.parse::<u64>().ok())
                        .unwrap_or(50);
                    feed.set(Feed::Cycle {
                        payload,
                        period: every.max(1),
                    });
                }
                Ok(LobbyCamera::Synthetic(source))
            }
            other => Err(anyhow!(
                "unsupported camera scheme '{}'; expected http(s) or stub",
                other
            )),
        }
    }
}

impl VideoSource for LobbyCamera {
    fn start(&mut self) -> Result<()> {
        match self {
            LobbyCamera::Http(source) => source.start(),
            LobbyCamera::Synthetic(source) => source.start(),
        }
    }

    fn stop(&mut self) {
        match self {
            LobbyCamera::Http(source) => source.stop(),
            LobbyCamera::Synthetic(source) => source.stop(),
        }
    }

    fn is_active(&self) -> bool {
        match self {
            LobbyCamera::Http(source) => source.is_active(),
            LobbyCamera::Synthetic(source) => source.is_active(),
        }
    }

    fn current_frame(&mut self) -> Result<VideoFrame> {
        match self {
            LobbyCamera::Http(source) => source.current_frame(),
            LobbyCamera::Synthetic(source) => source.current_frame(),
        }
    }

    fn descriptor(&self) -> String {
        match self {
            LobbyCamera::Http(source) => source.descriptor(),
            LobbyCamera::Synthetic(source) => source.descriptor(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_is_exclusive_until_release() {
        let (source, _feed) = SyntheticCamera::new(8, 8);
        let camera = Camera::new(source);

        let lease = camera.acquire().unwrap();
        let busy = camera.acquire().unwrap_err();
        assert!(busy.downcast_ref::<ResourceBusy>().is_some());

        // The original lease keeps working.
        camera.with_source(|s| s.start()).unwrap().unwrap();
        assert!(camera.with_source(|s| s.is_active()).unwrap());

        drop(lease);
        assert!(!camera.is_bound());
        assert!(camera.acquire().is_ok());
    }

    #[test]
    fn lease_drop_stops_the_source_and_balances_counters() {
        let (source, _feed) = SyntheticCamera::new(8, 8);
        let camera = Camera::new(source);

        {
            let _lease = camera.acquire().unwrap();
            camera.with_source(|s| s.start()).unwrap().unwrap();
            assert!(camera.with_source(|s| s.is_active()).unwrap());
        }

        assert!(!camera.with_source(|s| s.is_active()).unwrap());
        assert_eq!(camera.acquisitions(), 1);
        assert_eq!(camera.releases(), 1);
    }

    #[test]
    fn lobby_camera_rejects_unknown_schemes() {
        assert!(LobbyCamera::from_url("rtsp://cam", 10).is_err());
        assert!(LobbyCamera::from_url("not a url", 10).is_err());
        assert!(LobbyCamera::from_url("stub://lobby", 10).is_ok());
    }
}
