//! The sampling decode loop.
//!
//! `DecoderEngine::start` binds the camera exclusively, starts the device,
//! and spawns a recurring sampling task: every `sample_interval` it takes
//! the source's current frame and runs the decode backend over it. One
//! sample never blocks longer than one frame's worth of decode work.
//!
//! Decoding is level-triggered: the first successful decode latches the
//! engine and invokes `on_decode` exactly once; no further decode is
//! attempted until the caller either stops the engine or re-arms it with
//! [`EngineCtl::resume`]. The sampling loop itself keeps running until
//! stopped; stopping after a decode is the caller's responsibility.
//!
//! `on_decode_error` fires for recoverable per-frame conditions (no code in
//! frame, frame unavailable). It never stops the loop; it is a diagnostic
//! signal only.

use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::camera::{Camera, CameraLease, VideoSource};
use crate::decode::CodeDecoder;

const DEFAULT_SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Invoked once per distinct successful decode. Receives the engine control
/// so the callback can stop the loop or re-arm it.
pub type DecodeCallback = Box<dyn FnMut(String, &EngineCtl) + Send>;

/// Invoked for recoverable per-frame decode failures. Diagnostic only.
pub type DecodeErrorCallback = Box<dyn FnMut(&str) + Send>;

/// Shared control plane between the engine loop and its caller.
#[derive(Clone)]
pub struct EngineCtl {
    stop: Arc<AtomicBool>,
    latched: Arc<AtomicBool>,
}

impl EngineCtl {
    fn new() -> Self {
        Self {
            stop: Arc::new(AtomicBool::new(false)),
            latched: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Ask the loop to exit. The camera is released by
    /// [`EngineHandle::stop`], which also joins the loop.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Re-arm decoding after a latched decode whose scan was not taken
    /// (e.g. the still capture failed).
    pub fn resume(&self) {
        self.latched.store(false, Ordering::Release);
    }

    pub fn is_latched(&self) -> bool {
        self.latched.load(Ordering::Acquire)
    }

    pub(crate) fn latch(&self) {
        self.latched.store(true, Ordering::Release);
    }
}

/// Decode loop configuration: camera, backend, and the two callbacks.
pub struct DecoderEngine<S: VideoSource + 'static> {
    camera: Camera<S>,
    backend: Box<dyn CodeDecoder>,
    on_decode: DecodeCallback,
    on_decode_error: DecodeErrorCallback,
    sample_interval: Duration,
}

impl<S: VideoSource + 'static> DecoderEngine<S> {
    pub fn new(
        camera: Camera<S>,
        backend: Box<dyn CodeDecoder>,
        on_decode: DecodeCallback,
        on_decode_error: DecodeErrorCallback,
    ) -> Self {
        Self {
            camera,
            backend,
            on_decode,
            on_decode_error,
            sample_interval: DEFAULT_SAMPLE_INTERVAL,
        }
    }

    pub fn with_sample_interval(mut self, interval: Duration) -> Self {
        self.sample_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Bind the camera and start sampling.
    ///
    /// Fails with [`crate::ResourceBusy`] when another engine is already
    /// bound to the camera. On any failure the binding is released.
    pub fn start(self) -> Result<EngineHandle<S>> {
        let lease = self.camera.acquire()?;
        // Lease drop stops the source again if device start fails.
        self.camera.with_source(|source| source.start())??;

        let ctl = EngineCtl::new();
        let loop_ctl = ctl.clone();
        let camera = self.camera.clone();
        let backend = self.backend;
        let on_decode = self.on_decode;
        let on_decode_error = self.on_decode_error;
        let interval = self.sample_interval;
        let thread = thread::Builder::new()
            .name("decode-loop".to_string())
            .spawn(move || run_loop(camera, backend, on_decode, on_decode_error, loop_ctl, interval))
            .map_err(anyhow::Error::from)?;

        Ok(EngineHandle {
            ctl,
            thread: Some(thread),
            lease: Some(lease),
        })
    }
}

/// Running decode loop. `stop` (or drop) joins the loop and releases the
/// camera deterministically.
pub struct EngineHandle<S: VideoSource> {
    ctl: EngineCtl,
    thread: Option<thread::JoinHandle<()>>,
    lease: Option<CameraLease<S>>,
}

impl<S: VideoSource> EngineHandle<S> {
    pub fn ctl(&self) -> &EngineCtl {
        &self.ctl
    }

    /// Stop the loop and release the camera. Idempotent: stopping an
    /// already-stopped engine has no observable effect.
    pub fn stop(&mut self) {
        self.ctl.request_stop();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("decode loop panicked");
            }
        }
        // Dropping the lease stops the video source and frees the binding.
        self.lease.take();
    }

    pub fn is_stopped(&self) -> bool {
        self.thread.is_none()
    }
}

impl<S: VideoSource> std::fmt::Debug for EngineHandle<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("stopped", &self.thread.is_none())
            .finish_non_exhaustive()
    }
}

impl<S: VideoSource> Drop for EngineHandle<S> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_loop<S: VideoSource>(
    camera: Camera<S>,
    mut backend: Box<dyn CodeDecoder>,
    mut on_decode: DecodeCallback,
    mut on_decode_error: DecodeErrorCallback,
    ctl: EngineCtl,
    interval: Duration,
) {
    log::debug!("decode loop running (backend={})", backend.name());
    while !ctl.stop_requested() {
        let tick = Instant::now();

        if !ctl.is_latched() {
            match camera.with_source(|source| source.current_frame()) {
                Ok(Ok(frame)) => {
                    match backend.decode(frame.pixels(), frame.width(), frame.height()) {
                        Ok(Some(code)) => {
                            ctl.latch();
                            log::debug!("decoded code ({} bytes)", code.len());
                            on_decode(code, &ctl);
                        }
                        Ok(None) => on_decode_error("no code found in frame"),
                        Err(err) => on_decode_error(&format!("decoder failed: {}", err)),
                    }
                }
                Ok(Err(err)) => on_decode_error(&format!("frame unavailable: {}", err)),
                Err(err) => {
                    log::error!("decode loop lost the camera: {}", err);
                    break;
                }
            }
        }

        let elapsed = tick.elapsed();
        if elapsed < interval {
            thread::sleep(interval - elapsed);
        }
    }
    log::debug!("decode loop exited");
}
