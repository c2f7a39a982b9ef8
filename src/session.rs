//! Scan session controller.
//!
//! A session owns the decode loop for as long as the scanner is open. On a
//! successful decode it captures a still from the same source, stops the
//! loop, and emits a single [`ScanResult`]; the session hands that result
//! to the reconciliation workflow and returns to idle.
//!
//! Ordering within one cycle is fixed: decode success happens before the
//! capture attempt, capture before the engine stop request, the stop
//! request before the emission. If the capture fails the scan is treated as
//! not having occurred and decoding resumes.
//!
//! Closing (or dropping) a session always releases the camera. A session
//! can never leak an active camera handle, whether it emitted a scan,
//! timed out, or was abandoned mid-scan.

use anyhow::Result;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::camera::{Camera, VideoSource};
use crate::decode::CodeDecoder;
use crate::engine::{DecodeCallback, DecodeErrorCallback, DecoderEngine, EngineHandle};
use crate::frame::capture_still;
use crate::{session_id, ScanResult, SessionState};

/// Scan session tuning.
#[derive(Clone, Copy, Debug)]
pub struct SessionConfig {
    /// Cadence of the decode loop.
    pub sample_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_interval: Duration::from_millis(100),
        }
    }
}

/// One open scanner: a running decode loop plus the single-emission guard.
pub struct ScanSession<S: VideoSource + 'static> {
    id: String,
    handle: Option<EngineHandle<S>>,
    rx: Receiver<ScanResult>,
    state: Arc<Mutex<SessionState>>,
    emitted: bool,
}

impl<S: VideoSource + 'static> std::fmt::Debug for ScanSession<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanSession")
            .field("id", &self.id)
            .field("emitted", &self.emitted)
            .finish_non_exhaustive()
    }
}

fn set_state(state: &Arc<Mutex<SessionState>>, next: SessionState) {
    if let Ok(mut guard) = state.lock() {
        *guard = next;
    }
}

impl<S: VideoSource + 'static> ScanSession<S> {
    /// Open the scanner: bind the camera and start decoding.
    ///
    /// Fails with [`crate::ResourceBusy`] when the camera is already bound
    /// to another session; that failure is surfaced to the operator and is
    /// not retried here.
    pub fn open(
        camera: &Camera<S>,
        backend: Box<dyn CodeDecoder>,
        config: SessionConfig,
    ) -> Result<Self> {
        let id = session_id();
        let state = Arc::new(Mutex::new(SessionState::Scanning));
        let (tx, rx) = mpsc::channel();

        let capture_camera = camera.clone();
        let capture_state = Arc::clone(&state);
        let capture_id = id.clone();
        let on_decode: DecodeCallback = Box::new(move |code, ctl| {
            set_state(&capture_state, SessionState::Captured);
            let captured = capture_camera
                .with_source(|source| capture_still(source))
                .and_then(|result| result);
            match captured {
                Ok(image_png) => {
                    // Stop the loop before the result leaves the session.
                    ctl.request_stop();
                    set_state(&capture_state, SessionState::Idle);
                    log::info!(
                        "[scan {}] decoded code and captured still ({} bytes)",
                        capture_id,
                        image_png.len()
                    );
                    let _ = tx.send(ScanResult { code, image_png });
                }
                Err(err) => {
                    log::warn!(
                        "[scan {}] still capture failed, resuming scan: {}",
                        capture_id,
                        err
                    );
                    set_state(&capture_state, SessionState::Scanning);
                    ctl.resume();
                }
            }
        });

        let miss_id = id.clone();
        let on_decode_error: DecodeErrorCallback = Box::new(move |err| {
            log::debug!("[scan {}] {}", miss_id, err);
        });

        let handle = DecoderEngine::new(camera.clone(), backend, on_decode, on_decode_error)
            .with_sample_interval(config.sample_interval)
            .start()?;

        let descriptor = camera
            .with_source(|source| source.descriptor())
            .unwrap_or_else(|_| "<camera>".to_string());
        log::info!("[scan {}] session open on {}", id, descriptor);

        Ok(Self {
            id,
            handle: Some(handle),
            rx,
            state,
            emitted: false,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
            .lock()
            .map(|guard| *guard)
            .unwrap_or(SessionState::Aborted)
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Block up to `timeout` for the session's scan result.
    ///
    /// At most one result is ever returned per session; the camera is
    /// stopped before this returns it. `None` means no scan yet (or the
    /// session already emitted and is closed).
    pub fn wait_for_scan(&mut self, timeout: Duration) -> Option<ScanResult> {
        if self.emitted {
            return None;
        }
        match self.rx.recv_timeout(timeout) {
            Ok(scan) => {
                self.emitted = true;
                self.close();
                Some(scan)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                // Decode loop died without emitting; fold the session.
                self.close();
                None
            }
        }
    }

    /// Stop decoding and release the camera. Idempotent; called on drop.
    pub fn close(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.stop();
            set_state(&self.state, SessionState::Idle);
            log::info!("[scan {}] session closed", self.id);
        }
    }
}

impl<S: VideoSource + 'static> Drop for ScanSession<S> {
    fn drop(&mut self) {
        self.close();
    }
}
