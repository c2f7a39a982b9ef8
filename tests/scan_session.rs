//! Scan session behavior against a scripted camera:
//! - exactly one emission per open/close cycle, camera stopped right after
//! - camera release on close and on drop (acquire/release stays balanced)
//! - capture failure resumes decoding instead of emitting
//! - a second session on a bound camera fails with ResourceBusy

use std::time::Duration;

use portaria_scan::camera::{Camera, SyntheticCamera};
use portaria_scan::VideoSource;
use portaria_scan::{ResourceBusy, ScanSession, SessionConfig, SessionState, StubDecoder};

const FAST: SessionConfig = SessionConfig {
    sample_interval: Duration::from_millis(2),
};

const WAIT: Duration = Duration::from_secs(2);

fn open_session(
    camera: &Camera<SyntheticCamera>,
) -> ScanSession<SyntheticCamera> {
    ScanSession::open(camera, Box::new(StubDecoder::new()), FAST).expect("open scan session")
}

#[test]
fn successful_scan_emits_once_and_stops_the_camera() {
    let (source, feed) = SyntheticCamera::new(32, 32);
    feed.present_code("PKG-100");
    let camera = Camera::new(source);

    let mut session = open_session(&camera);
    assert_eq!(session.state(), SessionState::Scanning);

    let scan = session.wait_for_scan(WAIT).expect("scan emitted");
    assert_eq!(scan.code, "PKG-100");
    // The emitted result always carries the captured still.
    assert_eq!(&scan.image_png[..8], b"\x89PNG\r\n\x1a\n");

    // Camera stopped immediately after emission, no leaked binding.
    assert!(!camera.is_bound());
    assert!(!camera.with_source(|s| s.is_active()).unwrap());
    assert_eq!(camera.acquisitions(), camera.releases());

    // One emission per open/close cycle, ever.
    assert!(session.wait_for_scan(Duration::from_millis(50)).is_none());
    assert_eq!(session.state(), SessionState::Idle);
}

#[test]
fn close_while_scanning_releases_the_camera() {
    let (source, _feed) = SyntheticCamera::new(32, 32);
    let camera = Camera::new(source);

    let mut session = open_session(&camera);
    assert!(camera.is_bound());

    session.close();
    assert!(!camera.is_bound());
    assert!(!camera.with_source(|s| s.is_active()).unwrap());
    assert_eq!(camera.acquisitions(), camera.releases());

    // Closing twice has no observable effect.
    session.close();
    assert_eq!(camera.acquisitions(), camera.releases());
}

#[test]
fn dropping_a_session_releases_the_camera() {
    let (source, _feed) = SyntheticCamera::new(32, 32);
    let camera = Camera::new(source);

    {
        let _session = open_session(&camera);
        assert!(camera.is_bound());
    }

    assert!(!camera.is_bound());
    assert_eq!(camera.acquisitions(), camera.releases());
}

#[test]
fn capture_failure_resumes_scanning_without_emitting() {
    let (source, feed) = SyntheticCamera::new(32, 32);
    // One decodable frame, then darkness: the decode succeeds but the
    // capture that follows finds no frame.
    feed.present_code_once_then_dark("PKG-200");
    let camera = Camera::new(source);

    let mut session = open_session(&camera);

    // No emission while the feed is dark.
    assert!(session.wait_for_scan(Duration::from_millis(100)).is_none());
    assert!(session.is_open());

    // Light returns; the re-armed loop decodes and this time capture works.
    feed.present_code("PKG-200");
    let scan = session.wait_for_scan(WAIT).expect("scan after resume");
    assert_eq!(scan.code, "PKG-200");

    assert!(!camera.is_bound());
    assert_eq!(camera.acquisitions(), camera.releases());
}

#[test]
fn second_session_on_a_bound_camera_is_busy() {
    let (source, _feed) = SyntheticCamera::new(32, 32);
    let camera = Camera::new(source);

    let _session = open_session(&camera);
    let err = ScanSession::open(&camera, Box::new(StubDecoder::new()), FAST).unwrap_err();
    assert!(err.downcast_ref::<ResourceBusy>().is_some());
}

#[test]
fn timeout_leaves_the_session_scanning() {
    let (source, feed) = SyntheticCamera::new(32, 32);
    let camera = Camera::new(source);

    let mut session = open_session(&camera);
    assert!(session.wait_for_scan(Duration::from_millis(50)).is_none());
    assert!(session.is_open());
    assert_eq!(session.state(), SessionState::Scanning);

    feed.present_code("PKG-300");
    let scan = session.wait_for_scan(WAIT).expect("late code still scans");
    assert_eq!(scan.code, "PKG-300");
}
