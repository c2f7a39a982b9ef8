use std::sync::Mutex;

use tempfile::NamedTempFile;

use portaria_scan::config::PortariaConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PORTARIA_CONFIG",
        "PORTARIA_API_URL",
        "PORTARIA_CAMERA_URL",
        "PORTARIA_CAMERA_FPS",
        "PORTARIA_APARTMENT_ID",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = PortariaConfig::load().expect("load config");

    assert_eq!(cfg.api_url, "http://localhost:3000");
    assert_eq!(cfg.camera.url, "stub://lobby");
    assert_eq!(cfg.camera.target_fps, 10);
    assert_eq!(cfg.apartment_id, 1);
    assert_eq!(cfg.sample_interval.as_millis(), 100);

    clear_env();
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "api_url": "http://store.condo.local:8080",
        "apartment_id": 4,
        "camera": {
            "url": "http://lobby-cam.local/stream",
            "target_fps": 12
        },
        "scan": {
            "sample_interval_ms": 40
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("PORTARIA_CONFIG", file.path());
    std::env::set_var("PORTARIA_CAMERA_URL", "stub://lobby?code=DEMO&every=25");
    std::env::set_var("PORTARIA_APARTMENT_ID", "9");

    let cfg = PortariaConfig::load().expect("load config");

    assert_eq!(cfg.api_url, "http://store.condo.local:8080");
    assert_eq!(cfg.camera.url, "stub://lobby?code=DEMO&every=25");
    assert_eq!(cfg.camera.target_fps, 12);
    assert_eq!(cfg.apartment_id, 9);
    assert_eq!(cfg.sample_interval.as_millis(), 40);

    clear_env();
}

#[test]
fn rejects_non_numeric_fps_override() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PORTARIA_CAMERA_FPS", "fast");
    assert!(PortariaConfig::load().is_err());

    clear_env();
}

#[test]
fn rejects_non_http_api_url() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PORTARIA_API_URL", "ftp://store.local");
    assert!(PortariaConfig::load().is_err());

    std::env::set_var("PORTARIA_API_URL", "not a url");
    assert!(PortariaConfig::load().is_err());

    clear_env();
}
