use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::session::SessionConfig;

const DEFAULT_API_URL: &str = "http://localhost:3000";
const DEFAULT_CAMERA_URL: &str = "stub://lobby";
const DEFAULT_CAMERA_FPS: u32 = 10;
const DEFAULT_SAMPLE_INTERVAL_MS: u64 = 100;

// TODO: resolve the apartment id from block/unit once the apartments API
// exposes a lookup; until then every submission carries this placeholder.
const DEFAULT_APARTMENT_ID: i64 = 1;

#[derive(Debug, Deserialize, Default)]
struct PortariaConfigFile {
    api_url: Option<String>,
    apartment_id: Option<i64>,
    camera: Option<CameraConfigFile>,
    scan: Option<ScanConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    url: Option<String>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ScanConfigFile {
    sample_interval_ms: Option<u64>,
}

/// Concierge station configuration.
///
/// Loaded from a JSON file named by `PORTARIA_CONFIG` (all fields
/// optional), then overridden by environment variables, then validated.
#[derive(Debug, Clone)]
pub struct PortariaConfig {
    /// Delivery store base URL, injected into the store client.
    pub api_url: String,
    /// Placeholder apartment id carried on every submission.
    pub apartment_id: i64,
    pub camera: CameraSettings,
    /// Decode loop cadence.
    pub sample_interval: Duration,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub url: String,
    pub target_fps: u32,
}

impl PortariaConfig {
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("PORTARIA_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(Path::new(path))?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default());
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            sample_interval: self.sample_interval,
        }
    }

    fn from_file(file: PortariaConfigFile) -> Self {
        let api_url = file.api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let apartment_id = file.apartment_id.unwrap_or(DEFAULT_APARTMENT_ID);
        let camera = CameraSettings {
            url: file
                .camera
                .as_ref()
                .and_then(|camera| camera.url.clone())
                .unwrap_or_else(|| DEFAULT_CAMERA_URL.to_string()),
            target_fps: file
                .camera
                .as_ref()
                .and_then(|camera| camera.target_fps)
                .unwrap_or(DEFAULT_CAMERA_FPS),
        };
        let sample_interval = Duration::from_millis(
            file.scan
                .and_then(|scan| scan.sample_interval_ms)
                .unwrap_or(DEFAULT_SAMPLE_INTERVAL_MS),
        );
        Self {
            api_url,
            apartment_id,
            camera,
            sample_interval,
        }
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var("PORTARIA_API_URL") {
            if !url.trim().is_empty() {
                self.api_url = url;
            }
        }
        if let Ok(url) = std::env::var("PORTARIA_CAMERA_URL") {
            if !url.trim().is_empty() {
                self.camera.url = url;
            }
        }
        if let Ok(fps) = std::env::var("PORTARIA_CAMERA_FPS") {
            self.camera.target_fps = fps
                .parse()
                .map_err(|_| anyhow!("PORTARIA_CAMERA_FPS must be an integer"))?;
        }
        if let Ok(apartment) = std::env::var("PORTARIA_APARTMENT_ID") {
            self.apartment_id = apartment
                .parse()
                .map_err(|_| anyhow!("PORTARIA_APARTMENT_ID must be an integer"))?;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        let api = url::Url::parse(&self.api_url)
            .map_err(|e| anyhow!("invalid api url {}: {}", self.api_url, e))?;
        if !matches!(api.scheme(), "http" | "https") {
            return Err(anyhow!(
                "api url must be http(s), got '{}://'",
                api.scheme()
            ));
        }
        url::Url::parse(&self.camera.url)
            .map_err(|e| anyhow!("invalid camera url {}: {}", self.camera.url, e))?;
        if self.sample_interval.is_zero() {
            return Err(anyhow!("scan sample interval must be greater than zero"));
        }
        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<PortariaConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}
