//! Sentinel payload format shared by the stub decoder and the synthetic
//! camera: marker, big-endian u16 length, UTF-8 payload, written over the
//! head of the pixel buffer.

use anyhow::{anyhow, Result};

const MARKER: &[u8] = b"\0QRP1";

/// Overwrite the head of `pixels` with an embedded payload.
pub fn embed_payload(pixels: &mut [u8], payload: &str) -> Result<()> {
    let bytes = payload.as_bytes();
    if bytes.len() > u16::MAX as usize {
        return Err(anyhow!("payload too long to embed"));
    }
    let needed = MARKER.len() + 2 + bytes.len();
    if pixels.len() < needed {
        return Err(anyhow!(
            "frame too small to embed payload ({} < {} bytes)",
            pixels.len(),
            needed
        ));
    }
    pixels[..MARKER.len()].copy_from_slice(MARKER);
    let len = (bytes.len() as u16).to_be_bytes();
    pixels[MARKER.len()..MARKER.len() + 2].copy_from_slice(&len);
    pixels[MARKER.len() + 2..needed].copy_from_slice(bytes);
    Ok(())
}

/// Read back a payload embedded by [`embed_payload`], if present.
pub fn extract_payload(pixels: &[u8]) -> Option<String> {
    if pixels.len() < MARKER.len() + 2 || &pixels[..MARKER.len()] != MARKER {
        return None;
    }
    let len = u16::from_be_bytes([pixels[MARKER.len()], pixels[MARKER.len() + 1]]) as usize;
    let start = MARKER.len() + 2;
    let end = start.checked_add(len)?;
    if pixels.len() < end {
        return None;
    }
    String::from_utf8(pixels[start..end].to_vec()).ok()
}
