use anyhow::Result;

use crate::decode::stub_payload::extract_payload;
use crate::decode::CodeDecoder;

/// Stub backend for tests and demos. Decodes the synthetic payload format
/// embedded by the synthetic camera; real frames always miss.
pub struct StubDecoder;

impl StubDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StubDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl CodeDecoder for StubDecoder {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn decode(&mut self, pixels: &[u8], _width: u32, _height: u32) -> Result<Option<String>> {
        Ok(extract_payload(pixels))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::stub_payload::embed_payload;

    #[test]
    fn decodes_embedded_payloads_and_misses_noise() {
        let mut decoder = StubDecoder::new();

        let noise = vec![7u8; 48];
        assert!(decoder.decode(&noise, 4, 4).unwrap().is_none());

        let mut coded = vec![7u8; 48];
        embed_payload(&mut coded, "XYZ123").unwrap();
        assert_eq!(
            decoder.decode(&coded, 4, 4).unwrap().as_deref(),
            Some("XYZ123")
        );
    }
}
