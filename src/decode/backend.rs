use anyhow::Result;

/// Per-frame code decoder.
///
/// Implementations must treat the pixel slice as read-only and ephemeral;
/// one call inspects exactly one frame.
pub trait CodeDecoder: Send {
    /// Backend identifier for log lines.
    fn name(&self) -> &'static str;

    /// Attempt to extract a code payload from one RGB frame.
    ///
    /// `Ok(Some(code))` on a successful decode, `Ok(None)` when the frame
    /// holds no recognizable code (a miss, not a failure), `Err` when the
    /// backend itself broke.
    fn decode(&mut self, pixels: &[u8], width: u32, height: u32) -> Result<Option<String>>;
}
