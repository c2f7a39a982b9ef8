//! Portaria scan kernel
//!
//! This crate implements the scan-to-delivery capture pipeline of a
//! condominium concierge station: continuously decode QR codes from a live
//! camera feed, capture a still image at the instant of a successful decode,
//! and reconcile the scanned code against the delivery store before
//! committing a create or update.
//!
//! # Architecture
//!
//! Data flows in one direction:
//!
//! camera -> decode loop -> (on success) still capture -> scan session ->
//! reconciliation workflow -> delivery store
//!
//! # Module Structure
//!
//! - `camera`: video source boundary (exclusive binding, HTTP and synthetic
//!   sources)
//! - `frame`: raw frames and still-image capture
//! - `decode`: code decoder backend seam
//! - `engine`: the sampling decode loop
//! - `session`: scan session controller (state machine, single emission)
//! - `store`: delivery store HTTP client
//! - `workflow`: scan reconciliation (lookup, edit, confirm/register)

use anyhow::{anyhow, Result};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod camera;
pub mod config;
pub mod decode;
pub mod engine;
pub mod frame;
pub mod session;
pub mod store;
pub mod workflow;

pub use camera::{Camera, CameraLease, LobbyCamera, ResourceBusy, VideoSource};
pub use decode::{CodeDecoder, StubDecoder};
pub use engine::{DecoderEngine, EngineCtl, EngineHandle};
pub use frame::{capture_still, CaptureFailed, VideoFrame};
pub use session::{ScanSession, SessionConfig};
pub use store::{DeliveryRecord, DeliveryStoreClient, Lookup};
pub use workflow::{DeliveryForm, DeliveryWorkflow};

// -------------------- Blocks and unit numbers --------------------

/// Lowest floor selectable in either block.
pub const MIN_FLOOR: u8 = 1;
/// Highest floor selectable in either block.
pub const MAX_FLOOR: u8 = 18;

/// Lowest per-floor apartment slot.
pub const MIN_SLOT: u8 = 1;
/// Highest per-floor apartment slot.
pub const MAX_SLOT: u8 = 6;

/// Building wing identifier. The condominium has exactly two towers.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum Block {
    A,
    B,
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Block::A => write!(f, "A"),
            Block::B => write!(f, "B"),
        }
    }
}

impl FromStr for Block {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "A" | "a" => Ok(Block::A),
            "B" | "b" => Ok(Block::B),
            other => Err(anyhow!("unknown block '{}'; expected A or B", other)),
        }
    }
}

/// Encode floor + slot into the store's unit number.
///
/// The store keeps the unit as the *string concatenation* of floor and slot
/// parsed back into an integer: floor 3, slot 6 is unit 36; floor 12, slot 3
/// is unit 123. Two-digit floors therefore produce three-digit units. Every
/// existing delivery row uses this encoding, so it is reproduced as-is
/// rather than replaced with an arithmetic combination.
pub fn unit_number(floor: u8, slot: u8) -> Result<u32> {
    if !(MIN_FLOOR..=MAX_FLOOR).contains(&floor) {
        return Err(anyhow!(
            "floor {} out of range {}..={}",
            floor,
            MIN_FLOOR,
            MAX_FLOOR
        ));
    }
    if !(MIN_SLOT..=MAX_SLOT).contains(&slot) {
        return Err(anyhow!(
            "slot {} out of range {}..={}",
            slot,
            MIN_SLOT,
            MAX_SLOT
        ));
    }
    let unit: u32 = format!("{}{}", floor, slot)
        .parse()
        .map_err(|_| anyhow!("unit digits did not form an integer"))?;
    Ok(unit)
}

/// Split a stored unit number back into (floor, slot).
///
/// Inverse of [`unit_number`]: the final digit is the slot, the remaining
/// prefix is the floor. A unit with fewer than two digits, or whose parts
/// fall outside the floor/slot ranges, is malformed.
pub fn split_unit(unit: u32) -> Result<(u8, u8)> {
    let digits = unit.to_string();
    if digits.len() < 2 {
        return Err(anyhow!("unit number {} has no floor prefix", unit));
    }
    let (floor_digits, slot_digit) = digits.split_at(digits.len() - 1);
    let floor: u8 = floor_digits
        .parse()
        .map_err(|_| anyhow!("unit number {} has a malformed floor prefix", unit))?;
    let slot: u8 = slot_digit
        .parse()
        .map_err(|_| anyhow!("unit number {} has a malformed slot digit", unit))?;
    if !(MIN_FLOOR..=MAX_FLOOR).contains(&floor) {
        return Err(anyhow!("unit number {} floor {} out of range", unit, floor));
    }
    if !(MIN_SLOT..=MAX_SLOT).contains(&slot) {
        return Err(anyhow!("unit number {} slot {} out of range", unit, slot));
    }
    Ok((floor, slot))
}

// -------------------- Scan results --------------------

/// The product of one successful decode cycle: the decoded payload plus the
/// still image captured at the decode instant.
///
/// A `ScanResult` is never constructed without its image; a failed capture
/// means the scan did not happen and the decode loop resumes.
#[derive(Debug)]
pub struct ScanResult {
    /// Decoded payload. Natural key for delivery lookup.
    pub code: String,
    /// PNG-encoded still of the frame at the decode instant.
    pub image_png: Vec<u8>,
}

// -------------------- Session state --------------------

/// Lookup disposition once the store has answered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    Found,
    NotFound,
}

/// Where a scan session currently stands, from camera open through store
/// submission. At most one session is active per camera at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Scanning,
    Captured,
    LookingUp,
    Resolved(Disposition),
    Submitting,
    Done,
    Aborted,
}

/// Short random identifier attached to a session's log lines.
pub fn session_id() -> String {
    let mut bytes = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_number_concatenates_digits() {
        assert_eq!(unit_number(3, 6).unwrap(), 36);
        assert_eq!(unit_number(12, 3).unwrap(), 123);
        assert_eq!(unit_number(18, 6).unwrap(), 186);
        assert_eq!(unit_number(1, 1).unwrap(), 11);
    }

    #[test]
    fn unit_number_rejects_out_of_range() {
        assert!(unit_number(0, 1).is_err());
        assert!(unit_number(19, 1).is_err());
        assert!(unit_number(1, 0).is_err());
        assert!(unit_number(1, 7).is_err());
    }

    #[test]
    fn split_unit_takes_last_digit_as_slot() {
        assert_eq!(split_unit(45).unwrap(), (4, 5));
        assert_eq!(split_unit(123).unwrap(), (12, 3));
        assert_eq!(split_unit(186).unwrap(), (18, 6));
    }

    #[test]
    fn split_unit_rejects_malformed_units() {
        assert!(split_unit(7).is_err()); // no floor prefix
        assert!(split_unit(0).is_err());
        assert!(split_unit(191).is_err()); // floor 19
        assert!(split_unit(17).is_err()); // slot 7
        assert!(split_unit(1234).is_err()); // floor 123
    }

    #[test]
    fn block_parses_case_insensitively() {
        assert_eq!(Block::from_str("A").unwrap(), Block::A);
        assert_eq!(Block::from_str("b").unwrap(), Block::B);
        assert!(Block::from_str("C").is_err());
    }

    #[test]
    fn session_ids_are_short_hex() {
        let id = session_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
