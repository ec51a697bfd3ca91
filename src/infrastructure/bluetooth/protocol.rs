//! Heading Peripheral Protocol
//!
//! Identifiers and payload format of the Arduino heading peripheral.

use thiserror::Error;

/// Advertised local name of the heading peripheral
pub const TARGET_DEVICE_NAME: &str = "Arduino_GCS";

/// 16-bit UUID of the service carrying the heading characteristic
pub const HEADING_SERVICE_UUID16: u16 = 0x180A;

/// 16-bit UUID of the heading characteristic (notify)
pub const HEADING_CHAR_UUID16: u16 = 0x2A57;

/// Tail of the Bluetooth base UUID shared by all 16-bit short UUIDs
pub const BLUETOOTH_BASE_UUID_TAIL: &str = "-0000-1000-8000-00805f9b34fb";

/// Expected notification payload length in bytes
pub const HEADING_PAYLOAD_LEN: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("expected {HEADING_PAYLOAD_LEN} bytes, got {0}")]
    InvalidLength(usize),
}

/// Decode a heading notification
///
/// # Payload Structure (2 bytes)
///
/// ```text
/// [0-1] : Angle in whole degrees (i16 little-endian, may be negative)
/// ```
pub fn decode_heading(payload: &[u8]) -> Result<i16, DecodeError> {
    match payload {
        [lo, hi] => Ok(i16::from_le_bytes([*lo, *hi])),
        _ => Err(DecodeError::InvalidLength(payload.len())),
    }
}

/// Encode an angle the way the peripheral sends it
pub fn encode_heading(angle: i16) -> [u8; HEADING_PAYLOAD_LEN] {
    angle.to_le_bytes()
}

/// Expand a 16-bit short UUID into its full 128-bit string form
pub fn uuid16_to_string(uuid: u16) -> String {
    format!("0000{:04x}{}", uuid, BLUETOOTH_BASE_UUID_TAIL)
}

#[cfg(windows)]
pub mod guid {
    use windows::core::GUID;

    const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;
    const SHORT_MASK: u128 = 0xffff_ffff << 96;

    /// Short form of a GUID built on the Bluetooth base UUID
    pub fn to_uuid16(guid: &GUID) -> Option<u16> {
        let value = guid.to_u128();
        if value & !SHORT_MASK != BASE_UUID || value >> 112 != 0 {
            return None;
        }
        Some((value >> 96) as u16)
    }
}
