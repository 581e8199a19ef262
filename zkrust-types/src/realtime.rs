//! Realtime attendance events (`CMD_REG_EVENT` payloads)

use chrono::NaiveDateTime;

use crate::error::Result;
use crate::record::{FixedWidthRecord, c_string};
use crate::time;

/// Fields actually read from the event body
const MIN_LEN: usize = 32;

/// Live punch pushed by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealTimeLog {
    pub user_id: String,

    /// Verification state byte
    pub state: u8,

    pub punch: u8,

    pub timestamp: NaiveDateTime,
}

impl FixedWidthRecord for RealTimeLog {
    const NAME: &'static str = "realtime log";
    const WIDTH: usize = 52;

    /// Some firmware trims the trailing reserved bytes, so only the first
    /// 32 bytes are required.
    fn decode(bytes: &[u8]) -> Result<Self> {
        Self::ensure_len(bytes, MIN_LEN)?;

        let mut stamp = [0u8; 6];
        stamp.copy_from_slice(&bytes[26..32]);

        Ok(Self {
            user_id: c_string(&bytes[0..24]),
            state: bytes[24],
            punch: bytes[25],
            timestamp: time::decode_compact(&stamp)?,
        })
    }
}
