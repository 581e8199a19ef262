//! 40-byte attendance records

use byteorder::{ByteOrder, LittleEndian};
use chrono::NaiveDateTime;

use crate::error::Result;
use crate::record::{FixedWidthRecord, c_string};
use crate::time;

/// Stored attendance punch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attendance {
    /// Record serial number
    pub user_sn: u16,

    pub user_id: String,

    /// Verification state byte
    pub state: u8,

    /// Device-local time of the punch
    pub timestamp: NaiveDateTime,

    /// Punch type (check-in, check-out, ...)
    pub punch: u8,
}

impl FixedWidthRecord for Attendance {
    const NAME: &'static str = "attendance";
    const WIDTH: usize = 40;

    fn decode(bytes: &[u8]) -> Result<Self> {
        Self::ensure_len(bytes, Self::WIDTH)?;

        Ok(Self {
            user_sn: LittleEndian::read_u16(&bytes[0..2]),
            user_id: c_string(&bytes[2..26]),
            state: bytes[26],
            timestamp: time::decode_packed(LittleEndian::read_u32(&bytes[27..31]))?,
            punch: bytes[31],
        })
    }
}
