//! Device information structures

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};
use chrono::NaiveDateTime;

use crate::error::{Error, Result};

/// Storage counters reported by `CMD_GET_FREE_SIZES`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capacity {
    pub users: u32,
    pub fingers: u32,
    pub records: u32,
    pub cards: u32,
    pub finger_capacity: u32,
    pub user_capacity: u32,
    pub record_capacity: u32,
}

impl Capacity {
    /// Reply body is a table of little-endian `i32` counters; the first 80
    /// bytes are required.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 80 {
            return Err(Error::RecordTooShort {
                record: "capacity",
                expected: 80,
                actual: bytes.len(),
            });
        }

        let field = |index: usize| {
            LittleEndian::read_i32(&bytes[index * 4..index * 4 + 4]).max(0) as u32
        };

        Ok(Self {
            users: field(4),
            fingers: field(6),
            records: field(8),
            cards: field(12),
            finger_capacity: field(14),
            user_capacity: field(15),
            record_capacity: field(16),
        })
    }
}

/// Device information
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Firmware version string (`CMD_GET_VERSION`)
    pub firmware_version: String,

    /// Device clock (`CMD_GET_TIME`)
    pub device_time: Option<NaiveDateTime>,

    pub capacity: Option<Capacity>,
}

impl DeviceInfo {
    pub fn new(firmware_version: impl Into<String>) -> Self {
        Self {
            firmware_version: firmware_version.into(),
            device_time: None,
            capacity: None,
        }
    }

    pub fn with_device_time(mut self, time: NaiveDateTime) -> Self {
        self.device_time = Some(time);
        self
    }

    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = Some(capacity);
        self
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Device[FW: {}", self.firmware_version)?;
        if let Some(time) = self.device_time {
            write!(f, ", time: {}", time)?;
        }
        if let Some(capacity) = self.capacity {
            write!(
                f,
                ", users: {}/{}, records: {}/{}",
                capacity.users,
                capacity.user_capacity,
                capacity.records,
                capacity.record_capacity
            )?;
        }
        write!(f, "]")
    }
}
