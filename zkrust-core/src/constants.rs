//! Protocol constants

use std::ops::RangeInclusive;
use std::time::Duration;

/// Sync pattern opening every stream frame (`0x5050`, `0x7D82` little-endian)
pub const SYNC_MARKER: [u8; 4] = [0x50, 0x50, 0x82, 0x7D];

/// Outer transport header: sync marker, inner length, reserved
pub const OUTER_HEADER_SIZE: usize = 8;

/// Inner command header: command, checksum, session id, sequence id
pub const INNER_HEADER_SIZE: usize = 8;

/// Combined fixed header consumed by every decode path
pub const FRAME_HEADER_SIZE: usize = OUTER_HEADER_SIZE + INNER_HEADER_SIZE;

/// Command codes the device uses for unsolicited frames.
///
/// Realtime events come back under the `CMD_REG_EVENT` code, which never
/// appears as a reply code.
pub const EVENT_CODE_RANGE: RangeInclusive<u16> = 500..=500;

/// Read chunk size for TCP bulk transfers
pub const DEFAULT_CHUNK_SIZE: usize = 0xFFC0;

/// Write chunk size for `CMD_DATA` uploads
pub const DEFAULT_WRITE_CHUNK_SIZE: usize = 1024;

/// Default command timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default inactivity window between bulk sub-frames
pub const DEFAULT_CHUNK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default connection timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Authenticated sessions are reported stale after this long
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

bitflags::bitflags! {
    /// Real-time event flags (`CMD_REG_EVENT` payload)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct EventFlags: u32 {
        /// Attendance log event
        const ATTLOG = 1;
        /// Fingerprint pressed
        const FINGER = 1 << 1;
        /// User enrolled
        const ENROLL_USER = 1 << 2;
        /// Fingerprint enrolled
        const ENROLL_FINGER = 1 << 3;
        /// Button pressed
        const BUTTON = 1 << 4;
        /// Door unlocked
        const UNLOCK = 1 << 5;
        /// Verification event
        const VERIFY = 1 << 7;
        /// Fingerprint minutiae captured
        const FPFTR = 1 << 8;
        /// Alarm signal
        const ALARM = 1 << 9;
    }
}

/// Data type flags (`fct` field of bulk read requests)
pub mod data_types {
    /// Attendance log
    pub const FCT_ATTLOG: u32 = 1;

    /// Fingerprint template
    pub const FCT_FINGERTMP: u32 = 2;

    /// Operation log
    pub const FCT_OPLOG: u32 = 4;

    /// User record
    pub const FCT_USER: u32 = 5;
}
