//! Error types for zkrust-core

/// Result type alias for zkrust operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core protocol errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// Packet is too short to be valid
    #[error("Packet too short: expected at least {expected} bytes, got {actual} bytes")]
    PacketTooShort { expected: usize, actual: usize },

    /// Outer length field disagrees with the bytes at hand
    #[error("Frame length mismatch: header declares {declared} inner bytes, {available} available")]
    LengthMismatch { declared: usize, available: usize },

    /// Frame does not start with the configured sync pattern
    #[error("Bad sync marker: {found:02X?}")]
    BadSyncMarker { found: [u8; 4] },

    /// Checksum verification failed
    #[error("Checksum mismatch: expected 0x{expected:04X}, received 0x{received:04X}")]
    ChecksumMismatch { expected: u16, received: u16 },

    /// Payload does not fit the 16-bit length field
    #[error("Payload too large: {size} bytes, at most {max} fit in one frame")]
    PayloadTooLarge { size: usize, max: usize },

    /// Unknown command code
    #[error("Unknown command code: {0}")]
    UnknownCommand(u16),

    /// Invalid session state
    #[error("Invalid session state: {0}")]
    InvalidSessionState(String),
}

impl Error {
    /// Frame-level defects that end the current exchange
    pub fn is_malformed(&self) -> bool {
        matches!(
            self,
            Self::PacketTooShort { .. }
                | Self::LengthMismatch { .. }
                | Self::BadSyncMarker { .. }
                | Self::ChecksumMismatch { .. }
        )
    }
}
