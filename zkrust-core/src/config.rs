//! Protocol configuration
//!
//! The sync marker and chunk sizes vary between firmware families, so
//! they travel with the connection instead of being baked into the codec.

use std::time::Duration;

use crate::constants::{
    DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_TIMEOUT, DEFAULT_CONNECT_TIMEOUT, DEFAULT_SESSION_TTL,
    DEFAULT_TIMEOUT, DEFAULT_WRITE_CHUNK_SIZE, EventFlags, SYNC_MARKER,
};

/// Tunables shared by the codec, executor and bulk transfer
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use zkrust_core::ProtocolConfig;
///
/// let config = ProtocolConfig::default()
///     .with_chunk_size(1024)
///     .with_command_timeout(Duration::from_secs(2));
/// assert_eq!(config.chunk_size, 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolConfig {
    /// Sync pattern at the start of every stream frame
    pub sync_marker: [u8; 4],

    /// Bytes requested per `CMD_DATA_RDY` during bulk reads
    pub chunk_size: usize,

    /// Bytes per `CMD_DATA` frame during bulk writes
    pub write_chunk_size: usize,

    /// Deadline for a single command reply
    pub command_timeout: Duration,

    /// Inactivity window between sub-frames of a bulk read
    pub chunk_timeout: Duration,

    /// Deadline for establishing the socket
    pub connect_timeout: Duration,

    /// Age after which an authenticated session is reported stale
    pub session_ttl: Duration,

    /// Reject replies whose checksum does not match
    pub verify_checksum: bool,

    /// Events requested by `CMD_REG_EVENT`
    pub event_flags: EventFlags,
}

impl ProtocolConfig {
    pub fn with_sync_marker(mut self, marker: [u8; 4]) -> Self {
        self.sync_marker = marker;
        self
    }

    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn with_write_chunk_size(mut self, size: usize) -> Self {
        self.write_chunk_size = size;
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_chunk_timeout(mut self, timeout: Duration) -> Self {
        self.chunk_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_session_ttl(mut self, ttl: Duration) -> Self {
        self.session_ttl = ttl;
        self
    }

    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    pub fn with_event_flags(mut self, flags: EventFlags) -> Self {
        self.event_flags = flags;
        self
    }
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            sync_marker: SYNC_MARKER,
            chunk_size: DEFAULT_CHUNK_SIZE,
            write_chunk_size: DEFAULT_WRITE_CHUNK_SIZE,
            command_timeout: DEFAULT_TIMEOUT,
            chunk_timeout: DEFAULT_CHUNK_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            session_ttl: DEFAULT_SESSION_TTL,
            verify_checksum: false,
            event_flags: EventFlags::ATTLOG,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ProtocolConfig::default();
        assert_eq!(config.sync_marker, SYNC_MARKER);
        assert_eq!(config.chunk_size, 0xFFC0);
        assert_eq!(config.session_ttl, Duration::from_secs(1800));
        assert!(!config.verify_checksum);
    }

    #[test]
    fn test_builder_overrides() {
        let config = ProtocolConfig::default()
            .with_sync_marker([1, 2, 3, 4])
            .with_write_chunk_size(512)
            .with_checksum_verification(true);

        assert_eq!(config.sync_marker, [1, 2, 3, 4]);
        assert_eq!(config.write_chunk_size, 512);
        assert!(config.verify_checksum);
    }
}
