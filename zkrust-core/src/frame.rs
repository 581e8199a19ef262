//! Stream framing: the outer transport header around a [`Packet`]
//!
//! # Frame Structure
//!
//! ```text
//! ┌──────────────────┬──────────────┬──────────┬────────────────────────┐
//! │   Sync marker    │ Inner length │ Reserved │  Inner packet          │
//! │     4 bytes      │  (LE u16)    │ 2 bytes  │  8-byte header + data  │
//! └──────────────────┴──────────────┴──────────┴────────────────────────┘
//! ```
//!
//! The inner length counts the 8-byte command header plus the payload.

use bytes::{BufMut, Bytes, BytesMut};
use tracing::trace;

use crate::{
    command::{self, Command},
    config::ProtocolConfig,
    constants::{FRAME_HEADER_SIZE, OUTER_HEADER_SIZE, SYNC_MARKER},
    error::{Error, Result},
    packet::Packet,
};

/// Encoder/decoder for stream frames
///
/// # Examples
///
/// ```
/// use zkrust_core::{Command, FrameCodec};
///
/// let codec = FrameCodec::default();
/// let frame = codec.encode(Command::Connect.into(), 0, 0, &[]).unwrap();
/// assert_eq!(frame.len(), 16);
///
/// let packet = codec.decode(&frame).unwrap();
/// assert_eq!(packet.command(), Some(Command::Connect));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCodec {
    sync_marker: [u8; 4],
    verify_checksum: bool,
}

impl FrameCodec {
    pub fn new(sync_marker: [u8; 4]) -> Self {
        Self {
            sync_marker,
            verify_checksum: false,
        }
    }

    pub fn from_config(config: &ProtocolConfig) -> Self {
        Self::new(config.sync_marker).with_checksum_verification(config.verify_checksum)
    }

    pub fn with_checksum_verification(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    pub fn sync_marker(&self) -> [u8; 4] {
        self.sync_marker
    }

    /// Build a complete two-layer frame
    ///
    /// # Errors
    ///
    /// [`Error::PayloadTooLarge`] when the payload exceeds
    /// [`Packet::MAX_PAYLOAD_SIZE`]; larger data goes through the bulk
    /// protocol in chunks.
    pub fn encode(
        &self,
        code: u16,
        session_id: u16,
        sequence_id: u16,
        payload: &[u8],
    ) -> Result<Bytes> {
        let packet = Packet {
            code,
            session_id,
            sequence_id,
            payload: Bytes::copy_from_slice(payload),
        };
        self.encode_packet(&packet)
    }

    pub fn encode_packet(&self, packet: &Packet) -> Result<Bytes> {
        if packet.payload.len() > Packet::MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                size: packet.payload.len(),
                max: Packet::MAX_PAYLOAD_SIZE,
            });
        }

        let mut buf = BytesMut::with_capacity(OUTER_HEADER_SIZE + packet.size());
        buf.put_slice(&self.sync_marker);
        buf.put_u16_le(packet.size() as u16);
        buf.put_u16_le(0);
        packet.encode_into(&mut buf);

        trace!(frame = %hex::encode(&buf[..buf.len().min(32)]), "Encoded frame");

        Ok(buf.freeze())
    }

    /// Decode a complete frame into its inner packet
    ///
    /// # Errors
    ///
    /// - [`Error::PacketTooShort`] when fewer than 16 bytes are given
    /// - [`Error::BadSyncMarker`] when the frame does not start with the marker
    /// - [`Error::LengthMismatch`] when the declared length disagrees with the buffer
    /// - [`Error::ChecksumMismatch`] when verification is enabled and fails
    pub fn decode(&self, frame: &[u8]) -> Result<Packet> {
        if frame.len() < FRAME_HEADER_SIZE {
            return Err(Error::PacketTooShort {
                expected: FRAME_HEADER_SIZE,
                actual: frame.len(),
            });
        }

        let inner = self.strip_outer(frame)?;
        if self.verify_checksum {
            Packet::decode_verified(inner)
        } else {
            Packet::decode(inner)
        }
    }

    /// Remove the outer wrapper, returning the inner bytes
    ///
    /// Only the outer header is validated; the inner bytes may be shorter
    /// than a full command header.
    pub fn strip_outer(&self, frame: &[u8]) -> Result<Bytes> {
        let declared = self.declared_len(frame)?;
        let available = frame.len() - OUTER_HEADER_SIZE;

        if declared != available {
            return Err(Error::LengthMismatch {
                declared,
                available,
            });
        }

        Ok(Bytes::copy_from_slice(&frame[OUTER_HEADER_SIZE..]))
    }

    /// Cut the next complete frame off the front of a rolling buffer
    ///
    /// Returns `Ok(None)` while the buffer holds only part of a frame.
    pub fn split_frame(&self, buf: &mut BytesMut) -> Result<Option<Bytes>> {
        if buf.len() < OUTER_HEADER_SIZE {
            return Ok(None);
        }

        let total = OUTER_HEADER_SIZE + self.declared_len(buf)?;
        if buf.len() < total {
            return Ok(None);
        }

        Ok(Some(buf.split_to(total).freeze()))
    }

    /// Classify a frame as an unsolicited event
    ///
    /// Looks only at the command code, so it is safe to call on any complete
    /// frame before reassembly touches it.
    pub fn is_event_frame(&self, frame: &[u8]) -> bool {
        frame_code(frame).is_some_and(command::is_event_code)
    }

    fn declared_len(&self, frame: &[u8]) -> Result<usize> {
        if frame.len() < OUTER_HEADER_SIZE {
            return Err(Error::PacketTooShort {
                expected: OUTER_HEADER_SIZE,
                actual: frame.len(),
            });
        }

        let mut found = [0u8; 4];
        found.copy_from_slice(&frame[..4]);
        if found != self.sync_marker {
            return Err(Error::BadSyncMarker { found });
        }

        Ok(u16::from_le_bytes([frame[4], frame[5]]) as usize)
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(SYNC_MARKER)
    }
}

/// Raw command code of a stream frame, if it has one
pub fn frame_code(frame: &[u8]) -> Option<u16> {
    frame
        .get(OUTER_HEADER_SIZE..OUTER_HEADER_SIZE + 2)
        .map(|code| u16::from_le_bytes([code[0], code[1]]))
}

/// Name a frame for logs
pub fn describe(frame: &[u8]) -> String {
    match frame_code(frame) {
        Some(code) => match Command::try_from(code) {
            Ok(command) => command.to_string(),
            Err(_) => format!("code {}", code),
        },
        None => "truncated frame".to_string(),
    }
}
