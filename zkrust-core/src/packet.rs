//! Inner command packet: command header plus payload

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::fmt;

use crate::{
    checksum,
    command::{self, Command},
    constants::INNER_HEADER_SIZE,
    error::{Error, Result},
};

/// ZKTeco command packet
///
/// # Packet Structure
///
/// ```text
/// ┌─────────────┬─────────────┬─────────────┬─────────────┬─────────────┐
/// │   Command   │  Checksum   │  SessionID  │ SequenceID  │   Payload   │
/// │   2 bytes   │   2 bytes   │   2 bytes   │   2 bytes   │   N bytes   │
/// │ (LE u16)    │  (LE u16)   │  (LE u16)   │  (LE u16)   │   (bytes)   │
/// └─────────────┴─────────────┴─────────────┴─────────────┴─────────────┘
/// ```
///
/// The command code is kept raw so replies with codes this crate does not
/// know can still be decoded and reported.
///
/// # Examples
///
/// ```
/// use zkrust_core::{Packet, Command};
///
/// let packet = Packet::new(Command::Connect, 0, 0);
/// let decoded = Packet::decode(packet.encode().freeze()).unwrap();
/// assert_eq!(decoded.command(), Some(Command::Connect));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct Packet {
    /// Raw command or reply code
    pub code: u16,

    /// Session identifier (assigned by device on connect)
    pub session_id: u16,

    /// Sequence number of the exchange
    pub sequence_id: u16,

    /// Command-specific data
    pub payload: Bytes,
}

impl Packet {
    /// Maximum payload a 16-bit outer length can describe
    pub const MAX_PAYLOAD_SIZE: usize = u16::MAX as usize - INNER_HEADER_SIZE;

    /// Create a new packet with empty payload
    pub fn new(command: Command, session_id: u16, sequence_id: u16) -> Self {
        Self::with_payload(command, session_id, sequence_id, Bytes::new())
    }

    /// Create a packet with payload
    pub fn with_payload(
        command: Command,
        session_id: u16,
        sequence_id: u16,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            code: command.into(),
            session_id,
            sequence_id,
            payload: payload.into(),
        }
    }

    /// Interpret the raw code, `None` when the code is not known
    pub fn command(&self) -> Option<Command> {
        Command::try_from(self.code).ok()
    }

    /// Whether the code falls in the unsolicited event range
    pub fn is_event(&self) -> bool {
        command::is_event_code(self.code)
    }

    /// Check if this is a success response
    pub fn is_success(&self) -> bool {
        self.command().is_some_and(Command::is_success)
    }

    /// Calculate checksum for this packet
    pub fn checksum(&self) -> u16 {
        checksum::calculate(self.code, self.session_id, self.sequence_id, &self.payload)
    }

    /// Encode header and payload
    pub fn encode(&self) -> BytesMut {
        let mut buf = BytesMut::with_capacity(self.size());
        self.encode_into(&mut buf);
        buf
    }

    /// Append the encoded packet to `buf`
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.put_u16_le(self.code);
        buf.put_u16_le(self.checksum());
        buf.put_u16_le(self.session_id);
        buf.put_u16_le(self.sequence_id);
        buf.put_slice(&self.payload);
    }

    /// Decode a packet without checking its checksum
    ///
    /// # Errors
    ///
    /// [`Error::PacketTooShort`] if fewer than 8 bytes are given.
    pub fn decode(buf: Bytes) -> Result<Self> {
        Self::decode_parts(buf).map(|(packet, _)| packet)
    }

    /// Decode a packet and reject it if the checksum does not match
    pub fn decode_verified(buf: Bytes) -> Result<Self> {
        let (packet, received) = Self::decode_parts(buf)?;

        let expected = packet.checksum();
        if expected != received {
            return Err(Error::ChecksumMismatch { expected, received });
        }

        Ok(packet)
    }

    fn decode_parts(mut buf: Bytes) -> Result<(Self, u16)> {
        if buf.len() < INNER_HEADER_SIZE {
            return Err(Error::PacketTooShort {
                expected: INNER_HEADER_SIZE,
                actual: buf.len(),
            });
        }

        let code = buf.get_u16_le();
        let checksum = buf.get_u16_le();
        let session_id = buf.get_u16_le();
        let sequence_id = buf.get_u16_le();

        let packet = Self {
            code,
            session_id,
            sequence_id,
            payload: buf,
        };

        Ok((packet, checksum))
    }

    /// Get total packet size
    pub fn size(&self) -> usize {
        INNER_HEADER_SIZE + self.payload.len()
    }
}

impl fmt::Debug for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Packet")
            .field("code", &self.code)
            .field("session_id", &format!("0x{:04X}", self.session_id))
            .field("sequence_id", &self.sequence_id)
            .field("payload_len", &self.payload.len())
            .finish()
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.command() {
            Some(command) => write!(f, "Packet[{}]", command)?,
            None => write!(f, "Packet[{}]", self.code)?,
        }
        write!(
            f,
            "(session={}, seq={}, len={})",
            self.session_id,
            self.sequence_id,
            self.payload.len()
        )
    }
}
