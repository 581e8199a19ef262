//! Command executor
//!
//! A [`Connection`] owns one transport and one session. Exchanges are
//! serialized by an async mutex: the device answers strictly in order and
//! never pipelines, so the first non-event frame after a send is the reply.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use zkrust_core::{Command, FrameCodec, Packet, ProtocolConfig, Session, frame};
use zkrust_transport::Transport;

use crate::error::{Error, Result};

/// One logical connection to a device
pub struct Connection {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) session: Session,
    pub(crate) codec: FrameCodec,
    pub(crate) config: ProtocolConfig,

    /// Held for the whole of an exchange, including every round of a bulk transfer
    pub(crate) exchange: tokio::sync::Mutex<()>,

    /// Event dispatch task, present while subscribed
    pub(crate) events: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

impl Connection {
    pub fn new(transport: Arc<dyn Transport>, config: ProtocolConfig) -> Self {
        Self {
            transport,
            session: Session::with_ttl(config.session_ttl),
            codec: FrameCodec::from_config(&config),
            config,
            exchange: tokio::sync::Mutex::new(()),
            events: parking_lot::Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn config(&self) -> &ProtocolConfig {
        &self.config
    }

    /// Address of the device, for logs and errors
    pub fn endpoint(&self) -> String {
        self.transport.remote_addr()
    }

    /// Both the socket and the session are up
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected() && self.session.is_connected()
    }

    /// Run one command and return the decoded reply
    ///
    /// `CMD_CONNECT` resets the session first and is sent with session and
    /// sequence id 0; its reply carries the new session id, which is stored.
    /// Every other command takes the next sequence id.
    ///
    /// The reply code is not interpreted here; see [`Reply::ensure_ok`].
    ///
    /// # Errors
    ///
    /// - [`Error::NoReply`] if the connection closes before a reply is framed
    ///   or the reply is empty
    /// - [`Error::Timeout`] after [`ProtocolConfig::command_timeout`]
    /// - [`Error::MalformedFrame`] for a reply that does not decode
    /// - [`Error::WriteFailed`] / [`Error::Disconnected`] from the send
    pub async fn execute(&self, command: Command, payload: &[u8]) -> Result<Packet> {
        let _exchange = self.exchange.lock().await;
        self.transact(command, payload).await
    }

    /// Like [`execute`](Self::execute) but return the inner bytes undecoded
    ///
    /// For replies whose contract is defined on the raw inner header, such
    /// as `CMD_AUTH`.
    pub async fn execute_raw(&self, command: Command, payload: &[u8]) -> Result<Bytes> {
        let _exchange = self.exchange.lock().await;
        self.round_trip(command, payload).await
    }

    /// One exchange; the caller holds `self.exchange`
    pub(crate) async fn transact(&self, command: Command, payload: &[u8]) -> Result<Packet> {
        let inner = self.round_trip(command, payload).await?;
        let packet = self.decode_inner(inner)?;

        trace!(reply = %packet, "Reply");

        if command == Command::Connect {
            self.session
                .establish(packet.session_id)
                .map_err(Error::Session)?;
        }

        Ok(packet)
    }

    async fn round_trip(&self, command: Command, payload: &[u8]) -> Result<Bytes> {
        let dropped = self.transport.discard_pending();
        if dropped > 0 {
            debug!(dropped, "Dropped stale replies");
        }

        self.send_command(command, payload).await?;

        let frame = self
            .await_reply(command, self.config.command_timeout)
            .await?;
        let inner = self.codec.strip_outer(&frame)?;

        if inner.is_empty() {
            return Err(Error::NoReply { command });
        }

        Ok(inner)
    }

    /// Encode and write one command without waiting for anything
    pub(crate) async fn send_command(&self, command: Command, payload: &[u8]) -> Result<()> {
        let (session_id, sequence_id) = if command == Command::Connect {
            self.session.reset();
            (0, 0)
        } else {
            (self.session.session_id(), self.session.next_sequence_id())
        };

        debug!(
            command = %command,
            session_id,
            sequence_id,
            len = payload.len(),
            "Sending command"
        );

        let frame = self
            .codec
            .encode(command.into(), session_id, sequence_id, payload)
            .map_err(|e| Error::encoding(e, command))?;

        self.transport
            .send(&frame)
            .await
            .map_err(|e| Error::during(e, command, self.endpoint()))
    }

    /// Next non-event frame; a vanished connection means no reply
    async fn await_reply(&self, command: Command, after: Duration) -> Result<Bytes> {
        let frame = self.transport.await_next(after).await.map_err(|e| {
            match Error::during(e, command, self.endpoint()) {
                Error::Disconnected { .. } => Error::NoReply { command },
                other => other,
            }
        })?;

        trace!(reply = %frame::describe(&frame), len = frame.len(), "Received frame");
        Ok(frame)
    }

    pub(crate) fn decode_inner(&self, inner: Bytes) -> Result<Packet> {
        let packet = if self.config.verify_checksum {
            Packet::decode_verified(inner)?
        } else {
            Packet::decode(inner)?
        };
        Ok(packet)
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Some(task) = self.events.lock().take() {
            task.abort();
        }
    }
}

/// Reply code checks
pub trait Reply {
    /// Fail with [`Error::UnexpectedReply`] unless the device acknowledged
    fn ensure_ok(self, command: Command) -> Result<Packet>;
}

impl Reply for Packet {
    fn ensure_ok(self, command: Command) -> Result<Packet> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(Error::UnexpectedReply {
                command,
                code: self.code,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeDevice, Push, raw_reply, reply};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_connect_stores_session_id() {
        let device = FakeDevice::new(|packet| match packet.command() {
            Some(Command::Connect) => vec![reply(Command::AckOk, 7, 0, &[])],
            _ => vec![],
        });
        device.transport().connect().await.unwrap();
        let conn = Connection::new(device.transport(), ProtocolConfig::default());

        let reply = conn.execute(Command::Connect, &[]).await.unwrap();

        assert_eq!(reply.payload.len(), 0);
        assert_eq!(conn.session().session_id(), 7);
        assert!(conn.is_connected());

        let sent = device.sent();
        assert_eq!(sent[0].session_id, 0);
        assert_eq!(sent[0].sequence_id, 0);
    }

    #[tokio::test]
    async fn test_sequence_ids_follow_connect() {
        let device = FakeDevice::new(|packet| {
            vec![reply(Command::AckOk, 7, packet.sequence_id, &[])]
        });
        device.transport().connect().await.unwrap();
        let conn = Connection::new(device.transport(), ProtocolConfig::default());

        conn.execute(Command::Connect, &[]).await.unwrap();
        conn.execute(Command::DisableDevice, &[]).await.unwrap();
        conn.execute(Command::EnableDevice, &[]).await.unwrap();

        let sent: Vec<_> = device
            .sent()
            .iter()
            .map(|p| (p.code, p.session_id, p.sequence_id))
            .collect();
        assert_eq!(sent, vec![(1000, 0, 0), (1003, 7, 1), (1002, 7, 2)]);

        // Reconnect starts over
        conn.execute(Command::Connect, &[]).await.unwrap();
        conn.execute(Command::GetVersion, &[]).await.unwrap();
        assert_eq!(device.sent()[4].sequence_id, 1);
    }

    #[tokio::test]
    async fn test_oversize_payload_is_rejected_before_send() {
        let device = FakeDevice::new(|packet| {
            vec![reply(Command::AckOk, 7, packet.sequence_id, &[])]
        });
        device.transport().connect().await.unwrap();
        let conn = Connection::new(device.transport(), ProtocolConfig::default());
        conn.execute(Command::Connect, &[]).await.unwrap();

        let err = conn.execute(Command::Data, &[0u8; 70_000]).await.unwrap_err();

        assert!(matches!(
            err,
            Error::PayloadTooLarge {
                command: Command::Data,
                size: 70_000,
                max: Packet::MAX_PAYLOAD_SIZE,
            }
        ));
        assert!(device.sent_with(Command::Data).is_empty());
        assert!(conn.is_connected());
    }

    #[tokio::test]
    async fn test_event_frames_are_not_replies() {
        let device = FakeDevice::new(|packet| match packet.command() {
            Some(Command::GetVersion) => vec![
                reply(Command::RegEvent, 7, 0, &[0; 52]),
                reply(Command::AckOk, 7, packet.sequence_id, b"Ver 6.60\0"),
            ],
            _ => vec![reply(Command::AckOk, 7, 0, &[])],
        });
        device.transport().connect().await.unwrap();
        let conn = Connection::new(device.transport(), ProtocolConfig::default());
        conn.execute(Command::Connect, &[]).await.unwrap();

        let reply = conn.execute(Command::GetVersion, &[]).await.unwrap();

        assert_eq!(reply.command(), Some(Command::AckOk));
        assert_eq!(&reply.payload[..], b"Ver 6.60\0");
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_timeout() {
        let device = FakeDevice::new(|_| vec![]);
        device.transport().connect().await.unwrap();
        let conn = Connection::new(device.transport(), ProtocolConfig::default());

        let err = conn.execute(Command::GetVersion, &[]).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Timeout { command: Command::GetVersion, after } if after == Duration::from_secs(5)
        ));
    }

    #[tokio::test]
    async fn test_stale_reply_is_discarded() {
        let device = FakeDevice::new(|packet| match packet.command() {
            // Answers twice; the second one must not leak into the next exchange
            Some(Command::DisableDevice) => vec![
                reply(Command::AckOk, 7, packet.sequence_id, &[]),
                reply(Command::AckError, 7, packet.sequence_id, &[]),
            ],
            _ => vec![reply(Command::AckOk, 7, packet.sequence_id, b"ok")],
        });
        device.transport().connect().await.unwrap();
        let conn = Connection::new(device.transport(), ProtocolConfig::default());

        conn.execute(Command::DisableDevice, &[]).await.unwrap();
        let reply = conn.execute(Command::GetVersion, &[]).await.unwrap();

        assert_eq!(&reply.payload[..], b"ok");
    }

    #[tokio::test]
    async fn test_hangup_before_reply() {
        let device = FakeDevice::new(|_| vec![Push::Hangup]);
        device.transport().connect().await.unwrap();
        let conn = Connection::new(device.transport(), ProtocolConfig::default());

        let err = conn.execute(Command::GetVersion, &[]).await.unwrap_err();

        assert!(matches!(err, Error::NoReply { command: Command::GetVersion }));
    }

    #[tokio::test]
    async fn test_send_without_connection() {
        let device = FakeDevice::new(|_| vec![]);
        let conn = Connection::new(device.transport(), ProtocolConfig::default());

        let err = conn.execute(Command::GetVersion, &[]).await.unwrap_err();

        assert!(matches!(err, Error::Disconnected { command: Command::GetVersion, .. }));
        assert!(err.is_disconnect());
    }

    #[tokio::test]
    async fn test_short_reply_is_malformed() {
        let device = FakeDevice::new(|_| vec![raw_reply(&[0xD0, 0x07, 0, 0])]);
        device.transport().connect().await.unwrap();
        let conn = Connection::new(device.transport(), ProtocolConfig::default());

        let err = conn.execute(Command::GetVersion, &[]).await.unwrap_err();

        assert!(matches!(
            err,
            Error::MalformedFrame(zkrust_core::Error::PacketTooShort { expected: 8, actual: 4 })
        ));
    }

    #[tokio::test]
    async fn test_empty_reply_is_no_reply() {
        let device = FakeDevice::new(|_| vec![raw_reply(&[])]);
        device.transport().connect().await.unwrap();
        let conn = Connection::new(device.transport(), ProtocolConfig::default());

        let err = conn.execute(Command::Connect, &[]).await.unwrap_err();

        assert!(matches!(err, Error::NoReply { command: Command::Connect }));
    }

    #[tokio::test]
    async fn test_ensure_ok() {
        let ok = Packet::new(Command::AckOk, 1, 1);
        assert!(ok.ensure_ok(Command::EnableDevice).is_ok());

        let refused = Packet::new(Command::AckError, 1, 1);
        assert!(matches!(
            refused.ensure_ok(Command::EnableDevice),
            Err(Error::UnexpectedReply { command: Command::EnableDevice, code: 2001 })
        ));
    }
}
