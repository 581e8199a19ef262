//! Scripted in-memory device for protocol tests

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{Mutex as AsyncMutex, mpsc};

use zkrust_core::{Command, FrameCodec, Packet};
use zkrust_transport::{Error, EventReceiver, Result, Transport};

type Inbound = std::result::Result<Bytes, zkrust_core::Error>;
type Responder = Box<dyn FnMut(&Packet) -> Vec<Push> + Send>;

/// What the fake device does in answer to a command
pub(crate) enum Push {
    /// A complete frame, routed like the TCP read loop routes it
    Raw(Bytes),

    /// Peer closes the connection; frames already queued stay readable
    Hangup,
}

/// Encoded reply frame
pub(crate) fn reply(command: Command, session_id: u16, sequence_id: u16, payload: &[u8]) -> Push {
    Push::Raw(FrameCodec::default().encode(command.into(), session_id, sequence_id, payload).unwrap())
}

/// Frame around arbitrary inner bytes, which need not hold a full header
pub(crate) fn raw_reply(inner: &[u8]) -> Push {
    let mut frame = zkrust_core::constants::SYNC_MARKER.to_vec();
    frame.extend_from_slice(&(inner.len() as u16).to_le_bytes());
    frame.extend_from_slice(&[0, 0]);
    frame.extend_from_slice(inner);
    Push::Raw(Bytes::from(frame))
}

/// Handle on a [`FakeTransport`]
pub(crate) struct FakeDevice {
    transport: Arc<FakeTransport>,
}

impl FakeDevice {
    pub(crate) fn new<F>(responder: F) -> Self
    where
        F: FnMut(&Packet) -> Vec<Push> + Send + 'static,
    {
        Self {
            transport: Arc::new(FakeTransport {
                codec: FrameCodec::default(),
                responder: parking_lot::Mutex::new(Box::new(responder)),
                sent: parking_lot::Mutex::new(Vec::new()),
                link: parking_lot::Mutex::new(None),
            }),
        }
    }

    pub(crate) fn transport(&self) -> Arc<dyn Transport> {
        self.transport.clone()
    }

    /// Every command received so far
    pub(crate) fn sent(&self) -> Vec<Packet> {
        self.transport.sent.lock().clone()
    }

    /// Commands received with the given code
    pub(crate) fn sent_with(&self, command: Command) -> Vec<Packet> {
        self.sent()
            .into_iter()
            .filter(|p| p.code == u16::from(command))
            .collect()
    }

    /// Push unsolicited frames outside any exchange
    pub(crate) fn push(&self, pushes: Vec<Push>) {
        self.transport.deliver(pushes);
    }
}

struct FakeLink {
    /// `None` once the peer hung up
    replies_tx: Option<mpsc::UnboundedSender<Inbound>>,
    replies: Arc<AsyncMutex<mpsc::UnboundedReceiver<Inbound>>>,
    events: Option<mpsc::UnboundedSender<Bytes>>,
}

pub(crate) struct FakeTransport {
    codec: FrameCodec,
    responder: parking_lot::Mutex<Responder>,
    sent: parking_lot::Mutex<Vec<Packet>>,
    link: parking_lot::Mutex<Option<FakeLink>>,
}

impl FakeTransport {
    fn deliver(&self, pushes: Vec<Push>) {
        let mut link = self.link.lock();

        for push in pushes {
            let frame = match push {
                Push::Raw(frame) => frame,
                Push::Hangup => {
                    if let Some(current) = link.as_mut() {
                        current.replies_tx.take();
                        current.events.take();
                    }
                    return;
                }
            };
            let Some(current) = link.as_ref() else {
                return;
            };

            if self.codec.is_event_frame(&frame) {
                if let Some(tx) = &current.events {
                    let _ = tx.send(frame);
                }
            } else if let Some(tx) = &current.replies_tx {
                let _ = tx.send(Ok(frame));
            }
        }
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn connect(&self) -> Result<()> {
        let (replies_tx, replies) = mpsc::unbounded_channel();
        *self.link.lock() = Some(FakeLink {
            replies_tx: Some(replies_tx),
            replies: Arc::new(AsyncMutex::new(replies)),
            events: None,
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.link.lock().take();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.link
            .lock()
            .as_ref()
            .is_some_and(|link| link.replies_tx.is_some())
    }

    async fn send(&self, data: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let packet = self.codec.decode(data)?;
        self.sent.lock().push(packet.clone());

        let pushes = {
            let mut responder = self.responder.lock();
            (*responder)(&packet)
        };
        self.deliver(pushes);
        Ok(())
    }

    async fn await_next(&self, after: Duration) -> Result<Bytes> {
        let replies = {
            let link = self.link.lock();
            link.as_ref().ok_or(Error::NotConnected)?.replies.clone()
        };
        let mut replies = replies.lock().await;

        match tokio::time::timeout(after, replies.recv()).await {
            Err(_) => Err(Error::Timeout { after }),
            Ok(None) => Err(Error::Disconnected),
            Ok(Some(Ok(frame))) => Ok(frame),
            Ok(Some(Err(e))) => Err(Error::Malformed(e)),
        }
    }

    fn discard_pending(&self) -> usize {
        let replies = match self.link.lock().as_ref() {
            Some(link) => link.replies.clone(),
            None => return 0,
        };
        let Ok(mut replies) = replies.try_lock() else {
            return 0;
        };

        let mut discarded = 0;
        while replies.try_recv().is_ok() {
            discarded += 1;
        }
        discarded
    }

    fn subscribe_events(&self) -> Result<EventReceiver> {
        let mut link = self.link.lock();
        let link = link
            .as_mut()
            .filter(|link| link.replies_tx.is_some())
            .ok_or(Error::NotConnected)?;

        if link.events.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Err(Error::AlreadySubscribed);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        link.events = Some(tx);
        Ok(rx)
    }

    fn remote_addr(&self) -> String {
        "fake-device:4370".to_string()
    }
}
