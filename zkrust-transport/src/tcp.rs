//! TCP transport
//!
//! One read task per connection cuts the byte stream into frames and
//! routes them: event frames to the listener (or nowhere), everything else
//! into the reply queue drained by [`Transport::await_next`]. When the task
//! ends, its senders drop and every waiter wakes with `Disconnected`.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use zkrust_core::{FrameCodec, constants::DEFAULT_CONNECT_TIMEOUT, frame};

use crate::{EventReceiver, Transport, error::*};

const READ_BUFFER_SIZE: usize = 64 * 1024;

type Inbound = std::result::Result<Bytes, zkrust_core::Error>;
type EventSlot = Arc<parking_lot::Mutex<Option<mpsc::UnboundedSender<Bytes>>>>;

/// TCP transport for ZKTeco devices
pub struct TcpTransport {
    addr: String,
    port: u16,
    codec: FrameCodec,
    connect_timeout: Duration,
    link: parking_lot::Mutex<Option<Link>>,
}

/// Live connection state, replaced wholesale on reconnect
struct Link {
    peer: SocketAddr,
    writer: Arc<AsyncMutex<OwnedWriteHalf>>,
    replies: Arc<AsyncMutex<mpsc::UnboundedReceiver<Inbound>>>,
    events: EventSlot,
    reader: JoinHandle<()>,
}

impl TcpTransport {
    /// Create new TCP transport
    pub fn new(addr: impl Into<String>, port: u16) -> Self {
        Self {
            addr: addr.into(),
            port,
            codec: FrameCodec::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            link: parking_lot::Mutex::new(None),
        }
    }

    /// Set connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the sync pattern used to cut inbound frames
    pub fn with_sync_marker(mut self, marker: [u8; 4]) -> Self {
        self.codec = FrameCodec::new(marker);
        self
    }

    /// Resolve address to SocketAddr
    async fn resolve_addr(&self) -> Result<SocketAddr> {
        let addr_str = format!("{}:{}", self.addr, self.port);

        let mut addrs = tokio::net::lookup_host(&addr_str)
            .await
            .map_err(|e| Error::InvalidAddress(format!("{}: {}", addr_str, e)))?;

        addrs
            .next()
            .ok_or_else(|| Error::InvalidAddress(format!("No addresses found for {}", addr_str)))
    }

    fn replies(&self) -> Result<Arc<AsyncMutex<mpsc::UnboundedReceiver<Inbound>>>> {
        let link = self.link.lock();
        let link = link.as_ref().ok_or(Error::NotConnected)?;
        Ok(link.replies.clone())
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Err(Error::AlreadyConnected);
        }

        let addr = self.resolve_addr().await?;

        debug!("Connecting to {}...", addr);

        let stream = timeout(self.connect_timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| Error::ConnectionTimeout)?
            .map_err(Error::Io)?;

        // Disable Nagle's algorithm for low latency
        stream.set_nodelay(true)?;

        let (read_half, write_half) = stream.into_split();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let events: EventSlot = Arc::new(parking_lot::Mutex::new(None));

        let reader = tokio::spawn(read_loop(
            read_half,
            self.codec,
            reply_tx,
            events.clone(),
            addr,
        ));

        let stale = self.link.lock().replace(Link {
            peer: addr,
            writer: Arc::new(AsyncMutex::new(write_half)),
            replies: Arc::new(AsyncMutex::new(reply_rx)),
            events,
            reader,
        });
        if let Some(stale) = stale {
            // Previous link whose read loop had already ended
            stale.reader.abort();
            stale.events.lock().take();
        }

        debug!("Connected to {}", addr);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        let link = self.link.lock().take();

        if let Some(link) = link {
            debug!("Disconnecting from {}...", link.peer);

            link.reader.abort();
            link.events.lock().take();

            // Graceful shutdown
            let _ = link.writer.lock().await.shutdown().await;
        }

        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.link
            .lock()
            .as_ref()
            .is_some_and(|link| !link.reader.is_finished())
    }

    async fn send(&self, data: &[u8]) -> Result<()> {
        let writer = {
            let link = self.link.lock();
            let link = link.as_ref().ok_or(Error::NotConnected)?;
            link.writer.clone()
        };

        trace!(len = data.len(), head = %hex::encode(&data[..data.len().min(16)]), "Sending");

        let mut writer = writer.lock().await;
        writer.write_all(data).await.map_err(Error::WriteFailed)?;
        writer.flush().await.map_err(Error::WriteFailed)?;

        Ok(())
    }

    async fn await_next(&self, after: Duration) -> Result<Bytes> {
        let replies = self.replies()?;
        let mut replies = replies.lock().await;

        match timeout(after, replies.recv()).await {
            Err(_) => Err(Error::Timeout { after }),
            Ok(None) => Err(Error::Disconnected),
            Ok(Some(Ok(frame))) => Ok(frame),
            Ok(Some(Err(e))) => Err(Error::Malformed(e)),
        }
    }

    fn discard_pending(&self) -> usize {
        let Ok(replies) = self.replies() else {
            return 0;
        };
        // A parked waiter owns the queue; nothing is stale then
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
        let link = self.link.lock();
        let link = link.as_ref().ok_or(Error::NotConnected)?;

        let mut slot = link.events.lock();
        if slot.as_ref().is_some_and(|tx| !tx.is_closed()) {
            return Err(Error::AlreadySubscribed);
        }

        let (tx, rx) = mpsc::unbounded_channel();
        *slot = Some(tx);
        Ok(rx)
    }

    fn remote_addr(&self) -> String {
        self.link
            .lock()
            .as_ref()
            .map(|link| link.peer.to_string())
            .unwrap_or_else(|| format!("{}:{}", self.addr, self.port))
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        if let Some(link) = self.link.get_mut().take() {
            warn!("TCP transport dropped while still connected");
            link.reader.abort();
        }
    }
}

/// Demultiplexing read loop, one per connection
async fn read_loop(
    mut reader: OwnedReadHalf,
    codec: FrameCodec,
    replies: mpsc::UnboundedSender<Inbound>,
    events: EventSlot,
    peer: SocketAddr,
) {
    let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);

    'read: loop {
        if buf.capacity() - buf.len() < READ_BUFFER_SIZE / 4 {
            buf.reserve(READ_BUFFER_SIZE);
        }

        match reader.read_buf(&mut buf).await {
            Ok(0) => {
                debug!(%peer, "Connection closed by remote");
                break;
            }
            Ok(n) => trace!(%peer, n, "Received bytes"),
            Err(e) => {
                warn!(%peer, error = %e, "Read failed");
                break;
            }
        }

        loop {
            let frame = match codec.split_frame(&mut buf) {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    warn!(%peer, error = %e, discarded = buf.len(), "Stream desynchronized");
                    buf.clear();
                    if replies.send(Err(e)).is_err() {
                        break 'read;
                    }
                    break;
                }
            };

            if codec.is_event_frame(&frame) {
                match events.lock().as_ref() {
                    Some(tx) => {
                        if tx.send(frame).is_err() {
                            trace!(%peer, "Event listener gone, dropping event");
                        }
                    }
                    None => trace!(%peer, "No event listener, dropping event"),
                }
                continue;
            }

            trace!(%peer, frame = %frame::describe(&frame), len = frame.len(), "Reply frame");
            if replies.send(Ok(frame)).is_err() {
                break 'read;
            }
        }
    }

    events.lock().take();
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::net::TcpListener;
    use zkrust_core::Command;

    async fn listen() -> (TcpListener, TcpTransport) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, TcpTransport::new("127.0.0.1", port))
    }

    fn encode(command: Command, payload: &[u8]) -> Bytes {
        FrameCodec::default().encode(command.into(), 7, 1, payload).unwrap()
    }

    #[tokio::test]
    async fn test_tcp_transport_create() {
        let transport = TcpTransport::new("192.168.1.201", 4370);
        assert!(!transport.is_connected());
        assert_eq!(transport.remote_addr(), "192.168.1.201:4370");
    }

    #[tokio::test]
    async fn test_tcp_transport_invalid_address() {
        let transport = TcpTransport::new("invalid..address", 4370)
            .with_connect_timeout(Duration::from_millis(100));

        assert!(transport.connect().await.is_err());
    }

    #[tokio::test]
    async fn test_close_without_connection() {
        let transport = TcpTransport::new("127.0.0.1", 4370);
        transport.close().await.unwrap();
        transport.close().await.unwrap();

        assert!(matches!(transport.send(&[1]).await, Err(Error::NotConnected)));
        assert!(matches!(
            transport.await_next(Duration::from_millis(10)).await,
            Err(Error::NotConnected)
        ));
    }

    #[tokio::test]
    async fn test_reassembles_segments_and_routes_events() {
        let (listener, transport) = listen().await;
        let reply = encode(Command::AckOk, &[1, 2, 3, 4]);
        let event = encode(Command::RegEvent, &[9; 40]);

        let device = {
            let reply = reply.clone();
            let event = event.clone();
            tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                socket.write_all(&reply[..10]).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;

                socket.write_all(&reply[10..]).await.unwrap();
                socket.write_all(&event).await.unwrap();
                socket.write_all(&reply).await.unwrap();
                tokio::time::sleep(Duration::from_millis(200)).await;
            })
        };

        transport.connect().await.unwrap();
        let mut events = transport.subscribe_events().unwrap();
        assert!(matches!(
            transport.subscribe_events(),
            Err(Error::AlreadySubscribed)
        ));

        let first = transport.await_next(Duration::from_secs(2)).await.unwrap();
        assert_eq!(first, reply);

        let second = transport.await_next(Duration::from_secs(2)).await.unwrap();
        assert_eq!(second, reply);

        assert_eq!(events.recv().await.unwrap(), event);

        device.await.unwrap();
        transport.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_peer_close_wakes_waiter() {
        let (listener, transport) = listen().await;

        let device = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            drop(socket);
        });

        transport.connect().await.unwrap();
        let mut events = transport.subscribe_events().unwrap();

        let result = transport.await_next(Duration::from_secs(5)).await;
        assert!(matches!(result, Err(Error::Disconnected)));
        assert_eq!(events.recv().await, None);
        assert!(!transport.is_connected());

        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_during_wait() {
        let (listener, transport) = listen().await;
        let transport = Arc::new(transport);

        let device = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(500)).await;
            drop(socket);
        });

        transport.connect().await.unwrap();

        let waiter = {
            let transport = transport.clone();
            tokio::spawn(async move { transport.await_next(Duration::from_secs(5)).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        transport.close().await.unwrap();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(Error::Disconnected)));
        assert!(!transport.is_connected());

        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_wait_times_out() {
        let (listener, transport) = listen().await;

        let device = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(200)).await;
            drop(socket);
        });

        transport.connect().await.unwrap();

        let result = transport.await_next(Duration::from_millis(30)).await;
        assert!(matches!(result, Err(Error::Timeout { .. })));
        assert!(transport.is_connected());

        transport.close().await.unwrap();
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_garbage_reported_as_malformed() {
        let (listener, transport) = listen().await;
        let reply = encode(Command::AckOk, &[]);

        let device = {
            let reply = reply.clone();
            tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                socket.write_all(&[0xAB; 12]).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(50)).await;
                socket.write_all(&reply).await.unwrap();
                tokio::time::sleep(Duration::from_millis(200)).await;
            })
        };

        transport.connect().await.unwrap();

        let result = transport.await_next(Duration::from_secs(2)).await;
        assert!(matches!(result, Err(Error::Malformed(_))));

        // Stream resynchronizes on the next frame boundary
        let next = transport.await_next(Duration::from_secs(2)).await.unwrap();
        assert_eq!(next, reply);

        transport.close().await.unwrap();
        device.await.unwrap();
    }

    #[tokio::test]
    async fn test_discard_pending() {
        let (listener, transport) = listen().await;
        let reply = encode(Command::AckOk, &[]);

        let device = {
            let reply = reply.clone();
            tokio::spawn(async move {
                let (mut socket, _) = listener.accept().await.unwrap();
                socket.write_all(&reply).await.unwrap();
                socket.write_all(&reply).await.unwrap();
                tokio::time::sleep(Duration::from_millis(200)).await;
            })
        };

        transport.connect().await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(transport.discard_pending(), 2);
        assert!(matches!(
            transport.await_next(Duration::from_millis(20)).await,
            Err(Error::Timeout { .. })
        ));

        transport.close().await.unwrap();
        device.await.unwrap();
    }
}
