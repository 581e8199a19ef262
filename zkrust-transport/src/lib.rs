//! Transport layer for ZKTeco protocol
//!
//! A transport owns one physical connection. Inbound bytes are cut into
//! frames by a single read loop, which routes event frames to the event
//! listener and everything else to the reply queue.

pub mod error;
pub mod tcp;

pub use error::{Error, Result};
pub use tcp::TcpTransport;

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Receiving end of the event path
pub type EventReceiver = mpsc::UnboundedReceiver<Bytes>;

/// Transport trait for different communication methods
///
/// All methods take `&self`: `close` must be callable while another task
/// is parked in `await_next`, and every such waiter then observes
/// [`Error::Disconnected`].
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to device
    async fn connect(&self) -> Result<()>;

    /// Release the connection; a no-op when nothing is connected
    async fn close(&self) -> Result<()>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Send one encoded frame
    async fn send(&self, data: &[u8]) -> Result<()>;

    /// Next complete non-event frame, or [`Error::Timeout`] after `timeout`
    async fn await_next(&self, timeout: Duration) -> Result<Bytes>;

    /// Drop queued non-event frames nobody is waiting for
    fn discard_pending(&self) -> usize;

    /// Attach the event listener; at most one per connection
    fn subscribe_events(&self) -> Result<EventReceiver>;

    /// Get remote address
    fn remote_addr(&self) -> String;
}
