//! Realtime event stream
//!
//! The transport read loop already separates event frames from replies,
//! so the dispatch task below never competes with an exchange for frames.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use zkrust_core::{Command, FrameCodec, Session, constants::FRAME_HEADER_SIZE};
use zkrust_transport::{Error as TransportError, EventReceiver, Transport};
use zkrust_types::{FixedWidthRecord, RealTimeLog};

use crate::connection::{Connection, Reply};
use crate::error::{Error, Result};

/// Sequence id used when acknowledging an event
const EVENT_ACK_SEQUENCE: u16 = u16::MAX - 1;

impl Connection {
    /// Register for events and deliver each decoded punch to `callback`
    ///
    /// Returns `Ok(false)` without sending anything if a subscription is
    /// already active. The stream runs until [`disconnect`](Self::disconnect)
    /// or [`unsubscribe`](Self::unsubscribe).
    pub async fn subscribe<F>(&self, callback: F) -> Result<bool>
    where
        F: FnMut(RealTimeLog) + Send + 'static,
    {
        if self.is_subscribed() {
            debug!("Already subscribed to events");
            return Ok(false);
        }

        // Attached before registering so no early event is lost
        let events = match self.transport.subscribe_events() {
            Ok(events) => events,
            Err(TransportError::AlreadySubscribed) => return Ok(false),
            Err(e) => return Err(Error::during(e, Command::RegEvent, self.endpoint())),
        };

        let flags = self.config.event_flags;
        self.execute(Command::RegEvent, &flags.bits().to_le_bytes())
            .await?
            .ensure_ok(Command::RegEvent)?;

        let task = tokio::spawn(dispatch(
            events,
            self.transport.clone(),
            self.session.clone(),
            self.codec,
            callback,
        ));
        if let Some(stale) = self.events.lock().replace(task) {
            stale.abort();
        }

        debug!(?flags, "Subscribed to events");
        Ok(true)
    }

    pub fn is_subscribed(&self) -> bool {
        self.events
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Stop delivering events; the device keeps sending them until disconnect
    pub fn unsubscribe(&self) {
        if let Some(task) = self.events.lock().take() {
            task.abort();
            debug!("Unsubscribed from events");
        }
    }
}

async fn dispatch<F>(
    mut events: EventReceiver,
    transport: Arc<dyn Transport>,
    session: Session,
    codec: FrameCodec,
    mut callback: F,
) where
    F: FnMut(RealTimeLog) + Send + 'static,
{
    while let Some(frame) = events.recv().await {
        let ack = codec.encode(
            Command::AckOk.into(),
            session.session_id(),
            EVENT_ACK_SEQUENCE,
            &[],
        );
        match ack {
            Ok(ack) => {
                if let Err(e) = transport.send(&ack).await {
                    debug!(error = %e, "Failed to acknowledge event");
                }
            }
            Err(e) => debug!(error = %e, "Failed to encode event ack"),
        }

        let body = match frame.get(FRAME_HEADER_SIZE..) {
            Some(body) if !body.is_empty() => body,
            _ => {
                trace!(len = frame.len(), "Event without body");
                continue;
            }
        };

        for record in body.chunks(RealTimeLog::WIDTH) {
            match RealTimeLog::decode(record) {
                Ok(log) => callback(log),
                Err(e) => warn!(error = %e, "Undecodable event"),
            }
        }
    }

    debug!("Event stream ended");
}
