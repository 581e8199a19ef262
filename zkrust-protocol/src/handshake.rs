//! Session establishment and authentication

use tracing::{debug, info, warn};

use zkrust_core::{Command, Packet, auth, make_commkey};

use crate::connection::{Connection, Reply};
use crate::error::{Error, Result};

/// Tick value mixed into the CommKey
const COMMKEY_TICKS: u8 = 50;

/// Shortest auth reply that still holds a session id
const MIN_AUTH_REPLY: usize = 6;

impl Connection {
    /// Open the socket if needed and send `CMD_CONNECT`
    ///
    /// The reply is returned so callers can see whether the device wants
    /// authentication (`CMD_ACK_UNAUTH`).
    pub async fn connect(&self) -> Result<Packet> {
        if !self.transport.is_connected() {
            self.transport.connect().await?;
        }

        info!("Connecting to {}...", self.endpoint());

        let reply = self.execute(Command::Connect, &[]).await?;

        match reply.command() {
            Some(Command::AckOk) => {
                info!(session_id = reply.session_id, "Connected");
            }
            Some(Command::AckUnauth) => {
                info!(
                    session_id = reply.session_id,
                    "Connected, device requires authentication"
                );
            }
            _ => {
                self.session.reset();
                return Err(Error::UnexpectedReply {
                    command: Command::Connect,
                    code: reply.code,
                });
            }
        }

        Ok(reply)
    }

    /// Connect, then authenticate with a digest of `password`
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidAuthResponse`] if the reply is shorter than 6 bytes
    /// - [`Error::InvalidSessionId`] if the reply carries session id 0
    pub async fn connect_with_auth(&self, password: &str) -> Result<()> {
        self.session.reset();
        self.connect().await?;

        let payload = auth::digest_payload(password, chrono::Utc::now().timestamp());
        let reply = self.execute_raw(Command::Auth, &payload).await?;

        if reply.len() < MIN_AUTH_REPLY {
            return Err(Error::InvalidAuthResponse { len: reply.len() });
        }

        let session_id = u16::from_le_bytes([reply[4], reply[5]]);
        if session_id == 0 {
            return Err(Error::InvalidSessionId);
        }

        self.session
            .authenticate(session_id)
            .map_err(Error::Session)?;

        info!(session_id, "Authenticated");
        Ok(())
    }

    /// Answer `CMD_ACK_UNAUTH` with a CommKey built from a numeric password
    pub async fn authenticate_commkey(&self, password: u32) -> Result<()> {
        let session_id = self.session.session_id();
        let key = make_commkey(password, session_id, COMMKEY_TICKS);

        debug!(session_id, "Sending CommKey");

        self.execute(Command::Auth, &key)
            .await?
            .ensure_ok(Command::Auth)?;

        self.session
            .authenticate(session_id)
            .map_err(Error::Session)?;

        info!(session_id, "Authenticated");
        Ok(())
    }

    /// Whether the last authentication is younger than the session TTL
    ///
    /// Nothing re-authenticates automatically; callers decide what to do
    /// with a stale session.
    pub fn validate_session(&self) -> bool {
        self.session.validate()
    }

    /// Leave the session: best-effort `CMD_EXIT`, then close the socket
    ///
    /// Safe to call when nothing is connected.
    pub async fn disconnect(&self) -> Result<()> {
        self.unsubscribe();

        // Busy lock: an exchange is in flight and ends with Disconnected on close
        match self.exchange.try_lock() {
            Ok(_exchange) => {
                if self.is_connected() {
                    info!("Disconnecting from {}...", self.endpoint());

                    if let Err(e) = self.transact(Command::Exit, &[]).await {
                        warn!(error = %e, "Failed to send EXIT command");
                    }
                }
            }
            Err(_) => {
                info!("Disconnecting from {} mid-exchange", self.endpoint());
            }
        }

        self.transport.close().await?;
        self.session.reset();

        debug!("Disconnected");
        Ok(())
    }
}
