//! Session management for ZKTeco protocol
//!
//! A session represents one connection to a device and tracks:
//! - Session ID (assigned by device)
//! - Sequence counter (increments per command, reset on connect)
//! - Authentication state and timestamp

use std::sync::Arc;
use std::sync::atomic::{AtomicU16, Ordering};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::constants::DEFAULT_SESSION_TTL;
use crate::error::{Error, Result};

/// Session state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Not connected
    Disconnected,

    /// Connected but not authenticated
    Connected,

    /// Authenticated and ready for commands
    Authenticated,
}

/// Session manager
///
/// Owned by one connection; clones share the same state.
#[derive(Debug, Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Debug)]
struct SessionInner {
    /// Session ID assigned by device (0 when not connected)
    session_id: AtomicU16,

    /// Last sequence id handed out (0 right after connect)
    sequence: AtomicU16,

    state: parking_lot::RwLock<SessionState>,

    authenticated_at: parking_lot::RwLock<Option<Instant>>,

    ttl: Duration,
}

impl Session {
    /// Create a new disconnected session with the default 30 minute TTL
    pub fn new() -> Self {
        Self::with_ttl(DEFAULT_SESSION_TTL)
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                session_id: AtomicU16::new(0),
                sequence: AtomicU16::new(0),
                state: parking_lot::RwLock::new(SessionState::Disconnected),
                authenticated_at: parking_lot::RwLock::new(None),
                ttl,
            }),
        }
    }

    /// Get current session ID
    pub fn session_id(&self) -> u16 {
        self.inner.session_id.load(Ordering::Acquire)
    }

    /// Sequence id of the most recent command
    pub fn sequence_id(&self) -> u16 {
        self.inner.sequence.load(Ordering::Acquire)
    }

    /// Get current state
    pub fn state(&self) -> SessionState {
        *self.inner.state.read()
    }

    /// Check if connected
    pub fn is_connected(&self) -> bool {
        !matches!(self.state(), SessionState::Disconnected)
    }

    /// Check if authenticated
    pub fn is_authenticated(&self) -> bool {
        matches!(self.state(), SessionState::Authenticated)
    }

    /// When the last successful authentication happened
    pub fn authenticated_at(&self) -> Option<Instant> {
        *self.inner.authenticated_at.read()
    }

    /// Forget the session: id and sequence back to 0
    ///
    /// Called before every connect command and on close.
    pub fn reset(&self) {
        let mut state = self.inner.state.write();
        self.inner.session_id.store(0, Ordering::Release);
        self.inner.sequence.store(0, Ordering::Release);
        *self.inner.authenticated_at.write() = None;
        *state = SessionState::Disconnected;
    }

    /// Record the device-assigned session ID from a connect reply
    pub fn establish(&self, session_id: u16) -> Result<()> {
        let mut state = self.inner.state.write();

        if *state != SessionState::Disconnected {
            return Err(Error::InvalidSessionState(format!(
                "Cannot establish from state: {:?}",
                *state
            )));
        }

        self.inner.session_id.store(session_id, Ordering::Release);
        *state = SessionState::Connected;

        debug!(session_id, "Session established");
        Ok(())
    }

    /// Mark session as authenticated under `session_id`
    pub fn authenticate(&self, session_id: u16) -> Result<()> {
        let mut state = self.inner.state.write();

        if *state != SessionState::Connected {
            return Err(Error::InvalidSessionState(format!(
                "Cannot authenticate from state: {:?}",
                *state
            )));
        }

        self.inner.session_id.store(session_id, Ordering::Release);
        *self.inner.authenticated_at.write() = Some(Instant::now());
        *state = SessionState::Authenticated;

        debug!(session_id, "Session authenticated");
        Ok(())
    }

    /// Whether the authentication is still within its TTL
    ///
    /// Advisory only: nothing re-authenticates automatically.
    pub fn validate(&self) -> bool {
        self.is_authenticated()
            && self
                .authenticated_at()
                .is_some_and(|at| at.elapsed() < self.inner.ttl)
    }

    /// Allocate the next sequence id, wrapping at `u16::MAX`
    pub fn next_sequence_id(&self) -> u16 {
        self.inner
            .sequence
            .fetch_add(1, Ordering::AcqRel)
            .wrapping_add(1)
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_new() {
        let session = Session::new();
        assert_eq!(session.session_id(), 0);
        assert_eq!(session.sequence_id(), 0);
        assert_eq!(session.state(), SessionState::Disconnected);
        assert!(!session.is_connected());
        assert!(!session.validate());
    }

    #[test]
    fn test_session_establish() {
        let session = Session::new();
        session.establish(1234).unwrap();

        assert_eq!(session.session_id(), 1234);
        assert_eq!(session.state(), SessionState::Connected);
        assert!(!session.is_authenticated());
        assert!(!session.validate());
    }

    #[test]
    fn test_session_authenticate() {
        let session = Session::new();
        session.establish(1234).unwrap();
        session.authenticate(4321).unwrap();

        assert_eq!(session.session_id(), 4321);
        assert!(session.is_authenticated());
        assert!(session.authenticated_at().is_some());
        assert!(session.validate());
    }

    #[test]
    fn test_session_expiry() {
        let session = Session::with_ttl(Duration::ZERO);
        session.establish(1).unwrap();
        session.authenticate(1).unwrap();

        assert!(session.is_authenticated());
        assert!(!session.validate());
    }

    #[test]
    fn test_session_reset() {
        let session = Session::new();
        session.establish(1234).unwrap();
        session.authenticate(1234).unwrap();
        session.next_sequence_id();

        session.reset();

        assert_eq!(session.session_id(), 0);
        assert_eq!(session.sequence_id(), 0);
        assert_eq!(session.authenticated_at(), None);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn test_sequence_generation() {
        let session = Session::new();

        assert_eq!(session.next_sequence_id(), 1);
        assert_eq!(session.next_sequence_id(), 2);
        assert_eq!(session.sequence_id(), 2);
    }

    #[test]
    fn test_sequence_wrap() {
        let session = Session::new();

        for _ in 0..u16::MAX {
            session.next_sequence_id();
        }

        assert_eq!(session.sequence_id(), u16::MAX);
        assert_eq!(session.next_sequence_id(), 0);
    }

    #[test]
    fn test_invalid_state_transitions() {
        let session = Session::new();

        // Cannot authenticate without connecting
        assert!(session.authenticate(1).is_err());

        // Cannot establish twice
        session.establish(100).unwrap();
        assert!(session.establish(200).is_err());
    }

    #[test]
    fn test_session_clone() {
        let session1 = Session::new();
        session1.establish(1234).unwrap();

        let session2 = session1.clone();
        assert_eq!(session2.session_id(), 1234);

        session1.authenticate(1234).unwrap();
        assert!(session2.is_authenticated());
    }
}
