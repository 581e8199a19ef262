//! Protocol errors
//!
//! Every variant that can be traced back to a command carries it, and
//! connection-level failures carry the endpoint they happened on.

use std::io;
use std::time::Duration;

use bytes::Bytes;
use zkrust_core::Command;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Header or length defect; fatal to the current exchange
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[from] zkrust_core::Error),

    #[error("{command} could not be written to {endpoint}: {source}")]
    WriteFailed {
        command: Command,
        endpoint: String,
        #[source]
        source: io::Error,
    },

    #[error("{command} payload of {size} bytes exceeds the {max}-byte frame limit")]
    PayloadTooLarge {
        command: Command,
        size: usize,
        max: usize,
    },

    #[error("{command} got no data within {after:?}")]
    Timeout { command: Command, after: Duration },

    #[error("Connection to {endpoint} lost during {command}")]
    Disconnected { command: Command, endpoint: String },

    #[error("Connection closed before {command} was answered")]
    NoReply { command: Command },

    #[error("Auth reply too short: {len} bytes")]
    InvalidAuthResponse { len: usize },

    #[error("Device assigned session id 0")]
    InvalidSessionId,

    #[error("Unexpected reply to {command}: code {code}")]
    UnexpectedReply { command: Command, code: u16 },

    #[error("Session state: {0}")]
    Session(#[source] zkrust_core::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] zkrust_transport::Error),
}

impl Error {
    /// Map a transport failure that happened while `command` was in flight
    pub(crate) fn during(
        err: zkrust_transport::Error,
        command: Command,
        endpoint: impl Into<String>,
    ) -> Self {
        use zkrust_transport::Error as T;

        match err {
            T::WriteFailed(source) => Self::WriteFailed {
                command,
                endpoint: endpoint.into(),
                source,
            },
            T::Timeout { after } => Self::Timeout { command, after },
            T::Disconnected | T::NotConnected => Self::Disconnected {
                command,
                endpoint: endpoint.into(),
            },
            T::Malformed(e) => Self::MalformedFrame(e),
            other => Self::Transport(other),
        }
    }

    /// Map a codec failure while building the frame for `command`
    pub(crate) fn encoding(err: zkrust_core::Error, command: Command) -> Self {
        match err {
            zkrust_core::Error::PayloadTooLarge { size, max } => {
                Self::PayloadTooLarge { command, size, max }
            }
            other => Self::MalformedFrame(other),
        }
    }

    /// Whether the connection is gone, as opposed to a slow or confused peer
    pub fn is_disconnect(&self) -> bool {
        matches!(
            self,
            Self::Disconnected { .. } | Self::NoReply { .. } | Self::WriteFailed { .. }
        )
    }
}

/// A bulk transfer that stopped early
///
/// `partial` holds every byte moved before `error` ended the transfer; the
/// caller decides whether it is still useful.
#[derive(Debug, thiserror::Error)]
#[error("Bulk transfer stopped after {} of {total} bytes: {error}", .partial.len())]
pub struct Incomplete {
    pub partial: Bytes,

    /// Declared size of the transfer (0 if it never got that far)
    pub total: usize,

    #[source]
    pub error: Error,
}

impl Incomplete {
    pub fn new(partial: impl Into<Bytes>, total: usize, error: Error) -> Self {
        Self {
            partial: partial.into(),
            total,
            error,
        }
    }
}

impl From<Error> for Incomplete {
    fn from(error: Error) -> Self {
        Self::new(Bytes::new(), 0, error)
    }
}
