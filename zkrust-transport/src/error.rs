//! Transport errors

use std::io;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Not connected")]
    NotConnected,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("Connection timeout")]
    ConnectionTimeout,

    #[error("Write failed: {0}")]
    WriteFailed(#[source] io::Error),

    #[error("No data within {after:?}")]
    Timeout { after: Duration },

    #[error("Connection closed")]
    Disconnected,

    #[error("Malformed frame on the wire: {0}")]
    Malformed(#[from] zkrust_core::Error),

    #[error("Event listener already attached")]
    AlreadySubscribed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}
