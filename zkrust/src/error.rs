//! High-level error types

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Protocol error: {0}")]
    Protocol(#[from] zkrust_protocol::Error),

    /// Bulk read or write that stopped early; the partial bytes are kept
    #[error(transparent)]
    Incomplete(#[from] zkrust_protocol::Incomplete),

    #[error("Type error: {0}")]
    Types(#[from] zkrust_types::Error),

    #[error("Device not connected")]
    NotConnected,
}
