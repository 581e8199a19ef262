//! # zkrust-protocol
//!
//! The protocol engine on top of a [`zkrust_transport::Transport`]:
//!
//! - [`Connection::execute`]: one command, one reply
//! - [`Connection::read_with_buffer`] / [`Connection::write_with_buffer`]:
//!   chunked bulk transfers with partial results on failure
//! - [`Connection::subscribe`]: realtime events
//! - [`Connection::connect_with_auth`] and friends: session handshake

pub mod bulk;
pub mod connection;
pub mod error;
pub mod events;
pub mod handshake;

#[cfg(test)]
mod testing;

pub use bulk::{BulkRequest, BulkResult, ChunkPlan};
pub use connection::{Connection, Reply};
pub use error::{Error, Incomplete, Result};
