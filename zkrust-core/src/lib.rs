//! # zkrust-core
//!
//! Core protocol implementation for ZKTeco biometric devices.
//!
//! This crate provides the low-level protocol primitives:
//! - Stream frame and command packet encoding/decoding
//! - Checksum calculation
//! - Command definitions and protocol constants
//! - Session state and credential encodings

pub mod auth;
pub mod checksum;
pub mod command;
pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod packet;
pub mod session;

pub use auth::make_commkey;
pub use command::Command;
pub use config::ProtocolConfig;
pub use constants::EventFlags;
pub use error::{Error, Result};
pub use frame::FrameCodec;
pub use packet::Packet;
pub use session::{Session, SessionState};

/// Default device port
pub const DEFAULT_PORT: u16 = 4370;
