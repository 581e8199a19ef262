//! # zkrust
//!
//! Rust implementation of the ZKTeco Attendance device communication protocol.
//!
//! ## Features
//!
//! - Async/await API using Tokio
//! - Chunked bulk reads with partial results on failure
//! - Realtime attendance events alongside regular commands
//!
//! ## Quick Start
//!
//! ```no_run
//! use zkrust::Device;
//!
//! #[tokio::main]
//! async fn main() -> zkrust::Result<()> {
//!     // Connect to device
//!     let device = Device::new("192.168.1.201", 4370);
//!     device.connect().await?;
//!
//!     // Stored punches
//!     for record in device.get_attendances().await? {
//!         println!("{} at {}", record.user_id, record.timestamp);
//!     }
//!
//!     // Disconnect
//!     device.disconnect().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod device;
pub mod error;

// Re-exports
pub use device::Device;
pub use error::{Error, Result};

pub use zkrust_core::{Command, EventFlags, ProtocolConfig};
pub use zkrust_protocol::{BulkRequest, Connection, Incomplete};
pub use zkrust_types::{Attendance, Capacity, DeviceInfo, RealTimeLog, User};
