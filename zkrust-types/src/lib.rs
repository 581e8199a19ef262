//! Type definitions for zkrust
//!
//! Fixed-width record codecs for the buffers a bulk transfer reassembles,
//! and the device time formats they embed.

pub mod attendance;
pub mod device_info;
pub mod error;
pub mod realtime;
pub mod record;
pub mod time;
pub mod user;

pub use attendance::Attendance;
pub use device_info::{Capacity, DeviceInfo};
pub use error::{Error, Result};
pub use realtime::RealTimeLog;
pub use record::{FixedWidthRecord, decode_records};
pub use user::User;
