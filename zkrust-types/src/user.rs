//! 72-byte user records

use byteorder::{ByteOrder, LittleEndian};

use crate::error::Result;
use crate::record::{FixedWidthRecord, c_string};

/// Enrolled user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Internal slot number
    pub uid: u16,

    /// Privilege level (0 = user, 14 = admin)
    pub role: u8,

    pub password: String,

    pub name: String,

    pub card_no: u32,

    pub group_id: String,

    /// User id as shown on the terminal
    pub user_id: String,
}

impl FixedWidthRecord for User {
    const NAME: &'static str = "user";
    const WIDTH: usize = 72;

    fn decode(bytes: &[u8]) -> Result<Self> {
        Self::ensure_len(bytes, Self::WIDTH)?;

        Ok(Self {
            uid: LittleEndian::read_u16(&bytes[0..2]),
            role: bytes[2],
            password: c_string(&bytes[3..11]),
            name: c_string(&bytes[11..35]),
            card_no: LittleEndian::read_u32(&bytes[35..39]),
            group_id: c_string(&bytes[40..47]),
            user_id: c_string(&bytes[48..72]),
        })
    }
}

impl User {
    /// Whether the user holds admin privilege
    pub fn is_admin(&self) -> bool {
        self.role == 14
    }
}
