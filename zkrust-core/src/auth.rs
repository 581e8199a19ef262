//! Credential encodings for `CMD_AUTH`
//!
//! Two schemes exist in the field:
//! - the digest scheme: SHA-256 of the password followed by an 8-byte
//!   timestamp, sent right after `CMD_CONNECT`
//! - the CommKey scheme: a 4-byte scramble of a numeric password with the
//!   session id, used by firmware that answers `CMD_ACK_UNAUTH`

use bytes::{BufMut, Bytes, BytesMut};
use sha2::{Digest, Sha256};

/// Length of the password digest
pub const DIGEST_SIZE: usize = 32;

/// Length of the digest-scheme auth payload
pub const AUTH_PAYLOAD_SIZE: usize = DIGEST_SIZE + 8;

/// Build the digest-scheme payload
///
/// The timestamp (little-endian, caller's clock) keeps two payloads for the
/// same password from being identical.
///
/// # Examples
///
/// ```
/// use zkrust_core::auth;
///
/// let payload = auth::digest_payload("1234", 1_700_000_000);
/// assert_eq!(payload.len(), auth::AUTH_PAYLOAD_SIZE);
/// ```
pub fn digest_payload(password: &str, timestamp: i64) -> Bytes {
    let digest = Sha256::digest(password.as_bytes());

    let mut buf = BytesMut::with_capacity(AUTH_PAYLOAD_SIZE);
    buf.put_slice(&digest);
    buf.put_i64_le(timestamp);
    buf.freeze()
}

/// Create a CommKey authentication key from password and session_id
///
/// # Algorithm
///
/// 1. Reverse bits of the password
/// 2. Add session_id to reversed password
/// 3. XOR with 'Z', 'K', 'S', 'O' bytes
/// 4. Swap the two 16-bit halves
/// 5. XOR with ticks value (the third byte is replaced by it)
///
/// # Examples
///
/// ```
/// use zkrust_core::auth;
///
/// let auth_key = auth::make_commkey(0, 32031, 50);
/// assert_eq!(auth_key.len(), 4);
/// ```
pub fn make_commkey(password: u32, session_id: u16, ticks: u8) -> Bytes {
    let k = password.reverse_bits().wrapping_add(session_id as u32);

    let b = k.to_le_bytes();
    let xored = [b[0] ^ b'Z', b[1] ^ b'K', b[2] ^ b'S', b[3] ^ b'O'];

    // Halves swapped, then mixed with ticks
    let key = [
        xored[2] ^ ticks,
        xored[3] ^ ticks,
        ticks,
        xored[1] ^ ticks,
    ];

    Bytes::copy_from_slice(&key)
}
