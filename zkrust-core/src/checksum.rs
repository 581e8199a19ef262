//! ZKTeco checksum algorithm
//!
//! Ones-complement sum of the inner header (checksum field zeroed) and the
//! payload, read as little-endian 16-bit words. A trailing odd byte counts
//! as the low byte of a word.

use tracing::trace;

/// Calculate the inner-header checksum
///
/// # Examples
///
/// ```
/// use zkrust_core::checksum;
///
/// // CMD_CONNECT with a fresh session
/// assert_eq!(checksum::calculate(1000, 0, 0, &[]), 0xFC17);
/// ```
pub fn calculate(command: u16, session_id: u16, sequence_id: u16, payload: &[u8]) -> u16 {
    let header = [command, 0, session_id, sequence_id];

    let words = header.into_iter().chain(payload.chunks(2).map(|pair| match *pair {
        [lo, hi] => u16::from_le_bytes([lo, hi]),
        [lo] => lo as u16,
        _ => 0,
    }));

    let mut sum: u32 = 0;
    for word in words {
        sum += word as u32;
        if sum > 0xFFFF {
            sum -= 0xFFFF;
        }
    }

    let checksum = !(sum as u16);

    trace!(
        command,
        session_id,
        sequence_id,
        payload_len = payload.len(),
        checksum = format!("0x{:04X}", checksum),
        "Calculated checksum"
    );

    checksum
}

/// Verify checksum
pub fn verify(
    command: u16,
    session_id: u16,
    sequence_id: u16,
    payload: &[u8],
    expected: u16,
) -> bool {
    calculate(command, session_id, sequence_id, payload) == expected
}
