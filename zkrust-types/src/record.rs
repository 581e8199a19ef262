//! Slicing reassembled buffers into fixed-width records

use crate::error::{Error, Result};

/// Bytes of the size header preceding the records of a bulk read
pub const BUFFER_HEADER_SIZE: usize = 4;

/// A record with a fixed byte width on the wire
pub trait FixedWidthRecord: Sized {
    /// Name used in errors and logs
    const NAME: &'static str;

    /// Bytes per record
    const WIDTH: usize;

    /// Decode one record from exactly `WIDTH` (or more) bytes
    fn decode(bytes: &[u8]) -> Result<Self>;

    /// Fail with [`Error::RecordTooShort`] when fewer than `min` bytes are given
    fn ensure_len(bytes: &[u8], min: usize) -> Result<()> {
        if bytes.len() < min {
            return Err(Error::RecordTooShort {
                record: Self::NAME,
                expected: min,
                actual: bytes.len(),
            });
        }
        Ok(())
    }
}

/// Decode every record of a reassembled bulk buffer
///
/// Skips the 4-byte size header, then decodes consecutive `R::WIDTH`
/// slices. Trailing bytes that do not fill a whole record are ignored.
pub fn decode_records<R: FixedWidthRecord>(buffer: &[u8]) -> Result<Vec<R>> {
    let Some(body) = buffer.get(BUFFER_HEADER_SIZE..) else {
        return Ok(Vec::new());
    };

    body.chunks_exact(R::WIDTH).map(R::decode).collect()
}

/// Read a NUL-terminated ASCII field
pub fn c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, PartialEq)]
    struct Pair(u8, u8);

    impl FixedWidthRecord for Pair {
        const NAME: &'static str = "pair";
        const WIDTH: usize = 2;

        fn decode(bytes: &[u8]) -> Result<Self> {
            Self::ensure_len(bytes, Self::WIDTH)?;
            Ok(Pair(bytes[0], bytes[1]))
        }
    }

    #[test]
    fn test_decode_records_skips_header() {
        let buffer = [4, 0, 0, 0, 1, 2, 3, 4, 5];
        let records: Vec<Pair> = decode_records(&buffer).unwrap();
        assert_eq!(records, vec![Pair(1, 2), Pair(3, 4)]);
    }

    #[test]
    fn test_decode_records_short_buffer() {
        let records: Vec<Pair> = decode_records(&[1, 2]).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_ensure_len() {
        assert_eq!(
            Pair::decode(&[1]),
            Err(Error::RecordTooShort {
                record: "pair",
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_c_string() {
        assert_eq!(c_string(b"1234\0\0garbage"), "1234");
        assert_eq!(c_string(b"full"), "full");
    }
}
