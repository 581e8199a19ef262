pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("{record} record too short: expected {expected} bytes, got {actual}")]
    RecordTooShort {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid device time: {0}")]
    InvalidTime(String),
}
