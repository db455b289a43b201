//! Codec error types.

use thiserror::Error;

/// A binary field could not be decoded.
///
/// Callers treat the affected field as absent; a decode error never aborts
/// the surrounding load cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("truncated field: needed {needed} bytes, {available} available")]
    Truncated { needed: usize, available: usize },

    #[error("empty field")]
    Empty,

    #[error("invalid length {length} for {field}")]
    InvalidLength { field: &'static str, length: usize },

    #[error("unsupported coding scheme 0x{0:02X}")]
    UnsupportedCoding(u8),

    #[error("uninitialized record")]
    Uninitialized,

    #[error("invalid {field}: {reason}")]
    Invalid {
        field: &'static str,
        reason: &'static str,
    },
}

impl DecodeError {
    pub(crate) fn truncated(needed: usize, available: usize) -> Self {
        DecodeError::Truncated { needed, available }
    }
}

/// A value cannot be represented in the target record format.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("character {0:?} is not a dialable digit")]
    InvalidDigit(char),

    #[error("{field} too long: {length} exceeds {max}")]
    TooLong {
        field: &'static str,
        length: usize,
        max: usize,
    },

    #[error("{0} is empty")]
    Empty(&'static str),

    #[error("record width {0} is too small")]
    RecordTooSmall(usize),
}
