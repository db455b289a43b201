//! Transport error types.

use sim_records_types::FileId;
use thiserror::Error;

/// A card request failed.
///
/// Read failures are recovered by the engine (the field stays absent or a
/// resolver moves to its next source); write failures reach the caller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("file {0} not found")]
    FileNotFound(FileId),

    #[error("record {record} out of range for {file}")]
    RecordOutOfRange { file: FileId, record: u8 },

    #[error("{file} has the wrong structure for this command")]
    WrongStructure { file: FileId },

    #[error("invalid data length for {file}: expected {expected}, got {actual}")]
    InvalidLength {
        file: FileId,
        expected: usize,
        actual: usize,
    },

    #[error("reply payload does not match the request")]
    UnexpectedPayload,

    #[error("card removed")]
    CardRemoved,

    #[error("card I/O failed: {0}")]
    Io(String),
}
