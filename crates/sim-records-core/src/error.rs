//! Engine error types.

use sim_codec::EncodeError;
use sim_transport::{RequestTag, TransportError};
use thiserror::Error;

/// Failure of a consumer-requested write.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    /// The operator fixed the voicemail number; nothing was written.
    #[error("voicemail number is fixed by the operator")]
    FixedByOperator,

    #[error("no writable location for this value on the card")]
    NotSupported,

    #[error("cannot encode value: {0}")]
    Encode(#[from] EncodeError),

    #[error("card write failed: {0}")]
    Transport(TransportError),

    #[error("all {attempts} card writes failed, last error: {last}")]
    AllWritesFailed {
        attempts: usize,
        last: TransportError,
    },

    #[error("no card available")]
    CardUnavailable,

    #[error("record service stopped")]
    ServiceStopped,
}

/// An internal contract was broken. Logged and counted, never surfaced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    #[error("ledger settled more often than issued")]
    LedgerUnderflow,

    #[error("reply {tag} belongs to generation {}, current is {current}", .tag.generation())]
    StaleGeneration { tag: RequestTag, current: u32 },

    #[error("reply {0} does not match any outstanding request")]
    UnknownTag(RequestTag),
}
