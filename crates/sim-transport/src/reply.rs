//! Reply channel shared by every request.

use crate::error::TransportError;
use crate::request::{CardRequest, RequestTag};
use tokio::sync::mpsc;

/// Successful reply contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyPayload {
    /// Transparent file contents or one record.
    Bytes(Vec<u8>),
    /// All records of a linear fixed file.
    Records(Vec<Vec<u8>>),
    /// An update completed.
    Written,
}

/// Terminal reply for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportReply {
    pub tag: RequestTag,
    pub result: Result<ReplyPayload, TransportError>,
}

impl TransportReply {
    /// Bytes of a read reply, or the error that ended it.
    ///
    /// Non-byte payloads are reported as [`TransportError::UnexpectedPayload`].
    pub fn bytes(&self) -> Result<&[u8], TransportError> {
        match &self.result {
            Ok(ReplyPayload::Bytes(data)) => Ok(data),
            Ok(_) => Err(TransportError::UnexpectedPayload),
            Err(err) => Err(err.clone()),
        }
    }
}

/// Cloneable handle into the single dispatch channel.
///
/// Transports may deliver from any thread; the receiving side processes
/// replies one at a time.
#[derive(Debug, Clone)]
pub struct ReplySink {
    tx: mpsc::UnboundedSender<TransportReply>,
}

impl ReplySink {
    /// Create a sink and the receiver that drains it.
    pub fn channel() -> (ReplySink, mpsc::UnboundedReceiver<TransportReply>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ReplySink { tx }, rx)
    }

    /// Deliver a reply. Returns `false` if the receiver is gone.
    pub fn deliver(&self, tag: RequestTag, result: Result<ReplyPayload, TransportError>) -> bool {
        let delivered = self.tx.send(TransportReply { tag, result }).is_ok();
        if !delivered {
            tracing::trace!(%tag, "reply dropped, receiver closed");
        }
        delivered
    }
}

/// The card I/O collaborator.
///
/// `submit` must not block; the reply for `tag` arrives later through `sink`.
pub trait CardTransport: Send + Sync {
    fn submit(&self, tag: RequestTag, request: CardRequest, sink: &ReplySink);
}
