//! In-memory card used by tests and the CLI.
//!
//! Files live behind a `parking_lot::Mutex` so the card can be shared with
//! the service task while a test drives delivery from outside. Replies are
//! either delivered at submit time or held until released, in any order.

use crate::error::TransportError;
use crate::reply::{CardTransport, ReplyPayload, ReplySink};
use crate::request::{CardRequest, RequestTag};
use parking_lot::Mutex;
use sim_records_types::FileId;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

/// Contents of one elementary file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CardFile {
    Transparent(Vec<u8>),
    LinearFixed(Vec<Vec<u8>>),
}

/// When replies reach the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeliveryMode {
    /// Reply from inside `submit`.
    #[default]
    Immediate,
    /// Keep replies until [`SimulatedCard::release`] is called.
    Held,
}

struct HeldReply {
    tag: RequestTag,
    result: Result<ReplyPayload, TransportError>,
    sink: ReplySink,
}

#[derive(Default)]
struct CardState {
    files: BTreeMap<FileId, CardFile>,
    failures: HashMap<FileId, TransportError>,
    delivery: DeliveryMode,
    held: Vec<HeldReply>,
    log: Vec<(RequestTag, CardRequest)>,
}

/// Simulated card file system implementing [`CardTransport`].
#[derive(Default)]
pub struct SimulatedCard {
    state: Mutex<CardState>,
}

impl SimulatedCard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> SimulatedCardBuilder {
        SimulatedCardBuilder::default()
    }

    // =========================================================================
    // File contents
    // =========================================================================

    pub fn insert_file(&self, file: FileId, contents: CardFile) {
        self.state.lock().files.insert(file, contents);
    }

    pub fn remove_file(&self, file: FileId) -> Option<CardFile> {
        self.state.lock().files.remove(&file)
    }

    pub fn file(&self, file: FileId) -> Option<CardFile> {
        self.state.lock().files.get(&file).cloned()
    }

    /// Make every request for `file` fail with `error`.
    pub fn fail_file(&self, file: FileId, error: TransportError) {
        self.state.lock().failures.insert(file, error);
    }

    pub fn clear_failure(&self, file: FileId) {
        self.state.lock().failures.remove(&file);
    }

    // =========================================================================
    // Delivery control
    // =========================================================================

    pub fn set_delivery(&self, mode: DeliveryMode) {
        self.state.lock().delivery = mode;
    }

    /// Tags of replies waiting to be released, in submission order.
    pub fn pending_tags(&self) -> Vec<RequestTag> {
        self.state.lock().held.iter().map(|h| h.tag).collect()
    }

    /// Deliver the held reply for `tag`. Returns `false` if none is held.
    pub fn release(&self, tag: RequestTag) -> bool {
        let held = {
            let mut state = self.state.lock();
            let Some(pos) = state.held.iter().position(|h| h.tag == tag) else {
                return false;
            };
            state.held.remove(pos)
        };
        held.sink.deliver(held.tag, held.result);
        true
    }

    /// Deliver the held replies in the given order; unknown tags are skipped.
    pub fn release_in_order(&self, tags: &[RequestTag]) -> usize {
        tags.iter().filter(|tag| self.release(**tag)).count()
    }

    /// Deliver every held reply in submission order.
    pub fn release_all(&self) -> usize {
        let held = std::mem::take(&mut self.state.lock().held);
        let count = held.len();
        for reply in held {
            reply.sink.deliver(reply.tag, reply.result);
        }
        count
    }

    // =========================================================================
    // Request log
    // =========================================================================

    /// Every request submitted so far.
    pub fn requests(&self) -> Vec<(RequestTag, CardRequest)> {
        self.state.lock().log.clone()
    }

    /// Number of submitted requests touching `file`.
    pub fn request_count(&self, file: FileId) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|(_, req)| req.file() == file)
            .count()
    }

    fn execute(state: &mut CardState, request: &CardRequest) -> Result<ReplyPayload, TransportError> {
        let file_id = request.file();
        if let Some(error) = state.failures.get(&file_id) {
            return Err(error.clone());
        }
        let file = state
            .files
            .get_mut(&file_id)
            .ok_or(TransportError::FileNotFound(file_id))?;

        match (request, file) {
            (CardRequest::ReadTransparent { .. }, CardFile::Transparent(data)) => {
                Ok(ReplyPayload::Bytes(data.clone()))
            }
            (CardRequest::ReadLinearFixed { record, .. }, CardFile::LinearFixed(records)) => {
                record_slot(records, file_id, *record).map(|r| ReplyPayload::Bytes(r.clone()))
            }
            (CardRequest::ReadLinearFixedAll { .. }, CardFile::LinearFixed(records)) => {
                Ok(ReplyPayload::Records(records.clone()))
            }
            (
                CardRequest::UpdateLinearFixed { record, data, .. },
                CardFile::LinearFixed(records),
            ) => {
                let slot = record_slot(records, file_id, *record)?;
                if slot.len() != data.len() {
                    return Err(TransportError::InvalidLength {
                        file: file_id,
                        expected: slot.len(),
                        actual: data.len(),
                    });
                }
                slot.clone_from(data);
                Ok(ReplyPayload::Written)
            }
            (CardRequest::UpdateTransparent { data, .. }, CardFile::Transparent(contents)) => {
                if contents.len() != data.len() {
                    return Err(TransportError::InvalidLength {
                        file: file_id,
                        expected: contents.len(),
                        actual: data.len(),
                    });
                }
                contents.clone_from(data);
                Ok(ReplyPayload::Written)
            }
            _ => Err(TransportError::WrongStructure { file: file_id }),
        }
    }
}

fn record_slot(
    records: &mut [Vec<u8>],
    file: FileId,
    record: u8,
) -> Result<&mut Vec<u8>, TransportError> {
    let index = (record as usize)
        .checked_sub(1)
        .ok_or(TransportError::RecordOutOfRange { file, record })?;
    records
        .get_mut(index)
        .ok_or(TransportError::RecordOutOfRange { file, record })
}

impl CardTransport for SimulatedCard {
    fn submit(&self, tag: RequestTag, request: CardRequest, sink: &ReplySink) {
        let mut state = self.state.lock();
        let result = Self::execute(&mut state, &request);
        match &result {
            Ok(ReplyPayload::Bytes(data)) => {
                trace!(%tag, %request, data = %hex::encode(data), "simulated card reply")
            }
            Ok(_) => trace!(%tag, %request, "simulated card reply"),
            Err(err) => debug!(%tag, %request, error = %err, "simulated card request failed"),
        }
        state.log.push((tag, request));

        let delivery = state.delivery;
        match delivery {
            DeliveryMode::Immediate => {
                drop(state);
                sink.deliver(tag, result);
            }
            DeliveryMode::Held => state.held.push(HeldReply {
                tag,
                result,
                sink: sink.clone(),
            }),
        }
    }
}

/// Builder for a [`SimulatedCard`] with preset files.
#[derive(Default)]
pub struct SimulatedCardBuilder {
    files: BTreeMap<FileId, CardFile>,
    failures: HashMap<FileId, TransportError>,
    delivery: DeliveryMode,
}

impl SimulatedCardBuilder {
    pub fn transparent(mut self, file: FileId, data: impl Into<Vec<u8>>) -> Self {
        self.files.insert(file, CardFile::Transparent(data.into()));
        self
    }

    pub fn records<I, R>(mut self, file: FileId, records: I) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<Vec<u8>>,
    {
        let records = records.into_iter().map(Into::into).collect();
        self.files.insert(file, CardFile::LinearFixed(records));
        self
    }

    pub fn failing(mut self, file: FileId, error: TransportError) -> Self {
        self.failures.insert(file, error);
        self
    }

    pub fn held(mut self) -> Self {
        self.delivery = DeliveryMode::Held;
        self
    }

    pub fn build(self) -> SimulatedCard {
        SimulatedCard {
            state: Mutex::new(CardState {
                files: self.files,
                failures: self.failures,
                delivery: self.delivery,
                ..Default::default()
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> SimulatedCard {
        SimulatedCard::builder()
            .transparent(FileId::IMSI, vec![0x08, 0x39, 0x01])
            .records(FileId::MSISDN, [vec![0xFF; 16], vec![0x00; 16]])
            .failing(FileId::SPN, TransportError::FileNotFound(FileId::SPN))
            .build()
    }

    #[test]
    fn test_immediate_reads() {
        let card = card();
        let (sink, mut rx) = ReplySink::channel();
        card.submit(RequestTag::new(1, 1), CardRequest::read(FileId::IMSI), &sink);
        card.submit(RequestTag::new(1, 2), CardRequest::read_record(FileId::MSISDN, 2), &sink);
        card.submit(RequestTag::new(1, 3), CardRequest::read(FileId::SPN), &sink);
        card.submit(RequestTag::new(1, 4), CardRequest::read_record(FileId::MSISDN, 3), &sink);

        assert_eq!(rx.try_recv().unwrap().bytes().unwrap(), &[0x08, 0x39, 0x01]);
        assert_eq!(rx.try_recv().unwrap().bytes().unwrap(), &[0x00; 16]);
        assert_eq!(
            rx.try_recv().unwrap().result,
            Err(TransportError::FileNotFound(FileId::SPN))
        );
        assert_eq!(
            rx.try_recv().unwrap().result,
            Err(TransportError::RecordOutOfRange {
                file: FileId::MSISDN,
                record: 3
            })
        );
        assert_eq!(card.request_count(FileId::MSISDN), 2);
    }

    #[test]
    fn test_held_replies_release_in_any_order() {
        let card = card();
        card.set_delivery(DeliveryMode::Held);
        let (sink, mut rx) = ReplySink::channel();
        let first = RequestTag::new(2, 1);
        let second = RequestTag::new(2, 2);
        card.submit(first, CardRequest::read(FileId::IMSI), &sink);
        card.submit(second, CardRequest::read_record(FileId::MSISDN, 1), &sink);
        assert!(rx.try_recv().is_err());
        assert_eq!(card.pending_tags(), vec![first, second]);

        assert_eq!(card.release_in_order(&[second, first, second]), 2);
        assert_eq!(rx.try_recv().unwrap().tag, second);
        assert_eq!(rx.try_recv().unwrap().tag, first);
        assert!(card.pending_tags().is_empty());
    }

    #[test]
    fn test_updates_change_contents() {
        let card = card();
        let (sink, mut rx) = ReplySink::channel();
        card.submit(
            RequestTag::new(1, 1),
            CardRequest::UpdateLinearFixed {
                file: FileId::MSISDN,
                record: 1,
                data: vec![0x11; 16],
            },
            &sink,
        );
        assert_eq!(rx.try_recv().unwrap().result, Ok(ReplyPayload::Written));
        match card.file(FileId::MSISDN) {
            Some(CardFile::LinearFixed(records)) => assert_eq!(records[0], vec![0x11; 16]),
            other => panic!("unexpected file {other:?}"),
        }

        card.submit(
            RequestTag::new(1, 2),
            CardRequest::UpdateTransparent {
                file: FileId::IMSI,
                data: vec![0x00; 2],
            },
            &sink,
        );
        assert!(matches!(
            rx.try_recv().unwrap().result,
            Err(TransportError::InvalidLength { expected: 3, actual: 2, .. })
        ));
    }

    #[test]
    fn test_wrong_structure() {
        let card = card();
        let (sink, mut rx) = ReplySink::channel();
        card.submit(RequestTag::new(1, 1), CardRequest::read(FileId::MSISDN), &sink);
        assert_eq!(
            rx.try_recv().unwrap().result,
            Err(TransportError::WrongStructure {
                file: FileId::MSISDN
            })
        );
    }
}
