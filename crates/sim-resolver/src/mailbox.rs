//! Voicemail number resolution and write planning.
//!
//! Reading: `EF_MBI` record 1 names the `EF_MBDN` record holding the voicemail
//! number. If the indicator is invalid, or the record is missing or empty, the
//! CPHS mailbox file (record 1) is used instead.
//!
//! Writing: the `EF_MBDN` record is written first when its index is known,
//! then the CPHS mailbox if the CPHS service table enables it.

use crate::{ReadOutcome, Transition};
use sim_codec::service_info::decode_mailbox_index;
use sim_codec::AdnRecord;
use sim_records_types::FileId;
use sim_transport::CardRequest;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MailboxState {
    #[default]
    Idle,
    ReadingIndicator,
    ReadingPrimary {
        index: u8,
    },
    ReadingLegacy,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxEvent<'a> {
    Start,
    ReadDone(ReadOutcome<'a>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailboxEffect {
    Read(CardRequest),
    /// Valid `EF_MBDN` index from the indicator, needed for later writes.
    RememberIndex(u8),
    /// Record width of a number file, needed to encode writes.
    RememberRecordSize { file: FileId, size: usize },
    Publish(AdnRecord),
}

fn legacy_read() -> MailboxEffect {
    MailboxEffect::Read(CardRequest::read_record(FileId::MAILBOX_CPHS, 1))
}

/// Advance the resolver by one event.
pub fn step(state: MailboxState, event: MailboxEvent<'_>) -> Transition<MailboxState, MailboxEffect> {
    use MailboxState::*;

    match (state, event) {
        (_, MailboxEvent::Start) => Transition::with(
            ReadingIndicator,
            vec![MailboxEffect::Read(CardRequest::read_record(FileId::MBI, 1))],
        ),

        (ReadingIndicator, MailboxEvent::ReadDone(outcome)) => {
            let index = outcome
                .map_err(|err| err.to_string())
                .and_then(|data| decode_mailbox_index(data).map_err(|err| err.to_string()));
            match index {
                Ok(index) => Transition::with(
                    ReadingPrimary { index },
                    vec![
                        MailboxEffect::RememberIndex(index),
                        MailboxEffect::Read(CardRequest::read_record(FileId::MBDN, index)),
                    ],
                ),
                Err(reason) => {
                    debug!(%reason, "no usable EF_MBI, trying CPHS mailbox");
                    Transition::with(ReadingLegacy, vec![legacy_read()])
                }
            }
        }

        (ReadingPrimary { index }, MailboxEvent::ReadDone(outcome)) => {
            let mut effects = Vec::new();
            if let Some(record) = decode_number(FileId::MBDN, outcome, &mut effects) {
                effects.push(MailboxEffect::Publish(record));
                return Transition::with(Resolved, effects);
            }
            debug!(index, "EF_MBDN record unusable, trying CPHS mailbox");
            effects.push(legacy_read());
            Transition::with(ReadingLegacy, effects)
        }

        (ReadingLegacy, MailboxEvent::ReadDone(outcome)) => {
            let mut effects = Vec::new();
            if let Some(record) = decode_number(FileId::MAILBOX_CPHS, outcome, &mut effects) {
                effects.push(MailboxEffect::Publish(record));
            }
            Transition::with(Resolved, effects)
        }

        (state @ (Idle | Resolved), MailboxEvent::ReadDone(_)) => {
            debug!(?state, "mailbox reply outside a lookup ignored");
            Transition::to(state)
        }
    }
}

/// Decode a number record, remembering its width. `None` when the read failed,
/// the record is corrupt, or it holds no number.
fn decode_number(
    file: FileId,
    outcome: ReadOutcome<'_>,
    effects: &mut Vec<MailboxEffect>,
) -> Option<AdnRecord> {
    let data = match outcome {
        Ok(data) => data,
        Err(err) => {
            debug!(%file, error = %err, "mailbox read failed");
            return None;
        }
    };
    let record = match AdnRecord::decode(data) {
        Ok(record) => record,
        Err(err) => {
            debug!(%file, error = %err, "mailbox record not decodable");
            return None;
        }
    };
    effects.push(MailboxEffect::RememberRecordSize {
        file,
        size: data.len(),
    });
    (!record.number.is_empty()).then_some(record)
}

// =============================================================================
// Writes
// =============================================================================

/// One location a voicemail number is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteTarget {
    pub file: FileId,
    pub record: u8,
}

/// Why no voicemail write can be attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePlanError {
    FixedByOperator,
    NoTarget,
}

/// Ordered write targets: `EF_MBDN[index]` first, then the CPHS mailbox.
pub fn plan_write(
    mailbox_index: Option<u8>,
    cphs_mailbox_enabled: bool,
    fixed_by_operator: bool,
) -> Result<Vec<WriteTarget>, WritePlanError> {
    if fixed_by_operator {
        return Err(WritePlanError::FixedByOperator);
    }
    let mut targets = Vec::with_capacity(2);
    if let Some(index) = mailbox_index.filter(|i| *i != 0 && *i != 0xFF) {
        targets.push(WriteTarget {
            file: FileId::MBDN,
            record: index,
        });
    }
    if cphs_mailbox_enabled {
        targets.push(WriteTarget {
            file: FileId::MAILBOX_CPHS,
            record: 1,
        });
    }
    if targets.is_empty() {
        return Err(WritePlanError::NoTarget);
    }
    Ok(targets)
}
