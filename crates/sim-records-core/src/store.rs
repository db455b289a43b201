//! Record store: the snapshot under construction plus the raw bytes and
//! card facts the engine needs for later writes.

use serde::Serialize;
use sim_records_types::{CardRecordSnapshot, FileId};
use std::collections::HashMap;

/// Record width assumed for number files never read successfully.
pub const DEFAULT_RECORD_SIZE: usize = 28;

/// Last raw bytes of the files whose indicator bits are rewritten in place,
/// keyed by file and record number (`None` for transparent files).
#[derive(Debug, Default, Clone)]
pub struct RawFileCache {
    entries: HashMap<(FileId, Option<u8>), Vec<u8>>,
}

impl RawFileCache {
    pub fn insert(&mut self, file: FileId, record: Option<u8>, data: Vec<u8>) {
        self.entries.insert((file, record), data);
    }

    pub fn get(&self, file: FileId, record: Option<u8>) -> Option<&[u8]> {
        self.entries.get(&(file, record)).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Voicemail-waiting and call-forwarding state as seen by subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndicatorState {
    pub voicemail_message_count: i32,
    pub call_forwarding_enabled: bool,
}

/// Indicator values per source file, before precedence is applied.
#[derive(Debug, Default, Clone, Copy)]
struct IndicatorSources {
    mwis: Option<i32>,
    cphs_mwi: Option<i32>,
    cfis: Option<bool>,
    cff: Option<bool>,
}

/// Everything decoded from the card in the current generation.
#[derive(Debug, Default)]
pub struct RecordStore {
    snapshot: CardRecordSnapshot,
    raw: RawFileCache,
    record_sizes: HashMap<FileId, usize>,
    mailbox_index: Option<u8>,
    cphs_info: Option<Vec<u8>>,
    indicators: IndicatorSources,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> &CardRecordSnapshot {
        &self.snapshot
    }

    pub fn snapshot_mut(&mut self) -> &mut CardRecordSnapshot {
        &mut self.snapshot
    }

    pub fn raw(&self) -> &RawFileCache {
        &self.raw
    }

    pub fn raw_mut(&mut self) -> &mut RawFileCache {
        &mut self.raw
    }

    pub fn record_size(&self, file: FileId) -> usize {
        self.record_sizes
            .get(&file)
            .copied()
            .unwrap_or(DEFAULT_RECORD_SIZE)
    }

    pub fn set_record_size(&mut self, file: FileId, size: usize) {
        self.record_sizes.insert(file, size);
    }

    pub fn mailbox_index(&self) -> Option<u8> {
        self.mailbox_index
    }

    pub fn set_mailbox_index(&mut self, index: u8) {
        self.mailbox_index = Some(index);
    }

    pub fn clear_mailbox_index(&mut self) {
        self.mailbox_index = None;
    }

    pub fn cphs_info(&self) -> Option<&[u8]> {
        self.cphs_info.as_deref()
    }

    pub fn set_cphs_info(&mut self, info: Vec<u8>) {
        self.cphs_info = Some(info);
    }

    // =========================================================================
    // Indicators
    // =========================================================================

    pub fn set_mwis_count(&mut self, count: Option<i32>) {
        self.indicators.mwis = count;
    }

    pub fn set_cphs_mwi_count(&mut self, count: Option<i32>) {
        self.indicators.cphs_mwi = count;
    }

    pub fn set_cfis_enabled(&mut self, enabled: Option<bool>) {
        self.indicators.cfis = enabled;
    }

    pub fn set_cff_enabled(&mut self, enabled: Option<bool>) {
        self.indicators.cff = enabled;
    }

    pub fn indicator_state(&self) -> IndicatorState {
        IndicatorState {
            voicemail_message_count: self.snapshot.voicemail_message_count,
            call_forwarding_enabled: self.snapshot.call_forwarding_enabled,
        }
    }

    /// Apply source precedence to the snapshot (`EF_MWIS` over the CPHS
    /// indicator, `EF_CFIS` over CPHS flags). Returns the new state if it
    /// changed.
    pub fn recompute_indicators(&mut self) -> Option<IndicatorState> {
        let before = self.indicator_state();
        let sources = self.indicators;
        self.snapshot.voicemail_message_count = sources.mwis.or(sources.cphs_mwi).unwrap_or(0);
        self.snapshot.call_forwarding_enabled = sources.cfis.or(sources.cff).unwrap_or(false);
        let after = self.indicator_state();
        (after != before).then_some(after)
    }

    /// Forget everything read from the card.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
