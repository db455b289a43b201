//! Record loading orchestrator.
//!
//! [`RecordEngine`] is a synchronous state machine: every input is an
//! [`EngineEvent`] and every output an [`EngineEffect`] for the caller to
//! carry out (submit a request, notify subscribers, answer a write). Owning
//! the transport, channels and callbacks is the service layer's job, which
//! keeps the engine testable without any I/O.
//!
//! Each load cycle runs in its own generation. Request tags carry the
//! generation that issued them, so replies from a superseded cycle are
//! recognised and dropped before they can touch the ledger or the store.

use crate::config::EngineConfig;
use crate::error::{ProtocolViolation, WriteError};
use crate::ledger::{PendingLedger, SettleOutcome};
use crate::mcc;
use crate::store::{IndicatorState, RecordStore};
use serde::Serialize;
use sim_codec::indicators::{
    decode_cff, decode_cfis, decode_cphs_mwi, decode_mwis, encode_cff, encode_cfis,
    encode_cphs_mwi, encode_mwis,
};
use sim_codec::service_info::{cphs_mailbox_enabled, decode_csp_operator_menu, decode_mnc_length};
use sim_codec::{decode_digits, decode_imsi, decode_spdi, AdnRecord, DecodeError};
use sim_records_types::{CardRecordSnapshot, DialingNumber, FileId, RegistrationContext};
use sim_resolver::mailbox::{self, MailboxEvent, WritePlanError};
use sim_resolver::network_name::NetworkNameEvent;
use sim_resolver::spn::{self, SpnEvent};
use sim_resolver::{
    MailboxEffect, MailboxState, NetworkNameEffect, NetworkNameResolver, ReadOutcome, SpnEffect,
    SpnState, Transition,
};
use sim_transport::{CardRequest, RequestTag, TransportError, TransportReply};
use std::collections::{BTreeMap, HashMap, VecDeque};
use tracing::{debug, info, trace, warn};

/// Caller-chosen identifier correlating a write command with its completion.
pub type WriteId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Loading,
    Loaded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCommand {
    OwnNumber(DialingNumber),
    VoicemailNumber(DialingNumber),
    CallForwarding(bool),
    VoiceMessageWaiting(i32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The card is ready: start a load cycle if none is running.
    RadioReady,
    /// The card is gone: drop everything and wait.
    RadioUnavailable,
    /// The card was reset: drop everything and load again.
    CardReset,
    FileChanged(FileId),
    RegistrationChanged(Option<RegistrationContext>),
    Reply(TransportReply),
    Write { id: WriteId, command: WriteCommand },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEffect {
    Submit {
        tag: RequestTag,
        request: CardRequest,
    },
    RecordsLoaded,
    WriteCompleted {
        id: WriteId,
        result: Result<(), WriteError>,
    },
    IndicatorsChanged(IndicatorState),
}

/// Counters for conditions that are logged but never surfaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EngineDiagnostics {
    pub stale_replies: u64,
    pub unknown_replies: u64,
    pub ledger_underflows: u64,
    pub decode_failures: u64,
}

/// What an outstanding tag was issued for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Purpose {
    Iccid,
    Imsi,
    Ad,
    Msisdn,
    Mwis,
    CphsMwi,
    Cfis,
    Cff,
    Spdi,
    CphsInfo,
    Csp,
    // `run` identifies one resolver lookup; a restart supersedes earlier runs.
    Spn { run: u32 },
    NetworkName { run: u32 },
    Mailbox { run: u32 },
    Write(WriteId),
}

enum SnapshotUpdate {
    OwnNumber(Option<DialingNumber>),
    VoicemailNumber(Option<DialingNumber>),
}

/// A write command in progress. Requests are sent one at a time, in order.
struct WriteOp {
    queue: VecDeque<CardRequest>,
    attempts: usize,
    succeeded: usize,
    last_error: Option<TransportError>,
    on_success: Option<SnapshotUpdate>,
}

impl WriteOp {
    fn new(requests: Vec<CardRequest>, on_success: Option<SnapshotUpdate>) -> Self {
        Self {
            queue: requests.into(),
            attempts: 0,
            succeeded: 0,
            last_error: None,
            on_success,
        }
    }

    /// Success if nothing needed writing or any write succeeded.
    fn result(&self) -> Result<(), WriteError> {
        if self.attempts == 0 || self.succeeded > 0 {
            return Ok(());
        }
        let last = self
            .last_error
            .clone()
            .unwrap_or_else(|| TransportError::Io("write not answered".to_string()));
        if self.attempts == 1 {
            Err(WriteError::Transport(last))
        } else {
            Err(WriteError::AllWritesFailed {
                attempts: self.attempts,
                last,
            })
        }
    }
}

pub struct RecordEngine {
    config: EngineConfig,
    phase: Phase,
    generation: u32,
    next_sequence: u32,
    ledger: PendingLedger,
    pending: HashMap<RequestTag, Purpose>,
    store: RecordStore,

    spn: SpnState,
    spn_run: u32,
    network_name: NetworkNameResolver,
    network_name_run: u32,
    mailbox: MailboxState,
    mailbox_run: u32,

    writes: BTreeMap<WriteId, WriteOp>,
    diagnostics: EngineDiagnostics,
}

impl RecordEngine {
    pub fn new(config: EngineConfig) -> Self {
        let network_name =
            NetworkNameResolver::new(config.name_algorithm, config.max_operator_records);
        Self {
            config,
            phase: Phase::Idle,
            generation: 0,
            next_sequence: 0,
            ledger: PendingLedger::new(),
            pending: HashMap::new(),
            store: RecordStore::new(),
            spn: SpnState::Init,
            spn_run: 0,
            network_name,
            network_name_run: 0,
            mailbox: MailboxState::Idle,
            mailbox_run: 0,
            writes: BTreeMap::new(),
            diagnostics: EngineDiagnostics::default(),
        }
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// True once every read of the current generation settled.
    pub fn is_loaded(&self) -> bool {
        self.phase == Phase::Loaded
    }

    pub fn snapshot(&self) -> &CardRecordSnapshot {
        self.store.snapshot()
    }

    pub fn indicator_state(&self) -> IndicatorState {
        self.store.indicator_state()
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn outstanding(&self) -> usize {
        self.ledger.outstanding()
    }

    pub fn diagnostics(&self) -> EngineDiagnostics {
        self.diagnostics
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    // =========================================================================
    // Event dispatch
    // =========================================================================

    pub fn handle(&mut self, event: EngineEvent) -> Vec<EngineEffect> {
        let mut out = Vec::new();
        match event {
            EngineEvent::RadioReady => {
                if self.phase == Phase::Idle {
                    self.start(&mut out);
                } else {
                    debug!(generation = self.generation, "radio ready while active, ignored");
                }
            }
            EngineEvent::RadioUnavailable => self.reset(&mut out),
            EngineEvent::CardReset => {
                self.reset(&mut out);
                self.start(&mut out);
            }
            EngineEvent::FileChanged(file) => self.file_changed(file, &mut out),
            EngineEvent::RegistrationChanged(registration) => {
                let effects = self
                    .network_name
                    .handle(NetworkNameEvent::Registration(registration));
                self.apply_network_name(effects, &mut out);
            }
            EngineEvent::Reply(reply) => self.on_reply(reply, &mut out),
            EngineEvent::Write { id, command } => self.write(id, command, &mut out),
        }
        out
    }

    fn reset(&mut self, out: &mut Vec<EngineEffect>) {
        self.generation = self.generation.wrapping_add(1);
        self.next_sequence = 0;
        self.ledger = PendingLedger::new();
        self.pending.clear();
        self.store.clear();
        self.spn = SpnState::Init;
        self.mailbox = MailboxState::Idle;
        self.network_name.reset();
        for id in std::mem::take(&mut self.writes).into_keys() {
            out.push(EngineEffect::WriteCompleted {
                id,
                result: Err(WriteError::CardUnavailable),
            });
        }
        self.phase = Phase::Idle;
        info!(generation = self.generation, "card records reset");
    }

    fn start(&mut self, out: &mut Vec<EngineEffect>) {
        self.phase = Phase::Loading;
        info!(generation = self.generation, "loading card records");

        let batch = [
            (Purpose::Iccid, CardRequest::read(FileId::ICCID)),
            (Purpose::Imsi, CardRequest::read(FileId::IMSI)),
            (Purpose::Ad, CardRequest::read(FileId::AD)),
            (Purpose::Msisdn, CardRequest::read_record(FileId::MSISDN, 1)),
            (Purpose::Mwis, CardRequest::read_record(FileId::MWIS, 1)),
            (Purpose::CphsMwi, CardRequest::read(FileId::VOICE_MAIL_INDICATOR_CPHS)),
            (Purpose::Cfis, CardRequest::read_record(FileId::CFIS, 1)),
            (Purpose::Cff, CardRequest::read(FileId::CFF_CPHS)),
            (Purpose::Spdi, CardRequest::read(FileId::SPDI)),
            (Purpose::CphsInfo, CardRequest::read(FileId::INFO_CPHS)),
        ];
        for (purpose, request) in batch {
            self.issue_read(purpose, request, out);
        }
        if self.config.load_csp {
            self.issue_read(Purpose::Csp, CardRequest::read(FileId::CSP_CPHS), out);
        }
        self.start_mailbox(out);
        self.start_spn(out);
        self.start_network_name(out);
    }

    fn file_changed(&mut self, file: FileId, out: &mut Vec<EngineEffect>) {
        if self.phase == Phase::Idle {
            debug!(%file, "file change without an active card, ignored");
            return;
        }
        info!(%file, "card file changed");
        let single = match file {
            FileId::ICCID => Some((Purpose::Iccid, CardRequest::read(file))),
            FileId::IMSI => Some((Purpose::Imsi, CardRequest::read(file))),
            FileId::AD => Some((Purpose::Ad, CardRequest::read(file))),
            FileId::MSISDN => Some((Purpose::Msisdn, CardRequest::read_record(file, 1))),
            FileId::MWIS => Some((Purpose::Mwis, CardRequest::read_record(file, 1))),
            FileId::VOICE_MAIL_INDICATOR_CPHS => Some((Purpose::CphsMwi, CardRequest::read(file))),
            FileId::CFIS => Some((Purpose::Cfis, CardRequest::read_record(file, 1))),
            FileId::CFF_CPHS => Some((Purpose::Cff, CardRequest::read(file))),
            FileId::SPDI => Some((Purpose::Spdi, CardRequest::read(file))),
            FileId::INFO_CPHS => Some((Purpose::CphsInfo, CardRequest::read(file))),
            FileId::CSP_CPHS if self.config.load_csp => {
                Some((Purpose::Csp, CardRequest::read(file)))
            }
            FileId::CSP_CPHS => return,
            FileId::SPN | FileId::SPN_CPHS | FileId::SPN_SHORT_CPHS => {
                self.start_spn(out);
                return;
            }
            FileId::PNN | FileId::OPL => {
                self.start_network_name(out);
                return;
            }
            FileId::MBI | FileId::MBDN | FileId::MAILBOX_CPHS => {
                self.start_mailbox(out);
                return;
            }
            _ => None,
        };
        match single {
            Some((purpose, request)) => self.issue_read(purpose, request, out),
            None => {
                info!(%file, "unrecognised file, reloading all records");
                self.reset(out);
                self.start(out);
            }
        }
    }

    // =========================================================================
    // Request issuance
    // =========================================================================

    fn next_tag(&mut self) -> RequestTag {
        self.next_sequence = self.next_sequence.wrapping_add(1);
        RequestTag::new(self.generation, self.next_sequence)
    }

    /// Submit a counted read. A read issued after convergence reopens the cycle.
    fn issue_read(&mut self, purpose: Purpose, request: CardRequest, out: &mut Vec<EngineEffect>) {
        let tag = self.next_tag();
        self.ledger.issue();
        self.pending.insert(tag, purpose);
        if self.phase == Phase::Loaded {
            self.phase = Phase::Loading;
        }
        trace!(%tag, %request, ?purpose, outstanding = self.ledger.outstanding(), "issuing read");
        out.push(EngineEffect::Submit { tag, request });
    }

    fn start_spn(&mut self, out: &mut Vec<EngineEffect>) {
        self.spn_run = self.spn_run.wrapping_add(1);
        let transition = spn::step(self.spn, SpnEvent::Start);
        self.apply_spn(transition, out);
    }

    fn start_mailbox(&mut self, out: &mut Vec<EngineEffect>) {
        self.mailbox_run = self.mailbox_run.wrapping_add(1);
        self.store.snapshot_mut().voicemail_number = None;
        self.store.clear_mailbox_index();
        let transition = mailbox::step(self.mailbox, MailboxEvent::Start);
        self.apply_mailbox(transition, out);
    }

    fn start_network_name(&mut self, out: &mut Vec<EngineEffect>) {
        self.network_name_run = self.network_name_run.wrapping_add(1);
        let effects = self.network_name.handle(NetworkNameEvent::Start);
        self.apply_network_name(effects, out);
    }

    fn apply_spn(&mut self, transition: Transition<SpnState, SpnEffect>, out: &mut Vec<EngineEffect>) {
        self.spn = transition.state;
        for effect in transition.effects {
            match effect {
                SpnEffect::ClearName => {
                    let snapshot = self.store.snapshot_mut();
                    snapshot.provider_display_name = None;
                    snapshot.display_condition = -1;
                }
                SpnEffect::Read(request) => {
                    let run = self.spn_run;
                    self.issue_read(Purpose::Spn { run }, request, out);
                }
                SpnEffect::ResetDisplayCondition => {
                    self.store.snapshot_mut().display_condition = -1;
                }
                SpnEffect::Publish {
                    name,
                    display_condition,
                } => {
                    debug!(%name, ?display_condition, "provider name resolved");
                    let snapshot = self.store.snapshot_mut();
                    snapshot.provider_display_name = Some(name);
                    if let Some(condition) = display_condition {
                        snapshot.display_condition = condition;
                    }
                }
            }
        }
    }

    fn apply_mailbox(
        &mut self,
        transition: Transition<MailboxState, MailboxEffect>,
        out: &mut Vec<EngineEffect>,
    ) {
        self.mailbox = transition.state;
        for effect in transition.effects {
            match effect {
                MailboxEffect::Read(request) => {
                    let run = self.mailbox_run;
                    self.issue_read(Purpose::Mailbox { run }, request, out);
                }
                MailboxEffect::RememberIndex(index) => self.store.set_mailbox_index(index),
                MailboxEffect::RememberRecordSize { file, size } => {
                    self.store.set_record_size(file, size)
                }
                MailboxEffect::Publish(record) => {
                    debug!(number = %record.number, "voicemail number resolved");
                    self.store.snapshot_mut().voicemail_number =
                        Some(DialingNumber::new(record.alpha, record.number));
                }
            }
        }
    }

    fn apply_network_name(&mut self, effects: Vec<NetworkNameEffect>, out: &mut Vec<EngineEffect>) {
        for effect in effects {
            match effect {
                NetworkNameEffect::ClearNames => {
                    let snapshot = self.store.snapshot_mut();
                    snapshot.operator_long_name = None;
                    snapshot.operator_short_name = None;
                }
                NetworkNameEffect::Read(request) => {
                    let run = self.network_name_run;
                    self.issue_read(Purpose::NetworkName { run }, request, out);
                }
                NetworkNameEffect::Publish {
                    long_name,
                    short_name,
                } => {
                    debug!(%long_name, ?short_name, "network name resolved");
                    let snapshot = self.store.snapshot_mut();
                    snapshot.operator_long_name = Some(long_name);
                    snapshot.operator_short_name = short_name;
                }
            }
        }
    }

    // =========================================================================
    // Reply dispatch
    // =========================================================================

    fn on_reply(&mut self, reply: TransportReply, out: &mut Vec<EngineEffect>) {
        let tag = reply.tag;
        if tag.generation() != self.generation {
            self.violation(ProtocolViolation::StaleGeneration {
                tag,
                current: self.generation,
            });
            return;
        }
        let Some(purpose) = self.pending.remove(&tag) else {
            self.violation(ProtocolViolation::UnknownTag(tag));
            return;
        };
        if let Purpose::Write(id) = purpose {
            self.on_write_reply(id, reply, out);
            return;
        }

        let outcome = reply.bytes();
        match &outcome {
            Ok(data) => debug!(%tag, ?purpose, data = %hex::encode(data), "read reply"),
            Err(err) => debug!(%tag, ?purpose, error = %err, "read failed"),
        }
        self.dispatch_read(purpose, outcome, out);

        match self.ledger.settle() {
            SettleOutcome::Outstanding(n) => trace!(outstanding = n, "reply settled"),
            SettleOutcome::AllSettled => self.on_all_settled(out),
            SettleOutcome::Underflow => self.violation(ProtocolViolation::LedgerUnderflow),
        }
    }

    fn violation(&mut self, violation: ProtocolViolation) {
        match &violation {
            ProtocolViolation::StaleGeneration { .. } => {
                self.diagnostics.stale_replies += 1;
                debug!(%violation, "discarding reply");
                return;
            }
            ProtocolViolation::UnknownTag(_) => self.diagnostics.unknown_replies += 1,
            ProtocolViolation::LedgerUnderflow => self.diagnostics.ledger_underflows += 1,
        }
        warn!(%violation, "protocol violation");
    }

    /// Decode a successful read, logging and counting decode failures.
    fn decode<T>(
        &mut self,
        file: FileId,
        outcome: &ReadOutcome<'_>,
        decoder: impl FnOnce(&[u8]) -> Result<T, DecodeError>,
    ) -> Option<T> {
        let data = outcome.as_ref().ok().copied()?;
        match decoder(data) {
            Ok(value) => Some(value),
            Err(DecodeError::Uninitialized) => {
                debug!(%file, "record not initialised");
                None
            }
            Err(err) => {
                self.diagnostics.decode_failures += 1;
                warn!(%file, error = %err, "record not decodable, field left absent");
                None
            }
        }
    }

    fn dispatch_read(&mut self, purpose: Purpose, outcome: ReadOutcome<'_>, out: &mut Vec<EngineEffect>) {
        match purpose {
            Purpose::Iccid => {
                let serial = self
                    .decode(FileId::ICCID, &outcome, |d| Ok(decode_digits(d)))
                    .filter(|s| !s.is_empty());
                self.store.snapshot_mut().card_serial = serial;
            }
            Purpose::Imsi => {
                let imsi = self
                    .decode(FileId::IMSI, &outcome, decode_imsi)
                    .filter(|imsi| {
                        let valid = (6..=15).contains(&imsi.len());
                        if !valid {
                            warn!(length = imsi.len(), "subscriber id length invalid, discarded");
                        }
                        valid
                    });
                self.store.snapshot_mut().subscriber_id = imsi;
            }
            Purpose::Ad => {
                let mnc_length = self.decode(FileId::AD, &outcome, decode_mnc_length);
                if let Some(length @ (1 | 4..)) = mnc_length {
                    debug!(length, "unusual mnc length in EF_AD");
                }
                self.store.snapshot_mut().mnc_length = mnc_length.unwrap_or(0);
            }
            Purpose::Msisdn => {
                let record = self.decode(FileId::MSISDN, &outcome, AdnRecord::decode);
                if let (Some(_), Ok(data)) = (&record, &outcome) {
                    self.store.set_record_size(FileId::MSISDN, data.len());
                }
                self.store.snapshot_mut().own_number = record
                    .filter(|r| !r.is_empty())
                    .map(|r| DialingNumber::new(r.alpha, r.number));
            }
            Purpose::Mwis => {
                self.cache_raw(FileId::MWIS, Some(1), &outcome);
                let count = self.decode(FileId::MWIS, &outcome, decode_mwis);
                self.store.set_mwis_count(count);
                self.publish_indicators(false, out);
            }
            Purpose::CphsMwi => {
                self.cache_raw(FileId::VOICE_MAIL_INDICATOR_CPHS, None, &outcome);
                let count = self.decode(FileId::VOICE_MAIL_INDICATOR_CPHS, &outcome, decode_cphs_mwi);
                self.store.set_cphs_mwi_count(count);
                self.publish_indicators(false, out);
            }
            Purpose::Cfis => {
                self.cache_raw(FileId::CFIS, Some(1), &outcome);
                let enabled = self.decode(FileId::CFIS, &outcome, decode_cfis);
                self.store.set_cfis_enabled(enabled);
                self.publish_indicators(false, out);
            }
            Purpose::Cff => {
                self.cache_raw(FileId::CFF_CPHS, None, &outcome);
                let enabled = self.decode(FileId::CFF_CPHS, &outcome, decode_cff);
                self.store.set_cff_enabled(enabled);
                self.publish_indicators(false, out);
            }
            Purpose::Spdi => {
                let networks = outcome.as_ref().map(|d| decode_spdi(d)).unwrap_or_default();
                self.store.snapshot_mut().equivalent_networks = networks;
            }
            Purpose::CphsInfo => {
                if let Ok(data) = &outcome {
                    self.store.set_cphs_info(data.to_vec());
                }
            }
            Purpose::Csp => {
                if let Some(enabled) = outcome.as_ref().ok().and_then(|d| decode_csp_operator_menu(d)) {
                    self.store.snapshot_mut().operator_menu_enabled = enabled;
                }
            }
            Purpose::Spn { run } => {
                if run != self.spn_run {
                    debug!(run, "superseded provider name reply");
                    return;
                }
                let transition = spn::step(self.spn, SpnEvent::ReadDone(outcome));
                self.apply_spn(transition, out);
            }
            Purpose::NetworkName { run } => {
                if run != self.network_name_run {
                    debug!(run, "superseded network name reply");
                    return;
                }
                let effects = self.network_name.handle(NetworkNameEvent::ReadDone(outcome));
                self.apply_network_name(effects, out);
            }
            Purpose::Mailbox { run } => {
                if run != self.mailbox_run {
                    debug!(run, "superseded mailbox reply");
                    return;
                }
                let transition = mailbox::step(self.mailbox, MailboxEvent::ReadDone(outcome));
                self.apply_mailbox(transition, out);
            }
            Purpose::Write(_) => {}
        }
    }

    fn cache_raw(&mut self, file: FileId, record: Option<u8>, outcome: &ReadOutcome<'_>) {
        if let Ok(data) = outcome {
            self.store.raw_mut().insert(file, record, data.to_vec());
        }
    }

    fn publish_indicators(&mut self, always: bool, out: &mut Vec<EngineEffect>) {
        match self.store.recompute_indicators() {
            Some(state) => out.push(EngineEffect::IndicatorsChanged(state)),
            None if always => out.push(EngineEffect::IndicatorsChanged(self.store.indicator_state())),
            None => {}
        }
    }

    fn on_all_settled(&mut self, out: &mut Vec<EngineEffect>) {
        self.derive_home_operator();
        self.apply_carrier_overrides();
        self.phase = Phase::Loaded;
        info!(
            generation = self.generation,
            home_operator = ?self.store.snapshot().home_operator,
            "card records loaded"
        );
        out.push(EngineEffect::RecordsLoaded);
    }

    fn derive_home_operator(&mut self) {
        let snapshot = self.store.snapshot_mut();
        snapshot.home_operator = None;
        snapshot.iso_country = None;
        let Some(imsi) = snapshot.subscriber_id.clone() else {
            return;
        };
        let Some(mcc) = mcc::parse_mcc(&imsi) else {
            return;
        };
        let mnc_length = match snapshot.mnc_length {
            0 => mcc::smallest_mnc_digits(mcc),
            declared => declared,
        };
        snapshot.home_operator = imsi
            .get(..3 + mnc_length as usize)
            .map(str::to_string);
        snapshot.iso_country = mcc::iso_country(mcc).map(str::to_string);
    }

    fn apply_carrier_overrides(&mut self) {
        let overrides = &self.config.carrier_overrides;
        let snapshot = self.store.snapshot_mut();
        let Some(home) = snapshot.home_operator.as_deref() else {
            return;
        };
        if let Some(number) = overrides.voicemail.get(home) {
            debug!(home, "voicemail number fixed by operator");
            snapshot.voicemail_number = Some(number.clone());
            snapshot.voicemail_fixed_by_operator = true;
        }
        if let Some(name) = overrides.provider_names.get(home) {
            snapshot.provider_display_name = Some(name.clone());
        }
    }

    // =========================================================================
    // Writes
    // =========================================================================

    fn write(&mut self, id: WriteId, command: WriteCommand, out: &mut Vec<EngineEffect>) {
        if self.phase == Phase::Idle {
            out.push(EngineEffect::WriteCompleted {
                id,
                result: Err(WriteError::CardUnavailable),
            });
            return;
        }
        let op = match command {
            WriteCommand::OwnNumber(number) => self.plan_own_number(number),
            WriteCommand::VoicemailNumber(number) => self.plan_voicemail(number),
            WriteCommand::CallForwarding(enabled) => Ok(self.plan_call_forwarding(enabled, out)),
            WriteCommand::VoiceMessageWaiting(count) => Ok(self.plan_message_waiting(count, out)),
        };
        match op {
            Ok(op) => {
                self.writes.insert(id, op);
                self.advance_write(id, out);
            }
            Err(err) => {
                debug!(write = id, error = %err, "write refused");
                out.push(EngineEffect::WriteCompleted { id, result: Err(err) });
            }
        }
    }

    fn plan_own_number(&self, number: DialingNumber) -> Result<WriteOp, WriteError> {
        let data = AdnRecord::new(number.display_name.clone(), number.digits.clone())
            .encode(self.store.record_size(FileId::MSISDN))?;
        let request = CardRequest::UpdateLinearFixed {
            file: FileId::MSISDN,
            record: 1,
            data,
        };
        let stored = (!number.is_empty()).then_some(number);
        Ok(WriteOp::new(vec![request], Some(SnapshotUpdate::OwnNumber(stored))))
    }

    fn plan_voicemail(&self, number: DialingNumber) -> Result<WriteOp, WriteError> {
        let cphs_enabled = self.store.cphs_info().map(cphs_mailbox_enabled).unwrap_or(false);
        let targets = mailbox::plan_write(
            self.store.mailbox_index(),
            cphs_enabled,
            self.store.snapshot().voicemail_fixed_by_operator,
        )
        .map_err(|err| match err {
            WritePlanError::FixedByOperator => WriteError::FixedByOperator,
            WritePlanError::NoTarget => WriteError::NotSupported,
        })?;

        let record = AdnRecord::new(number.display_name.clone(), number.digits.clone());
        let requests = targets
            .into_iter()
            .map(|target| -> Result<CardRequest, WriteError> {
                Ok(CardRequest::UpdateLinearFixed {
                    file: target.file,
                    record: target.record,
                    data: record.encode(self.store.record_size(target.file))?,
                })
            })
            .collect::<Result<Vec<_>, WriteError>>()?;
        let stored = (!number.is_empty()).then_some(number);
        Ok(WriteOp::new(requests, Some(SnapshotUpdate::VoicemailNumber(stored))))
    }

    fn plan_call_forwarding(&mut self, enabled: bool, out: &mut Vec<EngineEffect>) -> WriteOp {
        let mut requests = Vec::new();

        let cfis = self.store.raw().get(FileId::CFIS, Some(1)).map(|raw| encode_cfis(raw, enabled));
        if let Some(encoded) = cfis {
            match encoded {
                Ok(data) => {
                    self.store.raw_mut().insert(FileId::CFIS, Some(1), data.clone());
                    requests.push(CardRequest::UpdateLinearFixed {
                        file: FileId::CFIS,
                        record: 1,
                        data,
                    });
                }
                Err(err) => warn!(error = %err, "cached EF_CFIS not rewritable"),
            }
        }

        let cff = self.store.raw().get(FileId::CFF_CPHS, None).map(|raw| encode_cff(raw, enabled));
        if let Some(encoded) = cff {
            match encoded {
                Ok(data) => {
                    self.store.raw_mut().insert(FileId::CFF_CPHS, None, data.clone());
                    self.store.set_cff_enabled(Some(enabled));
                    requests.push(CardRequest::UpdateTransparent {
                        file: FileId::CFF_CPHS,
                        data,
                    });
                }
                Err(err) => warn!(error = %err, "cached CPHS call-forward flags not rewritable"),
            }
        }

        self.store.set_cfis_enabled(Some(enabled));
        self.publish_indicators(true, out);
        WriteOp::new(requests, None)
    }

    fn plan_message_waiting(&mut self, count: i32, out: &mut Vec<EngineEffect>) -> WriteOp {
        let count = count.clamp(-1, 255);
        let mut requests = Vec::new();

        let mwis = self.store.raw().get(FileId::MWIS, Some(1)).map(|raw| encode_mwis(raw, count));
        if let Some(encoded) = mwis {
            match encoded {
                Ok(data) => {
                    self.store.raw_mut().insert(FileId::MWIS, Some(1), data.clone());
                    requests.push(CardRequest::UpdateLinearFixed {
                        file: FileId::MWIS,
                        record: 1,
                        data,
                    });
                }
                Err(err) => warn!(error = %err, "cached EF_MWIS not rewritable"),
            }
        }

        let cphs = self
            .store
            .raw()
            .get(FileId::VOICE_MAIL_INDICATOR_CPHS, None)
            .map(|raw| encode_cphs_mwi(raw, count));
        if let Some(encoded) = cphs {
            match encoded {
                Ok(data) => {
                    self.store
                        .raw_mut()
                        .insert(FileId::VOICE_MAIL_INDICATOR_CPHS, None, data.clone());
                    self.store
                        .set_cphs_mwi_count(Some(if count == 0 { 0 } else { -1 }));
                    requests.push(CardRequest::UpdateTransparent {
                        file: FileId::VOICE_MAIL_INDICATOR_CPHS,
                        data,
                    });
                }
                Err(err) => warn!(error = %err, "cached CPHS voicemail indicator not rewritable"),
            }
        }

        self.store.set_mwis_count(Some(count));
        self.publish_indicators(true, out);
        WriteOp::new(requests, None)
    }

    fn advance_write(&mut self, id: WriteId, out: &mut Vec<EngineEffect>) {
        let next = match self.writes.get_mut(&id) {
            Some(op) => op.queue.pop_front(),
            None => return,
        };
        let Some(request) = next else {
            self.finish_write(id, out);
            return;
        };
        let tag = self.next_tag();
        self.pending.insert(tag, Purpose::Write(id));
        if let Some(op) = self.writes.get_mut(&id) {
            op.attempts += 1;
        }
        debug!(%tag, %request, write = id, "issuing write");
        out.push(EngineEffect::Submit { tag, request });
    }

    fn on_write_reply(&mut self, id: WriteId, reply: TransportReply, out: &mut Vec<EngineEffect>) {
        let Some(op) = self.writes.get_mut(&id) else {
            debug!(write = id, "reply for a finished write");
            return;
        };
        match reply.result {
            Ok(_) => op.succeeded += 1,
            Err(err) => {
                warn!(write = id, tag = %reply.tag, error = %err, "card write failed");
                op.last_error = Some(err);
            }
        }
        self.advance_write(id, out);
    }

    fn finish_write(&mut self, id: WriteId, out: &mut Vec<EngineEffect>) {
        let Some(op) = self.writes.remove(&id) else {
            return;
        };
        let result = op.result();
        if result.is_ok() {
            let snapshot = self.store.snapshot_mut();
            match op.on_success {
                Some(SnapshotUpdate::OwnNumber(number)) => snapshot.own_number = number,
                Some(SnapshotUpdate::VoicemailNumber(number)) => snapshot.voicemail_number = number,
                None => {}
            }
        }
        debug!(write = id, ?result, "write finished");
        out.push(EngineEffect::WriteCompleted { id, result });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sim_transport::ReplyPayload;

    fn submits(effects: &[EngineEffect]) -> Vec<(RequestTag, CardRequest)> {
        effects
            .iter()
            .filter_map(|e| match e {
                EngineEffect::Submit { tag, request } => Some((*tag, request.clone())),
                _ => None,
            })
            .collect()
    }

    fn fail(tag: RequestTag) -> EngineEvent {
        EngineEvent::Reply(TransportReply {
            tag,
            result: Err(TransportError::FileNotFound(FileId(0))),
        })
    }

    fn ok(tag: RequestTag, data: &[u8]) -> EngineEvent {
        EngineEvent::Reply(TransportReply {
            tag,
            result: Ok(ReplyPayload::Bytes(data.to_vec())),
        })
    }

    /// Fail every read until the cycle converges; returns all effects seen.
    fn fail_everything(engine: &mut RecordEngine, mut queue: Vec<(RequestTag, CardRequest)>) -> Vec<EngineEffect> {
        let mut seen = Vec::new();
        while let Some((tag, _)) = queue.pop() {
            let effects = engine.handle(fail(tag));
            queue.extend(submits(&effects));
            seen.extend(effects);
        }
        seen
    }

    #[test]
    fn test_initial_batch_is_counted() {
        let mut engine = RecordEngine::new(EngineConfig::default());
        let effects = engine.handle(EngineEvent::RadioReady);
        let batch = submits(&effects);
        // 10 plain reads plus the first read of each resolver
        assert_eq!(batch.len(), 13);
        assert_eq!(engine.outstanding(), 13);
        assert_eq!(engine.phase(), Phase::Loading);
        assert!(batch.iter().all(|(tag, _)| tag.generation() == engine.generation()));
    }

    #[test]
    fn test_all_failures_still_converge() {
        let mut engine = RecordEngine::new(EngineConfig::default());
        let batch = submits(&engine.handle(EngineEvent::RadioReady));
        let seen = fail_everything(&mut engine, batch);
        assert_eq!(
            seen.iter().filter(|e| **e == EngineEffect::RecordsLoaded).count(),
            1
        );
        assert!(engine.is_loaded());
        assert_eq!(engine.outstanding(), 0);
        assert_eq!(engine.snapshot().provider_display_name, None);
        assert_eq!(engine.snapshot().display_condition, -1);
    }

    #[test]
    fn test_unknown_and_stale_tags_are_counted() {
        let mut engine = RecordEngine::new(EngineConfig::default());
        engine.handle(EngineEvent::RadioReady);
        let generation = engine.generation();
        assert!(engine.handle(fail(RequestTag::new(generation, 999))).is_empty());
        assert!(engine.handle(fail(RequestTag::new(generation + 7, 1))).is_empty());
        let diagnostics = engine.diagnostics();
        assert_eq!(diagnostics.unknown_replies, 1);
        assert_eq!(diagnostics.stale_replies, 1);
        assert_eq!(engine.outstanding(), 13);
    }

    #[test]
    fn test_home_operator_from_mnc_length() {
        let mut engine = RecordEngine::new(EngineConfig::default());
        let batch = submits(&engine.handle(EngineEvent::RadioReady));
        let mut rest = Vec::new();
        for (tag, request) in batch {
            match request.file() {
                FileId::IMSI => {
                    engine.handle(ok(tag, &[0x08, 0x29, 0x43, 0x51, 0x10, 0x32, 0x54, 0x76, 0x98]));
                }
                FileId::AD => {
                    engine.handle(ok(tag, &[0x00, 0x00, 0x00, 0x02]));
                }
                _ => rest.push((tag, request)),
            }
        }
        fail_everything(&mut engine, rest);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.subscriber_id.as_deref(), Some("234150123456789"));
        assert_eq!(snapshot.home_operator.as_deref(), Some("23415"));
        assert_eq!(snapshot.iso_country.as_deref(), Some("gb"));
        assert_eq!(snapshot.mnc_length, 2);
    }

    #[test]
    fn test_declared_mnc_length_is_not_replaced_by_guess() {
        let mut engine = RecordEngine::new(EngineConfig::default());
        let batch = submits(&engine.handle(EngineEvent::RadioReady));
        let mut rest = Vec::new();
        for (tag, request) in batch {
            match request.file() {
                FileId::IMSI => {
                    engine.handle(ok(tag, &[0x08, 0x29, 0x43, 0x51, 0x10, 0x32, 0x54, 0x76, 0x98]));
                }
                FileId::AD => {
                    // MCC 234 guesses two digits; the card says three
                    engine.handle(ok(tag, &[0x00, 0x00, 0x00, 0x03]));
                }
                _ => rest.push((tag, request)),
            }
        }
        fail_everything(&mut engine, rest);
        let snapshot = engine.snapshot();
        assert_eq!(snapshot.mnc_length, 3);
        assert_eq!(snapshot.home_operator.as_deref(), Some("234150"));
    }

    #[test]
    fn test_write_without_card_is_refused() {
        let mut engine = RecordEngine::new(EngineConfig::default());
        let effects = engine.handle(EngineEvent::Write {
            id: 1,
            command: WriteCommand::CallForwarding(true),
        });
        assert_eq!(
            effects,
            vec![EngineEffect::WriteCompleted {
                id: 1,
                result: Err(WriteError::CardUnavailable)
            }]
        );
    }
}
