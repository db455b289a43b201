#![allow(dead_code)]
//! Shared fixtures for engine integration tests.
//!
//! - `full_card`: a card with every file the engine reads, populated
//! - `Driver`: feeds engine effects to a [`SimulatedCard`] and replies back

use sim_codec::bcd::encode_imsi;
use sim_codec::network_name::encode_network_name;
use sim_codec::plmn::encode_plmn;
use sim_codec::{encode_alpha, AdnRecord};
use sim_records_core::{EngineConfig, EngineEffect, EngineEvent, RecordEngine, WriteError, WriteId};
use sim_records_types::FileId;
use sim_transport::{CardTransport, ReplySink, SimulatedCard, SimulatedCardBuilder, TransportReply};
use tokio::sync::mpsc::UnboundedReceiver;

pub const IMSI: &str = "310260123456789";
pub const ICCID: &str = "8901260123456789012";

pub fn adn(alpha: &str, number: &str) -> Vec<u8> {
    AdnRecord::new(alpha, number).encode(28).unwrap()
}

pub fn iccid_bytes() -> Vec<u8> {
    // swapped nibbles, 0xF filler
    vec![0x98, 0x10, 0x62, 0x10, 0x32, 0x54, 0x76, 0x98, 0x10, 0xF2]
}

pub fn spn(condition: u8, name: &str) -> Vec<u8> {
    let mut data = vec![condition];
    data.extend(encode_alpha(name, 16).unwrap());
    data
}

pub fn pnn_name_list(long: &str, short: &str) -> Vec<u8> {
    let long = encode_network_name(long).unwrap();
    let short = encode_network_name(short).unwrap();
    let mut record = vec![0x43, long.len() as u8];
    record.extend(long);
    record.push(0x45);
    record.push(short.len() as u8);
    record.extend(short);
    record.resize(24, 0xFF);
    record
}

pub fn spdi(plmns: &[&str]) -> Vec<u8> {
    let mut list = Vec::new();
    for plmn in plmns {
        list.extend(encode_plmn(plmn).unwrap());
    }
    let mut inner = vec![0x80, list.len() as u8];
    inner.extend(list);
    let mut data = vec![0xA3, inner.len() as u8];
    data.extend(inner);
    data
}

/// A card populated with every file read during loading.
pub fn full_card() -> SimulatedCardBuilder {
    let mut cfis = vec![0x01, 0x01];
    cfis.resize(16, 0xFF);
    SimulatedCard::builder()
        .transparent(FileId::ICCID, iccid_bytes())
        .transparent(FileId::IMSI, encode_imsi(IMSI).unwrap())
        .transparent(FileId::AD, vec![0x00, 0x00, 0x00, 0x03])
        .records(FileId::MSISDN, [adn("Me", "+15551230000")])
        .records(FileId::MBI, [vec![0x01, 0x00, 0x00, 0x00]])
        .records(FileId::MBDN, [adn("Voicemail", "+15551239999")])
        .records(FileId::MAILBOX_CPHS, [adn("VM", "121")])
        .records(FileId::MWIS, [vec![0x01, 0x03, 0x00, 0x00, 0x00]])
        .transparent(FileId::VOICE_MAIL_INDICATOR_CPHS, vec![0x0A, 0x00])
        .records(FileId::CFIS, [cfis])
        .transparent(FileId::CFF_CPHS, vec![0x05, 0x00])
        .transparent(FileId::SPN, spn(0x01, "Carrier"))
        .transparent(FileId::SPDI, spdi(&["310410", "31026"]))
        .records(FileId::PNN, [pnn_name_list("Carrier Mobile", "CarrierM")])
        .transparent(FileId::INFO_CPHS, vec![0x02, 0x30, 0x00])
}

/// Runs an engine against a simulated card, recording every effect.
pub struct Driver {
    pub engine: RecordEngine,
    pub card: SimulatedCard,
    sink: ReplySink,
    replies: UnboundedReceiver<TransportReply>,
    pub effects: Vec<EngineEffect>,
}

impl Driver {
    pub fn new(config: EngineConfig, card: SimulatedCard) -> Self {
        let (sink, replies) = ReplySink::channel();
        Self {
            engine: RecordEngine::new(config),
            card,
            sink,
            replies,
            effects: Vec::new(),
        }
    }

    pub fn with_card(card: SimulatedCard) -> Self {
        Self::new(EngineConfig::default(), card)
    }

    /// Feed one event and submit whatever it asks for.
    pub fn send(&mut self, event: EngineEvent) {
        let effects = self.engine.handle(event);
        for effect in effects {
            if let EngineEffect::Submit { tag, request } = &effect {
                self.card.submit(*tag, request.clone(), &self.sink);
            }
            self.effects.push(effect);
        }
    }

    /// Feed delivered replies until none are left. Returns how many were fed.
    pub fn pump(&mut self) -> usize {
        let mut fed = 0;
        while let Ok(reply) = self.replies.try_recv() {
            fed += 1;
            self.send(EngineEvent::Reply(reply));
        }
        fed
    }

    /// Start loading and run to quiescence.
    pub fn load(&mut self) {
        self.send(EngineEvent::RadioReady);
        self.pump();
    }

    pub fn loaded_count(&self) -> usize {
        self.effects
            .iter()
            .filter(|e| **e == EngineEffect::RecordsLoaded)
            .count()
    }

    pub fn write_result(&self, id: WriteId) -> Option<Result<(), WriteError>> {
        self.effects.iter().find_map(|e| match e {
            EngineEffect::WriteCompleted { id: done, result } if *done == id => Some(result.clone()),
            _ => None,
        })
    }

    pub fn indicator_notifications(&self) -> usize {
        self.effects
            .iter()
            .filter(|e| matches!(e, EngineEffect::IndicatorsChanged(_)))
            .count()
    }
}
