//! SIM card record acquisition and resolution.
//!
//! The workspace is layered bottom-up:
//!
//! - `sim-records-types`: file identifiers and the published snapshot
//! - `sim-codec`: bounds-checked decoders and encoders for card record formats
//! - `sim-transport`: request tags, the reply channel and a simulated card
//! - `sim-resolver`: fallback state machines (provider name, network name, mailbox)
//! - `sim-records-core`: the pending ledger, record store and orchestrating engine
//!
//! This crate runs the engine as a tokio task ([`service`]) and builds its
//! configuration from the environment ([`config`]). See [`CardRecordsService::spawn`].

pub mod config;
pub mod service;

pub use config::{ConfigError, ServiceConfig};
pub use service::{CardRecordsHandle, CardRecordsService, ServiceError};

pub use sim_records_core::{EngineConfig, EngineDiagnostics, IndicatorState, WriteError};
pub use sim_records_types::{
    CardRecordSnapshot, DialingNumber, DisplayRule, FileId, RegistrationContext,
};
