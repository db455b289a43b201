//! Card record loading engine.
//!
//! This crate turns a stream of transport replies into a consistent
//! [`CardRecordSnapshot`](sim_records_types::CardRecordSnapshot):
//!
//! - [`ledger`]: counts outstanding reads so convergence is detected exactly once
//! - [`store`]: the snapshot under construction, raw indicator bytes and card facts
//! - [`engine`]: the orchestrator, a synchronous event-in/effects-out state machine
//! - [`config`]: algorithm selection and carrier overrides
//!
//! The engine owns no I/O. Callers feed it [`EngineEvent`]s and carry out the
//! [`EngineEffect`]s it returns; the `sim-records` service does exactly that
//! on a tokio task.

pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod mcc;
pub mod store;

pub use config::{CarrierOverrides, EngineConfig};
pub use engine::{
    EngineDiagnostics, EngineEffect, EngineEvent, Phase, RecordEngine, WriteCommand, WriteId,
};
pub use error::{ProtocolViolation, WriteError};
pub use ledger::{PendingLedger, SettleOutcome};
pub use store::{IndicatorState, RawFileCache, RecordStore, DEFAULT_RECORD_SIZE};
