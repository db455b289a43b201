#![allow(dead_code)]
//! Shared helpers for the service and CLI tests.

use sim_records_types::FileId;
use sim_transport::{CardImage, SimulatedCard};
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for anything a test awaits.
pub const TIMEOUT: Duration = Duration::from_secs(5);

pub fn demo_image_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("demos/card.json")
}

/// The demo card image as a simulated card.
pub fn demo_card() -> SimulatedCard {
    CardImage::load(&demo_image_path())
        .expect("demo image loads")
        .to_card()
        .expect("demo image is valid")
}

pub fn record(card: &SimulatedCard, file: FileId) -> Vec<u8> {
    match card.file(file) {
        Some(sim_transport::CardFile::LinearFixed(records)) => records[0].clone(),
        other => panic!("{file} has no records: {other:?}"),
    }
}
