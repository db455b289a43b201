//! Service tests: the engine running as a tokio task behind `CardRecordsHandle`.

mod common;

use common::*;
use parking_lot::Mutex;
use sim_codec::AdnRecord;
use sim_records::{
    CardRecordsService, EngineConfig, FileId, IndicatorState, RegistrationContext, WriteError,
};
use sim_transport::{CardFile, DeliveryMode, SimulatedCard};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn spawn(card: &Arc<SimulatedCard>) -> sim_records::CardRecordsHandle {
    CardRecordsService::spawn(EngineConfig::default(), card.clone())
}

// =============================================================================
// Loading
// =============================================================================

#[tokio::test]
async fn test_load_publishes_snapshot() {
    let card = Arc::new(demo_card());
    let handle = spawn(&card);
    assert!(!handle.is_loaded());

    handle.radio_ready();
    let snapshot = tokio::time::timeout(TIMEOUT, handle.wait_loaded())
        .await
        .unwrap()
        .unwrap();

    assert!(handle.is_loaded());
    assert_eq!(snapshot.subscriber_id.as_deref(), Some("310260123456789"));
    assert_eq!(snapshot.home_operator.as_deref(), Some("310260"));
    assert_eq!(snapshot.provider_display_name.as_deref(), Some("Carrier"));
    assert_eq!(snapshot.operator_long_name.as_deref(), Some("Carrier Mobile"));
    assert_eq!(handle.current_snapshot(), snapshot);
    assert_eq!(handle.diagnostics().stale_replies, 0);
    handle.shutdown().await;
}

#[tokio::test]
async fn test_loaded_callback_fires_once_per_cycle() {
    let card = Arc::new(demo_card());
    let handle = spawn(&card);
    let fired = Arc::new(AtomicUsize::new(0));
    let counter = fired.clone();
    handle
        .subscribe_on_loaded(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    handle.radio_ready();
    tokio::time::timeout(TIMEOUT, handle.wait_loaded())
        .await
        .unwrap()
        .unwrap();
    // a second ready signal while loaded starts nothing
    handle.radio_ready();
    handle.card_file_changed(FileId::SPDI);
    tokio::time::timeout(TIMEOUT, async {
        while fired.load(Ordering::SeqCst) < 2 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    handle.shutdown().await;

    assert_eq!(fired.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_late_subscriber_called_immediately() {
    let card = Arc::new(demo_card());
    let handle = spawn(&card);
    handle.radio_ready();
    tokio::time::timeout(TIMEOUT, handle.wait_loaded())
        .await
        .unwrap()
        .unwrap();

    let seen = Arc::new(Mutex::new(None));
    let slot = seen.clone();
    handle
        .subscribe_on_loaded(move |snapshot| {
            *slot.lock() = snapshot.card_serial.clone();
        })
        .unwrap();
    handle.shutdown().await;

    assert_eq!(seen.lock().as_deref(), Some("8901260123456789012"));
}

#[tokio::test]
async fn test_card_reset_with_replies_in_flight() {
    let card = Arc::new(demo_card());
    card.set_delivery(DeliveryMode::Held);
    let handle = spawn(&card);
    handle.radio_ready();

    // wait for the first batch, then for the reset's batch
    handle.card_reset();
    tokio::time::timeout(TIMEOUT, async {
        while card.pending_tags().len() < 26 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    card.set_delivery(DeliveryMode::Immediate);
    card.release_all();

    tokio::time::timeout(TIMEOUT, handle.wait_loaded())
        .await
        .unwrap()
        .unwrap();
    handle.shutdown().await;
    assert_eq!(handle.diagnostics().stale_replies, 13);
}

#[tokio::test]
async fn test_operator_list_registration_before_ready() {
    let card = Arc::new(demo_card());
    let mut opl = vec![0x13, 0x00, 0x62];
    opl.extend([0x00, 0x00, 0xFF, 0xFE, 0x02]);
    card.insert_file(FileId::OPL, CardFile::LinearFixed(vec![opl]));
    let mut pnn2 = vec![0x43, 0x05];
    pnn2.extend(b"Local");
    pnn2.resize(16, 0xFF);
    let pnn1 = record(&card, FileId::PNN);
    card.insert_file(FileId::PNN, CardFile::LinearFixed(vec![pnn1, pnn2]));

    let config = EngineConfig {
        name_algorithm: sim_resolver::NameAlgorithm::OperatorList,
        ..EngineConfig::default()
    };
    let handle = CardRecordsService::spawn(config, card.clone());
    handle.registration_changed(Some(RegistrationContext::new("310260", 0x1234)));
    handle.radio_ready();
    let snapshot = tokio::time::timeout(TIMEOUT, handle.wait_loaded())
        .await
        .unwrap()
        .unwrap();
    handle.shutdown().await;

    assert_eq!(snapshot.operator_long_name.as_deref(), Some("Local"));
    assert_eq!(snapshot.operator_short_name, None);
}

// =============================================================================
// Writes
// =============================================================================

#[tokio::test]
async fn test_writes_reach_the_card() {
    let card = Arc::new(demo_card());
    let handle = spawn(&card);
    handle.radio_ready();
    tokio::time::timeout(TIMEOUT, handle.wait_loaded())
        .await
        .unwrap()
        .unwrap();

    handle.set_own_number("Work", "5551234").await.unwrap();
    handle
        .set_voicemail_number("VM", "+15550009999")
        .await
        .unwrap();

    let own = AdnRecord::decode(&record(&card, FileId::MSISDN)).unwrap();
    assert_eq!(own.number, "5551234");
    let mailbox = AdnRecord::decode(&record(&card, FileId::MBDN)).unwrap();
    assert_eq!(mailbox.number, "+15550009999");
    let snapshot = handle.current_snapshot();
    assert_eq!(snapshot.own_number.unwrap().digits, "5551234");
    assert_eq!(snapshot.voicemail_number.unwrap().display_name, "VM");
    handle.shutdown().await;
}

#[tokio::test]
async fn test_indicator_subscribers_see_writes() {
    let card = Arc::new(demo_card());
    let handle = spawn(&card);
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    handle
        .subscribe_indicators(move |state| sink.lock().push(state))
        .unwrap();
    handle.radio_ready();
    tokio::time::timeout(TIMEOUT, handle.wait_loaded())
        .await
        .unwrap()
        .unwrap();

    handle.set_call_forwarding(false).await.unwrap();
    handle.set_voice_message_waiting(300).await.unwrap();
    handle.shutdown().await;

    let states = states.lock();
    assert_eq!(
        states.last(),
        Some(&IndicatorState {
            voicemail_message_count: 255,
            call_forwarding_enabled: false,
        })
    );
    assert!(states.contains(&IndicatorState {
        voicemail_message_count: 3,
        call_forwarding_enabled: false,
    }));
}

#[tokio::test]
async fn test_concurrent_writes_all_complete() {
    let card = Arc::new(demo_card());
    let handle = spawn(&card);
    handle.radio_ready();
    tokio::time::timeout(TIMEOUT, handle.wait_loaded())
        .await
        .unwrap()
        .unwrap();

    let results = futures::future::join_all((0..8).map(|i| {
        let handle = handle.clone();
        async move { handle.set_voice_message_waiting(i).await }
    }))
    .await;
    assert!(results.iter().all(Result::is_ok));
    handle.shutdown().await;
}

#[tokio::test]
async fn test_write_before_ready_is_refused() {
    let card = Arc::new(demo_card());
    let handle = spawn(&card);
    assert_eq!(
        handle.set_call_forwarding(true).await,
        Err(WriteError::CardUnavailable)
    );
    handle.shutdown().await;
}

#[tokio::test]
async fn test_write_after_shutdown() {
    let card = Arc::new(demo_card());
    let handle = spawn(&card);
    handle.shutdown().await;
    assert_eq!(
        handle.set_own_number("", "1").await,
        Err(WriteError::ServiceStopped)
    );
    assert!(handle.wait_loaded().await.is_err());
}
