//! Card records service: a tokio task owning the [`RecordEngine`].
//!
//! Lifecycle signals, subscriptions and writes reach the task over one
//! command channel; transport replies over the [`ReplySink`] channel. Both
//! are drained one message at a time, so the engine is never shared. After
//! every message the task publishes a copy of the snapshot that
//! [`CardRecordsHandle::current_snapshot`] reads without a round trip.

use parking_lot::RwLock;
use sim_records_core::{
    EngineConfig, EngineDiagnostics, EngineEffect, EngineEvent, IndicatorState, RecordEngine,
    WriteCommand, WriteError, WriteId,
};
use sim_records_types::{CardRecordSnapshot, DialingNumber, FileId, RegistrationContext};
use sim_transport::{CardTransport, ReplySink, TransportReply};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub type LoadedCallback = Box<dyn Fn(&CardRecordSnapshot) + Send + Sync>;
pub type IndicatorCallback = Box<dyn Fn(IndicatorState) + Send + Sync>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("record service stopped")]
    Stopped,
}

enum Command {
    Signal(EngineEvent),
    SubscribeLoaded(LoadedCallback),
    SubscribeIndicators(IndicatorCallback),
    Write {
        command: WriteCommand,
        reply: oneshot::Sender<Result<(), WriteError>>,
    },
    Shutdown,
}

/// State copied out of the task after every message.
#[derive(Debug, Clone, Default)]
struct Published {
    snapshot: CardRecordSnapshot,
    loaded: bool,
    diagnostics: EngineDiagnostics,
}

pub struct CardRecordsService {
    engine: RecordEngine,
    transport: Arc<dyn CardTransport>,
    sink: ReplySink,
    commands: mpsc::UnboundedReceiver<Command>,
    replies: mpsc::UnboundedReceiver<TransportReply>,
    published: Arc<RwLock<Published>>,
    loaded: watch::Sender<bool>,
    loaded_subscribers: Vec<LoadedCallback>,
    indicator_subscribers: Vec<IndicatorCallback>,
    writes: HashMap<WriteId, oneshot::Sender<Result<(), WriteError>>>,
    next_write_id: WriteId,
}

impl CardRecordsService {
    /// Start the service on the current tokio runtime.
    ///
    /// Nothing is read until [`CardRecordsHandle::radio_ready`] is called.
    pub fn spawn(config: EngineConfig, transport: Arc<dyn CardTransport>) -> CardRecordsHandle {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (sink, replies) = ReplySink::channel();
        let (loaded, loaded_rx) = watch::channel(false);
        let published = Arc::new(RwLock::new(Published::default()));

        let service = Self {
            engine: RecordEngine::new(config),
            transport,
            sink,
            commands,
            replies,
            published: published.clone(),
            loaded,
            loaded_subscribers: Vec::new(),
            indicator_subscribers: Vec::new(),
            writes: HashMap::new(),
            next_write_id: 1,
        };
        let task = tokio::spawn(service.run());

        CardRecordsHandle {
            commands: commands_tx,
            published,
            loaded: loaded_rx,
            task: Arc::new(parking_lot::Mutex::new(Some(task))),
        }
    }

    async fn run(mut self) {
        info!("card records service started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(Command::Shutdown) | None => break,
                    Some(command) => self.on_command(command),
                },
                Some(reply) = self.replies.recv() => self.dispatch(EngineEvent::Reply(reply)),
            }
        }
        for (_, reply) in self.writes.drain() {
            let _ = reply.send(Err(WriteError::ServiceStopped));
        }
        info!("card records service stopped");
    }

    fn on_command(&mut self, command: Command) {
        match command {
            Command::Signal(event) => self.dispatch(event),
            Command::SubscribeLoaded(callback) => {
                if self.engine.is_loaded() {
                    callback(self.engine.snapshot());
                }
                self.loaded_subscribers.push(callback);
            }
            Command::SubscribeIndicators(callback) => self.indicator_subscribers.push(callback),
            Command::Write { command, reply } => {
                let id = self.next_write_id;
                self.next_write_id += 1;
                self.writes.insert(id, reply);
                self.dispatch(EngineEvent::Write { id, command });
            }
            Command::Shutdown => {}
        }
    }

    fn dispatch(&mut self, event: EngineEvent) {
        let effects = self.engine.handle(event);
        for effect in effects {
            match effect {
                EngineEffect::Submit { tag, request } => {
                    self.transport.submit(tag, request, &self.sink);
                }
                EngineEffect::RecordsLoaded => {
                    self.publish();
                    let snapshot = self.engine.snapshot();
                    debug!(
                        subscribers = self.loaded_subscribers.len(),
                        "notifying records loaded"
                    );
                    for callback in &self.loaded_subscribers {
                        callback(snapshot);
                    }
                }
                EngineEffect::WriteCompleted { id, result } => match self.writes.remove(&id) {
                    Some(reply) => {
                        let _ = reply.send(result);
                    }
                    None => warn!(write = id, "completion for an unknown write"),
                },
                EngineEffect::IndicatorsChanged(state) => {
                    for callback in &self.indicator_subscribers {
                        callback(state);
                    }
                }
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let loaded = self.engine.is_loaded();
        *self.published.write() = Published {
            snapshot: self.engine.snapshot().clone(),
            loaded,
            diagnostics: self.engine.diagnostics(),
        };
        self.loaded.send_if_modified(|current| {
            let changed = *current != loaded;
            *current = loaded;
            changed
        });
    }
}

/// Cloneable handle to a running [`CardRecordsService`].
#[derive(Clone)]
pub struct CardRecordsHandle {
    commands: mpsc::UnboundedSender<Command>,
    published: Arc<RwLock<Published>>,
    loaded: watch::Receiver<bool>,
    task: Arc<parking_lot::Mutex<Option<JoinHandle<()>>>>,
}

impl CardRecordsHandle {
    fn send(&self, command: Command) -> Result<(), ServiceError> {
        self.commands.send(command).map_err(|_| ServiceError::Stopped)
    }

    fn signal(&self, event: EngineEvent) {
        if self.send(Command::Signal(event)).is_err() {
            debug!("signal dropped, service stopped");
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    pub fn radio_ready(&self) {
        self.signal(EngineEvent::RadioReady);
    }

    pub fn radio_unavailable(&self) {
        self.signal(EngineEvent::RadioUnavailable);
    }

    pub fn card_reset(&self) {
        self.signal(EngineEvent::CardReset);
    }

    pub fn card_file_changed(&self, file: FileId) {
        self.signal(EngineEvent::FileChanged(file));
    }

    pub fn registration_changed(&self, registration: Option<RegistrationContext>) {
        self.signal(EngineEvent::RegistrationChanged(registration));
    }

    /// Stop the service; pending writes fail with [`WriteError::ServiceStopped`].
    pub async fn shutdown(&self) {
        let _ = self.send(Command::Shutdown);
        let task = self.task.lock().take();
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!(error = %err, "card records service task failed");
            }
        }
    }

    // =========================================================================
    // Queries and subscriptions
    // =========================================================================

    pub fn current_snapshot(&self) -> CardRecordSnapshot {
        self.published.read().snapshot.clone()
    }

    pub fn is_loaded(&self) -> bool {
        self.published.read().loaded
    }

    pub fn diagnostics(&self) -> EngineDiagnostics {
        self.published.read().diagnostics
    }

    /// Call `callback` at the end of every load cycle, and right away if the
    /// current cycle already finished.
    pub fn subscribe_on_loaded(
        &self,
        callback: impl Fn(&CardRecordSnapshot) + Send + Sync + 'static,
    ) -> Result<(), ServiceError> {
        self.send(Command::SubscribeLoaded(Box::new(callback)))
    }

    /// Call `callback` whenever the message-waiting or call-forwarding state changes.
    pub fn subscribe_indicators(
        &self,
        callback: impl Fn(IndicatorState) + Send + Sync + 'static,
    ) -> Result<(), ServiceError> {
        self.send(Command::SubscribeIndicators(Box::new(callback)))
    }

    /// Wait until the current load cycle finishes and return its snapshot.
    pub async fn wait_loaded(&self) -> Result<CardRecordSnapshot, ServiceError> {
        let mut loaded = self.loaded.clone();
        loaded
            .wait_for(|loaded| *loaded)
            .await
            .map_err(|_| ServiceError::Stopped)?;
        Ok(self.current_snapshot())
    }

    // =========================================================================
    // Writes
    // =========================================================================

    async fn write(&self, command: WriteCommand) -> Result<(), WriteError> {
        let (reply, result) = oneshot::channel();
        self.send(Command::Write { command, reply })
            .map_err(|_| WriteError::ServiceStopped)?;
        result.await.unwrap_or(Err(WriteError::ServiceStopped))
    }

    pub async fn set_own_number(&self, display_name: &str, digits: &str) -> Result<(), WriteError> {
        self.write(WriteCommand::OwnNumber(DialingNumber::new(display_name, digits)))
            .await
    }

    pub async fn set_voicemail_number(
        &self,
        display_name: &str,
        digits: &str,
    ) -> Result<(), WriteError> {
        self.write(WriteCommand::VoicemailNumber(DialingNumber::new(
            display_name,
            digits,
        )))
        .await
    }

    pub async fn set_call_forwarding(&self, enabled: bool) -> Result<(), WriteError> {
        self.write(WriteCommand::CallForwarding(enabled)).await
    }

    /// `count` is clamped to `-1..=255`; `-1` means waiting with an unknown count.
    pub async fn set_voice_message_waiting(&self, count: i32) -> Result<(), WriteError> {
        self.write(WriteCommand::VoiceMessageWaiting(count)).await
    }
}
