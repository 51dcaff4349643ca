//! Hub: shared coordinator state plus the I/O that applies its effects.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use voxhub_protocol::{
    ClientMessage, ConnectionId, ErrorCode, LeaveReason, PeerId, PeerView, RoleHolderView,
    ServerMessage, StatusSnapshot,
};
use voxhub_roles::{
    CoordinatorConfig, CoordinatorError, Dispatch, Effect, Recipient, SessionCoordinator,
    SessionEvent,
};
use voxhub_synth::{SpeechSynthesizer, SynthesisRequest};

/// What the session task writes to its socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    Frame(String),
    Close(LeaveReason),
}

pub struct HubState {
    pub coordinator: SessionCoordinator,
    outboxes: HashMap<ConnectionId, mpsc::UnboundedSender<Outbound>>,
}

#[derive(Clone)]
pub struct Hub {
    state: Arc<RwLock<HubState>>,
    synth: Arc<dyn SpeechSynthesizer>,
}

impl Hub {
    pub fn new(config: CoordinatorConfig, synth: Arc<dyn SpeechSynthesizer>) -> Self {
        Self {
            state: Arc::new(RwLock::new(HubState {
                coordinator: SessionCoordinator::new(config),
                outboxes: HashMap::new(),
            })),
            synth,
        }
    }

    pub fn synthesizer(&self) -> Arc<dyn SpeechSynthesizer> {
        self.synth.clone()
    }

    /// Register a new connection. The returned receiver already holds the
    /// welcome and status frames.
    pub async fn connect(
        &self,
        peer_id: Option<PeerId>,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(ConnectionId, mpsc::UnboundedReceiver<Outbound>), CoordinatorError> {
        let connection_id = ConnectionId::generate();
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.write().await;
        state.outboxes.insert(connection_id.clone(), tx);
        let event = SessionEvent::Connected {
            connection_id: connection_id.clone(),
            peer_id,
            metadata,
        };
        match state.coordinator.handle(event, chrono::Utc::now()) {
            Ok(effects) => {
                self.apply(&mut state, effects);
                Ok((connection_id, rx))
            }
            Err(e) => {
                state.outboxes.remove(&connection_id);
                Err(e)
            }
        }
    }

    pub async fn message(&self, connection_id: &ConnectionId, message: ClientMessage) {
        let event = SessionEvent::Message {
            connection_id: connection_id.clone(),
            message,
        };
        if let Err(e) = self.event(event).await {
            tracing::warn!(connection_id = %connection_id, error = %e, "Message rejected");
        }
    }

    /// Answer a frame that could not be decoded. The connection stays open.
    pub async fn reject_frame(&self, connection_id: &ConnectionId, reason: String) {
        tracing::debug!(connection_id = %connection_id, %reason, "Invalid frame");
        let state = self.state.read().await;
        if let Some(outbox) = state.outboxes.get(connection_id) {
            let message = ServerMessage::error(ErrorCode::InvalidMessage, reason);
            if let Ok(frame) = message.encode() {
                let _ = outbox.send(Outbound::Frame(frame));
            }
        }
    }

    pub async fn disconnect(&self, connection_id: &ConnectionId) {
        let mut state = self.state.write().await;
        state.outboxes.remove(connection_id);
        let event = SessionEvent::Disconnected {
            connection_id: connection_id.clone(),
        };
        match state.coordinator.handle(event, chrono::Utc::now()) {
            Ok(effects) => self.apply(&mut state, effects),
            Err(e) => {
                tracing::warn!(connection_id = %connection_id, error = %e, "Disconnect failed")
            }
        }
    }

    pub async fn event(&self, event: SessionEvent) -> Result<(), CoordinatorError> {
        let mut state = self.state.write().await;
        let effects = state.coordinator.handle(event, chrono::Utc::now())?;
        self.apply(&mut state, effects);
        Ok(())
    }

    pub async fn force_assign(&self, target: &str) -> Result<(), CoordinatorError> {
        let mut state = self.state.write().await;
        let effects = state.coordinator.force_assign(target, chrono::Utc::now())?;
        self.apply(&mut state, effects);
        Ok(())
    }

    pub async fn force_remove(&self, target: &str) -> Result<(), CoordinatorError> {
        let mut state = self.state.write().await;
        let effects = state.coordinator.force_remove(target, chrono::Utc::now())?;
        self.apply(&mut state, effects);
        Ok(())
    }

    pub async fn clear_queue(&self) -> usize {
        let mut state = self.state.write().await;
        let (count, effects) = state.coordinator.clear_queue();
        self.apply(&mut state, effects);
        count
    }

    pub async fn snapshot(&self) -> StatusSnapshot {
        self.state.read().await.coordinator.snapshot()
    }

    pub async fn peers(&self) -> Vec<PeerView> {
        self.state.read().await.coordinator.peers()
    }

    pub async fn role_holders(&self) -> Vec<RoleHolderView> {
        self.state.read().await.coordinator.role_holders()
    }

    /// Drive the idle and history sweeps until the task is dropped.
    pub async fn run_timers(
        self,
        idle_every: Duration,
        history_every: Duration,
    ) -> Result<(), anyhow::Error> {
        let mut idle_interval = tokio::time::interval(idle_every);
        let mut history_interval = tokio::time::interval(history_every);
        // Both fire immediately; skip that first tick.
        idle_interval.tick().await;
        history_interval.tick().await;

        loop {
            tokio::select! {
                _ = idle_interval.tick() => {
                    self.event(SessionEvent::IdleSweep).await?;
                }
                _ = history_interval.tick() => {
                    self.event(SessionEvent::HistorySweep).await?;
                }
            }
        }
    }

    /// Runs under the write guard so frames leave in state order.
    fn apply(&self, state: &mut HubState, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Send { to, message } => {
                    let frame = match message.encode() {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to encode outbound frame");
                            continue;
                        }
                    };
                    match to {
                        Recipient::Connection(id) => {
                            if let Some(outbox) = state.outboxes.get(&id) {
                                let _ = outbox.send(Outbound::Frame(frame));
                            }
                        }
                        Recipient::Broadcast => {
                            for outbox in state.outboxes.values() {
                                let _ = outbox.send(Outbound::Frame(frame.clone()));
                            }
                        }
                        Recipient::BroadcastExcept(skip) => {
                            for (id, outbox) in &state.outboxes {
                                if *id != skip {
                                    let _ = outbox.send(Outbound::Frame(frame.clone()));
                                }
                            }
                        }
                    }
                }
                Effect::Dispatch(dispatch) => self.spawn_conversion(dispatch),
                Effect::Close {
                    connection_id,
                    reason,
                } => {
                    if let Some(outbox) = state.outboxes.remove(&connection_id) {
                        let _ = outbox.send(Outbound::Close(reason));
                    }
                }
            }
        }
    }

    /// The synthesizer runs on its own task so a panic inside it still
    /// resolves the request.
    fn spawn_conversion(&self, dispatch: Dispatch) {
        let hub = self.clone();
        tokio::spawn(async move {
            let request = SynthesisRequest {
                text: dispatch.payload.text,
                language: dispatch.payload.language,
                speed: dispatch.payload.speed,
            };
            let synth = hub.synth.clone();
            let conversion = tokio::spawn(async move { synth.synthesize(&request).await });
            let result = match conversion.await {
                Ok(outcome) => outcome.map_err(|e| e.to_string()),
                Err(e) => {
                    tracing::error!(
                        request_id = %dispatch.request_id,
                        error = %e,
                        "Conversion task aborted"
                    );
                    Err("conversion failed unexpectedly".to_string())
                }
            };
            let event = SessionEvent::WorkResolved {
                request_id: dispatch.request_id,
                result,
            };
            if let Err(e) = hub.event(event).await {
                tracing::error!(error = %e, "Failed to resolve work");
            }
        });
    }
}
