//! Session lifecycle coordinator.
//!
//! Owns the registry, role set, history, router and in-flight table, and
//! turns every [`SessionEvent`] into a list of [`Effect`]s. It performs no
//! I/O; the hub applies the effects (frames to outboxes, conversion calls,
//! transport closes) in the order they are returned.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use voxhub_protocol::{
    AudioClip, CancelReason, ClientMessage, ConnectionId, ErrorCode, GrantReason, LeaveReason,
    PeerId, PeerRef, PeerView, ReleaseCause, RequestId, RoleHolderView, RoleMode, ServerMessage,
    StatusSnapshot, PROTOCOL_VERSION,
};

use crate::error::CoordinatorError;
use crate::history::RoleHistory;
use crate::registry::PeerRegistry;
use crate::role_set::{Admission, ForcedAdmission, Removal, RoleGrant, RoleSet};
use crate::router::{
    Dispatch, PendingRequest, RequestRouter, RouterConfig, SubmitOutcome, WorkRequest,
};

/// What happens to converted work whose masters are all gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OrphanPolicy {
    /// Put the work back in the queue until a master appears.
    #[default]
    Retain,
    /// Drop the work and tell the submitter.
    Cancel,
}

impl std::str::FromStr for OrphanPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "retain" => Ok(OrphanPolicy::Retain),
            "cancel" => Ok(OrphanPolicy::Cancel),
            other => Err(format!("unknown orphan policy '{other}' (expected retain|cancel)")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub mode: RoleMode,
    pub orphan_policy: OrphanPolicy,
    pub router: RouterConfig,
    pub max_recovery_attempts: u32,
    pub idle_timeout: Duration,
    pub history_retention: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            mode: RoleMode::Single,
            orphan_policy: OrphanPolicy::Retain,
            router: RouterConfig::default(),
            max_recovery_attempts: 3,
            idle_timeout: Duration::from_secs(300),
            history_retention: Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    Connection(ConnectionId),
    Broadcast,
    BroadcastExcept(ConnectionId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Send { to: Recipient, message: ServerMessage },
    /// Hand the payload to the conversion service. The result must come back
    /// as [`SessionEvent::WorkResolved`] with the same request id.
    Dispatch(Dispatch),
    /// Close the transport. Emitted before the leave notifications.
    Close { connection_id: ConnectionId, reason: LeaveReason },
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    Connected {
        connection_id: ConnectionId,
        /// Identity presented by a returning client.
        peer_id: Option<PeerId>,
        metadata: serde_json::Map<String, serde_json::Value>,
    },
    Message {
        connection_id: ConnectionId,
        message: ClientMessage,
    },
    Disconnected {
        connection_id: ConnectionId,
    },
    WorkResolved {
        request_id: RequestId,
        result: Result<AudioClip, String>,
    },
    IdleSweep,
    HistorySweep,
}

#[derive(Debug, Clone)]
struct InFlight {
    dispatch: Dispatch,
    dispatched_at: DateTime<Utc>,
}

pub struct SessionCoordinator {
    config: CoordinatorConfig,
    registry: PeerRegistry,
    roles: RoleSet,
    history: RoleHistory,
    router: RequestRouter,
    in_flight: HashMap<RequestId, InFlight>,
}

impl SessionCoordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            registry: PeerRegistry::new(),
            roles: RoleSet::new(config.mode),
            history: RoleHistory::new(config.max_recovery_attempts),
            router: RequestRouter::new(config.router.clone()),
            in_flight: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn registry(&self) -> &PeerRegistry {
        &self.registry
    }

    pub fn roles(&self) -> &RoleSet {
        &self.roles
    }

    pub fn history(&self) -> &RoleHistory {
        &self.history
    }

    pub fn router(&self) -> &RequestRouter {
        &self.router
    }

    pub fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    pub fn handle(
        &mut self,
        event: SessionEvent,
        now: DateTime<Utc>,
    ) -> Result<Vec<Effect>, CoordinatorError> {
        let mut effects = Vec::new();
        match event {
            SessionEvent::Connected {
                connection_id,
                peer_id,
                metadata,
            } => self.on_connect(connection_id, peer_id, metadata, now, &mut effects)?,
            SessionEvent::Message {
                connection_id,
                message,
            } => self.on_message(connection_id, message, now, &mut effects)?,
            SessionEvent::Disconnected { connection_id } => {
                self.on_disconnect(&connection_id, LeaveReason::Closed, now, &mut effects)
            }
            SessionEvent::WorkResolved { request_id, result } => {
                self.on_resolved(request_id, result, now, &mut effects)
            }
            SessionEvent::IdleSweep => self.on_idle_sweep(now, &mut effects),
            SessionEvent::HistorySweep => {
                let purged = self.history.sweep(self.config.history_retention, now);
                if !purged.is_empty() {
                    tracing::debug!(purged = purged.len(), "Expired role history entries");
                }
            }
        }
        debug_assert!(
            self.roles.is_empty() || self.router.is_empty(),
            "pending queue must be empty while a master exists"
        );
        Ok(effects)
    }

    fn on_connect(
        &mut self,
        connection_id: ConnectionId,
        peer_id: Option<PeerId>,
        metadata: serde_json::Map<String, serde_json::Value>,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) -> Result<(), CoordinatorError> {
        let peer_id = peer_id.unwrap_or_else(PeerId::generate);
        let mut peer = self
            .registry
            .register(connection_id.clone(), peer_id.clone(), metadata, now)?;
        self.history.touch(&peer_id, now);
        if let Some(entry) = self.history.get(&peer_id) {
            self.registry.set_wants_role(&connection_id, entry.wants_role);
            peer.wants_role = entry.wants_role;
        }

        tracing::info!(
            peer_id = %peer_id,
            connection_id = %connection_id,
            peers = self.registry.count(),
            "Peer connected"
        );

        effects.push(Effect::Send {
            to: Recipient::Connection(connection_id.clone()),
            message: ServerMessage::Welcome {
                peer_id: peer_id.clone(),
                connection_id: connection_id.clone(),
                protocol_version: PROTOCOL_VERSION.to_string(),
            },
        });
        effects.push(Effect::Send {
            to: Recipient::Connection(connection_id.clone()),
            message: ServerMessage::StatusSnapshot {
                snapshot: self.snapshot(),
            },
        });
        effects.push(Effect::Send {
            to: Recipient::BroadcastExcept(connection_id.clone()),
            message: ServerMessage::PeerJoined {
                peer: peer.view(false),
                peer_count: self.registry.count(),
            },
        });

        if self.history.wants_recovery(&peer_id)
            && self
                .history
                .should_auto_grant(&peer_id, self.roles.mode(), self.roles.is_empty())
        {
            self.try_grant(&connection_id, GrantReason::AutoRecovered, now, effects);
        }
        Ok(())
    }

    fn on_message(
        &mut self,
        connection_id: ConnectionId,
        message: ClientMessage,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) -> Result<(), CoordinatorError> {
        if !self.registry.touch(&connection_id, now) {
            return Err(CoordinatorError::UnknownPeer(connection_id.to_string()));
        }
        let peer_id = self.peer_id_of(&connection_id)?;
        self.history.touch(&peer_id, now);
        tracing::trace!(connection_id = %connection_id, kind = message.kind(), "Inbound message");

        match message {
            ClientMessage::DeclarePreference {
                wants_role,
                was_role_holder,
            } => {
                self.history.record_preference(&peer_id, wants_role, now);
                self.registry.set_wants_role(&connection_id, wants_role);
                tracing::debug!(
                    peer_id = %peer_id,
                    wants_role,
                    claimed_holder = ?was_role_holder,
                    "Role preference declared"
                );
                if wants_role
                    && !self.roles.contains(&connection_id)
                    && self
                        .history
                        .should_auto_grant(&peer_id, self.roles.mode(), self.roles.is_empty())
                {
                    let reason = if self.history.wants_recovery(&peer_id) {
                        GrantReason::AutoRecovered
                    } else {
                        GrantReason::Manual
                    };
                    self.try_grant(&connection_id, reason, now, effects);
                }
            }
            ClientMessage::RequestRole { is_recovery } => {
                if self.roles.contains(&connection_id) {
                    effects.push(self.reply(
                        &connection_id,
                        ServerMessage::error(
                            ErrorCode::AlreadyRoleHolder,
                            "this connection already holds the master role",
                        ),
                    ));
                    return Ok(());
                }
                self.history.record_preference(&peer_id, true, now);
                self.registry.set_wants_role(&connection_id, true);
                let reason = if is_recovery {
                    GrantReason::AutoRecovered
                } else {
                    GrantReason::Manual
                };
                let denied = self.try_grant(&connection_id, reason, now, effects);
                if let Some(current_holders) = denied {
                    if is_recovery {
                        let attempts = self.history.record_recovery_attempt(&peer_id, now);
                        tracing::info!(peer_id = %peer_id, attempts, "Role recovery denied");
                    }
                    effects.push(self.reply(
                        &connection_id,
                        ServerMessage::RoleDenied {
                            reason: "the master role is already held".into(),
                            current_holders,
                            retry_hint: "wait for role-released or role-disconnected, then retry"
                                .into(),
                        },
                    ));
                }
            }
            ClientMessage::ReleaseRole { intentional } => match self.roles.remove(&connection_id) {
                Removal::NotMember => {
                    effects.push(self.reply(
                        &connection_id,
                        ServerMessage::error(
                            ErrorCode::NotRoleHolder,
                            "this connection does not hold the master role",
                        ),
                    ));
                }
                Removal::Removed(grant) => {
                    self.history.record_release(&peer_id, intentional, now);
                    if intentional {
                        self.registry.set_wants_role(&connection_id, false);
                    }
                    tracing::info!(peer_id = %peer_id, intentional, "Master role released");
                    effects.push(self.broadcast(ServerMessage::RoleReleased {
                        peer_id: grant.peer_id,
                        connection_id: grant.connection_id,
                        intentional,
                        preference_cleared: intentional,
                        cause: ReleaseCause::Voluntary,
                        holders: self.roles.targets(),
                    }));
                }
            },
            ClientMessage::SubmitWork {
                text,
                language,
                speed,
                priority,
            } => {
                let request = WorkRequest {
                    request_id: RequestId::generate(),
                    submitted_by: PeerRef {
                        peer_id: peer_id.clone(),
                        connection_id: connection_id.clone(),
                    },
                    text,
                    language,
                    speed,
                    priority,
                };
                match self.router.submit(request, &self.roles, now) {
                    SubmitOutcome::Routed(dispatch) => self.dispatch(dispatch, now, effects),
                    SubmitOutcome::Queued {
                        request_id,
                        position,
                    } => {
                        tracing::info!(
                            request_id = %request_id,
                            position,
                            "Work queued, no master"
                        );
                        let queued = ServerMessage::WorkQueued { request_id, position };
                        effects.push(self.reply(&connection_id, queued));
                        effects.push(self.broadcast(ServerMessage::RoleNeeded {
                            queue_length: self.router.len(),
                        }));
                    }
                    SubmitOutcome::Rejected(rejection) => {
                        tracing::debug!(peer_id = %peer_id, %rejection, "Work rejected");
                        let message = rejection.to_string();
                        let rejected = ServerMessage::WorkRejected { rejection, message };
                        effects.push(self.reply(&connection_id, rejected));
                    }
                }
            }
            ClientMessage::Heartbeat => {
                effects.push(self.reply(&connection_id, ServerMessage::Pong { server_time: now }));
            }
            ClientMessage::ClientInfo { metadata } => {
                self.registry.set_metadata(&connection_id, metadata);
            }
            ClientMessage::PlaybackControl { action } => {
                if self.roles.contains(&connection_id) {
                    effects.push(Effect::Send {
                        to: Recipient::BroadcastExcept(connection_id.clone()),
                        message: ServerMessage::Playback {
                            action,
                            from_peer_id: peer_id,
                        },
                    });
                } else {
                    effects.push(self.reply(
                        &connection_id,
                        ServerMessage::error(
                            ErrorCode::RoleRequired,
                            "only a master may control playback",
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    fn on_disconnect(
        &mut self,
        connection_id: &ConnectionId,
        reason: LeaveReason,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) {
        let Some(peer) = self.registry.remove(connection_id) else {
            return;
        };
        self.history.touch(&peer.peer_id, now);

        if let Removal::Removed(_) = self.roles.remove(connection_id) {
            self.history.record_release(&peer.peer_id, false, now);
            let wants_recovery = self.history.wants_recovery(&peer.peer_id);
            tracing::warn!(
                peer_id = %peer.peer_id,
                wants_recovery,
                remaining = self.roles.len(),
                "Master disconnected"
            );
            effects.push(self.broadcast(ServerMessage::RoleDisconnected {
                peer_id: peer.peer_id.clone(),
                connection_id: connection_id.clone(),
                wants_recovery,
            }));
        }

        tracing::info!(
            peer_id = %peer.peer_id,
            connection_id = %connection_id,
            ?reason,
            peers = self.registry.count(),
            "Peer left"
        );
        effects.push(self.broadcast(ServerMessage::PeerLeft {
            peer_id: peer.peer_id,
            connection_id: connection_id.clone(),
            reason,
            peer_count: self.registry.count(),
        }));
    }

    fn on_resolved(
        &mut self,
        request_id: RequestId,
        result: Result<AudioClip, String>,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) {
        let Some(InFlight {
            dispatch,
            dispatched_at,
        }) = self.in_flight.remove(&request_id)
        else {
            tracing::warn!(request_id = %request_id, "Resolution for unknown request");
            return;
        };
        let elapsed_ms = (now - dispatched_at).num_milliseconds();
        let submitter = dispatch.submitted_by.connection_id.clone();

        let audio = match result {
            Ok(audio) => audio,
            Err(error) => {
                tracing::warn!(request_id = %request_id, %error, elapsed_ms, "Conversion failed");
                self.notify(&submitter, ServerMessage::WorkFailed { request_id, error }, effects);
                return;
            }
        };

        let mut targets: Vec<PeerRef> = dispatch
            .targets
            .iter()
            .filter(|t| self.roles.contains(&t.connection_id))
            .cloned()
            .collect();
        if targets.is_empty() && !self.roles.is_empty() {
            targets = self.router.select_targets(&self.roles, &dispatch.submitted_by);
            tracing::info!(request_id = %request_id, "Target masters gone, re-routing audio");
        }

        if targets.is_empty() {
            match self.config.orphan_policy {
                OrphanPolicy::Retain => {
                    let pending = PendingRequest {
                        request_id: request_id.clone(),
                        payload: dispatch.payload,
                        submitted_by: dispatch.submitted_by,
                        enqueued_at: now,
                    };
                    match self.router.requeue(pending) {
                        Ok(position) => {
                            tracing::info!(
                                request_id = %request_id,
                                position,
                                "No master for audio, requeued"
                            );
                            let queued = ServerMessage::WorkQueued { request_id, position };
                            self.notify(&submitter, queued, effects);
                            effects.push(self.broadcast(ServerMessage::RoleNeeded {
                                queue_length: self.router.len(),
                            }));
                        }
                        Err(refused) => {
                            tracing::warn!(
                                request_id = %request_id,
                                capacity = self.router.config().max_queue_length,
                                "No master for audio and queue full, cancelled"
                            );
                            self.notify(
                                &submitter,
                                ServerMessage::WorkCancelled {
                                    request_id,
                                    text: refused.payload.text,
                                    reason: CancelReason::QueueFull,
                                },
                                effects,
                            );
                        }
                    }
                }
                OrphanPolicy::Cancel => {
                    tracing::info!(request_id = %request_id, "No master for audio, cancelled");
                    self.notify(
                        &submitter,
                        ServerMessage::WorkCancelled {
                            request_id,
                            text: dispatch.payload.text,
                            reason: CancelReason::NoRoleHolder,
                        },
                        effects,
                    );
                }
            }
            return;
        }

        let from_peer_id = dispatch.submitted_by.peer_id.clone();
        for target in &targets {
            effects.push(Effect::Send {
                to: Recipient::Connection(target.connection_id.clone()),
                message: ServerMessage::WorkAudio {
                    request_id: request_id.clone(),
                    from_peer_id: from_peer_id.clone(),
                    audio: audio.clone(),
                },
            });
        }
        tracing::info!(
            request_id = %request_id,
            targets = targets.len(),
            elapsed_ms,
            "Audio delivered"
        );
        self.notify(&submitter, ServerMessage::WorkCompleted { request_id, targets }, effects);
    }

    fn on_idle_sweep(&mut self, now: DateTime<Utc>, effects: &mut Vec<Effect>) {
        for connection_id in self.registry.idle(self.config.idle_timeout, now) {
            tracing::info!(connection_id = %connection_id, "Closing idle connection");
            effects.push(Effect::Close {
                connection_id: connection_id.clone(),
                reason: LeaveReason::IdleTimeout,
            });
            self.on_disconnect(&connection_id, LeaveReason::IdleTimeout, now, effects);
        }
    }

    /// Attempt admission for a registered connection. On success the grant is
    /// broadcast and the queue drained; on denial the current holders are
    /// returned.
    fn try_grant(
        &mut self,
        connection_id: &ConnectionId,
        reason: GrantReason,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) -> Option<Vec<PeerRef>> {
        let peer_id = self.registry.get(connection_id)?.peer_id.clone();
        match self.roles.try_add(connection_id.clone(), peer_id, reason, now) {
            Admission::Granted(grant) => {
                self.admit(grant, now, effects);
                None
            }
            Admission::AlreadyMember => None,
            Admission::Denied { current_holders } => Some(current_holders),
        }
    }

    fn admit(&mut self, grant: RoleGrant, now: DateTime<Utc>, effects: &mut Vec<Effect>) {
        self.history.record_grant(&grant.peer_id, now);
        self.registry.set_wants_role(&grant.connection_id, true);
        tracing::info!(
            peer_id = %grant.peer_id,
            connection_id = %grant.connection_id,
            reason = ?grant.reason,
            holders = self.roles.len(),
            "Master role granted"
        );
        effects.push(self.broadcast(ServerMessage::RoleGranted {
            peer_id: grant.peer_id,
            connection_id: grant.connection_id,
            reason: grant.reason,
            holders: self.roles.targets(),
        }));

        let drained = self.router.drain(&self.roles);
        if !drained.is_empty() {
            tracing::info!(count = drained.len(), "Draining pending queue");
        }
        for dispatch in drained {
            self.dispatch(dispatch, now, effects);
        }
    }

    fn dispatch(&mut self, dispatch: Dispatch, now: DateTime<Utc>, effects: &mut Vec<Effect>) {
        self.notify(
            &dispatch.submitted_by.connection_id,
            ServerMessage::WorkRouted {
                request_id: dispatch.request_id.clone(),
                targets: dispatch.targets.clone(),
            },
            effects,
        );
        self.in_flight.insert(
            dispatch.request_id.clone(),
            InFlight {
                dispatch: dispatch.clone(),
                dispatched_at: now,
            },
        );
        effects.push(Effect::Dispatch(dispatch));
    }

    fn cancel_pending(&mut self, reason: CancelReason, effects: &mut Vec<Effect>) -> usize {
        let cleared = self.router.clear();
        let count = cleared.len();
        for pending in cleared {
            self.notify(
                &pending.submitted_by.connection_id,
                ServerMessage::WorkCancelled {
                    request_id: pending.request_id,
                    text: pending.payload.text,
                    reason,
                },
                effects,
            );
        }
        count
    }

    /// Resolve an operator-supplied target: a connection id first, then the
    /// most recent connection of a peer id.
    pub fn resolve_target(&self, target: &str) -> Result<ConnectionId, CoordinatorError> {
        let as_connection = ConnectionId::new(target.to_string());
        if self.registry.contains(&as_connection) {
            return Ok(as_connection);
        }
        self.registry
            .find_by_peer(&PeerId::new(target.to_string()))
            .map(|p| p.connection_id.clone())
            .ok_or_else(|| CoordinatorError::UnknownPeer(target.to_string()))
    }

    /// Operator grant. In single mode the current holder is displaced.
    pub fn force_assign(
        &mut self,
        target: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Effect>, CoordinatorError> {
        let connection_id = self.resolve_target(target)?;
        let peer_id = self.peer_id_of(&connection_id)?;
        let mut effects = Vec::new();
        match self.roles.force_add(connection_id, peer_id, now) {
            ForcedAdmission::AlreadyMember => {
                return Err(CoordinatorError::AlreadyRoleHolder(target.to_string()))
            }
            ForcedAdmission::Granted { grant, displaced } => {
                for old in displaced {
                    self.history.record_revocation(&old.peer_id, now);
                    tracing::info!(peer_id = %old.peer_id, "Master displaced by operator");
                    effects.push(self.broadcast(ServerMessage::RoleReleased {
                        peer_id: old.peer_id,
                        connection_id: old.connection_id,
                        intentional: false,
                        preference_cleared: false,
                        cause: ReleaseCause::Operator,
                        holders: self.roles.targets(),
                    }));
                }
                self.admit(grant, now, &mut effects);
            }
        }
        Ok(effects)
    }

    pub fn force_remove(
        &mut self,
        target: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<Effect>, CoordinatorError> {
        let connection_id = self.resolve_target(target)?;
        match self.roles.remove(&connection_id) {
            Removal::NotMember => Err(CoordinatorError::NotRoleHolder(target.to_string())),
            Removal::Removed(grant) => {
                self.history.record_revocation(&grant.peer_id, now);
                tracing::info!(peer_id = %grant.peer_id, "Master removed by operator");
                Ok(vec![self.broadcast(ServerMessage::RoleReleased {
                    peer_id: grant.peer_id,
                    connection_id: grant.connection_id,
                    intentional: false,
                    preference_cleared: false,
                    cause: ReleaseCause::Operator,
                    holders: self.roles.targets(),
                })])
            }
        }
    }

    /// Drop every pending request. Returns the count and the cancel notices.
    pub fn clear_queue(&mut self) -> (usize, Vec<Effect>) {
        let mut effects = Vec::new();
        let count = self.cancel_pending(CancelReason::Cleared, &mut effects);
        if count > 0 {
            tracing::info!(count, "Pending queue cleared");
        }
        (count, effects)
    }

    pub fn peers(&self) -> Vec<PeerView> {
        self.registry
            .list()
            .into_iter()
            .map(|p| p.view(self.roles.contains(&p.connection_id)))
            .collect()
    }

    pub fn role_holders(&self) -> Vec<RoleHolderView> {
        self.roles.grants().into_iter().map(RoleGrant::view).collect()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            mode: self.roles.mode(),
            role_holders: self.role_holders(),
            peers: self.peers(),
            queue_length: self.router.len(),
            in_flight: self.in_flight.len(),
        }
    }

    fn peer_id_of(&self, connection_id: &ConnectionId) -> Result<PeerId, CoordinatorError> {
        self.registry
            .get(connection_id)
            .map(|p| p.peer_id.clone())
            .ok_or_else(|| CoordinatorError::UnknownPeer(connection_id.to_string()))
    }

    fn reply(&self, connection_id: &ConnectionId, message: ServerMessage) -> Effect {
        Effect::Send {
            to: Recipient::Connection(connection_id.clone()),
            message,
        }
    }

    fn broadcast(&self, message: ServerMessage) -> Effect {
        Effect::Send {
            to: Recipient::Broadcast,
            message,
        }
    }

    /// Direct send that is skipped once the connection has gone.
    fn notify(
        &self,
        connection_id: &ConnectionId,
        message: ServerMessage,
        effects: &mut Vec<Effect>,
    ) {
        if self.registry.contains(connection_id) {
            effects.push(self.reply(connection_id, message));
        }
    }
}
