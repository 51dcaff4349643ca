use serde::{Deserialize, Serialize};

use crate::identity::{ConnectionId, PeerId, RequestId};
use crate::types::*;
use crate::ProtocolError;

/// Frames a peer sends to the hub.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Durable wish to hold (or not hold) the master role.
    DeclarePreference {
        wants_role: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        was_role_holder: Option<bool>,
    },
    RequestRole {
        #[serde(default)]
        is_recovery: bool,
    },
    ReleaseRole {
        #[serde(default = "default_true")]
        intentional: bool,
    },
    SubmitWork {
        #[serde(default)]
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        priority: Option<Priority>,
    },
    Heartbeat,
    /// Opaque client attributes (user agent, screen, url...).
    ClientInfo {
        #[serde(default)]
        metadata: serde_json::Map<String, serde_json::Value>,
    },
    PlaybackControl { action: PlaybackAction },
}

fn default_true() -> bool {
    true
}

impl ClientMessage {
    pub fn decode(frame: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(frame)?)
    }

    /// Wire name of the frame, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::DeclarePreference { .. } => "declare-preference",
            ClientMessage::RequestRole { .. } => "request-role",
            ClientMessage::ReleaseRole { .. } => "release-role",
            ClientMessage::SubmitWork { .. } => "submit-work",
            ClientMessage::Heartbeat => "heartbeat",
            ClientMessage::ClientInfo { .. } => "client-info",
            ClientMessage::PlaybackControl { .. } => "playback-control",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LeaveReason {
    Closed,
    IdleTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReleaseCause {
    /// The holder asked to give the role up.
    Voluntary,
    /// An operator removed or replaced the holder.
    Operator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CancelReason {
    /// An operator cleared the pending queue.
    Cleared,
    /// No master remained to receive the work.
    NoRoleHolder,
    /// The work could not be put back because the pending queue is full.
    QueueFull,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorCode {
    InvalidMessage,
    NotRoleHolder,
    AlreadyRoleHolder,
    RoleRequired,
}

/// Frames the hub sends to peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Welcome {
        peer_id: PeerId,
        connection_id: ConnectionId,
        protocol_version: String,
    },
    StatusSnapshot {
        #[serde(flatten)]
        snapshot: StatusSnapshot,
    },
    PeerJoined {
        peer: PeerView,
        peer_count: usize,
    },
    PeerLeft {
        peer_id: PeerId,
        connection_id: ConnectionId,
        reason: LeaveReason,
        peer_count: usize,
    },
    RoleGranted {
        peer_id: PeerId,
        connection_id: ConnectionId,
        reason: GrantReason,
        holders: Vec<PeerRef>,
    },
    RoleDenied {
        reason: String,
        current_holders: Vec<PeerRef>,
        retry_hint: String,
    },
    RoleReleased {
        peer_id: PeerId,
        connection_id: ConnectionId,
        intentional: bool,
        preference_cleared: bool,
        cause: ReleaseCause,
        holders: Vec<PeerRef>,
    },
    RoleDisconnected {
        peer_id: PeerId,
        connection_id: ConnectionId,
        wants_recovery: bool,
    },
    RoleNeeded {
        queue_length: usize,
    },
    WorkRouted {
        request_id: RequestId,
        targets: Vec<PeerRef>,
    },
    WorkQueued {
        request_id: RequestId,
        position: usize,
    },
    WorkRejected {
        rejection: Rejection,
        message: String,
    },
    WorkCancelled {
        request_id: RequestId,
        text: String,
        reason: CancelReason,
    },
    WorkFailed {
        request_id: RequestId,
        error: String,
    },
    WorkAudio {
        request_id: RequestId,
        from_peer_id: PeerId,
        audio: AudioClip,
    },
    WorkCompleted {
        request_id: RequestId,
        targets: Vec<PeerRef>,
    },
    Playback {
        action: PlaybackAction,
        from_peer_id: PeerId,
    },
    Pong {
        server_time: chrono::DateTime<chrono::Utc>,
    },
    Error {
        code: ErrorCode,
        message: String,
    },
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_declare_preference() {
        let msg = ClientMessage::decode(
            r#"{"type":"declare-preference","wantsRole":true,"wasRoleHolder":true}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ClientMessage::DeclarePreference {
                wants_role: true,
                was_role_holder: Some(true),
            }
        );
    }

    #[test]
    fn test_release_defaults_to_intentional() {
        let msg = ClientMessage::decode(r#"{"type":"release-role"}"#).unwrap();
        assert_eq!(msg, ClientMessage::ReleaseRole { intentional: true });
    }

    #[test]
    fn test_submit_work_optional_fields() {
        let msg = ClientMessage::decode(r#"{"type":"submit-work","text":"Halo"}"#).unwrap();
        match msg {
            ClientMessage::SubmitWork { text, language, speed, priority } => {
                assert_eq!(text, "Halo");
                assert!(language.is_none());
                assert!(speed.is_none());
                assert!(priority.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_is_invalid() {
        let err = ClientMessage::decode(r#"{"type":"become-god"}"#).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidMessage(_)));
    }

    #[test]
    fn test_server_message_tags() {
        let json = serde_json::to_value(ServerMessage::RoleNeeded { queue_length: 2 }).unwrap();
        assert_eq!(json["type"], "role-needed");
        assert_eq!(json["queueLength"], 2);
    }

    #[test]
    fn test_status_snapshot_is_flattened() {
        let msg = ServerMessage::StatusSnapshot {
            snapshot: StatusSnapshot {
                mode: RoleMode::Single,
                role_holders: vec![],
                peers: vec![],
                queue_length: 3,
                in_flight: 0,
            },
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "status-snapshot");
        assert_eq!(json["queueLength"], 3);
        assert_eq!(json["mode"], "single");
    }
}
