use serde::{Deserialize, Serialize};

use crate::identity::{ConnectionId, PeerId};

/// Admission policy for the master role. Chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RoleMode {
    /// At most one master at any time.
    #[default]
    Single,
    /// Any number of masters; every request fans out to all of them.
    Multi,
}

impl std::str::FromStr for RoleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" => Ok(RoleMode::Single),
            "multi" => Ok(RoleMode::Multi),
            other => Err(format!("unknown role mode '{other}' (expected single|multi)")),
        }
    }
}

/// Why a connection was admitted to the role set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrantReason {
    Manual,
    AutoRecovered,
    AdminAssigned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

/// Playback commands a master may broadcast to the other peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaybackAction {
    Play,
    Pause,
    Stop,
    Status,
}

/// Validated work payload as it travels through the router.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkPayload {
    pub text: String,
    pub language: String,
    pub speed: f64,
    pub priority: Priority,
}

/// A (peer, connection) pair naming one delivery target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerRef {
    pub peer_id: PeerId,
    pub connection_id: ConnectionId,
}

/// Public view of a connected peer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerView {
    pub peer_id: PeerId,
    pub connection_id: ConnectionId,
    pub has_role: bool,
    pub wants_role: bool,
    pub joined_at: chrono::DateTime<chrono::Utc>,
    pub last_activity_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

/// Public view of one role grant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleHolderView {
    pub peer_id: PeerId,
    pub connection_id: ConnectionId,
    pub reason: GrantReason,
    pub granted_at: chrono::DateTime<chrono::Utc>,
}

/// Point-in-time picture of the hub, sent to new peers and served to operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub mode: RoleMode,
    pub role_holders: Vec<RoleHolderView>,
    pub peers: Vec<PeerView>,
    pub queue_length: usize,
    pub in_flight: usize,
}

/// Converted speech delivered to role holders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioClip {
    /// `data:<format>;base64,<payload>`
    pub audio_url: String,
    pub format: String,
    pub duration_secs: f64,
    pub text_length: usize,
    pub original_text_length: usize,
    pub language: String,
    pub language_code: String,
    pub audio_size: usize,
}

/// Why a work submission was refused before routing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "code", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Rejection {
    EmptyText,
    TextTooLong { actual: usize, max: usize },
    MissingField { field: String },
    QueueFull { capacity: usize },
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::EmptyText => write!(f, "text is required"),
            Rejection::TextTooLong { actual, max } => {
                write!(f, "text too long ({actual} characters, maximum {max})")
            }
            Rejection::MissingField { field } => write!(f, "missing required field '{field}'"),
            Rejection::QueueFull { capacity } => {
                write!(f, "pending queue is full ({capacity} requests)")
            }
        }
    }
}
