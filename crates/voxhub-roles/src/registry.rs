//! Live connection registry.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use voxhub_protocol::{ConnectionId, PeerId, PeerRef, PeerView};

use crate::RegistryError;

/// One connected session.
#[derive(Debug, Clone, PartialEq)]
pub struct Peer {
    pub peer_id: PeerId,
    pub connection_id: ConnectionId,
    pub wants_role: bool,
    pub joined_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl Peer {
    pub fn target(&self) -> PeerRef {
        PeerRef {
            peer_id: self.peer_id.clone(),
            connection_id: self.connection_id.clone(),
        }
    }

    /// `has_role` is not stored on the peer; the caller supplies it from the role set.
    pub fn view(&self, has_role: bool) -> PeerView {
        PeerView {
            peer_id: self.peer_id.clone(),
            connection_id: self.connection_id.clone(),
            has_role,
            wants_role: self.wants_role,
            joined_at: self.joined_at,
            last_activity_at: self.last_activity_at,
            metadata: self.metadata.clone(),
        }
    }

    pub fn idle_for(&self, now: DateTime<Utc>) -> Option<Duration> {
        (now - self.last_activity_at).to_std().ok()
    }
}

#[derive(Debug, Default)]
pub struct PeerRegistry {
    peers: HashMap<ConnectionId, Peer>,
}

impl PeerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        connection_id: ConnectionId,
        peer_id: PeerId,
        metadata: serde_json::Map<String, serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<Peer, RegistryError> {
        if peer_id.as_str().trim().is_empty() || connection_id.as_str().trim().is_empty() {
            return Err(RegistryError::EmptyIdentity);
        }
        if self.peers.contains_key(&connection_id) {
            return Err(RegistryError::DuplicateConnection(connection_id));
        }
        let peer = Peer {
            peer_id,
            connection_id: connection_id.clone(),
            wants_role: false,
            joined_at: now,
            last_activity_at: now,
            metadata,
        };
        self.peers.insert(connection_id, peer.clone());
        Ok(peer)
    }

    /// Refresh activity. Returns false for unknown connections.
    pub fn touch(&mut self, connection_id: &ConnectionId, now: DateTime<Utc>) -> bool {
        match self.peers.get_mut(connection_id) {
            Some(peer) => {
                peer.last_activity_at = now;
                true
            }
            None => false,
        }
    }

    /// Removing an absent connection is a no-op.
    pub fn remove(&mut self, connection_id: &ConnectionId) -> Option<Peer> {
        self.peers.remove(connection_id)
    }

    pub fn get(&self, connection_id: &ConnectionId) -> Option<&Peer> {
        self.peers.get(connection_id)
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.peers.contains_key(connection_id)
    }

    /// Most recently joined connection presenting this identity.
    pub fn find_by_peer(&self, peer_id: &PeerId) -> Option<&Peer> {
        self.peers
            .values()
            .filter(|p| &p.peer_id == peer_id)
            .max_by_key(|p| p.joined_at)
    }

    pub fn set_wants_role(&mut self, connection_id: &ConnectionId, wants_role: bool) {
        if let Some(peer) = self.peers.get_mut(connection_id) {
            peer.wants_role = wants_role;
        }
    }

    pub fn set_metadata(
        &mut self,
        connection_id: &ConnectionId,
        metadata: serde_json::Map<String, serde_json::Value>,
    ) {
        if let Some(peer) = self.peers.get_mut(connection_id) {
            peer.metadata = metadata;
        }
    }

    /// Peers ordered by join time.
    pub fn list(&self) -> Vec<&Peer> {
        let mut peers: Vec<&Peer> = self.peers.values().collect();
        peers.sort_by(|a, b| {
            a.joined_at
                .cmp(&b.joined_at)
                .then_with(|| a.connection_id.cmp(&b.connection_id))
        });
        peers
    }

    pub fn count(&self) -> usize {
        self.peers.len()
    }

    /// Connections silent for at least `threshold`.
    pub fn idle(&self, threshold: Duration, now: DateTime<Utc>) -> Vec<ConnectionId> {
        let mut idle: Vec<&Peer> = self
            .peers
            .values()
            .filter(|p| p.idle_for(now).is_some_and(|d| d >= threshold))
            .collect();
        idle.sort_by_key(|p| p.last_activity_at);
        idle.into_iter().map(|p| p.connection_id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(id: &str) -> ConnectionId {
        ConnectionId::new(id.into())
    }

    fn peer(id: &str) -> PeerId {
        PeerId::new(id.into())
    }

    #[test]
    fn test_register_and_lookup() {
        let mut reg = PeerRegistry::new();
        let now = Utc::now();
        let p = reg.register(conn("c1"), peer("p1"), Default::default(), now).unwrap();
        assert_eq!(p.peer_id, peer("p1"));
        assert!(!p.wants_role);
        assert_eq!(reg.count(), 1);
        assert_eq!(reg.get(&conn("c1")).unwrap().joined_at, now);
    }

    #[test]
    fn test_duplicate_connection_rejected() {
        let mut reg = PeerRegistry::new();
        let now = Utc::now();
        reg.register(conn("c1"), peer("p1"), Default::default(), now).unwrap();
        let err = reg
            .register(conn("c1"), peer("p2"), Default::default(), now)
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicateConnection(conn("c1")));
        assert_eq!(reg.count(), 1);
    }

    #[test]
    fn test_empty_identity_rejected() {
        let mut reg = PeerRegistry::new();
        let err = reg
            .register(conn("c1"), peer("  "), Default::default(), Utc::now())
            .unwrap_err();
        assert_eq!(err, RegistryError::EmptyIdentity);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut reg = PeerRegistry::new();
        reg.register(conn("c1"), peer("p1"), Default::default(), Utc::now()).unwrap();
        assert!(reg.remove(&conn("c1")).is_some());
        assert!(reg.remove(&conn("c1")).is_none());
        assert_eq!(reg.count(), 0);
    }

    #[test]
    fn test_idle_detection_uses_last_activity() {
        let mut reg = PeerRegistry::new();
        let t0 = Utc::now();
        reg.register(conn("quiet"), peer("p1"), Default::default(), t0).unwrap();
        reg.register(conn("chatty"), peer("p2"), Default::default(), t0).unwrap();
        reg.touch(&conn("chatty"), t0 + chrono::Duration::seconds(250));

        let idle = reg.idle(Duration::from_secs(300), t0 + chrono::Duration::seconds(301));
        assert_eq!(idle, vec![conn("quiet")]);
    }

    #[test]
    fn test_find_by_peer_prefers_latest_connection() {
        let mut reg = PeerRegistry::new();
        let t0 = Utc::now();
        reg.register(conn("old"), peer("p1"), Default::default(), t0).unwrap();
        reg.register(conn("new"), peer("p1"), Default::default(), t0 + chrono::Duration::seconds(5))
            .unwrap();
        assert_eq!(reg.find_by_peer(&peer("p1")).unwrap().connection_id, conn("new"));
    }
}
