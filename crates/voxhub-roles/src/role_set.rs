//! Master role membership.
//!
//! The admission mode is fixed when the set is built. Single mode holds at
//! most one grant; a breach of that bound is a programming error: it panics
//! in debug builds and is logged and refused in release builds.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use voxhub_protocol::{ConnectionId, GrantReason, PeerId, PeerRef, RoleHolderView, RoleMode};

#[derive(Debug, Clone, PartialEq)]
pub struct RoleGrant {
    pub connection_id: ConnectionId,
    pub peer_id: PeerId,
    pub reason: GrantReason,
    pub granted_at: DateTime<Utc>,
    seq: u64,
}

impl RoleGrant {
    pub fn target(&self) -> PeerRef {
        PeerRef {
            peer_id: self.peer_id.clone(),
            connection_id: self.connection_id.clone(),
        }
    }

    pub fn view(&self) -> RoleHolderView {
        RoleHolderView {
            peer_id: self.peer_id.clone(),
            connection_id: self.connection_id.clone(),
            reason: self.reason,
            granted_at: self.granted_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Admission {
    Granted(RoleGrant),
    AlreadyMember,
    Denied { current_holders: Vec<PeerRef> },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ForcedAdmission {
    Granted {
        grant: RoleGrant,
        /// Holders pushed out to keep the single-master bound.
        displaced: Vec<RoleGrant>,
    },
    AlreadyMember,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Removal {
    Removed(RoleGrant),
    NotMember,
}

#[derive(Debug)]
pub struct RoleSet {
    mode: RoleMode,
    grants: HashMap<ConnectionId, RoleGrant>,
    next_seq: u64,
}

impl RoleSet {
    pub fn new(mode: RoleMode) -> Self {
        Self {
            mode,
            grants: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn mode(&self) -> RoleMode {
        self.mode
    }

    pub fn try_add(
        &mut self,
        connection_id: ConnectionId,
        peer_id: PeerId,
        reason: GrantReason,
        now: DateTime<Utc>,
    ) -> Admission {
        if self.grants.contains_key(&connection_id) {
            return Admission::AlreadyMember;
        }
        if self.mode == RoleMode::Single && !self.grants.is_empty() {
            return Admission::Denied {
                current_holders: self.targets(),
            };
        }
        match self.insert(connection_id, peer_id, reason, now) {
            Some(grant) => Admission::Granted(grant),
            None => Admission::Denied {
                current_holders: self.targets(),
            },
        }
    }

    /// Operator override. In single mode the existing holder is replaced.
    pub fn force_add(
        &mut self,
        connection_id: ConnectionId,
        peer_id: PeerId,
        now: DateTime<Utc>,
    ) -> ForcedAdmission {
        if self.grants.contains_key(&connection_id) {
            return ForcedAdmission::AlreadyMember;
        }
        let displaced = match self.mode {
            RoleMode::Single => {
                let mut out: Vec<RoleGrant> = self.grants.drain().map(|(_, g)| g).collect();
                out.sort_by_key(|g| g.seq);
                out
            }
            RoleMode::Multi => Vec::new(),
        };
        match self.insert(connection_id, peer_id, GrantReason::AdminAssigned, now) {
            Some(grant) => ForcedAdmission::Granted { grant, displaced },
            None => ForcedAdmission::AlreadyMember,
        }
    }

    pub fn remove(&mut self, connection_id: &ConnectionId) -> Removal {
        match self.grants.remove(connection_id) {
            Some(grant) => Removal::Removed(grant),
            None => Removal::NotMember,
        }
    }

    pub fn contains(&self, connection_id: &ConnectionId) -> bool {
        self.grants.contains_key(connection_id)
    }

    pub fn is_empty(&self) -> bool {
        self.grants.is_empty()
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }

    /// Grants in admission order.
    pub fn grants(&self) -> Vec<&RoleGrant> {
        let mut grants: Vec<&RoleGrant> = self.grants.values().collect();
        grants.sort_by_key(|g| g.seq);
        grants
    }

    pub fn members(&self) -> Vec<ConnectionId> {
        self.grants().into_iter().map(|g| g.connection_id.clone()).collect()
    }

    pub fn targets(&self) -> Vec<PeerRef> {
        self.grants().into_iter().map(RoleGrant::target).collect()
    }

    fn insert(
        &mut self,
        connection_id: ConnectionId,
        peer_id: PeerId,
        reason: GrantReason,
        now: DateTime<Utc>,
    ) -> Option<RoleGrant> {
        if self.mode == RoleMode::Single && !self.grants.is_empty() {
            debug_assert!(false, "single-master bound breached by {connection_id}");
            tracing::error!(
                connection_id = %connection_id,
                holders = self.grants.len(),
                "refusing grant that would breach the single-master bound"
            );
            return None;
        }
        let grant = RoleGrant {
            connection_id: connection_id.clone(),
            peer_id,
            reason,
            granted_at: now,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.grants.insert(connection_id, grant.clone());
        Some(grant)
    }
}
