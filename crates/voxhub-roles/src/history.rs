//! Durable role intent, keyed by peer identity so it survives reconnects.
//!
//! "Wants the role" is kept apart from "holds the role" (the role set). That
//! lets a returning peer tell "never was master" from "was master and lost
//! the connection".

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use voxhub_protocol::{PeerId, RoleMode};

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub wants_role: bool,
    pub was_role_holder: bool,
    pub last_seen_at: DateTime<Utc>,
    pub recovery_attempts: u32,
}

impl HistoryEntry {
    fn new(now: DateTime<Utc>) -> Self {
        Self {
            wants_role: false,
            was_role_holder: false,
            last_seen_at: now,
            recovery_attempts: 0,
        }
    }
}

#[derive(Debug)]
pub struct RoleHistory {
    entries: HashMap<PeerId, HistoryEntry>,
    max_recovery_attempts: u32,
}

impl RoleHistory {
    pub fn new(max_recovery_attempts: u32) -> Self {
        Self {
            entries: HashMap::new(),
            max_recovery_attempts,
        }
    }

    pub fn record_preference(&mut self, peer_id: &PeerId, wants_role: bool, now: DateTime<Utc>) {
        let entry = self.entry(peer_id, now);
        entry.wants_role = wants_role;
    }

    /// A grant implies intent. The holder flag is only raised once the role is
    /// lost, so other connections of a current holder are not recovered.
    pub fn record_grant(&mut self, peer_id: &PeerId, now: DateTime<Utc>) {
        let entry = self.entry(peer_id, now);
        entry.wants_role = true;
        entry.was_role_holder = false;
        entry.recovery_attempts = 0;
    }

    /// Intentional release forgets the identity entirely; anything else marks
    /// it as a lost holder eligible for recovery.
    pub fn record_release(&mut self, peer_id: &PeerId, intentional: bool, now: DateTime<Utc>) {
        if intentional {
            self.entries.remove(peer_id);
            return;
        }
        let entry = self.entry(peer_id, now);
        entry.was_role_holder = true;
    }

    /// An operator took the role away; intent stays, recovery does not.
    pub fn record_revocation(&mut self, peer_id: &PeerId, now: DateTime<Utc>) {
        let entry = self.entry(peer_id, now);
        entry.was_role_holder = false;
    }

    /// Count a failed recovery. Returns the new attempt count.
    pub fn record_recovery_attempt(&mut self, peer_id: &PeerId, now: DateTime<Utc>) -> u32 {
        let entry = self.entry(peer_id, now);
        entry.recovery_attempts = entry.recovery_attempts.saturating_add(1);
        entry.recovery_attempts
    }

    pub fn touch(&mut self, peer_id: &PeerId, now: DateTime<Utc>) {
        if let Some(entry) = self.entries.get_mut(peer_id) {
            entry.last_seen_at = now;
        }
    }

    pub fn should_auto_grant(
        &self,
        peer_id: &PeerId,
        mode: RoleMode,
        role_set_empty: bool,
    ) -> bool {
        let Some(entry) = self.entries.get(peer_id) else {
            return false;
        };
        if !entry.wants_role || entry.recovery_attempts >= self.max_recovery_attempts {
            return false;
        }
        match mode {
            RoleMode::Single => role_set_empty,
            RoleMode::Multi => true,
        }
    }

    /// True when a previous holder still intends to come back.
    pub fn wants_recovery(&self, peer_id: &PeerId) -> bool {
        self.entries
            .get(peer_id)
            .is_some_and(|e| e.wants_role && e.was_role_holder)
    }

    pub fn get(&self, peer_id: &PeerId) -> Option<&HistoryEntry> {
        self.entries.get(peer_id)
    }

    /// Drop entries not seen for at least `max_age`. Returns the purged identities.
    pub fn sweep(&mut self, max_age: Duration, now: DateTime<Utc>) -> Vec<PeerId> {
        let expired: Vec<PeerId> = self
            .entries
            .iter()
            .filter(|(_, e)| (now - e.last_seen_at).to_std().is_ok_and(|age| age >= max_age))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &expired {
            self.entries.remove(id);
        }
        expired
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&mut self, peer_id: &PeerId, now: DateTime<Utc>) -> &mut HistoryEntry {
        let entry = self
            .entries
            .entry(peer_id.clone())
            .or_insert_with(|| HistoryEntry::new(now));
        entry.last_seen_at = now;
        entry
    }
}
