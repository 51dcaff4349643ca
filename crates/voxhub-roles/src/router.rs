//! Work validation, fan-out and the pending queue.
//!
//! Work goes to every current master. While there is none it waits in a FIFO
//! queue that is taken whole the moment a master is admitted. The queue is
//! only ever non-empty while the role set is empty.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use voxhub_protocol::{
    clamp_speed, PeerRef, Priority, Rejection, RequestId, WorkPayload, DEFAULT_MAX_TEXT_LENGTH,
};

use crate::role_set::RoleSet;

#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Inclusive maximum for trimmed text, in characters.
    pub max_text_length: usize,
    pub max_queue_length: usize,
    /// Whether a submitter that also holds the role receives its own work
    /// when other masters exist.
    pub deliver_to_submitter: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            max_queue_length: 100,
            deliver_to_submitter: true,
        }
    }
}

/// Raw submission as received from a peer.
#[derive(Debug, Clone)]
pub struct WorkRequest {
    pub request_id: RequestId,
    pub submitted_by: PeerRef,
    pub text: String,
    pub language: Option<String>,
    pub speed: Option<f64>,
    pub priority: Option<Priority>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub request_id: RequestId,
    pub payload: WorkPayload,
    pub submitted_by: PeerRef,
    pub enqueued_at: DateTime<Utc>,
}

/// Work handed to the conversion service for a fixed set of masters.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub request_id: RequestId,
    pub payload: WorkPayload,
    pub submitted_by: PeerRef,
    pub targets: Vec<PeerRef>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    Routed(Dispatch),
    Queued { request_id: RequestId, position: usize },
    Rejected(Rejection),
}

#[derive(Debug)]
pub struct RequestRouter {
    config: RouterConfig,
    queue: VecDeque<PendingRequest>,
}

impl RequestRouter {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            config,
            queue: VecDeque::new(),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Checks run in order and the first failure wins.
    pub fn validate(&self, request: &WorkRequest) -> Result<WorkPayload, Rejection> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(Rejection::EmptyText);
        }
        let actual = text.chars().count();
        if actual > self.config.max_text_length {
            return Err(Rejection::TextTooLong {
                actual,
                max: self.config.max_text_length,
            });
        }
        let language = match request.language.as_deref().map(str::trim) {
            Some(lang) if !lang.is_empty() => lang.to_string(),
            _ => {
                return Err(Rejection::MissingField {
                    field: "language".into(),
                })
            }
        };
        Ok(WorkPayload {
            text: text.to_string(),
            language,
            speed: clamp_speed(request.speed),
            priority: request.priority.unwrap_or_default(),
        })
    }

    pub fn submit(
        &mut self,
        request: WorkRequest,
        roles: &RoleSet,
        now: DateTime<Utc>,
    ) -> SubmitOutcome {
        let payload = match self.validate(&request) {
            Ok(p) => p,
            Err(rejection) => return SubmitOutcome::Rejected(rejection),
        };

        if roles.is_empty() {
            if self.queue.len() >= self.config.max_queue_length {
                return SubmitOutcome::Rejected(Rejection::QueueFull {
                    capacity: self.config.max_queue_length,
                });
            }
            let request_id = request.request_id.clone();
            self.queue.push_back(PendingRequest {
                request_id: request.request_id,
                payload,
                submitted_by: request.submitted_by,
                enqueued_at: now,
            });
            return SubmitOutcome::Queued {
                request_id,
                position: self.queue.len(),
            };
        }

        let targets = self.select_targets(roles, &request.submitted_by);
        SubmitOutcome::Routed(Dispatch {
            request_id: request.request_id,
            payload,
            submitted_by: request.submitted_by,
            targets,
        })
    }

    /// Take the whole queue, oldest first, addressed to the current masters.
    pub fn drain(&mut self, roles: &RoleSet) -> Vec<Dispatch> {
        if roles.is_empty() {
            return Vec::new();
        }
        std::mem::take(&mut self.queue)
            .into_iter()
            .map(|pending| Dispatch {
                targets: self.select_targets(roles, &pending.submitted_by),
                request_id: pending.request_id,
                payload: pending.payload,
                submitted_by: pending.submitted_by,
            })
            .collect()
    }

    pub fn clear(&mut self) -> Vec<PendingRequest> {
        std::mem::take(&mut self.queue).into_iter().collect()
    }

    /// Put already-validated work back at the tail. Returns its position, or
    /// hands the work back when the queue is at capacity.
    pub fn requeue(&mut self, pending: PendingRequest) -> Result<usize, PendingRequest> {
        if self.queue.len() >= self.config.max_queue_length {
            return Err(pending);
        }
        self.queue.push_back(pending);
        Ok(self.queue.len())
    }

    pub fn select_targets(&self, roles: &RoleSet, submitter: &PeerRef) -> Vec<PeerRef> {
        let all = roles.targets();
        if self.config.deliver_to_submitter {
            return all;
        }
        let others: Vec<PeerRef> = all
            .iter()
            .filter(|t| t.connection_id != submitter.connection_id)
            .cloned()
            .collect();
        if others.is_empty() {
            all
        } else {
            others
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxhub_protocol::{ConnectionId, GrantReason, PeerId, RoleMode};

    fn target(id: &str) -> PeerRef {
        PeerRef {
            peer_id: PeerId::new(format!("peer-{id}")),
            connection_id: ConnectionId::new(format!("conn-{id}")),
        }
    }

    fn request(from: &str, text: &str) -> WorkRequest {
        WorkRequest {
            request_id: RequestId::generate(),
            submitted_by: target(from),
            text: text.into(),
            language: Some("id-ID".into()),
            speed: None,
            priority: None,
        }
    }

    fn grant(roles: &mut RoleSet, id: &str) {
        let t = target(id);
        roles.try_add(t.connection_id, t.peer_id, GrantReason::Manual, Utc::now());
    }

    fn router(max_text_length: usize) -> RequestRouter {
        RequestRouter::new(RouterConfig {
            max_text_length,
            ..Default::default()
        })
    }

    #[test]
    fn test_blank_text_rejected_not_queued() {
        let mut r = router(10);
        let roles = RoleSet::new(RoleMode::Single);
        let outcome = r.submit(request("b", "   \n\t "), &roles, Utc::now());
        assert_eq!(outcome, SubmitOutcome::Rejected(Rejection::EmptyText));
        assert!(r.is_empty());
    }

    #[test]
    fn test_length_boundary_is_inclusive() {
        let r = router(10);
        assert!(r.validate(&request("b", &"a".repeat(10))).is_ok());
        assert_eq!(
            r.validate(&request("b", &"a".repeat(11))).unwrap_err(),
            Rejection::TextTooLong { actual: 11, max: 10 }
        );
    }

    #[test]
    fn test_length_is_measured_after_trimming() {
        let r = router(5);
        assert!(r.validate(&request("b", "   abcde   ")).is_ok());
    }

    #[test]
    fn test_length_counts_characters() {
        let r = router(3);
        assert!(r.validate(&request("b", "日本語")).is_ok());
    }

    #[test]
    fn test_empty_text_wins_over_missing_language() {
        let r = router(10);
        let mut req = request("b", " ");
        req.language = None;
        assert_eq!(r.validate(&req).unwrap_err(), Rejection::EmptyText);
    }

    #[test]
    fn test_missing_language_rejected() {
        let r = router(10);
        let mut req = request("b", "hello");
        req.language = Some("  ".into());
        assert_eq!(
            r.validate(&req).unwrap_err(),
            Rejection::MissingField { field: "language".into() }
        );
    }

    #[test]
    fn test_speed_defaults_and_clamps() {
        let r = router(10);
        let mut req = request("b", "hello");
        assert_eq!(r.validate(&req).unwrap().speed, 1.0);
        req.speed = Some(9.0);
        assert_eq!(r.validate(&req).unwrap().speed, 2.0);
        req.speed = Some(0.1);
        assert_eq!(r.validate(&req).unwrap().speed, 0.5);
        req.speed = Some(f64::NAN);
        assert_eq!(r.validate(&req).unwrap().speed, 1.0);
    }

    #[test]
    fn test_queue_then_drain_in_order() {
        let mut r = router(100);
        let mut roles = RoleSet::new(RoleMode::Single);
        for (i, text) in ["R1", "R2", "R3"].iter().enumerate() {
            match r.submit(request("b", text), &roles, Utc::now()) {
                SubmitOutcome::Queued { position, .. } => assert_eq!(position, i + 1),
                other => panic!("expected queueing, got {other:?}"),
            }
        }
        grant(&mut roles, "a");
        let drained = r.drain(&roles);
        let texts: Vec<&str> = drained.iter().map(|d| d.payload.text.as_str()).collect();
        assert_eq!(texts, vec!["R1", "R2", "R3"]);
        assert!(drained.iter().all(|d| d.targets == vec![target("a")]));
        assert!(r.is_empty());
        assert!(r.drain(&roles).is_empty());
    }

    #[test]
    fn test_drain_without_masters_keeps_queue() {
        let mut r = router(100);
        let roles = RoleSet::new(RoleMode::Single);
        r.submit(request("b", "wait"), &roles, Utc::now());
        assert!(r.drain(&roles).is_empty());
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_queue_capacity() {
        let mut r = RequestRouter::new(RouterConfig {
            max_queue_length: 1,
            ..Default::default()
        });
        let roles = RoleSet::new(RoleMode::Single);
        r.submit(request("b", "one"), &roles, Utc::now());
        assert_eq!(
            r.submit(request("b", "two"), &roles, Utc::now()),
            SubmitOutcome::Rejected(Rejection::QueueFull { capacity: 1 })
        );
    }

    #[test]
    fn test_requeue_respects_capacity() {
        let mut r = RequestRouter::new(RouterConfig {
            max_queue_length: 1,
            ..Default::default()
        });
        let pending = |text: &str| PendingRequest {
            request_id: RequestId::generate(),
            payload: WorkPayload {
                text: text.into(),
                language: "id-ID".into(),
                speed: 1.0,
                priority: Priority::default(),
            },
            submitted_by: target("b"),
            enqueued_at: Utc::now(),
        };
        assert_eq!(r.requeue(pending("one")), Ok(1));
        let refused = r.requeue(pending("two")).unwrap_err();
        assert_eq!(refused.payload.text, "two");
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_routes_to_all_masters() {
        let mut r = router(100);
        let mut roles = RoleSet::new(RoleMode::Multi);
        grant(&mut roles, "a");
        grant(&mut roles, "b");
        match r.submit(request("c", "hi"), &roles, Utc::now()) {
            SubmitOutcome::Routed(d) => assert_eq!(d.targets, vec![target("a"), target("b")]),
            other => panic!("expected routing, got {other:?}"),
        }
        assert!(r.is_empty());
    }

    #[test]
    fn test_self_delivery_suppressed_among_several_masters() {
        let mut r = RequestRouter::new(RouterConfig {
            deliver_to_submitter: false,
            ..Default::default()
        });
        let mut roles = RoleSet::new(RoleMode::Multi);
        grant(&mut roles, "a");
        grant(&mut roles, "b");
        match r.submit(request("a", "hi"), &roles, Utc::now()) {
            SubmitOutcome::Routed(d) => assert_eq!(d.targets, vec![target("b")]),
            other => panic!("unexpected {other:?}"),
        }

        let mut solo = RoleSet::new(RoleMode::Multi);
        grant(&mut solo, "a");
        match r.submit(request("a", "hi"), &solo, Utc::now()) {
            SubmitOutcome::Routed(d) => assert_eq!(d.targets, vec![target("a")]),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_clear_returns_everything() {
        let mut r = router(100);
        let roles = RoleSet::new(RoleMode::Single);
        r.submit(request("b", "x"), &roles, Utc::now());
        r.submit(request("b", "y"), &roles, Utc::now());
        assert_eq!(r.clear().len(), 2);
        assert!(r.is_empty());
    }
}
