//! voxhub roles - master election and work routing
//!
//! The state machine that decides which connected peers hold the master
//! role and where submitted work goes:
//! - `PeerRegistry` tracks live connections
//! - `RoleSet` enforces single- or multi-master admission
//! - `RoleHistory` remembers durable role intent across reconnects
//! - `RequestRouter` validates work and fans it out, or queues it while no
//!   master exists
//! - `SessionCoordinator` owns all of the above and turns events into effects

pub mod coordinator;
pub mod error;
pub mod history;
pub mod registry;
pub mod role_set;
pub mod router;

pub use coordinator::{
    CoordinatorConfig, Effect, OrphanPolicy, Recipient, SessionCoordinator, SessionEvent,
};
pub use error::{CoordinatorError, RegistryError};
pub use history::{HistoryEntry, RoleHistory};
pub use registry::{Peer, PeerRegistry};
pub use role_set::{Admission, ForcedAdmission, Removal, RoleGrant, RoleSet};
pub use router::{Dispatch, PendingRequest, RequestRouter, RouterConfig, SubmitOutcome, WorkRequest};
