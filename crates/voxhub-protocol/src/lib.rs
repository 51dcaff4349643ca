//! voxhub protocol - identities and wire message definitions
//!
//! Every frame exchanged between a peer and the hub is a single JSON object
//! tagged by a kebab-case `type` field with camelCase payload fields.

pub mod constants;
pub mod error;
pub mod identity;
pub mod messages;
pub mod types;

pub use constants::*;
pub use error::*;
pub use identity::*;
pub use messages::*;
pub use types::*;
