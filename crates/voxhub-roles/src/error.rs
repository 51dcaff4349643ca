use thiserror::Error;
use voxhub_protocol::ConnectionId;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("connection {0} is already registered")]
    DuplicateConnection(ConnectionId),

    #[error("peer identity must not be empty")]
    EmptyIdentity,
}

/// Structured failures returned to callers of coordinator operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoordinatorError {
    #[error("no connected peer matches '{0}'")]
    UnknownPeer(String),

    #[error("'{0}' does not hold the master role")]
    NotRoleHolder(String),

    #[error("'{0}' already holds the master role")]
    AlreadyRoleHolder(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}
