use thiserror::Error;

/// Errors produced while decoding or constructing protocol values.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    #[error("identity must not be empty")]
    EmptyIdentity,
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::InvalidMessage(e.to_string())
    }
}
