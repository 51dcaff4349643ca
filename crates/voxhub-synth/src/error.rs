use thiserror::Error;

#[derive(Debug, Error)]
pub enum SynthError {
    #[error("invalid input: {0}")]
    Validation(String),

    #[error("too many conversion requests, try again later")]
    RateLimited,

    #[error("conversion service timed out")]
    Timeout,

    #[error("conversion endpoint not found")]
    NotFound,

    #[error("conversion service returned HTTP {0}")]
    Status(u16),

    #[error("conversion service returned no audio")]
    EmptyAudio,

    #[error("audio response too large ({size} bytes, maximum {max})")]
    TooLarge { size: usize, max: usize },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl SynthError {
    /// Map a transport error, keeping timeouts distinct.
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SynthError::Timeout
        } else {
            SynthError::Http(err)
        }
    }

    pub fn from_status(status: u16) -> Self {
        match status {
            429 => SynthError::RateLimited,
            404 => SynthError::NotFound,
            other => SynthError::Status(other),
        }
    }
}
