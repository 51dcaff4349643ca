use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use voxhub_protocol::AudioClip;

use crate::languages::{supported_languages, Language};
use crate::SynthError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisRequest {
    pub text: String,
    pub language: String,
    #[serde(default = "default_speed")]
    pub speed: f64,
}

fn default_speed() -> f64 {
    voxhub_protocol::DEFAULT_SPEED
}

/// Result of a reachability check against the conversion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeReport {
    pub status: u16,
    pub message: String,
    pub checked_at: DateTime<Utc>,
}

/// Text-to-speech backend. Implementations validate and rate limit on their
/// own and must not touch hub state.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioClip, SynthError>;

    async fn probe(&self) -> Result<ProbeReport, SynthError>;

    fn languages(&self) -> Vec<Language> {
        supported_languages()
    }
}
