use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Conversion client settings, read from the `[synth]` config section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
    pub probe_timeout_secs: u64,
    /// Shaped text is cut to this many characters before sending.
    pub chunk_length: usize,
    pub max_text_length: usize,
    pub max_audio_bytes: usize,
    pub rate_limit_points: u32,
    pub rate_limit_window_secs: u64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://translate.google.com/translate_tts".into(),
            timeout_secs: 15,
            probe_timeout_secs: 10,
            chunk_length: 180,
            max_text_length: voxhub_protocol::DEFAULT_MAX_TEXT_LENGTH,
            max_audio_bytes: 1024 * 1024,
            rate_limit_points: 100,
            rate_limit_window_secs: 900,
        }
    }
}

impl SynthConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
