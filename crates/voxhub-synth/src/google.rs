//! Google Translate TTS client.

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, ORIGIN, REFERER, USER_AGENT,
};
use tokio::sync::Mutex;
use voxhub_protocol::AudioClip;

use crate::rate_limit::RateLimiter;
use crate::shaping::{estimate_duration, map_language_code, shape_text, truncate};
use crate::synthesizer::{ProbeReport, SpeechSynthesizer, SynthesisRequest};
use crate::{SynthConfig, SynthError};

/// The endpoint always answers with MP3.
const AUDIO_FORMAT: &str = "audio/mp3";
const LIMITER_KEY: &str = "google-tts";
const PROBE_TEXT: &str = "Halo, selamat pagi. Apa kabar?";
const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36";

pub struct GoogleTts {
    client: reqwest::Client,
    config: SynthConfig,
    limiter: Mutex<RateLimiter>,
}

impl GoogleTts {
    pub fn new(config: SynthConfig) -> Result<Self, SynthError> {
        let mut headers = HeaderMap::new();
        headers.insert(REFERER, HeaderValue::from_static("https://translate.google.com/"));
        headers.insert(ORIGIN, HeaderValue::from_static("https://translate.google.com"));
        headers.insert(ACCEPT, HeaderValue::from_static("audio/mpeg, audio/*"));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .default_headers(headers)
            .build()?;
        let limiter = RateLimiter::new(
            config.rate_limit_points,
            std::time::Duration::from_secs(config.rate_limit_window_secs),
        );
        Ok(Self {
            client,
            config,
            limiter: Mutex::new(limiter),
        })
    }

    pub fn validate(&self, request: &SynthesisRequest) -> Result<(), SynthError> {
        let text = request.text.trim();
        if text.is_empty() {
            return Err(SynthError::Validation("text must not be empty".into()));
        }
        let len = text.chars().count();
        if len > self.config.max_text_length {
            return Err(SynthError::Validation(format!(
                "text too long ({len} characters, maximum {})",
                self.config.max_text_length
            )));
        }
        if request.language.trim().is_empty() {
            return Err(SynthError::Validation("language must not be empty".into()));
        }
        Ok(())
    }

    /// Build the endpoint request for already-shaped text.
    pub fn build_request(
        &self,
        text: &str,
        language_code: &str,
    ) -> Result<reqwest::Request, SynthError> {
        let textlen = text.chars().count().to_string();
        let request = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("ie", "UTF-8"),
                ("tl", language_code),
                ("client", "gtx"),
                ("q", text),
                ("ttsspeed", "1.0"),
                ("textlen", textlen.as_str()),
                ("idx", "0"),
                ("total", "1"),
                ("prev", "input"),
                ("dn", "translate.google.com"),
            ])
            .build()?;
        Ok(request)
    }

    async fn read_capped(&self, mut response: reqwest::Response) -> Result<Vec<u8>, SynthError> {
        let max = self.config.max_audio_bytes;
        if let Some(declared) = response.content_length() {
            if declared as usize > max {
                return Err(SynthError::TooLarge {
                    size: declared as usize,
                    max,
                });
            }
        }
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(SynthError::from_transport)? {
            if body.len() + chunk.len() > max {
                return Err(SynthError::TooLarge {
                    size: body.len() + chunk.len(),
                    max,
                });
            }
            body.extend_from_slice(&chunk);
        }
        Ok(body)
    }
}

/// `data:<format>;base64,<payload>`
pub fn encode_data_url(format: &str, audio: &[u8]) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(audio);
    format!("data:{format};base64,{encoded}")
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<AudioClip, SynthError> {
        self.validate(request)?;
        if !self.limiter.lock().await.check(LIMITER_KEY) {
            tracing::warn!("Conversion rate limit reached");
            return Err(SynthError::RateLimited);
        }

        let language_code = map_language_code(&request.language);
        let shaped = shape_text(&request.text, language_code);
        let text = truncate(&shaped, self.config.chunk_length);
        tracing::debug!(
            language_code,
            length = text.chars().count(),
            speed = request.speed,
            "Requesting speech"
        );

        let http_request = self.build_request(&text, language_code)?;
        let response = self
            .client
            .execute(http_request)
            .await
            .map_err(SynthError::from_transport)?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = status.as_u16(), "Conversion endpoint refused request");
            return Err(SynthError::from_status(status.as_u16()));
        }

        let audio = self.read_capped(response).await?;
        if audio.is_empty() {
            return Err(SynthError::EmptyAudio);
        }
        tracing::info!(language_code, bytes = audio.len(), "Speech converted");

        Ok(AudioClip {
            audio_url: encode_data_url(AUDIO_FORMAT, &audio),
            format: AUDIO_FORMAT.to_string(),
            duration_secs: estimate_duration(&text),
            text_length: text.chars().count(),
            original_text_length: request.text.chars().count(),
            language: request.language.clone(),
            language_code: language_code.to_string(),
            audio_size: audio.len(),
        })
    }

    async fn probe(&self) -> Result<ProbeReport, SynthError> {
        let response = self
            .client
            .head(&self.config.endpoint)
            .query(&[
                ("ie", "UTF-8"),
                ("tl", "id"),
                ("client", "gtx"),
                ("q", PROBE_TEXT),
                ("ttsspeed", "1.0"),
            ])
            .timeout(self.config.probe_timeout())
            .send()
            .await
            .map_err(SynthError::from_transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(SynthError::from_status(status.as_u16()));
        }
        Ok(ProbeReport {
            status: status.as_u16(),
            message: "conversion endpoint reachable".into(),
            checked_at: chrono::Utc::now(),
        })
    }
}
