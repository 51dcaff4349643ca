//! voxhub synth - text-to-speech conversion
//!
//! The hub treats conversion as an opaque call. This crate provides the
//! `SpeechSynthesizer` seam and a Google Translate TTS implementation with
//! the input shaping and rate limiting the service needs.

pub mod config;
pub mod error;
pub mod google;
pub mod languages;
pub mod rate_limit;
pub mod shaping;
pub mod synthesizer;

pub use config::SynthConfig;
pub use error::SynthError;
pub use google::GoogleTts;
pub use languages::{supported_languages, Language};
pub use rate_limit::RateLimiter;
pub use synthesizer::{ProbeReport, SpeechSynthesizer, SynthesisRequest};
