//! voxhub server - websocket hub and HTTP control plane
//!
//! Wires the role coordinator to real connections: each websocket session
//! feeds events into the shared [`hub::Hub`], effects are written to
//! per-connection outboxes, and conversions run on spawned tasks against a
//! [`voxhub_synth::SpeechSynthesizer`].

pub mod config;
pub mod hub;
pub mod session;
pub mod web_server;

pub use config::{ConfigError, HubConfig};
pub use hub::{Hub, Outbound};
pub use web_server::WebServer;
