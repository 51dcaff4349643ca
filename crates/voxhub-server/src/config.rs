//! Hub configuration.
//!
//! Looked up in order: `--config <path>`, `$VOXHUB_CONFIG`, then
//! `<config dir>/voxhub/config.toml` when it exists. Missing sections and
//! keys fall back to defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use voxhub_protocol::{RoleMode, DEFAULT_MAX_TEXT_LENGTH};
use voxhub_roles::{CoordinatorConfig, OrphanPolicy, RouterConfig};
use voxhub_synth::SynthConfig;

pub const CONFIG_ENV: &str = "VOXHUB_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub server: ServerConfig,
    pub roles: RolesConfig,
    pub sweeps: SweepConfig,
    pub synth: SynthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Static frontend directory. Detected when unset.
    pub web_root: Option<PathBuf>,
    pub events_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:3000".into(),
            web_root: None,
            events_interval_secs: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RolesConfig {
    pub mode: RoleMode,
    pub orphan_policy: OrphanPolicy,
    pub deliver_to_submitter: bool,
    pub max_recovery_attempts: u32,
    pub max_text_length: usize,
    pub max_queue_length: usize,
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            mode: RoleMode::Single,
            orphan_policy: OrphanPolicy::Retain,
            deliver_to_submitter: true,
            max_recovery_attempts: 3,
            max_text_length: DEFAULT_MAX_TEXT_LENGTH,
            max_queue_length: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub idle_sweep_interval_secs: u64,
    pub idle_timeout_secs: u64,
    pub history_sweep_interval_secs: u64,
    pub history_retention_secs: u64,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            idle_sweep_interval_secs: 60,
            idle_timeout_secs: 300,
            history_sweep_interval_secs: 1800,
            history_retention_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".into() }
    }
}

impl HubConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Load from the first configured location. Returns the path used, if any.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        let env_path = std::env::var(CONFIG_ENV).ok();
        let default_path = dirs::config_dir().map(|d| d.join("voxhub").join("config.toml"));
        match resolve_path(explicit, env_path.as_deref(), default_path) {
            Some(path) => Ok((Self::from_file(&path)?, Some(path))),
            None => Ok((Self::default(), None)),
        }
    }

    /// Replace the port of `bind_addr`, as set by `$PORT`.
    pub fn apply_port(&mut self, port: &str) -> Result<(), ConfigError> {
        let port: u16 = port
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("PORT '{port}' is not a valid port")))?;
        let host = match self.server.bind_addr.rsplit_once(':') {
            Some((host, _)) => host.to_string(),
            None => self.server.bind_addr.clone(),
        };
        self.server.bind_addr = format!("{host}:{port}");
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("sweeps.idle_sweep_interval_secs", self.sweeps.idle_sweep_interval_secs),
            ("sweeps.idle_timeout_secs", self.sweeps.idle_timeout_secs),
            ("sweeps.history_sweep_interval_secs", self.sweeps.history_sweep_interval_secs),
            ("sweeps.history_retention_secs", self.sweeps.history_retention_secs),
            ("server.events_interval_secs", self.server.events_interval_secs),
            ("synth.timeout_secs", self.synth.timeout_secs),
            ("synth.rate_limit_window_secs", self.synth.rate_limit_window_secs),
        ];
        for (name, value) in intervals {
            if value == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be greater than zero")));
            }
        }
        if self.roles.max_text_length == 0 {
            return Err(ConfigError::Invalid(
                "roles.max_text_length must be greater than zero".into(),
            ));
        }
        if self.roles.max_queue_length == 0 {
            return Err(ConfigError::Invalid(
                "roles.max_queue_length must be greater than zero".into(),
            ));
        }
        if self.roles.max_text_length > self.synth.max_text_length {
            return Err(ConfigError::Invalid(format!(
                "roles.max_text_length ({}) must not exceed synth.max_text_length ({})",
                self.roles.max_text_length, self.synth.max_text_length
            )));
        }
        if self.synth.chunk_length == 0 {
            return Err(ConfigError::Invalid("synth.chunk_length must be greater than zero".into()));
        }
        if self.server.bind_addr.trim().is_empty() {
            return Err(ConfigError::Invalid("server.bind_addr must not be empty".into()));
        }
        if self.sweeps.idle_timeout_secs < self.sweeps.idle_sweep_interval_secs {
            tracing::warn!(
                idle_timeout_secs = self.sweeps.idle_timeout_secs,
                idle_sweep_interval_secs = self.sweeps.idle_sweep_interval_secs,
                "Idle timeout is shorter than the sweep interval"
            );
        }
        Ok(())
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            mode: self.roles.mode,
            orphan_policy: self.roles.orphan_policy,
            router: RouterConfig {
                max_text_length: self.roles.max_text_length,
                max_queue_length: self.roles.max_queue_length,
                deliver_to_submitter: self.roles.deliver_to_submitter,
            },
            max_recovery_attempts: self.roles.max_recovery_attempts,
            idle_timeout: Duration::from_secs(self.sweeps.idle_timeout_secs),
            history_retention: Duration::from_secs(self.sweeps.history_retention_secs),
        }
    }

    pub fn idle_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweeps.idle_sweep_interval_secs)
    }

    pub fn history_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweeps.history_sweep_interval_secs)
    }

    pub fn events_interval(&self) -> Duration {
        Duration::from_secs(self.server.events_interval_secs)
    }
}

/// An explicit or env path is used even when missing, so the read fails
/// loudly. The default location is only used when it exists.
fn resolve_path(
    explicit: Option<&Path>,
    env_path: Option<&str>,
    default_path: Option<PathBuf>,
) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_path.filter(|p| !p.trim().is_empty()) {
        return Some(PathBuf::from(path));
    }
    default_path.filter(|p| p.exists())
}
