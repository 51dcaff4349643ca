use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use voxhub_protocol::RoleMode;
use voxhub_roles::OrphanPolicy;
use voxhub_server::{Hub, HubConfig, WebServer};
use voxhub_synth::GoogleTts;

/// voxhub: master/client coordination hub for shared text-to-speech.
#[derive(Parser, Debug)]
#[command(name = "voxhub", version, about)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, e.g. 0.0.0.0:3000.
    #[arg(long)]
    bind: Option<String>,

    /// Role admission mode: single or multi.
    #[arg(long)]
    mode: Option<RoleMode>,

    /// What to do with converted work when no master remains: retain or cancel.
    #[arg(long)]
    orphan_policy: Option<OrphanPolicy>,

    /// Directory with the static frontend.
    #[arg(long)]
    web_root: Option<PathBuf>,

    /// Log filter, overrides RUST_LOG (e.g. "debug", "voxhub_roles=trace").
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let level_from_cli = cli.log_level.is_some();

    let (mut config, config_path) = HubConfig::discover(cli.config.as_deref())?;
    if let Ok(port) = std::env::var("PORT") {
        config.apply_port(&port)?;
    }
    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }
    if let Some(mode) = cli.mode {
        config.roles.mode = mode;
    }
    if let Some(policy) = cli.orphan_policy {
        config.roles.orphan_policy = policy;
    }
    if let Some(web_root) = cli.web_root {
        config.server.web_root = Some(web_root);
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    init_tracing(&config.logging.level, level_from_cli);
    config.validate()?;

    tracing::info!(
        config = ?config_path,
        mode = ?config.roles.mode,
        orphan_policy = ?config.roles.orphan_policy,
        "Starting voxhub"
    );

    let synth = Arc::new(GoogleTts::new(config.synth.clone())?);
    let hub = Hub::new(config.coordinator_config(), synth);

    let timers = tokio::spawn(
        hub.clone()
            .run_timers(config.idle_sweep_interval(), config.history_sweep_interval()),
    );
    let server = WebServer::new(
        config.server.bind_addr.clone(),
        hub,
        config.server.web_root.clone(),
        config.events_interval(),
    );

    tokio::select! {
        result = server.run() => result?,
        result = timers => result??,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutting down");
        }
    }
    Ok(())
}

/// `--log-level` wins over `RUST_LOG`; the config file level does not.
fn init_tracing(level: &str, force: bool) {
    let filter = if force {
        EnvFilter::new(level)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
