//! maitre binary — CLI entry point and serve loop.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use maitre::config::Config;
use maitre::gateway::{self, AppState};
use maitre::observability::{self, Metrics};
use maitre::reclaim::Reclaimer;
use maitre::sessions;
use maitre::throttle;

/// `maitre` - Front-of-house for conversational booking agents.
#[derive(Parser, Debug)]
#[command(name = "maitre")]
#[command(version)]
#[command(about = "Bounded sessions, per-client quotas, zero leaks.", long_about = None)]
struct Cli {
    /// Override the config directory (default: ~/.maitre)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the HTTP gateway and the background reclaimer
    #[command(long_about = "\
Start the HTTP gateway and the background reclaimer.

The reclaimer is started here, after the async runtime is up, and is
stopped cooperatively on Ctrl-C: in-flight sweeps finish, then the
process exits.

Examples:
  maitre serve
  maitre serve --port 9000
  MAITRE_GATEWAY_HOST=0.0.0.0 maitre serve")]
    Serve {
        /// Bind host override
        #[arg(long)]
        host: Option<String>,

        /// Bind port override
        #[arg(long)]
        port: Option<u16>,
    },
    /// Print the resolved configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Serve { host, port } => serve(cli.config_dir.as_deref(), host, port).await,
        Commands::Config => {
            let config = Config::load_or_init(cli.config_dir.as_deref()).await?;
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

async fn serve(
    config_dir: Option<&std::path::Path>,
    host: Option<String>,
    port: Option<u16>,
) -> Result<()> {
    let mut config = Config::load_or_init(config_dir).await?;
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }
    config.validate()?;

    let metrics = Arc::new(Metrics::new()?);
    let store = sessions::create_session_store(config.limits.session_limits());
    let limiter = throttle::create_rate_limiter(
        config.limits.rate_limit_requests,
        config.limits.rate_window(),
    );
    let sink = observability::create_event_sink(Arc::clone(&metrics));

    // Background work starts here, once the runtime is live, never at
    // static-init time.
    let reclaimer = Reclaimer::new(
        Arc::clone(&store),
        Arc::clone(&limiter),
        sink,
        config.limits.reclaim_interval(),
    );
    let reclaimer_handle = reclaimer.spawn();

    let state = AppState {
        config: Arc::new(config),
        store,
        limiter,
        responder: None,
        metrics,
    };

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
    };
    gateway::serve(state, shutdown).await?;

    reclaimer_handle.shutdown().await;
    info!("maitre stopped");
    Ok(())
}
